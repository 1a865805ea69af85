pub mod app;
pub mod catalog;
pub mod logwatch;
pub mod process;
pub mod session;
pub mod status;
pub mod supervisor;
