pub mod config;

pub use config::{CatalogConfig, Config, WatchConfig};
