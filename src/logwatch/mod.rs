//! Game log watching
//!
//! This module follows the game client's log file and turns the lines the
//! session machine cares about into [`LogEvent`]s.

pub mod patterns;
pub mod tailer;

pub use patterns::{recognize, LogEvent, PatternError};
pub use tailer::{LineWaiter, LogTailer, TailError};
