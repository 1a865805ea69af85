//! Status document persistence
//!
//! This module owns the JSON file that stream overlays poll: the record
//! schema, the single writer, and the ordered publish queue the session
//! machine submits to.

pub mod publisher;
pub mod queue;
pub mod record;

pub use publisher::StatusPublisher;
pub use queue::{PublishHandle, ScheduledPublish, StatusSink};
pub use record::StatusRecord;
