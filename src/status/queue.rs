//! Ordered, delayed publishing
//!
//! The session machine never sleeps. It submits [`ScheduledPublish`]es and a
//! single background task performs them in submission order, waiting each
//! entry's delay first. Two submissions `(0, a)` then `(d, b)` therefore land
//! on disk as `a`, then `b` at least `d` later.

use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::publisher::StatusPublisher;
use super::record::StatusRecord;

/// One pending write to the status file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledPublish {
    /// Wait before writing, measured from when the previous entry finished
    pub delay: Duration,
    pub record: StatusRecord,
}

impl ScheduledPublish {
    pub fn now(record: StatusRecord) -> Self {
        Self {
            delay: Duration::ZERO,
            record,
        }
    }

    pub fn after(delay: Duration, record: StatusRecord) -> Self {
        Self { delay, record }
    }
}

/// Destination for status publishes
pub trait StatusSink {
    fn submit(&mut self, publish: ScheduledPublish);
}

/// Sender side of the publish queue
#[derive(Debug, Clone)]
pub struct PublishHandle {
    tx: mpsc::UnboundedSender<ScheduledPublish>,
}

impl StatusSink for PublishHandle {
    fn submit(&mut self, publish: ScheduledPublish) {
        if self.tx.send(publish).is_err() {
            warn!("Publish queue stopped, dropping status update");
        }
    }
}

/// Start the queue task
///
/// The task exits once every [`PublishHandle`] is dropped and the remaining
/// entries are written; await the join handle to drain it.
pub fn spawn(publisher: StatusPublisher) -> (PublishHandle, tokio::task::JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<ScheduledPublish>();

    let handle = tokio::spawn(async move {
        debug!("Publish queue started for {}", publisher.path().display());

        while let Some(entry) = rx.recv().await {
            if !entry.delay.is_zero() {
                tokio::time::sleep(entry.delay).await;
            }
            if let Err(e) = publisher.publish(&entry.record) {
                warn!("Failed to publish status: {:#}", e);
                continue;
            }
            info!(
                "Status updated: song={:?} state={}",
                entry.record.current_song, entry.record.song_state
            );
        }

        debug!("Publish queue drained");
    });

    (PublishHandle { tx }, handle)
}
