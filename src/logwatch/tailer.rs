//! Log file tailing
//!
//! Attaches to the end of the game log and hands out lines as they are
//! appended. "No line right now" is a normal answer, not end of stream.

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Tail failures
#[derive(Debug, Error)]
pub enum TailError {
    #[error("failed to open log file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read log file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Follows one log file from the position it had when opened
#[derive(Debug)]
pub struct LogTailer {
    path: PathBuf,
    reader: BufReader<File>,
    /// Offset of the next unread byte
    position: u64,
    /// Bytes of a line whose newline has not been written yet
    pending: Vec<u8>,
}

impl LogTailer {
    /// Open `path` and seek to its current end
    ///
    /// The game keeps the log open for writing; a plain read open shares
    /// access with it on every platform.
    pub fn open(path: &Path) -> Result<Self, TailError> {
        let open_error = |source| TailError::Open {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(open_error)?;
        let metadata = file.metadata().map_err(open_error)?;
        if !metadata.is_file() {
            return Err(open_error(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "not a regular file",
            )));
        }

        let mut reader = BufReader::new(file);
        let position = reader.seek(SeekFrom::End(0)).map_err(open_error)?;
        info!("Tailing {} from byte {}", path.display(), position);

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            position,
            pending: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Next complete line, without its line terminator
    ///
    /// `Ok(None)` means nothing new yet; poll again later.
    pub fn next_line(&mut self) -> Result<Option<String>, TailError> {
        let read = self
            .reader
            .read_until(b'\n', &mut self.pending)
            .map_err(|source| self.read_error(source))?;
        self.position += read as u64;

        if read == 0 {
            self.rewind_if_truncated()?;
            return Ok(None);
        }

        if !self.pending.ends_with(b"\n") {
            // Writer is mid-line; keep the fragment until the rest arrives
            return Ok(None);
        }

        let bytes = std::mem::take(&mut self.pending);
        let line = String::from_utf8_lossy(&bytes);
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    /// The game rewrote the log in place: start over at the top of the new content
    fn rewind_if_truncated(&mut self) -> Result<(), TailError> {
        let len = self
            .reader
            .get_ref()
            .metadata()
            .map_err(|source| self.read_error(source))?
            .len();

        if len < self.position {
            warn!(
                "Log file {} shrank from {} to {} bytes, rewinding",
                self.path.display(),
                self.position,
                len
            );
            self.reader
                .seek(SeekFrom::Start(0))
                .map_err(|source| self.read_error(source))?;
            self.position = 0;
            self.pending.clear();
        }
        Ok(())
    }

    fn read_error(&self, source: std::io::Error) -> TailError {
        TailError::Read {
            path: self.path.clone(),
            source,
        }
    }
}

/// Waits between empty reads
///
/// Sleeps for the poll interval, or less when a file system event for the
/// log arrives first. Without a watcher it is a plain fixed-interval poll.
pub struct LineWaiter {
    poll_interval: Duration,
    events: Option<FileEvents>,
}

struct FileEvents {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<()>,
}

impl LineWaiter {
    pub fn polling(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            events: None,
        }
    }

    /// Poll, but wake early on changes to `path`
    pub fn watching(path: &Path, poll_interval: Duration) -> Self {
        let events = match FileEvents::watch(path) {
            Ok(events) => Some(events),
            Err(e) => {
                warn!(
                    "File events unavailable for {}, polling every {:?}: {}",
                    path.display(),
                    poll_interval,
                    e
                );
                None
            }
        };
        Self {
            poll_interval,
            events,
        }
    }

    pub async fn wait(&mut self) {
        match self.events.as_mut() {
            Some(events) => {
                tokio::select! {
                    _ = tokio::time::sleep(self.poll_interval) => {}
                    Some(()) = events.rx.recv() => {}
                }
            }
            None => tokio::time::sleep(self.poll_interval).await,
        }
    }
}

impl FileEvents {
    fn watch(path: &Path) -> notify::Result<Self> {
        let (tx, rx) = mpsc::channel::<()>(1);
        let file_name = path.file_name().map(|n| n.to_os_string());

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                let concerns_log = event
                    .paths
                    .iter()
                    .any(|p| p.file_name() == file_name.as_deref());
                if concerns_log {
                    // Full channel already holds a wakeup
                    let _ = tx.try_send(());
                }
            }
        })?;

        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        debug!("Watching {} for log changes", dir.display());

        Ok(Self {
            _watcher: watcher,
            rx,
        })
    }
}
