//! Outer monitor loop
//!
//! Waits for the game, tails its log while it runs, and winds the session
//! down when it stops or when shutdown is requested.

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::app::Config;
use crate::catalog::TrackLookup;
use crate::logwatch::{LineWaiter, LogTailer, TailError};
use crate::process::ProcessProbe;
use crate::session::SessionMachine;
use crate::status::StatusSink;

/// How often the process table is re-checked while lines keep arriving
const LIVENESS_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub log_file: PathBuf,
    pub poll_interval: Duration,
    pub process_poll_interval: Duration,
    pub use_file_events: bool,
}

impl SupervisorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            log_file: config.log_file.clone(),
            poll_interval: config.watch.poll_interval(),
            process_poll_interval: config.watch.process_poll_interval(),
            use_file_events: config.watch.use_file_events,
        }
    }
}

/// Why a tailing session ended
#[derive(Debug)]
enum TailEnd {
    GameStopped,
    Shutdown,
    Failed(TailError),
}

pub struct Supervisor<P, L, S> {
    settings: SupervisorSettings,
    probe: P,
    machine: SessionMachine<L, S>,
}

impl<P: ProcessProbe, L: TrackLookup, S: StatusSink> Supervisor<P, L, S> {
    pub fn new(settings: SupervisorSettings, probe: P, machine: SessionMachine<L, S>) -> Self {
        Self {
            settings,
            probe,
            machine,
        }
    }

    pub fn machine(&self) -> &SessionMachine<L, S> {
        &self.machine
    }

    /// Run until `shutdown` turns true (or its sender goes away)
    ///
    /// Any song in progress is ended before this returns.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        let mut game_running = false;
        let mut announced_waiting = false;

        while !*shutdown.borrow() {
            if self.probe.is_running() {
                if !game_running {
                    info!("Game has started.");
                    game_running = true;
                    announced_waiting = false;
                }

                let end = match LogTailer::open(&self.settings.log_file) {
                    Ok(tailer) => self.follow(tailer, &mut shutdown).await,
                    Err(e) => TailEnd::Failed(e),
                };

                match end {
                    TailEnd::GameStopped => {
                        info!("Game has stopped.");
                        self.machine.finish();
                        game_running = false;
                    }
                    TailEnd::Shutdown => break,
                    TailEnd::Failed(e) => {
                        error!("{}", e);
                        if !self.idle(&mut shutdown).await {
                            break;
                        }
                    }
                }
            } else {
                if game_running {
                    info!("Game has stopped.");
                    self.machine.finish();
                    game_running = false;
                }
                if !announced_waiting {
                    info!("Waiting for game to start...");
                    announced_waiting = true;
                } else {
                    debug!("Game still not running");
                }
                if !self.idle(&mut shutdown).await {
                    break;
                }
            }
        }

        self.machine.finish();
        info!("Monitor stopped.");
    }

    /// Feed lines to the machine until the game stops or shutdown is requested
    async fn follow(
        &mut self,
        mut tailer: LogTailer,
        shutdown: &mut watch::Receiver<bool>,
    ) -> TailEnd {
        let mut waiter = if self.settings.use_file_events {
            LineWaiter::watching(tailer.path(), self.settings.poll_interval)
        } else {
            LineWaiter::polling(self.settings.poll_interval)
        };
        let mut last_check = Instant::now();

        loop {
            if *shutdown.borrow() {
                return TailEnd::Shutdown;
            }

            let line = match tailer.next_line() {
                Ok(line) => line,
                Err(e) => return TailEnd::Failed(e),
            };

            if last_check.elapsed() >= LIVENESS_INTERVAL {
                if !self.probe.is_running() {
                    return TailEnd::GameStopped;
                }
                last_check = Instant::now();
            }

            match line {
                Some(line) => self.machine.handle_line(&line).await,
                None => {
                    tokio::select! {
                        _ = waiter.wait() => {}
                        changed = shutdown.changed() => {
                            if changed.is_err() {
                                return TailEnd::Shutdown;
                            }
                        }
                    }
                }
            }
        }
    }

    /// Sleep one process-poll interval. Returns `false` if shutdown was requested.
    async fn idle(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(self.settings.process_poll_interval) => true,
            changed = shutdown.changed() => {
                if changed.is_err() {
                    warn!("Shutdown channel closed");
                    return false;
                }
                !*shutdown.borrow()
            }
        }
    }
}

/// Turn the first interrupt into a shutdown request
///
/// Returns when a second interrupt arrives, so the caller can exit without
/// waiting for pending status writes. Never returns if listening fails.
pub async fn forward_interrupts<F, Fut>(mut interrupt: F, shutdown: watch::Sender<bool>)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    for attempt in 0..2 {
        if let Err(e) = interrupt().await {
            error!("Failed to listen for interrupts: {}", e);
            // Keep the sender alive so a closed channel does not stop the monitor
            std::future::pending::<()>().await;
        }
        if attempt == 0 {
            info!("Interrupt received, shutting down (press Ctrl-C again to force)");
            let _ = shutdown.send(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TrackMetadata;
    use crate::session::SessionState;
    use crate::status::{ScheduledPublish, StatusRecord};
    use std::collections::BTreeMap;
    use std::io::Write;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[derive(Clone)]
    struct FakeProbe(Arc<AtomicBool>);

    impl ProcessProbe for FakeProbe {
        fn is_running(&mut self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    struct OneSong;

    impl TrackLookup for OneSong {
        async fn lookup(&self, song_id: &str) -> Option<TrackMetadata> {
            (song_id == "testsong").then(|| TrackMetadata {
                track_title: "Test Song".to_string(),
                artist_name: "Test Artist".to_string(),
                album_art_url: None,
                intensities: BTreeMap::from([("guitar".to_string(), 3)]),
            })
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        published: Vec<ScheduledPublish>,
    }

    impl StatusSink for RecordingSink {
        fn submit(&mut self, publish: ScheduledPublish) {
            self.published.push(publish);
        }
    }

    fn settings(log_file: PathBuf) -> SupervisorSettings {
        SupervisorSettings {
            log_file,
            poll_interval: Duration::from_millis(10),
            process_poll_interval: Duration::from_millis(20),
            use_file_events: false,
        }
    }

    fn append(path: &std::path::Path, lines: &[&str]) {
        let mut file = std::fs::OpenOptions::new().append(true).open(path).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
    }

    const SONG: &str = "LogPilgrimMusicBattle: Client -1 received song to play: testsong - Test Artist";
    const PART: &str = "LogPilgrimGemBreakListener: UPilgrimGemBreakListener::Init: using track EPilgrimTrackType::TrackGuitar and Difficulty EPilgrimSongDifficulty::DifficultyHard";

    #[tokio::test]
    async fn test_shutdown_flushes_song_in_progress() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("FortniteGame.log");
        std::fs::write(&log, "history that must not be replayed\n").unwrap();

        let running = Arc::new(AtomicBool::new(true));
        let machine = SessionMachine::new(OneSong, RecordingSink::default(), Duration::from_secs(2));
        let mut supervisor = Supervisor::new(settings(log.clone()), FakeProbe(running), machine);
        let (tx, rx) = watch::channel(false);

        let driver = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            append(&log, &[SONG, PART]);
            tokio::time::sleep(Duration::from_millis(200)).await;
            tx.send(true).unwrap();
        };
        tokio::join!(supervisor.run(rx), driver);

        let published = &supervisor.machine().sink().published;
        assert_eq!(published.len(), 4);
        assert_eq!(published[0].record.current_song.as_deref(), Some("Test Song"));
        assert!(published[1].record.song_state);
        assert!(!published[2].record.song_state);
        assert_eq!(published[3].record, StatusRecord::cleared());
        assert!(!supervisor.machine().state().playing_song);
    }

    #[tokio::test]
    async fn test_game_stop_ends_song() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("FortniteGame.log");
        std::fs::write(&log, "").unwrap();

        let running = Arc::new(AtomicBool::new(true));
        let machine = SessionMachine::new(OneSong, RecordingSink::default(), Duration::from_secs(2));
        let mut supervisor =
            Supervisor::new(settings(log.clone()), FakeProbe(running.clone()), machine);
        let (tx, rx) = watch::channel(false);

        let driver = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            append(&log, &[SONG, PART]);
            tokio::time::sleep(Duration::from_millis(200)).await;
            running.store(false, Ordering::SeqCst);
            // Outlast the liveness check
            tokio::time::sleep(LIVENESS_INTERVAL + Duration::from_millis(300)).await;
            tx.send(true).unwrap();
        };
        tokio::join!(supervisor.run(rx), driver);

        let published = &supervisor.machine().sink().published;
        assert_eq!(published.len(), 4);
        assert!(published[3].record.is_cleared());
        assert_eq!(*supervisor.machine().state(), SessionState::default());
    }

    #[tokio::test]
    async fn test_second_interrupt_forces_exit() {
        let interrupts = Arc::new(tokio::sync::Notify::new());
        let source = interrupts.clone();
        let (tx, mut rx) = watch::channel(false);

        let forwarder = tokio::spawn(forward_interrupts(
            move || {
                let source = source.clone();
                async move {
                    source.notified().await;
                    Ok(())
                }
            },
            tx,
        ));

        interrupts.notify_one();
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!forwarder.is_finished());

        interrupts.notify_one();
        tokio::time::timeout(Duration::from_secs(1), forwarder)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_log_file_keeps_supervisor_alive() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("missing.log");

        let machine = SessionMachine::new(OneSong, RecordingSink::default(), Duration::from_secs(2));
        let mut supervisor = Supervisor::new(
            settings(log),
            FakeProbe(Arc::new(AtomicBool::new(true))),
            machine,
        );
        let (tx, rx) = watch::channel(false);

        let driver = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            tx.send(true).unwrap();
        };
        tokio::join!(supervisor.run(rx), driver);

        assert!(supervisor.machine().sink().published.is_empty());
    }
}
