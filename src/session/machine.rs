//! Session state machine
//!
//! Applies recognized log events to [`SessionState`], asks the catalog about
//! new songs and submits status publishes. One line is handled completely
//! before the next; the only await point is the catalog lookup.

use std::time::Duration;
use tracing::{debug, info, warn};

use super::instruments::{difficulty_display_name, instrument_display_name, intensity_key};
use super::state::{PerformanceRef, SessionState, TrackRef};
use crate::catalog::TrackLookup;
use crate::logwatch::{recognize, LogEvent};
use crate::status::{ScheduledPublish, StatusRecord, StatusSink};

pub struct SessionMachine<L, S> {
    state: SessionState,
    catalog: L,
    sink: S,
    /// Gap between the two publishes of a song-state change
    song_state_delay: Duration,
}

impl<L: TrackLookup, S: StatusSink> SessionMachine<L, S> {
    pub fn new(catalog: L, sink: S, song_state_delay: Duration) -> Self {
        Self {
            state: SessionState::default(),
            catalog,
            sink,
            song_state_delay,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Recognize and apply one log line. Never fails; bad lines are logged and skipped.
    pub async fn handle_line(&mut self, line: &str) {
        match recognize(line) {
            Ok(Some(event)) => self.apply(event).await,
            Ok(None) => {}
            Err(e) if self.state.in_lobby => {
                debug!("Ignoring unparsable line in lobby: {}", e);
            }
            Err(e) => {
                warn!("Skipping log line ({}): {}", e, line.trim());
            }
        }
    }

    pub async fn apply(&mut self, event: LogEvent) {
        if self.state.in_lobby {
            if event == LogEvent::MatchmakingStarted {
                self.state.matchmaking_started = true;
                self.state.in_lobby = false;
                info!("Matchmaking started.");
            }
            return;
        }

        debug!("Event: {}", event.as_str());
        match event {
            LogEvent::MatchmakingStarted => {
                self.state.matchmaking_started = true;
                info!("Matchmaking started.");
            }
            LogEvent::MatchmakingCanceled => {
                self.state.matchmaking_started = false;
                info!("Matchmaking canceled.");
            }
            LogEvent::BattleStageSelected => {
                self.state.is_battle_stage = true;
                info!("Battle Stage mode detected.");
            }
            LogEvent::MainStageSelected => {
                self.state.is_battle_stage = false;
                info!("Main Stage mode detected.");
            }
            LogEvent::BackstageEntered => self.set_backstage(true),
            LogEvent::BackstageLeft => self.set_backstage(false),
            LogEvent::LoadingStarted => {
                info!("Player is loading into a game.");
            }
            LogEvent::ReturnedToMainMenu => {
                if self.state.playing_song {
                    self.end_song();
                }
                self.reset();
                self.state.in_lobby = true;
                info!("Player returned to main menu.");
            }
            LogEvent::SongSelected { song_id } => self.select_song(song_id).await,
            LogEvent::SongGameplayEnded => {
                if !self.state.playing_song {
                    debug!("Song gameplay ended without a published part");
                }
                self.end_song();
            }
            LogEvent::SongResultsEntered => {
                info!("Entering Song Results state.");
            }
            LogEvent::SongResultsLeft => {
                info!("Leaving Song Results state.");
            }
            LogEvent::PartStarted { track, difficulty } => self.start_part(&track, &difficulty),
            LogEvent::SleepEntered => {
                self.state.in_sleep_mode = true;
                info!("Player entered Sleep Mode.");
            }
            LogEvent::SleepLeft => {
                self.state.in_sleep_mode = false;
                info!("Player left Sleep Mode.");
            }
        }
    }

    /// End any song in progress and reset. Used when the game stops or the monitor exits.
    pub fn finish(&mut self) {
        if self.state.playing_song {
            self.end_song();
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.state.reset();
        info!("State has been reset.");
    }

    fn set_backstage(&mut self, in_backstage: bool) {
        if self.state.in_backstage == in_backstage {
            return;
        }
        self.state.in_backstage = in_backstage;
        if in_backstage {
            info!("Player is now in the backstage area.");
        } else {
            info!("Player is no longer in the backstage area.");
        }
    }

    async fn select_song(&mut self, song_id: String) {
        if self.state.playing_song {
            info!(
                "New song selected while '{}' is still playing",
                self.state.track_title()
            );
            self.end_song();
        }

        info!("Song gameplay started: {}", song_id);
        self.state.current_performance = None;
        self.state.current_track = match self.catalog.lookup(&song_id).await {
            Some(metadata) => {
                let track = TrackRef::from_metadata(song_id, metadata);
                info!("Identified song: {} by {}", track.title, track.artist);
                Some(track)
            }
            None => {
                info!("Song '{}' could not be identified", song_id);
                None
            }
        };
    }

    fn start_part(&mut self, track: &str, difficulty: &str) {
        let key = intensity_key(track);
        let Some(current) = self.state.current_track.as_ref() else {
            info!("No song info for part '{}', status not updated", track);
            return;
        };
        let Some(intensity) = current.intensity(&key) else {
            info!("Instrument key '{}' not found in song info.", key);
            return;
        };

        let performance = PerformanceRef {
            instrument: instrument_display_name(track),
            difficulty: difficulty_display_name(difficulty),
            intensity,
        };
        self.begin_song(performance);
    }

    /// Publish the song with `song_state=false`, then `true` after the delay
    fn begin_song(&mut self, performance: PerformanceRef) {
        self.state.playing_song = true;
        self.state.current_performance = Some(performance);

        let record = StatusRecord::from_session(
            self.state.current_track.as_ref(),
            self.state.current_performance.as_ref(),
            false,
        );
        info!(
            "Playing song: {} by {}, Instrument: {}, Intensity: {}, Difficulty: {}",
            record.current_song.as_deref().unwrap_or_default(),
            record.current_artist.as_deref().unwrap_or_default(),
            record.current_instrument.as_deref().unwrap_or_default(),
            record.current_intensity.unwrap_or_default(),
            record.current_difficulty.as_deref().unwrap_or_default(),
        );
        if let Some(art) = &record.current_album_art {
            info!("Album Art URL: {}", art);
        }

        let confirmed = record.with_song_state(true);
        self.sink.submit(ScheduledPublish::now(record));
        self.sink
            .submit(ScheduledPublish::after(self.song_state_delay, confirmed));
    }

    /// Publish `song_state=false` with the current fields, then a cleared record after the delay
    fn end_song(&mut self) {
        self.state.playing_song = false;

        let record = StatusRecord::from_session(
            self.state.current_track.as_ref(),
            self.state.current_performance.as_ref(),
            false,
        );
        info!("Finished playing song: {}", self.state.track_title());

        self.sink.submit(ScheduledPublish::now(record));
        self.sink.submit(ScheduledPublish::after(
            self.song_state_delay,
            StatusRecord::cleared(),
        ));

        self.state.current_track = None;
        self.state.current_performance = None;
    }
}
