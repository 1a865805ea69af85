use std::collections::BTreeMap;

use crate::catalog::TrackMetadata;

/// Song identified at song-start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRef {
    /// Lowercased id from the log
    pub song_id: String,
    pub title: String,
    pub artist: String,
    pub album_art_url: Option<String>,
    /// Intensity per instrument key, as returned by the catalog
    pub intensities: BTreeMap<String, i64>,
}

impl TrackRef {
    pub fn from_metadata(song_id: String, metadata: TrackMetadata) -> Self {
        Self {
            song_id,
            title: metadata.track_title,
            artist: metadata.artist_name,
            album_art_url: metadata.album_art_url,
            intensities: metadata.intensities,
        }
    }

    pub fn intensity(&self, key: &str) -> Option<i64> {
        self.intensities.get(key).copied()
    }
}

/// Part being played
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerformanceRef {
    /// Display name (`Lead`, `Pro Bass`, ...)
    pub instrument: String,
    /// Display name (`Easy` .. `Expert`)
    pub difficulty: String,
    pub intensity: i64,
}

/// Everything known about the current game session
///
/// One instance per game process run. `Default` is the reset state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Pre-song staging area
    pub in_backstage: bool,
    pub matchmaking_started: bool,
    pub playing_song: bool,
    /// Battle Stage playlist rather than Main Stage
    pub is_battle_stage: bool,
    /// Back at the main menu; only matchmaking start is evaluated
    pub in_lobby: bool,
    pub in_sleep_mode: bool,
    pub current_track: Option<TrackRef>,
    /// Set only while `playing_song`
    pub current_performance: Option<PerformanceRef>,
}

impl SessionState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Title for log output
    pub fn track_title(&self) -> &str {
        self.current_track
            .as_ref()
            .map(|t| t.title.as_str())
            .unwrap_or("unknown song")
    }
}
