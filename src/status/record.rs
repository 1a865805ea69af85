//! The status document read by overlays

use serde::{Deserialize, Serialize};

use crate::session::{PerformanceRef, TrackRef};

/// Persisted song status
///
/// Field order is the on-disk order; overlays key on these exact names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    #[serde(default)]
    pub current_song: Option<String>,
    #[serde(default)]
    pub current_artist: Option<String>,
    #[serde(default)]
    pub current_instrument: Option<String>,
    #[serde(default)]
    pub current_intensity: Option<i64>,
    #[serde(default)]
    pub current_difficulty: Option<String>,
    #[serde(default)]
    pub current_album_art: Option<String>,
    /// Gameplay audio confirmed running (lags the song being identified)
    #[serde(default)]
    pub song_state: bool,
}

impl StatusRecord {
    /// All fields empty, `song_state` false
    pub fn cleared() -> Self {
        Self::default()
    }

    /// Build a record from whatever track/performance is known
    pub fn from_session(
        track: Option<&TrackRef>,
        performance: Option<&PerformanceRef>,
        song_state: bool,
    ) -> Self {
        Self {
            current_song: track.map(|t| t.title.clone()),
            current_artist: track.map(|t| t.artist.clone()),
            current_instrument: performance.map(|p| p.instrument.clone()),
            current_intensity: performance.map(|p| p.intensity),
            current_difficulty: performance.map(|p| p.difficulty.clone()),
            current_album_art: track.and_then(|t| t.album_art_url.clone()),
            song_state,
        }
    }

    /// Same record with a different `song_state`
    pub fn with_song_state(&self, song_state: bool) -> Self {
        Self {
            song_state,
            ..self.clone()
        }
    }

    pub fn is_cleared(&self) -> bool {
        *self == Self::cleared()
    }
}
