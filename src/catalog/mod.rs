//! Song catalog lookups
//!
//! Resolves the song id found in the game log to title, artist, album art and
//! per-instrument intensity using the community track API.

pub mod client;

pub use client::{parse_track_response, CatalogClient, TrackLookup, TrackMetadata};
