//! HTTP client for the song catalog API
//!
//! One GET per song, no retry, no cache. Anything other than a 200 with a
//! well-formed body is reported as "no metadata".

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use tracing::{debug, info, warn};

use crate::app::config::CatalogConfig;

/// Track metadata for one song
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackMetadata {
    pub track_title: String,
    pub artist_name: String,
    /// Absolute URL
    pub album_art_url: Option<String>,
    /// Intensity per instrument key (`guitar`, `drums`, `proGuitar`, ...)
    pub intensities: BTreeMap<String, i64>,
}

/// Anything that can resolve a song id to metadata
pub trait TrackLookup {
    fn lookup(&self, song_id: &str) -> impl Future<Output = Option<TrackMetadata>> + Send;
}

/// Response body of `{base_url}/{song_id}.json`
#[derive(Debug, Deserialize)]
struct TrackResponse {
    track: TrackPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackPayload {
    track_title: String,
    artist_name: String,
    #[serde(default)]
    album_art_filename: Option<String>,
    #[serde(default)]
    intensities: BTreeMap<String, i64>,
}

/// Catalog API client
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: String,
    album_art_base_url: String,
    aliases: BTreeMap<String, String>,
}

impl CatalogClient {
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            album_art_base_url: config.album_art_base_url.clone(),
            aliases: config.song_id_aliases.clone(),
        })
    }

    /// Apply the log-to-catalog id correction table
    pub fn normalize_song_id<'a>(&'a self, song_id: &'a str) -> &'a str {
        self.aliases
            .get(song_id)
            .map(String::as_str)
            .unwrap_or(song_id)
    }

    /// URL requested for `song_id`
    pub fn track_url(&self, song_id: &str) -> String {
        format!("{}/{}.json", self.base_url, self.normalize_song_id(song_id))
    }

    async fn fetch(&self, song_id: &str) -> Option<TrackMetadata> {
        let url = self.track_url(song_id);
        debug!("Fetching track info: {}", url);

        let response = match self.http.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Track lookup for '{}' failed: {}", song_id, e);
                return None;
            }
        };

        if response.status() != StatusCode::OK {
            info!(
                "Song ID '{}' not found in catalog ({})",
                self.normalize_song_id(song_id),
                response.status()
            );
            return None;
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to read catalog response for '{}': {}", song_id, e);
                return None;
            }
        };

        match parse_track_response(&body, &self.album_art_base_url) {
            Ok(metadata) => {
                debug!("Fetched track info: {:?}", metadata);
                Some(metadata)
            }
            Err(e) => {
                warn!("Malformed catalog entry for '{}': {:#}", song_id, e);
                None
            }
        }
    }
}

impl TrackLookup for CatalogClient {
    async fn lookup(&self, song_id: &str) -> Option<TrackMetadata> {
        self.fetch(song_id).await
    }
}

/// Parse a catalog body, resolving the album art filename against `album_art_base_url`
pub fn parse_track_response(body: &str, album_art_base_url: &str) -> Result<TrackMetadata> {
    let response: TrackResponse =
        serde_json::from_str(body).context("Failed to parse track response")?;
    let track = response.track;

    Ok(TrackMetadata {
        track_title: track.track_title,
        artist_name: track.artist_name,
        album_art_url: track
            .album_art_filename
            .map(|filename| format!("{}{}", album_art_base_url, filename)),
        intensities: track.intensities,
    })
}
