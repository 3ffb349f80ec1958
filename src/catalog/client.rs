// Catalog API client
// Authenticated JSON requests against the remote catalog: playlist lookup,
// per-track stream URLs and a credential check.
//
// Uses the blocking reqwest client. Call it from a plain thread or from
// tokio::task::spawn_blocking, never directly from async code.

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use super::models::{Playlist, Track, User};
use crate::player::error::ResolveError;
use crate::player::resolve::{ResolvedStream, TrackResolver};

pub const DEFAULT_API_BASE: &str = "https://api-v2.soundcloud.com";

const USER_AGENT: &str = concat!("stream-player/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub base_url: String,
    pub token: String,
    pub timeout: Duration,
}

// Response of /tracks/{id}/stream. The URL is signed and expires quickly,
// so it is fetched right before playback and never cached.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    url: String,
}

// Response of /resolve for a public URL.
#[derive(Debug, Deserialize)]
struct ResolvedResource {
    #[serde(default)]
    kind: String,
    id: u64,
}

pub struct CatalogClient {
    http: Client,
    base_url: String,
    token: String,
}

impl CatalogClient {
    pub fn new(config: &CatalogConfig) -> Result<Self, ResolveError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ResolveError::Upstream(format!("unable to build HTTP client: {e}")))?;

        Ok(CatalogClient {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.trim().to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        what: &str,
    ) -> Result<T, ResolveError> {
        let url = self.endpoint(path);
        tracing::debug!(url = %url, "catalog request");

        let resp = self
            .http
            .get(&url)
            .query(query)
            .header(AUTHORIZATION, format!("OAuth {}", self.token))
            .header(ACCEPT, "application/json")
            .send()
            .map_err(|e| ResolveError::Upstream(format!("{what}: {e}")))?;

        check_status(resp.status(), what)?;

        resp.json::<T>()
            .map_err(|e| ResolveError::Upstream(format!("unable to decode {what}: {e}")))
    }

    /// The account the configured token belongs to.
    pub fn me(&self) -> Result<User, ResolveError> {
        self.get("/me", &[], "current user")
    }

    pub fn playlist(&self, id: &str) -> Result<Playlist, ResolveError> {
        self.get(&format!("/playlists/{id}"), &[], &format!("playlist {id}"))
    }

    /// Load a playlist from its public URL.
    ///
    /// Asks the catalog to resolve the URL first; if that fails, falls back to
    /// the id segment after `/sets/` in the URL itself.
    pub fn playlist_from_url(&self, url: &str) -> Result<Playlist, ResolveError> {
        match self.get::<ResolvedResource>("/resolve", &[("url", url)], url) {
            Ok(resource) if resource.kind.is_empty() || resource.kind == "playlist" => {
                self.playlist(&resource.id.to_string())
            }
            Ok(resource) => Err(ResolveError::NotFound(format!(
                "playlist at {url} (it is a {})",
                resource.kind
            ))),
            Err(err) => match extract_playlist_id(url) {
                Some(id) => {
                    tracing::debug!(url, id, error = %err, "resolve failed, using id from URL");
                    self.playlist(id)
                }
                None => Err(err),
            },
        }
    }

    pub fn track(&self, track_id: u64) -> Result<Track, ResolveError> {
        self.get(
            &format!("/tracks/{track_id}"),
            &[],
            &format!("track {track_id}"),
        )
    }

    /// Declared duration of `track`. Playlist listings only carry full
    /// details for the first few tracks; the rest arrive as stubs with a
    /// zero duration and are looked up individually.
    fn declared_duration(&self, track: &Track) -> Duration {
        if track.duration_ms > 0 {
            return track.duration();
        }
        match self.track(track.id) {
            Ok(full) => full.duration(),
            Err(err) => {
                tracing::warn!(track_id = track.id, error = %err, "no declared duration for track");
                Duration::ZERO
            }
        }
    }

    pub fn stream_url(&self, track_id: u64) -> Result<String, ResolveError> {
        let resp: StreamResponse = self.get(
            &format!("/tracks/{track_id}/stream"),
            &[],
            &format!("track {track_id}"),
        )?;

        if resp.url.is_empty() {
            return Err(ResolveError::NoPlayableFormat(track_id));
        }
        Ok(resp.url)
    }
}

impl TrackResolver for CatalogClient {
    fn resolve(&self, track: &Track) -> Result<ResolvedStream, ResolveError> {
        let url = self.stream_url(track.id)?;
        Ok(ResolvedStream {
            url,
            duration: self.declared_duration(track),
        })
    }
}

fn check_status(status: StatusCode, what: &str) -> Result<(), ResolveError> {
    if status.is_success() {
        Ok(())
    } else if status == StatusCode::NOT_FOUND {
        Err(ResolveError::NotFound(what.to_string()))
    } else {
        Err(ResolveError::Upstream(format!("{what}: HTTP {status}")))
    }
}

/// The path segment following `sets`, e.g. `summer` in `.../artist/sets/summer`.
pub fn extract_playlist_id(url: &str) -> Option<&str> {
    let path = url.split(|c| c == '?' || c == '#').next().unwrap_or(url);
    let mut parts = path.split('/').filter(|p| !p.is_empty());
    parts.find(|p| *p == "sets")?;
    parts.next()
}
