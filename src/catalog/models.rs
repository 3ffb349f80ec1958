// Catalog data model.
// These mirror the JSON the catalog API returns. Optional counters come back
// as null on some tracks, so they are Options with serde defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    // Declared length in milliseconds. This is the authoritative duration
    // for all position math, even if the decoded stream is slightly longer.
    #[serde(rename = "duration", default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub permalink_url: String,
    #[serde(default)]
    pub likes_count: Option<u64>,
    #[serde(default)]
    pub comment_count: Option<u64>,
    #[serde(default)]
    pub user: User,
}

impl Track {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// "Title - Owner", the way tracks are listed in the driver.
    pub fn display_name(&self) -> String {
        if self.user.username.is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", self.title, self.user.username)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub user: User,
}
