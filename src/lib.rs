//! Streams catalog playlists to the local audio device.
//!
//! [`player`] holds the playback controller and its collaborators,
//! [`catalog`] the API client, and [`app`] the terminal driver that feeds
//! the controller tracks.

pub mod app;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod logging;
pub mod player;
