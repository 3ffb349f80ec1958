pub mod client;
pub mod models;

pub use client::{CatalogClient, CatalogConfig, DEFAULT_API_BASE};
pub use models::{Playlist, Track, User};
