// Error types for the playback pipeline.
//
// Each collaborator (resolver, fetcher, decoder) has its own enum so callers
// can tell where a track failed. AssemblyError folds them together for the
// controller, which only cares that the track could not be opened.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("{0} not found in the catalog")]
    NotFound(String),
    #[error("track {0} has no playable stream")]
    NoPlayableFormat(u64),
    #[error("catalog request failed: {0}")]
    Upstream(String),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("stream request failed: {0}")]
    Network(String),
    #[error("stream request returned HTTP {0}")]
    BadStatus(u16),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),
    #[error("corrupt audio stream: {0}")]
    Corrupt(String),
}

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("no audio output device: {0}")]
    Device(#[from] rodio::StreamError),
    #[error("unable to open audio sink: {0}")]
    Sink(#[from] rodio::PlayError),
}

/// Any failure while turning a track into a playable session.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// The very first track could not be opened; the controller never started.
#[derive(Debug, Error)]
#[error("unable to start playback with track {track_id} ({title}): {source}")]
pub struct StartupError {
    pub track_id: u64,
    pub title: String,
    #[source]
    pub source: AssemblyError,
}
