use std::time::Duration;

use crate::catalog::Track;
use crate::player::error::ResolveError;

/// Where a track can be streamed from, and how long the catalog says it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStream {
    pub url: String,
    pub duration: Duration,
}

/// Turns a catalog track into a streamable URL.
///
/// Implementations may need more than one request (e.g. a lookup that returns
/// a short-lived signed URL); the controller treats this as a single call.
pub trait TrackResolver: Send {
    fn resolve(&self, track: &Track) -> Result<ResolvedStream, ResolveError>;
}
