//! Playback sessions and how they are put together.
//!
//! A session's position is derived from the wall clock, never read back
//! from the decoder: the decoder runs ahead of the device by its buffer and
//! knows nothing about pauses.

use std::time::{Duration, Instant};

use crate::catalog::Track;
use crate::player::audio::{Decoded, SampleFormat, StreamDecoder};
use crate::player::error::AssemblyError;
use crate::player::fetch::StreamFetcher;
use crate::player::resolve::TrackResolver;
use crate::player::stream::StreamHandle;

pub trait Clock: Send {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Wall-clock elapsed time with pauses subtracted.
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    origin: Instant,
    paused_total: Duration,
    paused_at: Option<Instant>,
}

impl SessionClock {
    pub fn started(now: Instant) -> Self {
        Self {
            origin: now,
            paused_total: Duration::ZERO,
            paused_at: None,
        }
    }

    /// Frozen at the pause instant while paused.
    pub fn elapsed(&self, now: Instant) -> Duration {
        let until = self.paused_at.unwrap_or(now);
        until
            .saturating_duration_since(self.origin)
            .saturating_sub(self.paused_total)
    }

    /// Flip between playing and paused. Returns the new paused state.
    pub fn toggle(&mut self, now: Instant) -> bool {
        match self.paused_at.take() {
            Some(at) => {
                self.paused_total += now.saturating_duration_since(at);
                false
            }
            None => {
                self.paused_at = Some(now);
                true
            }
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }
}

/// What the driver learns about a session once it is playing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub track: Track,
    pub format: SampleFormat,
    pub total: Duration,
}

/// A track that has been resolved, fetched and decoded but not yet handed
/// to the output.
pub struct PreparedSession {
    pub track: Track,
    pub stream: StreamHandle,
    pub decoded: Decoded,
    pub total: Duration,
}

/// The one live session owned by the controller.
#[derive(Debug)]
pub struct PlaybackSession {
    track: Track,
    format: SampleFormat,
    total: Duration,
    stream: StreamHandle,
    generation: u64,
    clock: SessionClock,
    finished: bool,
}

impl PlaybackSession {
    pub fn new(
        track: Track,
        format: SampleFormat,
        total: Duration,
        stream: StreamHandle,
        generation: u64,
        now: Instant,
    ) -> Self {
        Self {
            track,
            format,
            total,
            stream,
            generation,
            clock: SessionClock::started(now),
            finished: false,
        }
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        self.clock.elapsed(now)
    }

    /// Position worth reporting, if any: nothing while paused, after the
    /// track completed, or once the declared duration has been reached.
    pub fn position(&self, now: Instant) -> Option<Duration> {
        if self.finished || self.clock.is_paused() {
            return None;
        }
        let elapsed = self.clock.elapsed(now);
        (elapsed < self.total).then_some(elapsed)
    }

    pub fn toggle_pause(&mut self, now: Instant) -> bool {
        self.clock.toggle(now)
    }

    pub fn mark_completed(&mut self) {
        self.finished = true;
    }

    /// Close the byte stream. True only the first time.
    pub fn release(&self) -> bool {
        self.stream.close()
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            track: self.track.clone(),
            format: self.format,
            total: self.total,
        }
    }
}

// ==========================================
// ASSEMBLY: resolve -> fetch -> decode
// ==========================================
pub struct SessionAssembler {
    resolver: Box<dyn TrackResolver>,
    fetcher: Box<dyn StreamFetcher>,
    decoder: Box<dyn StreamDecoder>,
}

impl SessionAssembler {
    pub fn new(
        resolver: Box<dyn TrackResolver>,
        fetcher: Box<dyn StreamFetcher>,
        decoder: Box<dyn StreamDecoder>,
    ) -> Self {
        Self {
            resolver,
            fetcher,
            decoder,
        }
    }

    /// Open `track` for playback. Any failure aborts the whole assembly and
    /// leaves nothing open.
    pub fn assemble(&self, track: &Track) -> Result<PreparedSession, AssemblyError> {
        let resolved = self.resolver.resolve(track)?;
        tracing::debug!(track_id = track.id, "track resolved");

        let stream = self.fetcher.open(&resolved.url)?;
        let handle = stream.handle();

        let decoded = match self.decoder.decode(stream) {
            Ok(decoded) => decoded,
            Err(err) => {
                handle.close();
                return Err(err.into());
            }
        };

        Ok(PreparedSession {
            track: track.clone(),
            stream: handle,
            decoded,
            total: resolved.duration,
        })
    }
}
