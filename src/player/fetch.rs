//! HTTP streaming fetcher.
//!
//! Opens one GET per track and exposes the body as a [`ByteStream`]. Decoders
//! probe container headers and rewind, so the body is wrapped in a
//! [`Rewindable`] reader that keeps the bytes received so far.

use std::io::{self, Read, Seek, SeekFrom};
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;

use crate::player::error::FetchError;
use crate::player::stream::ByteStream;

const PULL_CHUNK: usize = 16 * 1024;

pub trait StreamFetcher: Send {
    fn open(&self, url: &str) -> Result<ByteStream, FetchError>;
}

/// Configuration for the HTTP fetcher.
#[derive(Clone, Debug)]
pub struct FetchConfig {
    /// Connect timeout. The body itself has no deadline: it is read for as
    /// long as the track plays.
    pub connect_timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
        }
    }
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(None)
            .build()
            .map_err(|e| FetchError::Network(format!("unable to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl StreamFetcher for HttpFetcher {
    fn open(&self, url: &str) -> Result<ByteStream, FetchError> {
        let started = std::time::Instant::now();
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        check_status(resp.status())?;

        let len = resp.content_length();
        tracing::debug!(
            took_ms = started.elapsed().as_millis() as u64,
            content_length = ?len,
            "stream opened"
        );
        Ok(ByteStream::new(url, Rewindable::new(resp, len)))
    }
}

fn check_status(status: StatusCode) -> Result<(), FetchError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(FetchError::BadStatus(status.as_u16()))
    }
}

/// Sequential reader that can seek back over everything it has already read.
///
/// Seeking forward pulls the gap from the inner reader. `SeekFrom::End` needs
/// either a declared length or the inner reader to have hit EOF.
pub struct Rewindable<R> {
    inner: R,
    received: Vec<u8>,
    pos: u64,
    len: Option<u64>,
    finished: bool,
}

impl<R: Read> Rewindable<R> {
    pub fn new(inner: R, len: Option<u64>) -> Self {
        Self {
            inner,
            received: Vec::new(),
            pos: 0,
            len,
            finished: false,
        }
    }

    /// Read up to `want` more bytes from the inner reader into the buffer.
    fn pull(&mut self, want: usize) -> io::Result<usize> {
        if self.finished {
            return Ok(0);
        }
        let start = self.received.len();
        self.received.resize(start + want, 0);
        let n = loop {
            match self.inner.read(&mut self.received[start..]) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.received.truncate(start);
                    return Err(e);
                }
            }
        };
        self.received.truncate(start + n);
        if n == 0 {
            self.finished = true;
            if self.len.is_none() {
                self.len = Some(self.received.len() as u64);
            }
        }
        Ok(n)
    }

    /// Buffer the body up to `target`, or to its end if that comes first.
    /// Pulls at most one chunk at a time so a bogus offset cannot force a
    /// huge allocation.
    fn fill_to(&mut self, target: u64) -> io::Result<()> {
        let target = self.len.map_or(target, |len| target.min(len));
        while (self.received.len() as u64) < target && !self.finished {
            self.pull(PULL_CHUNK)?;
        }
        Ok(())
    }

    fn end(&mut self) -> io::Result<u64> {
        match self.len {
            Some(len) => Ok(len),
            None => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "stream length unknown",
            )),
        }
    }
}

impl<R: Read> Read for Rewindable<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        if self.pos >= self.received.len() as u64 {
            self.fill_to(self.pos.saturating_add(1))?;
        }
        let offset = self.pos as usize;
        if offset >= self.received.len() {
            return Ok(0);
        }
        let available = &self.received[offset..];
        let n = available.len().min(out.len());
        out[..n].copy_from_slice(&available[..n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl<R: Read> Seek for Rewindable<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(x) => x,
            SeekFrom::Current(d) => add_signed(self.pos, d),
            SeekFrom::End(d) => {
                let len = self.end()?;
                add_signed(len, d)
            }
        };
        self.fill_to(target)?;
        self.pos = target;
        Ok(target)
    }
}

/// Add a signed delta to an unsigned base with saturation.
fn add_signed(base: u64, delta: i64) -> u64 {
    if delta >= 0 {
        base.saturating_add(delta as u64)
    } else {
        base.saturating_sub(delta.unsigned_abs())
    }
}
