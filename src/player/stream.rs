//! Closable byte source handed from the fetcher to the decoder.
//!
//! The decoder takes ownership of the [`ByteStream`] and reads it from the
//! audio render thread, so the controller keeps a [`StreamHandle`] to close
//! it later. Closing only flips a flag; the next read on the render side
//! drops the underlying connection and reports end of stream.

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// Shared close flag for a [`ByteStream`].
#[derive(Clone)]
pub struct StreamHandle {
    closed: Arc<AtomicBool>,
    label: Arc<str>,
}

impl StreamHandle {
    /// Close the stream. Returns `true` only for the call that closed it.
    pub fn close(&self) -> bool {
        let first = !self.closed.swap(true, Ordering::AcqRel);
        if first {
            tracing::debug!(stream = %self.label, "byte stream closed");
        }
        first
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHandle")
            .field("label", &self.label)
            .field("closed", &self.is_closed())
            .finish()
    }
}

pub struct ByteStream {
    // rodio's decoder requires a Sync source. The mutex is never locked:
    // every access goes through get_mut on the single owning thread.
    reader: Mutex<Option<Box<dyn ReadSeek>>>,
    handle: StreamHandle,
}

impl ByteStream {
    pub fn new(label: impl Into<String>, reader: impl ReadSeek + 'static) -> Self {
        let label: String = label.into();
        ByteStream {
            reader: Mutex::new(Some(Box::new(reader))),
            handle: StreamHandle {
                closed: Arc::new(AtomicBool::new(false)),
                label: Arc::from(label),
            },
        }
    }

    pub fn handle(&self) -> StreamHandle {
        self.handle.clone()
    }

    pub fn label(&self) -> &str {
        self.handle.label()
    }

    pub fn close(&mut self) -> bool {
        let first = self.handle.close();
        self.release();
        first
    }

    fn release(&mut self) {
        self.reader
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    fn reader(&mut self) -> Option<&mut Box<dyn ReadSeek>> {
        if self.handle.is_closed() {
            self.release();
            return None;
        }
        self.reader
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
    }
}

impl Read for ByteStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.reader() {
            Some(reader) => reader.read(buf),
            None => Ok(0),
        }
    }
}

impl Seek for ByteStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self.reader() {
            Some(reader) => reader.seek(pos),
            None => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "byte stream is closed",
            )),
        }
    }
}

impl fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteStream")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn close_is_reported_once() {
        let stream = ByteStream::new("a", Cursor::new(vec![1u8, 2, 3]));
        let handle = stream.handle();
        assert!(!handle.is_closed());
        assert!(handle.close());
        assert!(!handle.close());
        assert!(handle.is_closed());
    }

    #[test]
    fn reads_end_after_handle_closes() {
        let mut stream = ByteStream::new("a", Cursor::new(vec![1u8, 2, 3, 4]));
        let handle = stream.handle();

        let mut buf = [0u8; 2];
        assert_eq!(stream.read(&mut buf).unwrap(), 2);
        assert_eq!(buf, [1, 2]);

        handle.close();
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
        assert!(stream.seek(SeekFrom::Start(0)).is_err());
    }

    #[test]
    fn closing_the_stream_marks_every_handle() {
        let mut stream = ByteStream::new("https://cdn.example.test/1.mp3", Cursor::new(Vec::new()));
        let handle = stream.handle();
        assert!(stream.close());
        assert!(handle.is_closed());
        assert!(!handle.close());
        assert_eq!(handle.label(), "https://cdn.example.test/1.mp3");
    }

    #[test]
    fn seeks_pass_through_while_open() {
        let mut stream = ByteStream::new("a", Cursor::new(vec![9u8, 8, 7]));
        assert_eq!(stream.seek(SeekFrom::End(-1)).unwrap(), 2);
        let mut buf = [0u8; 4];
        assert_eq!(stream.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 7);
    }
}
