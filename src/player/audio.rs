// ==========================================
// AUDIO DECODE / OUTPUT
// ==========================================
// The controller never talks to rodio directly. It sees two narrow
// capabilities:
// - StreamDecoder: byte stream in, decoded source + sample format out
// - AudioOutput: play / pause / clear on the output device
//
// The rodio-backed implementations live here too. Tests swap in fakes
// from player::testing so no audio device is needed.

use crossbeam_channel::Sender;
use rodio::decoder::DecoderError;
use rodio::source::EmptyCallback;
use rodio::{Decoder, OutputStream, Sink, Source};

use crate::player::error::{DecodeError, OutputError};
use crate::player::stream::ByteStream;

/// Decoded audio ready to be handed to the output.
pub type DecodeHandle = Box<dyn Source<Item = f32> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

pub struct Decoded {
    pub handle: DecodeHandle,
    pub format: SampleFormat,
}

// ==========================================
// COMPLETION SIGNAL
// ==========================================
// Fired from the audio render thread when a source runs dry.
// It only posts the session generation back to the control loop;
// the loop decides whether that session is still the active one.
#[derive(Debug, Clone)]
pub struct CompletionSignal {
    generation: u64,
    tx: Sender<u64>,
}

impl CompletionSignal {
    pub(crate) fn new(generation: u64, tx: Sender<u64>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn fire(&self) {
        // The loop may already be gone during shutdown.
        let _ = self.tx.send(self.generation);
    }
}

pub trait StreamDecoder: Send {
    fn decode(&self, stream: ByteStream) -> Result<Decoded, DecodeError>;
}

/// Output device capability. Every call must return promptly: it runs on
/// the control loop and never waits on the network.
pub trait AudioOutput: Send {
    /// Start rendering `handle`; `done` fires once it has been fully played.
    fn play(&mut self, handle: DecodeHandle, done: CompletionSignal);
    fn set_paused(&mut self, paused: bool);
    /// Drop whatever is queued on the device.
    fn clear(&mut self);
}

// ==========================================
// RODIO DECODER
// ==========================================
// rodio::Decoder probes the container (mp3, ogg, flac, wav) by reading
// and seeking the byte stream, which is why ByteStream must be seekable.
pub struct RodioDecoder;

impl StreamDecoder for RodioDecoder {
    fn decode(&self, stream: ByteStream) -> Result<Decoded, DecodeError> {
        let label = stream.label().to_string();
        let decoder = Decoder::new(stream).map_err(|e| map_decoder_error(e, &label))?;

        let format = SampleFormat {
            sample_rate: decoder.sample_rate(),
            channels: decoder.channels(),
        };
        tracing::debug!(
            sample_rate = format.sample_rate,
            channels = format.channels,
            "stream decoded"
        );

        Ok(Decoded {
            handle: Box::new(decoder.convert_samples::<f32>()),
            format,
        })
    }
}

#[allow(unreachable_patterns)]
fn map_decoder_error(err: DecoderError, label: &str) -> DecodeError {
    match err {
        DecoderError::UnrecognizedFormat => DecodeError::UnsupportedFormat(label.to_string()),
        other => DecodeError::Corrupt(format!("{label}: {other}")),
    }
}

// ==========================================
// RODIO OUTPUT
// ==========================================
// One Sink for the lifetime of the program. Each track is appended
// followed by an EmptyCallback, so the callback runs exactly when the
// track's samples are exhausted (natural end, or a decoder that gave up
// on a corrupt frame).
pub struct RodioOutput {
    sink: Sink,
}

impl RodioOutput {
    pub fn try_default() -> Result<Self, OutputError> {
        let (stream, handle) = OutputStream::try_default()?;
        let sink = Sink::try_new(&handle)?;

        // OutputStream is !Send and must outlive the sink. Leak it so the
        // output can move onto the control thread.
        std::mem::forget(stream);

        Ok(Self { sink })
    }
}

impl AudioOutput for RodioOutput {
    fn play(&mut self, handle: DecodeHandle, done: CompletionSignal) {
        self.sink.append(handle);
        self.sink
            .append(EmptyCallback::<f32>::new(Box::new(move || done.fire())));
        self.sink.play();
    }

    fn set_paused(&mut self, paused: bool) {
        if paused {
            self.sink.pause();
        } else {
            self.sink.play();
        }
    }

    fn clear(&mut self) {
        self.sink.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_signal_posts_its_generation() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let signal = CompletionSignal::new(4, tx);
        signal.clone().fire();
        assert_eq!(rx.try_recv().unwrap(), 4);
        assert_eq!(signal.generation(), 4);
    }

    #[test]
    fn completion_signal_tolerates_a_closed_loop() {
        let (tx, rx) = crossbeam_channel::unbounded();
        drop(rx);
        CompletionSignal::new(1, tx).fire();
    }

    #[test]
    fn unrecognized_format_is_unsupported() {
        let err = map_decoder_error(DecoderError::UnrecognizedFormat, "track.bin");
        assert!(matches!(err, DecodeError::UnsupportedFormat(label) if label == "track.bin"));
    }

    #[test]
    fn garbage_bytes_do_not_decode() {
        let stream = ByteStream::new("noise", std::io::Cursor::new(vec![0x42u8; 512]));
        assert!(RodioDecoder.decode(stream).is_err());
    }
}
