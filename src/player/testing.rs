//! Fakes for controller and assembly tests. No network, no audio device.

use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;

use crate::catalog::{Track, User};
use crate::player::audio::{
    AudioOutput, CompletionSignal, DecodeHandle, Decoded, SampleFormat, StreamDecoder,
};
use crate::player::controller::{
    event_channel, request_channel, ControllerConfig, ControllerEvent, ControllerHandle,
    EventReceiver, PlayerController,
};
use crate::player::error::{DecodeError, FetchError, ResolveError};
use crate::player::fetch::StreamFetcher;
use crate::player::resolve::{ResolvedStream, TrackResolver};
use crate::player::session::{Clock, SessionAssembler};
use crate::player::stream::{ByteStream, StreamHandle};

pub fn track(id: u64, secs: u64) -> Track {
    Track {
        id,
        title: format!("Track {id}"),
        duration_ms: secs * 1000,
        user: User {
            id: 1,
            username: "artist".to_string(),
        },
        ..Track::default()
    }
}

pub fn stream_url(id: u64) -> String {
    format!("https://cdn.example.test/{id}.mp3")
}

pub fn stream_handle(label: &str) -> StreamHandle {
    ByteStream::new(label, Cursor::new(Vec::new())).handle()
}

#[derive(Clone)]
pub struct ManualClock(Arc<Mutex<Instant>>);

impl ManualClock {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(Instant::now())))
    }

    pub fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.0.lock().unwrap()
    }
}

/// Track ids that fail at each stage.
#[derive(Debug, Clone, Default)]
pub struct Failures {
    pub resolve: Vec<u64>,
    pub fetch: Vec<u64>,
    pub decode: Vec<u64>,
    /// `(id, secs)`: the resolver reports `secs` instead of the track's own
    /// duration.
    pub resolved_secs: Vec<(u64, u64)>,
}

impl Failures {
    fn url_in(ids: &[u64], url: &str) -> bool {
        ids.iter().any(|id| stream_url(*id) == url)
    }
}

/// Every stream the fake fetcher opened, in order.
#[derive(Clone, Default)]
pub struct StreamRegistry(Arc<Mutex<Vec<StreamHandle>>>);

impl StreamRegistry {
    fn record(&self, handle: StreamHandle) {
        self.0.lock().unwrap().push(handle);
    }

    pub fn opened(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn open_count(&self) -> usize {
        self.0.lock().unwrap().iter().filter(|h| !h.is_closed()).count()
    }

    pub fn is_closed(&self, url: &str) -> bool {
        self.0
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|h| h.label() == url)
            .map(StreamHandle::is_closed)
            .unwrap_or_else(|| panic!("{url} was never opened"))
    }
}

pub struct FakeResolver {
    failures: Failures,
}

impl TrackResolver for FakeResolver {
    fn resolve(&self, track: &Track) -> Result<ResolvedStream, ResolveError> {
        if self.failures.resolve.contains(&track.id) {
            return Err(ResolveError::NotFound(format!("track {}", track.id)));
        }
        let duration = self
            .failures
            .resolved_secs
            .iter()
            .find(|(id, _)| *id == track.id)
            .map_or(track.duration(), |(_, secs)| Duration::from_secs(*secs));
        Ok(ResolvedStream {
            url: stream_url(track.id),
            duration,
        })
    }
}

pub struct FakeFetcher {
    failures: Failures,
    streams: StreamRegistry,
}

impl StreamFetcher for FakeFetcher {
    fn open(&self, url: &str) -> Result<ByteStream, FetchError> {
        if Failures::url_in(&self.failures.fetch, url) {
            return Err(FetchError::BadStatus(404));
        }
        let stream = ByteStream::new(url, Cursor::new(vec![0u8; 64]));
        self.streams.record(stream.handle());
        Ok(stream)
    }
}

pub struct FakeDecoder {
    failures: Failures,
}

impl StreamDecoder for FakeDecoder {
    fn decode(&self, stream: ByteStream) -> Result<Decoded, DecodeError> {
        if Failures::url_in(&self.failures.decode, stream.label()) {
            return Err(DecodeError::Corrupt(stream.label().to_string()));
        }
        let handle: DecodeHandle = Box::new(rodio::source::Empty::<f32>::new());
        Ok(Decoded {
            handle,
            format: SampleFormat {
                sample_rate: 44_100,
                channels: 2,
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputCall {
    /// `open_streams` is how many fetched streams were still open when
    /// playback of this generation began.
    Play { generation: u64, open_streams: usize },
    Paused(bool),
    Clear,
}

#[derive(Default)]
struct ProbeState {
    calls: Vec<OutputCall>,
    signals: Vec<CompletionSignal>,
}

#[derive(Clone, Default)]
pub struct OutputProbe(Arc<Mutex<ProbeState>>);

impl OutputProbe {
    pub fn calls(&self) -> Vec<OutputCall> {
        self.0.lock().unwrap().calls.clone()
    }

    pub fn signal(&self, index: usize) -> CompletionSignal {
        self.0.lock().unwrap().signals[index].clone()
    }

    /// Pretend the most recently played source ran out.
    pub fn finish_latest(&self) {
        let state = self.0.lock().unwrap();
        state.signals.last().expect("nothing played").fire();
    }
}

pub struct FakeOutput {
    probe: OutputProbe,
    streams: StreamRegistry,
}

impl AudioOutput for FakeOutput {
    fn play(&mut self, _handle: DecodeHandle, done: CompletionSignal) {
        let open_streams = self.streams.open_count();
        let mut state = self.probe.0.lock().unwrap();
        state.calls.push(OutputCall::Play {
            generation: done.generation(),
            open_streams,
        });
        state.signals.push(done);
    }

    fn set_paused(&mut self, paused: bool) {
        self.probe.0.lock().unwrap().calls.push(OutputCall::Paused(paused));
    }

    fn clear(&mut self) {
        self.probe.0.lock().unwrap().calls.push(OutputCall::Clear);
    }
}

/// A controller wired to fakes, plus every probe a test needs.
pub struct Rig {
    pub controller: PlayerController,
    pub handle: ControllerHandle,
    pub events: EventReceiver,
    pub clock: ManualClock,
    pub streams: StreamRegistry,
    pub output: OutputProbe,
    pub ticks: Sender<Instant>,
    pub failures: Failures,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_failures(Failures::default())
    }

    pub fn with_failures(failures: Failures) -> Self {
        let clock = ManualClock::new();
        let streams = StreamRegistry::default();
        let output = OutputProbe::default();
        let (handle, requests) = request_channel();
        let (events_tx, events) = event_channel();
        let (ticks, ticker) = crossbeam_channel::unbounded();

        let controller = PlayerController::new(
            assembler(&failures, &streams),
            Box::new(FakeOutput {
                probe: output.clone(),
                streams: streams.clone(),
            }),
            requests,
            events_tx,
            ControllerConfig::default(),
        )
        .with_clock(clock.clone())
        .with_ticker(ticker);

        Self {
            controller,
            handle,
            events,
            clock,
            streams,
            output,
            ticks,
            failures,
        }
    }

    /// A second assembler sharing this rig's failures and stream registry.
    pub fn assembler(&self) -> SessionAssembler {
        assembler(&self.failures, &self.streams)
    }

    pub fn drain(&mut self) -> Vec<ControllerEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}

fn assembler(failures: &Failures, streams: &StreamRegistry) -> SessionAssembler {
    SessionAssembler::new(
        Box::new(FakeResolver {
            failures: failures.clone(),
        }),
        Box::new(FakeFetcher {
            failures: failures.clone(),
            streams: streams.clone(),
        }),
        Box::new(FakeDecoder {
            failures: failures.clone(),
        }),
    )
}
