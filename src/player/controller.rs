// ==========================================
// PLAYER CONTROLLER
// ==========================================
// Owns the single active PlaybackSession and is the only code that
// touches it or the output device. Everything else talks to it through
// channels:
//
//   driver  --ControlRequest-->  controller  --ControllerEvent-->  driver
//   render thread --generation--> controller
//   ticker --Instant-->           controller
//
// The loop is synchronous: a SwitchTrack blocks it for the duration of
// resolve + fetch + decode, and ticks simply wait. Run it with
// tokio::task::spawn_blocking or on a plain thread.

use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use tokio::sync::mpsc;

use crate::catalog::Track;
use crate::player::audio::{AudioOutput, CompletionSignal};
use crate::player::error::StartupError;
use crate::player::session::{
    Clock, PlaybackSession, PreparedSession, SessionAssembler, SessionInfo, SystemClock,
};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRequest {
    SwitchTrack(Track),
    TogglePause,
}

/// Why the driver is being asked for another track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceReason {
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    /// A switch finished. `None` means the track could not be opened.
    SessionReady(Option<SessionInfo>),
    PositionTick(Duration),
    AutoAdvance(AdvanceReason),
}

pub type EventSender = mpsc::UnboundedSender<ControllerEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ControllerEvent>;

/// Cloneable input side of the controller.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    tx: Sender<ControlRequest>,
}

impl ControllerHandle {
    /// Returns false once the controller has stopped.
    pub fn switch_track(&self, track: Track) -> bool {
        self.tx.send(ControlRequest::SwitchTrack(track)).is_ok()
    }

    pub fn toggle_pause(&self) -> bool {
        self.tx.send(ControlRequest::TogglePause).is_ok()
    }
}

pub fn request_channel() -> (ControllerHandle, Receiver<ControlRequest>) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (ControllerHandle { tx }, rx)
}

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub tick_interval: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

/// One thing the loop reacts to.
#[derive(Debug)]
pub(crate) enum Occurrence {
    Request(ControlRequest),
    Completed(u64),
    Tick,
    TickerClosed,
    CompletionsClosed,
    RequestsClosed,
}

pub struct PlayerController {
    assembler: SessionAssembler,
    output: Box<dyn AudioOutput>,
    clock: Box<dyn Clock>,
    requests: Receiver<ControlRequest>,
    completions_tx: Sender<u64>,
    completions_rx: Receiver<u64>,
    ticker: Receiver<Instant>,
    events: EventSender,
    active: Option<PlaybackSession>,
    generation: u64,
}

impl PlayerController {
    pub fn new(
        assembler: SessionAssembler,
        output: Box<dyn AudioOutput>,
        requests: Receiver<ControlRequest>,
        events: EventSender,
        config: ControllerConfig,
    ) -> Self {
        let (completions_tx, completions_rx) = crossbeam_channel::unbounded();
        Self {
            assembler,
            output,
            clock: Box::new(SystemClock),
            requests,
            completions_tx,
            completions_rx,
            ticker: crossbeam_channel::tick(config.tick_interval),
            events,
            active: None,
            generation: 0,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Replace the periodic ticker, e.g. with a channel a test controls.
    pub fn with_ticker(mut self, ticker: Receiver<Instant>) -> Self {
        self.ticker = ticker;
        self
    }

    /// Open `initial`, then run the control loop until every
    /// [`ControllerHandle`] has been dropped.
    ///
    /// Only the first track is fatal. Later failures become
    /// `SessionReady(None)` followed by `AutoAdvance(Failed)`.
    pub fn start(mut self, initial: Track) -> Result<(), StartupError> {
        self.open_initial(initial)?;
        self.run();
        Ok(())
    }

    pub(crate) fn open_initial(&mut self, track: Track) -> Result<(), StartupError> {
        tracing::info!(track_id = track.id, title = %track.title, "starting playback");
        match self.assembler.assemble(&track) {
            Ok(prepared) => {
                self.activate(prepared);
                Ok(())
            }
            Err(source) => {
                tracing::error!(track_id = track.id, error = %source, "first track failed");
                Err(StartupError {
                    track_id: track.id,
                    title: track.title,
                    source,
                })
            }
        }
    }

    fn run(&mut self) {
        loop {
            let occurrence = self.next_occurrence();
            if !self.handle(occurrence) {
                break;
            }
        }
        self.shutdown();
    }

    fn next_occurrence(&self) -> Occurrence {
        crossbeam_channel::select! {
            recv(self.requests) -> msg => match msg {
                Ok(request) => Occurrence::Request(request),
                Err(_) => Occurrence::RequestsClosed,
            },
            recv(self.completions_rx) -> msg => match msg {
                Ok(generation) => Occurrence::Completed(generation),
                Err(_) => Occurrence::CompletionsClosed,
            },
            recv(self.ticker) -> msg => match msg {
                Ok(_) => Occurrence::Tick,
                Err(_) => Occurrence::TickerClosed,
            },
        }
    }

    /// Process one occurrence. Returns false when the loop should end.
    pub(crate) fn handle(&mut self, occurrence: Occurrence) -> bool {
        match occurrence {
            Occurrence::Request(ControlRequest::SwitchTrack(track)) => self.switch_to(track),
            Occurrence::Request(ControlRequest::TogglePause) => self.toggle_pause(),
            Occurrence::Completed(generation) => self.on_completed(generation),
            Occurrence::Tick => self.tick(),
            Occurrence::TickerClosed => {
                tracing::warn!("position ticker closed, ticks stop");
                self.ticker = crossbeam_channel::never();
            }
            // completions_tx lives as long as the controller, so this
            // should not happen; stop selecting on it if it does.
            Occurrence::CompletionsClosed => {
                tracing::warn!("completion channel closed, natural completion is no longer reported");
                self.completions_rx = crossbeam_channel::never();
            }
            Occurrence::RequestsClosed => return false,
        }
        true
    }

    fn switch_to(&mut self, track: Track) {
        tracing::info!(track_id = track.id, title = %track.title, "switching track");
        match self.assembler.assemble(&track) {
            Ok(prepared) => self.activate(prepared),
            Err(err) => {
                tracing::warn!(track_id = track.id, error = %err, "track failed, skipping");
                self.emit(ControllerEvent::SessionReady(None));
                self.emit(ControllerEvent::AutoAdvance(AdvanceReason::Failed));
            }
        }
    }

    fn activate(&mut self, prepared: PreparedSession) {
        let PreparedSession {
            track,
            stream,
            decoded,
            total,
        } = prepared;

        // The old source must be off the device and its connection closed
        // before the new one starts.
        if let Some(previous) = self.active.take() {
            self.output.clear();
            previous.release();
        }

        self.generation += 1;
        let session = PlaybackSession::new(
            track,
            decoded.format,
            total,
            stream,
            self.generation,
            self.clock.now(),
        );
        let done = CompletionSignal::new(self.generation, self.completions_tx.clone());
        self.output.play(decoded.handle, done);

        let info = session.info();
        tracing::info!(
            track_id = info.track.id,
            generation = self.generation,
            total_ms = info.total.as_millis() as u64,
            sample_rate = info.format.sample_rate,
            channels = info.format.channels,
            "session ready"
        );
        self.active = Some(session);
        self.emit(ControllerEvent::SessionReady(Some(info)));
    }

    fn toggle_pause(&mut self) {
        let now = self.clock.now();
        let Some(session) = self.active.as_mut() else {
            tracing::debug!("toggle pause ignored, nothing is playing");
            return;
        };
        let paused = session.toggle_pause(now);
        self.output.set_paused(paused);
        tracing::debug!(
            paused,
            elapsed_ms = session.elapsed(now).as_millis() as u64,
            "pause toggled"
        );
    }

    fn tick(&mut self) {
        let now = self.clock.now();
        let position = self.active.as_ref().and_then(|s| s.position(now));
        if let Some(elapsed) = position {
            self.emit(ControllerEvent::PositionTick(elapsed));
        }
    }

    fn on_completed(&mut self, generation: u64) {
        match self.active.as_mut() {
            Some(session) if session.generation() == generation && !session.is_finished() => {
                session.mark_completed();
                tracing::info!(track_id = session.track().id, generation, "track finished");
                self.emit(ControllerEvent::AutoAdvance(AdvanceReason::Completed));
            }
            _ => tracing::debug!(generation, "stale completion ignored"),
        }
    }

    fn shutdown(&mut self) {
        if let Some(session) = self.active.take() {
            self.output.clear();
            session.release();
        }
        tracing::info!("controller stopped");
    }

    fn emit(&self, event: ControllerEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("event receiver dropped");
        }
    }

    /// Handle everything already queued, requests first.
    #[cfg(test)]
    pub(crate) fn pump(&mut self) {
        while let Ok(request) = self.requests.try_recv() {
            self.handle(Occurrence::Request(request));
        }
        while let Ok(generation) = self.completions_rx.try_recv() {
            self.handle(Occurrence::Completed(generation));
        }
    }
}
