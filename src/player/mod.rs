pub mod audio;
pub mod controller;
pub mod error;
pub mod fetch;
pub mod resolve;
pub mod session;
pub mod stream;

#[cfg(test)]
pub(crate) mod testing;

pub use audio::{AudioOutput, RodioDecoder, RodioOutput, SampleFormat, StreamDecoder};
pub use controller::{
    event_channel, request_channel, AdvanceReason, ControlRequest, ControllerConfig,
    ControllerEvent, ControllerHandle, EventReceiver, PlayerController,
};
pub use error::{AssemblyError, StartupError};
pub use fetch::{FetchConfig, HttpFetcher, StreamFetcher};
pub use resolve::TrackResolver;
pub use session::{SessionAssembler, SessionInfo};
