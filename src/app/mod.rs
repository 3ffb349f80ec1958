// Line-oriented driver for the player controller.
// Prints one status line per controller event, reads one-letter commands
// from stdin and picks the next track whenever the controller asks.

pub mod queue;

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use crate::player::{AdvanceReason, ControllerEvent, ControllerHandle, EventReceiver, SessionInfo};
use queue::PlayQueue;

pub type InputReceiver = mpsc::UnboundedReceiver<String>;

const HELP: &str = "commands: p (or empty line) pause/resume, n next, b back, q quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    TogglePause,
    Next,
    Back,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "" | "p" => Some(Command::TogglePause),
            "n" => Some(Command::Next),
            "b" => Some(Command::Back),
            "q" => Some(Command::Quit),
            _ => None,
        }
    }
}

pub struct PlayerApp<W: Write> {
    queue: PlayQueue,
    controller: ControllerHandle,
    events: EventReceiver,
    out: W,
    now_playing: Option<SessionInfo>,
    position: Duration,
    paused: bool,
    failed_in_row: usize,
    should_quit: bool,
}

impl<W: Write> PlayerApp<W> {
    /// `queue` must already point at the track the controller was started with.
    pub fn new(queue: PlayQueue, controller: ControllerHandle, events: EventReceiver, out: W) -> Self {
        PlayerApp {
            queue,
            controller,
            events,
            out,
            now_playing: None,
            position: Duration::ZERO,
            paused: false,
            failed_in_row: 0,
            should_quit: false,
        }
    }

    /// Run until the user quits, the playlist ends or the controller stops.
    /// Dropping the app drops its controller handle, which stops the loop.
    pub async fn run(mut self, mut input: InputReceiver) -> Result<()> {
        let mut input_open = true;
        writeln!(self.out, "{HELP}")?;

        while !self.should_quit {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => self.handle_event(event)?,
                    None => {
                        tracing::info!("controller event stream closed");
                        break;
                    }
                },
                line = input.recv(), if input_open => match line {
                    Some(line) => self.handle_input(&line)?,
                    None => input_open = false,
                },
            }
        }

        writeln!(self.out)?;
        Ok(())
    }

    fn handle_event(&mut self, event: ControllerEvent) -> Result<()> {
        match event {
            ControllerEvent::SessionReady(Some(info)) => {
                self.failed_in_row = 0;
                self.position = Duration::ZERO;
                self.paused = false;
                writeln!(
                    self.out,
                    "\nnow playing: {} [{}]",
                    info.track.display_name(),
                    format_duration(info.total)
                )?;
                self.now_playing = Some(info);
            }
            ControllerEvent::SessionReady(None) => {
                self.failed_in_row += 1;
                writeln!(self.out, "\ntrack unavailable, skipping")?;
            }
            ControllerEvent::PositionTick(elapsed) => {
                self.position = elapsed;
                self.render_progress()?;
            }
            ControllerEvent::AutoAdvance(reason) => {
                tracing::debug!(?reason, "auto advance");
                if reason == AdvanceReason::Failed && self.failed_in_row >= self.queue.len() {
                    tracing::warn!(failures = self.failed_in_row, "every track failed, giving up");
                    writeln!(self.out, "\nno playable tracks left")?;
                    self.should_quit = true;
                } else {
                    self.advance()?;
                }
            }
        }
        Ok(())
    }

    fn handle_input(&mut self, line: &str) -> Result<()> {
        match Command::parse(line) {
            Some(Command::TogglePause) => {
                if self.now_playing.is_some() && self.controller.toggle_pause() {
                    self.paused = !self.paused;
                    self.render_progress()?;
                }
            }
            Some(Command::Next) => self.advance()?,
            Some(Command::Back) => match self.queue.previous() {
                Some(track) => self.send(track),
                None => writeln!(self.out, "\nalready at the first track")?,
            },
            Some(Command::Quit) => self.should_quit = true,
            None => writeln!(self.out, "\n{HELP}")?,
        }
        Ok(())
    }

    fn advance(&mut self) -> Result<()> {
        match self.queue.next() {
            Some(track) => self.send(track),
            None => {
                tracing::info!("end of playlist");
                writeln!(self.out, "\nend of playlist")?;
                self.should_quit = true;
            }
        }
        Ok(())
    }

    fn send(&mut self, track: crate::catalog::Track) {
        tracing::debug!(track_id = track.id, "requesting track");
        if !self.controller.switch_track(track) {
            tracing::warn!("controller is gone");
            self.should_quit = true;
        }
    }

    fn render_progress(&mut self) -> Result<()> {
        let Some(info) = &self.now_playing else {
            return Ok(());
        };
        let state = if self.paused { "paused " } else { "playing" };
        write!(
            self.out,
            "\r{state} {} / {}",
            format_duration(self.position),
            format_duration(info.total)
        )?;
        self.out.flush()?;
        Ok(())
    }
}

/// Read stdin lines on a plain thread and forward them to the driver.
///
/// A blocking read cannot be cancelled. On a runtime worker it would hold up
/// shutdown until the next newline; this thread is simply abandoned at exit.
pub fn spawn_stdin_reader() -> Result<InputReceiver> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name("stdin-reader".into())
        .spawn(move || {
            for line in std::io::stdin().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to read stdin");
                        break;
                    }
                }
            }
        })
        .context("failed to start stdin reader")?;
    Ok(rx)
}

/// `hh:mm:ss`
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::queue::PlayOrder;
    use super::*;
    use crate::catalog::Track;
    use crate::player::{event_channel, request_channel, ControlRequest, SampleFormat};
    use crossbeam_channel::Receiver;

    fn playlist(n: u64) -> Vec<Track> {
        (1..=n)
            .map(|id| Track {
                id,
                title: format!("Track {id}"),
                duration_ms: 60_000,
                ..Track::default()
            })
            .collect()
    }

    fn app(n: u64, order: PlayOrder) -> (PlayerApp<Vec<u8>>, Receiver<ControlRequest>) {
        let mut queue = PlayQueue::with_seed(playlist(n), order, 3);
        queue.start_at(0);
        let (handle, requests) = request_channel();
        let (_events_tx, events) = event_channel();
        (PlayerApp::new(queue, handle, events, Vec::new()), requests)
    }

    fn switched_ids(requests: &Receiver<ControlRequest>) -> Vec<u64> {
        requests
            .try_iter()
            .filter_map(|r| match r {
                ControlRequest::SwitchTrack(t) => Some(t.id),
                ControlRequest::TogglePause => None,
            })
            .collect()
    }

    fn ready(id: u64) -> ControllerEvent {
        let track = playlist(id).pop().unwrap();
        ControllerEvent::SessionReady(Some(SessionInfo {
            total: track.duration(),
            track,
            format: SampleFormat {
                sample_rate: 44_100,
                channels: 2,
            },
        }))
    }

    fn output(app: &PlayerApp<Vec<u8>>) -> String {
        String::from_utf8_lossy(&app.out).into_owned()
    }

    #[test]
    fn format_duration_is_hh_mm_ss() {
        assert_eq!(format_duration(Duration::ZERO), "00:00:00");
        assert_eq!(format_duration(Duration::from_secs(215)), "00:03:35");
        assert_eq!(format_duration(Duration::from_millis(3_725_900)), "01:02:05");
    }

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse(""), Some(Command::TogglePause));
        assert_eq!(Command::parse(" p \n"), Some(Command::TogglePause));
        assert_eq!(Command::parse("n"), Some(Command::Next));
        assert_eq!(Command::parse("b"), Some(Command::Back));
        assert_eq!(Command::parse("q"), Some(Command::Quit));
        assert_eq!(Command::parse("x"), None);
    }

    #[test]
    fn completion_requests_the_next_track() {
        let (mut app, requests) = app(3, PlayOrder::Looped);
        app.handle_event(ready(1)).unwrap();
        app.handle_event(ControllerEvent::AutoAdvance(AdvanceReason::Completed))
            .unwrap();
        assert_eq!(switched_ids(&requests), vec![2]);
        assert!(!app.should_quit);
    }

    #[test]
    fn sequential_playlist_ends() {
        let (mut app, requests) = app(1, PlayOrder::Sequential);
        app.handle_event(ControllerEvent::AutoAdvance(AdvanceReason::Completed))
            .unwrap();
        assert!(switched_ids(&requests).is_empty());
        assert!(app.should_quit);
        assert!(output(&app).contains("end of playlist"));
    }

    #[test]
    fn failures_skip_forward_until_every_track_failed() {
        let (mut app, requests) = app(2, PlayOrder::Looped);

        app.handle_event(ControllerEvent::SessionReady(None)).unwrap();
        app.handle_event(ControllerEvent::AutoAdvance(AdvanceReason::Failed))
            .unwrap();
        assert_eq!(switched_ids(&requests), vec![2]);
        assert!(!app.should_quit);

        app.handle_event(ControllerEvent::SessionReady(None)).unwrap();
        app.handle_event(ControllerEvent::AutoAdvance(AdvanceReason::Failed))
            .unwrap();
        assert!(switched_ids(&requests).is_empty());
        assert!(app.should_quit);
    }

    #[test]
    fn a_successful_session_resets_the_failure_count() {
        let (mut app, _requests) = app(2, PlayOrder::Looped);
        app.handle_event(ControllerEvent::SessionReady(None)).unwrap();
        app.handle_event(ready(2)).unwrap();
        assert_eq!(app.failed_in_row, 0);
    }

    #[test]
    fn commands_reach_the_controller() {
        let (mut app, requests) = app(3, PlayOrder::Sequential);
        app.handle_event(ready(1)).unwrap();

        app.handle_input("n").unwrap();
        app.handle_input("b").unwrap();
        assert_eq!(switched_ids(&requests), vec![2, 1]);

        app.handle_input("p").unwrap();
        assert_eq!(requests.try_recv().unwrap(), ControlRequest::TogglePause);
        assert!(app.paused);

        app.handle_input("q").unwrap();
        assert!(app.should_quit);
    }

    #[test]
    fn pause_before_any_session_sends_nothing() {
        let (mut app, requests) = app(2, PlayOrder::Looped);
        app.handle_input("p").unwrap();
        assert!(requests.try_recv().is_err());
        assert!(!app.paused);
    }

    #[test]
    fn ticks_render_a_progress_line() {
        let (mut app, _requests) = app(1, PlayOrder::Looped);
        app.handle_event(ready(1)).unwrap();
        app.handle_event(ControllerEvent::PositionTick(Duration::from_secs(15)))
            .unwrap();
        let out = output(&app);
        assert!(out.contains("now playing: Track 1 [00:01:00]"));
        assert!(out.ends_with("\rplaying 00:00:15 / 00:01:00"));
    }

    #[tokio::test]
    async fn run_returns_when_events_close_with_input_still_open() {
        let (app, _requests) = app(2, PlayOrder::Looped);
        let (_input_tx, input) = mpsc::unbounded_channel();
        let finished = tokio::time::timeout(Duration::from_secs(1), app.run(input)).await;
        assert!(matches!(finished, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn quit_line_ends_run_while_controller_is_live() {
        let mut queue = PlayQueue::with_seed(playlist(2), PlayOrder::Looped, 3);
        queue.start_at(0);
        let (handle, _requests) = request_channel();
        let (events_tx, events) = event_channel();
        let (input_tx, input) = mpsc::unbounded_channel();
        input_tx.send("q".to_string()).unwrap();

        let app = PlayerApp::new(queue, handle, events, Vec::new());
        let finished = tokio::time::timeout(Duration::from_secs(1), app.run(input)).await;
        assert!(matches!(finished, Ok(Ok(()))));
        drop(events_tx);
    }

    #[test]
    fn losing_the_controller_quits() {
        let (mut app, requests) = app(3, PlayOrder::Looped);
        drop(requests);
        app.handle_input("n").unwrap();
        assert!(app.should_quit);
    }
}
