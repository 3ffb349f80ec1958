// ==========================================
// PLAY QUEUE
// ==========================================
// Decides which playlist track comes next. The controller never picks
// tracks itself: on AutoAdvance the driver asks the queue and sends the
// result back as a SwitchTrack.
//
// Three orders:
// - Sequential: play through once and stop
// - Looped: wrap back to the first track (the default)
// - Shuffled: every track once per cycle in random order, then reshuffle
//
// `history` holds playlist indices already played so `previous` can walk
// back regardless of order.

use clap::ValueEnum;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::catalog::Track;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PlayOrder {
    Sequential,
    #[default]
    Looped,
    Shuffled,
}

pub struct PlayQueue {
    tracks: Vec<Track>,
    order: PlayOrder,
    current: Option<usize>,
    history: Vec<usize>,
    // Remaining indices of the current shuffle cycle, drawn from the back.
    bag: Vec<usize>,
    rng: StdRng,
}

impl PlayQueue {
    pub fn new(tracks: Vec<Track>, order: PlayOrder) -> Self {
        Self::with_rng(tracks, order, StdRng::from_entropy())
    }

    /// Deterministic shuffle, for tests.
    pub fn with_seed(tracks: Vec<Track>, order: PlayOrder, seed: u64) -> Self {
        Self::with_rng(tracks, order, StdRng::seed_from_u64(seed))
    }

    fn with_rng(tracks: Vec<Track>, order: PlayOrder, rng: StdRng) -> Self {
        PlayQueue {
            tracks,
            order,
            current: None,
            history: Vec::new(),
            bag: Vec::new(),
            rng,
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.and_then(|i| self.tracks.get(i))
    }

    /// Make `index` the current track. Out of range indices are rejected.
    pub fn start_at(&mut self, index: usize) -> Option<Track> {
        if index >= self.tracks.len() {
            return None;
        }
        if self.order == PlayOrder::Shuffled {
            self.refill_bag();
            self.bag.retain(|i| *i != index);
        }
        self.current = Some(index);
        self.tracks.get(index).cloned()
    }

    /// Advance to the next track, or `None` when a sequential queue has run
    /// out (or the playlist is empty).
    pub fn next(&mut self) -> Option<Track> {
        let next = match (self.order, self.current) {
            (_, None) if self.tracks.is_empty() => return None,
            (PlayOrder::Shuffled, _) => self.draw(),
            (_, None) => 0,
            (PlayOrder::Sequential, Some(i)) if i + 1 >= self.tracks.len() => return None,
            (PlayOrder::Looped, Some(i)) => (i + 1) % self.tracks.len(),
            (PlayOrder::Sequential, Some(i)) => i + 1,
        };

        if let Some(previous) = self.current.replace(next) {
            self.history.push(previous);
        }
        self.tracks.get(next).cloned()
    }

    /// Step back to the last track played. The track being left becomes
    /// reachable again through `next` in sequential and looped order.
    pub fn previous(&mut self) -> Option<Track> {
        let back = self.history.pop()?;
        if let (PlayOrder::Shuffled, Some(current)) = (self.order, self.current) {
            self.bag.push(current);
        }
        self.current = Some(back);
        self.tracks.get(back).cloned()
    }

    fn draw(&mut self) -> usize {
        if self.bag.is_empty() {
            self.refill_bag();
            // Avoid repeating the same track across a reshuffle.
            if self.bag.len() > 1 && self.bag.last() == self.current.as_ref() {
                let last = self.bag.len() - 1;
                self.bag.swap(0, last);
            }
        }
        self.bag.pop().unwrap_or(0)
    }

    fn refill_bag(&mut self) {
        self.bag = (0..self.tracks.len()).collect();
        self.bag.shuffle(&mut self.rng);
    }
}
