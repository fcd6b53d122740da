//! The playback slot and the types that describe it

use crate::audio::AudioPlayer;
use log::{debug, warn};
use std::fmt;
use std::thread::JoinHandle;

/// Lifecycle of the single playback slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Nothing playing and nothing pending
    Empty,
    /// The latest request is being rendered by the engine
    Synthesizing,
    /// The latest request's player is on the device
    Playing,
    /// A player is being canceled and the device drained
    Canceling,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaybackState::Empty => "empty",
            PlaybackState::Synthesizing => "synthesizing",
            PlaybackState::Playing => "playing",
            PlaybackState::Canceling => "canceling",
        };
        f.write_str(name)
    }
}

/// How one speech request ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Played to the end
    Completed,
    /// Started, then stopped by stop/interrupt or a newer request
    Canceled,
    /// A newer request or a stop arrived before playback started
    Superseded,
    /// The engine failed to render the text
    SynthesisFailed(String),
    /// The player could not be created, bound or started
    PlayerFailed(String),
    /// The supervisor has no engine, or has been shut down
    Unavailable(String),
}

/// Called once with the outcome of a request, on the worker thread
pub type OutcomeCallback = Box<dyn FnOnce(PlaybackOutcome) + Send + 'static>;

/// A started player together with the request that owns it
pub(crate) struct PlaybackHandle {
    /// Generation of the request; its worker is tracked under the same id
    pub request: u64,
    pub player: Box<dyn AudioPlayer>,
}

/// Everything guarded by the supervisor's slot lock
pub(crate) struct Slot {
    /// Id of the most recent request; bumping it invalidates all older ones
    pub generation: u64,

    /// Installed handle, if any
    pub current: Option<PlaybackHandle>,

    /// Handles taken off the slot that still have to be canceled and drained
    pub retired: Vec<PlaybackHandle>,

    pub state: PlaybackState,

    /// Worker threads that may still be running, keyed by request id
    pub workers: Vec<(u64, JoinHandle<()>)>,

    /// Set by shutdown; no new requests are accepted
    pub closed: bool,
}

impl Slot {
    pub fn new() -> Self {
        Self {
            generation: 0,
            current: None,
            retired: Vec::new(),
            state: PlaybackState::Empty,
            workers: Vec::new(),
            closed: false,
        }
    }

    /// Whether `request` is still the one allowed to use the device
    pub fn is_latest(&self, request: u64) -> bool {
        !self.closed && self.generation == request
    }

    /// Start a new request, returning its id
    pub fn next_request(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Queue the installed handle for draining
    ///
    /// Returns whether there was one.
    pub fn retire_current(&mut self) -> bool {
        match self.current.take() {
            Some(handle) => {
                self.retired.push(handle);
                true
            }
            None => false,
        }
    }

    /// Join workers that have exited
    pub fn reap_workers(&mut self) {
        let (finished, running): (Vec<_>, Vec<_>) = self
            .workers
            .drain(..)
            .partition(|(_, handle)| handle.is_finished());
        self.workers = running;

        for (request, handle) in finished {
            if handle.join().is_err() {
                warn!("Speech worker for request {} panicked", request);
            } else {
                debug!("Reaped speech worker for request {}", request);
            }
        }
    }

    /// Forget workers started at or before `generation`
    ///
    /// Their requests are already invalidated, so they can never install a
    /// handle; dropping the join handles detaches the threads.
    pub fn abandon_workers(&mut self, generation: u64) -> usize {
        let before = self.workers.len();
        self.workers.retain(|(request, _)| *request > generation);
        before - self.workers.len()
    }

    /// Number of workers started at or before `generation` still tracked
    pub fn workers_up_to(&self, generation: u64) -> usize {
        self.workers
            .iter()
            .filter(|(request, _)| *request <= generation)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_generation_invalidates_older_requests() {
        let mut slot = Slot::new();
        let first = slot.next_request();
        let second = slot.next_request();

        assert!(!slot.is_latest(first));
        assert!(slot.is_latest(second));

        slot.closed = true;
        assert!(!slot.is_latest(second));
    }

    #[test]
    fn test_reap_and_abandon_workers() {
        let mut slot = Slot::new();
        slot.workers.push((1, thread::spawn(|| {})));
        slot.workers
            .push((2, thread::spawn(|| thread::sleep(Duration::from_millis(300)))));

        thread::sleep(Duration::from_millis(50));
        slot.reap_workers();
        assert_eq!(slot.workers.len(), 1);
        assert_eq!(slot.workers_up_to(1), 0);
        assert_eq!(slot.workers_up_to(2), 1);

        assert_eq!(slot.abandon_workers(2), 1);
        assert!(slot.workers.is_empty());
    }

    #[test]
    fn test_retire_current_on_empty_slot() {
        let mut slot = Slot::new();
        assert!(!slot.retire_current());
        assert!(slot.retired.is_empty());
        assert!(slot.current.is_none());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(PlaybackState::Canceling.to_string(), "canceling");
    }
}
