//! Playback supervision
//!
//! [`PlaybackSupervisor`] owns the single playback slot. Every `speak`
//! request runs synthesize-then-play on its own worker thread and the
//! newest request always wins the device:
//!
//! - `speak` bumps the request generation and moves the installed handle
//!   to the slot's retired queue under the slot lock, so the next request
//!   always sees (and cancels) the previous one.
//! - Workers only install a handle while their generation is still the
//!   latest; an older request that finishes synthesis late just drops out.
//! - Retired players are canceled and drained under the device lock, and
//!   every start drains the retired queue first, so a new player never
//!   starts while an old one is still on the device.
//! - Draining happens on worker threads; `speak` and `interrupt` never
//!   wait for the device.
//!
//! Lock order is device, then slot.

pub mod slot;

pub use slot::{OutcomeCallback, PlaybackOutcome, PlaybackState};

use crate::audio::{AudioPlayer, PlayerFactory, ProcessPlayerFactory};
use crate::config::{
    Config, DEFAULT_GRACE_INTERVAL_MS, DEFAULT_POLL_INTERVAL_MS, DEFAULT_SHUTDOWN_TIMEOUT_MS,
};
use crate::speech::{create_engine, SynthesisEngine};
use crate::{Result, SaydError};
use log::{debug, error, info, warn};
use slot::{PlaybackHandle, Slot};
use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Longest single wait while polling for workers to exit
const WORKER_EXIT_POLL: Duration = Duration::from_millis(10);

/// A spawned worker, or the spawn error and the callback it never took
type Spawned = std::result::Result<JoinHandle<()>, (io::Error, Option<OutcomeCallback>)>;

/// Timing knobs for the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorOptions {
    /// Upper bound on waiting for a canceled player to release the device
    pub grace_interval: Duration,
    /// Upper bound on waiting for workers in stop/shutdown
    pub shutdown_timeout: Duration,
    /// How often a playing worker checks for natural completion
    pub poll_interval: Duration,
}

impl SupervisorOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            grace_interval: config.grace_interval(),
            shutdown_timeout: config.shutdown_timeout(),
            poll_interval: config.poll_interval(),
        }
    }
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            grace_interval: Duration::from_millis(DEFAULT_GRACE_INTERVAL_MS),
            shutdown_timeout: Duration::from_millis(DEFAULT_SHUTDOWN_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

/// Engine and player factory, or the reason we have neither
enum Backend {
    Ready {
        engine: Arc<dyn SynthesisEngine>,
        players: Box<dyn PlayerFactory>,
    },
    Unavailable(String),
}

/// State shared between the supervisor and its workers
struct Shared {
    slot: Mutex<Slot>,

    /// Signalled whenever the slot changes or a worker exits
    changed: Condvar,

    /// Serializes start and cancel-and-drain on the output device
    device: Mutex<()>,

    /// Serializes synthesis for engines that aren't concurrency-safe
    synthesis: Mutex<()>,

    backend: Backend,
    options: SupervisorOptions,
}

/// Single-channel speech output
///
/// Cheap to share by reference across threads; all methods take `&self`.
/// Dropping the supervisor shuts it down.
pub struct PlaybackSupervisor {
    shared: Arc<Shared>,
}

impl PlaybackSupervisor {
    /// Create a supervisor from an engine construction result
    ///
    /// An engine error is logged and leaves the supervisor degraded: every
    /// request is dropped without touching the device.
    pub fn new(
        engine: Result<Box<dyn SynthesisEngine>>,
        players: Box<dyn PlayerFactory>,
        options: SupervisorOptions,
    ) -> Self {
        match engine {
            Ok(engine) => {
                debug!(
                    "Playback supervisor ready [engine = {}, voice = {}]",
                    engine.name(),
                    engine.voice()
                );
                Self::with_backend(
                    Backend::Ready {
                        engine: Arc::from(engine),
                        players,
                    },
                    options,
                )
            }
            Err(e) => Self::degraded(e, options),
        }
    }

    /// Create a supervisor that has no engine
    pub fn degraded(reason: SaydError, options: SupervisorOptions) -> Self {
        error!("Speech output unavailable, running degraded: {}", reason);
        Self::with_backend(Backend::Unavailable(reason.to_string()), options)
    }

    /// Build the configured engine and system audio player
    pub fn from_config(config: &Config) -> Self {
        let options = SupervisorOptions::from_config(config);
        let backend = ProcessPlayerFactory::from_config(config)
            .and_then(|players| Ok((create_engine(config)?, players)));

        match backend {
            Ok((engine, players)) => Self::new(Ok(engine), Box::new(players), options),
            Err(e) => Self::degraded(e, options),
        }
    }

    fn with_backend(backend: Backend, options: SupervisorOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot::new()),
                changed: Condvar::new(),
                device: Mutex::new(()),
                synthesis: Mutex::new(()),
                backend,
                options,
            }),
        }
    }

    /// Synthesize `text` and play it, preempting whatever is playing
    ///
    /// Returns as soon as the request is scheduled.
    pub fn speak(&self, text: &str) {
        self.submit(text, None);
    }

    /// Like [`PlaybackSupervisor::speak`], reporting how the request ended
    ///
    /// The callback runs exactly once, on the worker thread (or on the
    /// caller's thread if the request is refused up front).
    pub fn speak_with_outcome<F>(&self, text: &str, on_done: F)
    where
        F: FnOnce(PlaybackOutcome) + Send + 'static,
    {
        self.submit(text, Some(Box::new(on_done)));
    }

    fn submit(&self, text: &str, on_done: Option<OutcomeCallback>) {
        if let Backend::Unavailable(reason) = &self.shared.backend {
            error!("Cannot speak, synthesis engine unavailable: {}", reason);
            report(on_done, PlaybackOutcome::Unavailable(reason.clone()));
            return;
        }

        let mut slot = self.shared.lock_slot();
        if slot.closed {
            warn!("Ignoring speech request, supervisor has been shut down");
            drop(slot);
            report(
                on_done,
                PlaybackOutcome::Unavailable(SaydError::ShutDown.to_string()),
            );
            return;
        }

        slot.reap_workers();
        let request = slot.next_request();
        slot.state = if slot.retire_current() {
            PlaybackState::Canceling
        } else {
            PlaybackState::Synthesizing
        };

        let shared = Arc::clone(&self.shared);
        let text = text.to_string();
        let builder = thread::Builder::new().name(format!("sayd-speak-{}", request));
        let spawned = spawn_worker(builder, on_done, move || {
            let outcome = shared.run_request(request, &text);
            debug!("Request {} finished: {:?}", request, outcome);
            shared.changed.notify_all();
            outcome
        });

        match spawned {
            Ok(handle) => {
                slot.workers.push((request, handle));
                self.shared.changed.notify_all();
            }
            Err((e, on_done)) => {
                error!("Failed to spawn speech worker: {}", e);
                drop(slot);
                self.shared.release(request);
                report(
                    on_done,
                    PlaybackOutcome::Unavailable(format!("cannot spawn speech worker: {}", e)),
                );
            }
        }
    }

    /// Cancel the current playback, if any
    ///
    /// There is no paused state: interrupted audio cannot be resumed.
    /// A request still being synthesized is dropped as well. The player is
    /// canceled and drained on a worker thread; this returns right away.
    /// Fails with [`SaydError::NoActivePlayback`] when there is nothing to
    /// interrupt.
    pub fn interrupt(&self) -> Result<()> {
        let mut slot = self.shared.lock_slot();
        if slot.current.is_none() && slot.state == PlaybackState::Empty {
            return Err(SaydError::NoActivePlayback);
        }
        slot.reap_workers();
        let generation = slot.next_request();
        slot.retire_current();
        slot.state = PlaybackState::Canceling;

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(format!("sayd-cancel-{}", generation))
            .spawn(move || {
                shared.release(generation);
                shared.changed.notify_all();
            });

        match spawned {
            Ok(handle) => {
                slot.workers.push((generation, handle));
                self.shared.changed.notify_all();
            }
            Err(e) => {
                warn!("Failed to spawn cancel worker, canceling inline: {}", e);
                drop(slot);
                self.shared.release(generation);
            }
        }

        info!("Canceled audio output. Pausing is not supported.");
        Ok(())
    }

    /// Resuming interrupted audio is not supported
    ///
    /// Always returns [`SaydError::Unsupported`]; never starts audio.
    pub fn resume(&self) -> Result<()> {
        info!("Continuation of audio output is not supported.");
        Err(SaydError::Unsupported("resume"))
    }

    /// Cancel playback, drop pending requests, and wait for workers
    ///
    /// Waits at most `shutdown_timeout`; workers still running after that
    /// are detached. Calling this with nothing playing is a no-op. The
    /// supervisor accepts new requests afterwards.
    pub fn stop(&self) {
        self.halt(false);
    }

    /// Like [`PlaybackSupervisor::stop`], then refuse all further requests
    pub fn shutdown(&self) {
        self.halt(true);
    }

    fn halt(&self, close: bool) {
        let generation = {
            let mut slot = self.shared.lock_slot();
            if close {
                debug!("Playback supervisor shutdown triggered");
                slot.closed = true;
            }
            let generation = slot.next_request();
            if slot.retire_current() {
                slot.state = PlaybackState::Canceling;
            }
            self.shared.changed.notify_all();
            generation
        };

        self.shared.release(generation);
        self.shared.await_workers(generation);
    }

    /// Current slot state
    pub fn state(&self) -> PlaybackState {
        self.shared.lock_slot().state
    }

    /// Whether the supervisor is running without an engine
    pub fn is_degraded(&self) -> bool {
        matches!(self.shared.backend, Backend::Unavailable(_))
    }

    /// Whether shutdown has been called
    pub fn is_shut_down(&self) -> bool {
        self.shared.lock_slot().closed
    }

    /// Number of worker threads still running
    pub fn outstanding_workers(&self) -> usize {
        let mut slot = self.shared.lock_slot();
        slot.reap_workers();
        slot.workers.len()
    }

    pub fn options(&self) -> SupervisorOptions {
        self.shared.options
    }
}

impl Drop for PlaybackSupervisor {
    fn drop(&mut self) {
        if !self.shared.lock_slot().closed {
            self.shutdown();
        }
    }
}

impl Shared {
    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        // Every mutation leaves the slot consistent, so a panicked holder is harmless
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_device(&self) -> MutexGuard<'_, ()> {
        self.device.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the slot state if `request` still owns the slot
    fn set_state_if_latest(&self, request: u64, state: PlaybackState) {
        let mut slot = self.lock_slot();
        if slot.generation == request {
            slot.state = state;
            self.changed.notify_all();
        }
    }

    /// Synthesize-then-play for one request, on its worker thread
    fn run_request(&self, request: u64, text: &str) -> PlaybackOutcome {
        let Backend::Ready { engine, players } = &self.backend else {
            return PlaybackOutcome::Unavailable("no synthesis engine".to_string());
        };

        if !self.lock_slot().retired.is_empty() {
            let _device = self.lock_device();
            if self.drain_retired() {
                self.set_state_if_latest(request, PlaybackState::Synthesizing);
            }
        }

        if !self.lock_slot().is_latest(request) {
            debug!("Request {} superseded before synthesis", request);
            return PlaybackOutcome::Superseded;
        }

        let synthesized = {
            let _serial = if engine.is_concurrent() {
                None
            } else {
                Some(self.synthesis.lock().unwrap_or_else(PoisonError::into_inner))
            };
            engine.synthesize(text)
        };

        let stream = match synthesized {
            Ok(stream) => stream,
            Err(e) => {
                error!("An error occurred while synthesizing speech: {}", e);
                self.set_state_if_latest(request, PlaybackState::Empty);
                return PlaybackOutcome::SynthesisFailed(e.to_string());
            }
        };
        if let Some(length) = stream.wav_duration() {
            debug!("Request {} synthesized {:?} of audio", request, length);
        }

        let mut player = match players.create().and_then(|mut player| {
            player.bind(stream)?;
            Ok(player)
        }) {
            Ok(player) => player,
            Err(e) => {
                error!("Failed to prepare audio player: {}", e);
                self.set_state_if_latest(request, PlaybackState::Empty);
                return PlaybackOutcome::PlayerFailed(e.to_string());
            }
        };

        {
            let _device = self.lock_device();
            if !self.lock_slot().is_latest(request) {
                debug!("Request {} superseded before playback", request);
                return PlaybackOutcome::Superseded;
            }
            self.drain_retired();

            if let Err(e) = player.start() {
                error!("Failed to start audio output: {}", e);
                self.set_state_if_latest(request, PlaybackState::Empty);
                return PlaybackOutcome::PlayerFailed(e.to_string());
            }

            let mut slot = self.lock_slot();
            if !slot.is_latest(request) {
                // Lost the race while starting; we still hold the device
                drop(slot);
                self.drain(PlaybackHandle { request, player });
                return PlaybackOutcome::Superseded;
            }
            slot.current = Some(PlaybackHandle { request, player });
            slot.state = PlaybackState::Playing;
            self.changed.notify_all();
            debug!("Started audio output [request = {}]", request);
        }

        self.watch(request)
    }

    /// Wait until our handle finishes or is taken away
    fn watch(&self, request: u64) -> PlaybackOutcome {
        let mut slot = self.lock_slot();
        loop {
            let finished = match slot.current.as_mut() {
                Some(handle) if handle.request == request => handle.player.is_finished(),
                _ => {
                    debug!("Audio output canceled [request = {}]", request);
                    return PlaybackOutcome::Canceled;
                }
            };

            if finished {
                slot.current = None;
                slot.state = PlaybackState::Empty;
                self.changed.notify_all();
                debug!("Audio output finished [request = {}]", request);
                return PlaybackOutcome::Completed;
            }

            slot = self
                .changed
                .wait_timeout(slot, self.options.poll_interval)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Cancel a player and give the device time to let go of it
    ///
    /// Caller must hold the device lock.
    fn drain(&self, mut handle: PlaybackHandle) {
        cancel_player(handle.player.as_mut(), handle.request);
        if handle.player.wait_stopped(self.options.grace_interval) {
            debug!("Device released [request = {}]", handle.request);
        } else {
            debug!(
                "Grace interval elapsed after canceling request {}",
                handle.request
            );
        }
    }

    /// Drain every retired handle, returning whether there were any
    ///
    /// Caller must hold the device lock.
    fn drain_retired(&self) -> bool {
        let retired = std::mem::take(&mut self.lock_slot().retired);
        let drained = !retired.is_empty();
        for handle in retired {
            self.drain(handle);
        }
        drained
    }

    /// Drain retired handles, then empty the slot if `generation` is current
    fn release(&self, generation: u64) {
        {
            let _device = self.lock_device();
            self.drain_retired();
        }
        let mut slot = self.lock_slot();
        if slot.generation == generation {
            slot.state = PlaybackState::Empty;
            self.changed.notify_all();
        }
    }

    /// Wait for workers up to `generation`, detaching them after the bound
    fn await_workers(&self, generation: u64) {
        let timeout = self.options.shutdown_timeout;
        let deadline = Instant::now() + timeout;
        let mut slot = self.lock_slot();

        loop {
            slot.reap_workers();
            if slot.workers_up_to(generation) == 0 {
                return;
            }

            let now = Instant::now();
            if now >= deadline {
                let abandoned = slot.abandon_workers(generation);
                warn!(
                    "Abandoning {} speech worker(s) still running after {:?}",
                    abandoned, timeout
                );
                return;
            }

            slot = self
                .changed
                .wait_timeout(slot, WORKER_EXIT_POLL.min(deadline - now))
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

/// Cancel a player, treating interruption of a blocking call as success
fn cancel_player(player: &mut dyn AudioPlayer, request: u64) {
    match player.cancel() {
        Ok(()) => {}
        Err(e) if e.is_interruption() => {
            debug!("Device call interrupted by cancellation [request = {}]", request);
        }
        Err(e) => warn!("Failed to cancel audio player: {}", e),
    }
    debug!("Aborted audio output [request = {}]", request);
}

fn report(on_done: Option<OutcomeCallback>, outcome: PlaybackOutcome) {
    if let Some(callback) = on_done {
        callback(outcome);
    }
}

fn take_callback(pending: &Mutex<Option<OutcomeCallback>>) -> Option<OutcomeCallback> {
    pending.lock().unwrap_or_else(PoisonError::into_inner).take()
}

/// Run `job` on a new thread and report its outcome to `on_done`
///
/// If the thread cannot be spawned the callback is handed back unused.
fn spawn_worker<F>(builder: thread::Builder, on_done: Option<OutcomeCallback>, job: F) -> Spawned
where
    F: FnOnce() -> PlaybackOutcome + Send + 'static,
{
    let pending = Arc::new(Mutex::new(on_done));
    let worker_pending = Arc::clone(&pending);
    builder
        .spawn(move || {
            let outcome = job();
            report(take_callback(&worker_pending), outcome);
        })
        .map_err(|e| (e, take_callback(&pending)))
}
