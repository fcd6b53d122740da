//! In-memory engine and player used by the integration tests
//!
//! Both record into a shared [`Recorder`] so tests can assert on the
//! order in which audio started and stopped.

#![allow(dead_code)]

use sayd::audio::{AudioPlayer, PlayerFactory};
use sayd::speech::{AudioStream, SynthesisEngine};
use sayd::supervisor::{PlaybackSupervisor, SupervisorOptions};
use sayd::{Result, SaydError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Synthesized(String),
    Started(String),
    Canceled(String),
    Finished(String),
}

#[derive(Default)]
struct Counter {
    current: usize,
    max: usize,
}

impl Counter {
    fn enter(&mut self) {
        self.current += 1;
        self.max = self.max.max(self.current);
    }

    fn leave(&mut self) {
        self.current = self.current.saturating_sub(1);
    }
}

/// Shared, ordered and timestamped log of everything the fakes did
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<(Event, Instant)>>>,
    playing: Arc<Mutex<Counter>>,
    synthesizing: Arc<Mutex<Counter>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push((event, Instant::now()));
    }

    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(event, _)| event.clone())
            .collect()
    }

    /// When `event` was first recorded
    pub fn at(&self, event: &Event) -> Option<Instant> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .find(|(e, _)| e == event)
            .map(|(_, at)| *at)
    }

    pub fn position(&self, event: &Event) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }

    pub fn has(&self, event: &Event) -> bool {
        self.position(event).is_some()
    }

    /// Texts whose playback started, in order
    pub fn started(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Started(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Most players ever on the device at once
    pub fn max_playing(&self) -> usize {
        self.playing.lock().unwrap().max
    }

    pub fn now_playing(&self) -> usize {
        self.playing.lock().unwrap().current
    }

    /// Most synthesis calls ever in flight at once
    pub fn max_synthesizing(&self) -> usize {
        self.synthesizing.lock().unwrap().max
    }
}

/// Engine that "renders" text by echoing its bytes after a delay
pub struct FakeEngine {
    recorder: Recorder,
    delay: Duration,
    fail_on: Option<String>,
    concurrent: bool,
    voice: String,
}

impl FakeEngine {
    pub fn new(recorder: &Recorder) -> Self {
        Self {
            recorder: recorder.clone(),
            delay: Duration::from_millis(5),
            fail_on: None,
            concurrent: true,
            voice: "fake".to_string(),
        }
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn fail_on(mut self, text: &str) -> Self {
        self.fail_on = Some(text.to_string());
        self
    }

    pub fn serial(mut self) -> Self {
        self.concurrent = false;
        self
    }
}

impl SynthesisEngine for FakeEngine {
    fn name(&self) -> &str {
        "fake"
    }

    fn configure(&mut self, voice: &str) -> Result<()> {
        if voice.is_empty() {
            return Err(SaydError::Configuration("empty voice".to_string()));
        }
        self.voice = voice.to_string();
        Ok(())
    }

    fn voice(&self) -> &str {
        &self.voice
    }

    fn synthesize(&self, text: &str) -> Result<AudioStream> {
        self.recorder.synthesizing.lock().unwrap().enter();
        thread::sleep(self.delay);
        self.recorder.synthesizing.lock().unwrap().leave();

        if self.fail_on.as_deref() == Some(text) {
            return Err(SaydError::Synthesis(format!("cannot say '{}'", text)));
        }
        self.recorder.push(Event::Synthesized(text.to_string()));
        Ok(AudioStream::new(text.as_bytes().to_vec()))
    }

    fn is_concurrent(&self) -> bool {
        self.concurrent
    }
}

/// Player that "plays" for a fixed time after start
pub struct FakePlayer {
    recorder: Recorder,
    play_time: Duration,
    text: String,
    started_at: Option<Instant>,
    done: bool,
}

impl FakePlayer {
    fn stop_playing(&mut self, event: Event) {
        self.done = true;
        self.recorder.playing.lock().unwrap().leave();
        self.recorder.push(event);
    }
}

impl AudioPlayer for FakePlayer {
    fn bind(&mut self, stream: AudioStream) -> Result<()> {
        self.text = String::from_utf8_lossy(stream.as_bytes()).into_owned();
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.recorder.playing.lock().unwrap().enter();
        self.recorder.push(Event::Started(self.text.clone()));
        self.started_at = Some(Instant::now());
        Ok(())
    }

    fn cancel(&mut self) -> Result<()> {
        if self.started_at.is_some() && !self.done {
            self.stop_playing(Event::Canceled(self.text.clone()));
            // Like a device call cut short mid-stream
            return Err(SaydError::Interrupted);
        }
        Ok(())
    }

    fn is_finished(&mut self) -> bool {
        match self.started_at {
            None => true,
            Some(_) if self.done => true,
            Some(at) if at.elapsed() >= self.play_time => {
                self.stop_playing(Event::Finished(self.text.clone()));
                true
            }
            Some(_) => false,
        }
    }
}

pub fn players(recorder: &Recorder, play_time: Duration) -> Box<dyn PlayerFactory> {
    let recorder = recorder.clone();
    Box::new(move || -> Result<Box<dyn AudioPlayer>> {
        let player = FakePlayer {
            recorder: recorder.clone(),
            play_time,
            text: String::new(),
            started_at: None,
            done: false,
        };
        Ok(Box::new(player) as Box<dyn AudioPlayer>)
    })
}

pub fn fast_options() -> SupervisorOptions {
    SupervisorOptions {
        grace_interval: Duration::from_millis(20),
        shutdown_timeout: Duration::from_secs(2),
        poll_interval: Duration::from_millis(5),
    }
}

pub fn supervisor(
    engine: FakeEngine,
    recorder: &Recorder,
    play_time: Duration,
) -> PlaybackSupervisor {
    supervisor_with(engine, recorder, play_time, fast_options())
}

pub fn supervisor_with(
    engine: FakeEngine,
    recorder: &Recorder,
    play_time: Duration,
    options: SupervisorOptions,
) -> PlaybackSupervisor {
    PlaybackSupervisor::new(
        Ok(Box::new(engine) as Box<dyn SynthesisEngine>),
        players(recorder, play_time),
        options,
    )
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}
