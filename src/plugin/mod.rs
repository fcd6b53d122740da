//! Host plugin binding
//!
//! Maps the host's plugin lifecycle (start, stop, say text, interrupt,
//! continue) onto a [`PlaybackSupervisor`]. Nothing here returns an error
//! to the host: every failure is logged and the call becomes a no-op.

pub mod host;

pub use host::{serve, HostCommand};

use crate::config::Config;
use crate::supervisor::PlaybackSupervisor;
use crate::SaydError;
use log::{error, info, warn};

/// Lifecycle calls a host makes on a text-to-speech plugin
pub trait TtsPlugin {
    /// Create the speech backend; restarts it if already running
    fn start(&mut self);

    /// Silence output and release the speech backend
    fn stop(&mut self);

    /// Speak `text`, cutting off anything still playing
    fn say_text(&mut self, text: &str);

    /// Cancel current output; it cannot be resumed
    fn interrupt_execution(&mut self);

    /// Resume paused output (unsupported, logs and does nothing)
    fn continue_execution(&mut self);
}

/// Builds the supervisor when the host starts the plugin
pub type Launcher = Box<dyn Fn() -> PlaybackSupervisor>;

/// Speech plugin backed by a [`PlaybackSupervisor`]
pub struct SpeechPlugin {
    supervisor: Option<PlaybackSupervisor>,
    launcher: Launcher,
}

impl SpeechPlugin {
    /// Plugin that builds its engine and player from `config` on start
    pub fn new(config: Config) -> Self {
        Self::with_launcher(move || PlaybackSupervisor::from_config(&config))
    }

    /// Plugin with a custom supervisor constructor
    pub fn with_launcher<F>(launcher: F) -> Self
    where
        F: Fn() -> PlaybackSupervisor + 'static,
    {
        Self {
            supervisor: None,
            launcher: Box::new(launcher),
        }
    }

    /// Whether `start` has been called (and `stop` hasn't since)
    pub fn is_started(&self) -> bool {
        self.supervisor.is_some()
    }

    pub fn supervisor(&self) -> Option<&PlaybackSupervisor> {
        self.supervisor.as_ref()
    }

    fn started(&self) -> Option<&PlaybackSupervisor> {
        if self.supervisor.is_none() {
            error!("{}", SaydError::NotStarted);
        }
        self.supervisor.as_ref()
    }
}

impl TtsPlugin for SpeechPlugin {
    fn start(&mut self) {
        if let Some(previous) = self.supervisor.take() {
            info!("Speech plugin already running, restarting.");
            previous.shutdown();
        }
        self.supervisor = Some((self.launcher)());
        info!("Speech plugin started.");
    }

    fn stop(&mut self) {
        let Some(supervisor) = self.supervisor.take() else {
            error!("{}", SaydError::NotStarted);
            return;
        };
        supervisor.shutdown();
        info!("Speech plugin stopped.");
    }

    fn say_text(&mut self, text: &str) {
        if let Some(supervisor) = self.started() {
            supervisor.speak(text);
        }
    }

    fn interrupt_execution(&mut self) {
        let Some(supervisor) = self.started() else {
            return;
        };
        info!("Speech plugin interrupt triggered.");
        match supervisor.interrupt() {
            Ok(()) => {}
            Err(SaydError::NoActivePlayback) => warn!("Nothing to interrupt: no active playback"),
            Err(e) => error!("Interrupt failed: {}", e),
        }
    }

    fn continue_execution(&mut self) {
        let Some(supervisor) = self.started() else {
            return;
        };
        info!("Speech plugin resume triggered.");
        if let Err(e) = supervisor.resume() {
            info!("{}", e);
        }
    }
}

impl Drop for SpeechPlugin {
    fn drop(&mut self) {
        if let Some(supervisor) = self.supervisor.take() {
            supervisor.shutdown();
        }
    }
}
