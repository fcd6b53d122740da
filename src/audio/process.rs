//! Subprocess audio player
//!
//! Plays a WAV stream through a system player (`paplay`, `aplay`, or a
//! configured command) reading from stdin. Canceling kills the process,
//! which releases the device as soon as the process is reaped.

use crate::audio::{AudioPlayer, PlayerFactory};
use crate::config::Config;
use crate::platform::{find_executable, setup_pulseaudio};
use crate::speech::AudioStream;
use crate::{Result, SaydError};
use log::{debug, warn};
use once_cell::sync::OnceCell;
use std::io::{self, Write};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How often `wait_stopped` checks whether the process exited
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Players probed for by [`PlayerCommand::detect`], in order of preference
const CANDIDATES: &[&str] = &["paplay", "aplay"];

/// Probed once per process
static DETECTED: OnceCell<Option<PlayerCommand>> = OnceCell::new();

/// Command line of a player that reads WAV from stdin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerCommand {
    program: String,
    args: Vec<String>,
}

impl PlayerCommand {
    /// Parse a whitespace-separated command line such as `aplay -q`
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }

    /// Find a player installed on this system
    pub fn detect() -> Option<Self> {
        DETECTED
            .get_or_init(|| {
                let found = find_executable(CANDIDATES, &["--version"]);
                match &found {
                    Some(program) => debug!("Detected audio player: {}", program),
                    None => warn!("No audio player found (tried {:?})", CANDIDATES),
                }
                found.map(|program| Self::for_program(&program))
            })
            .clone()
    }

    fn for_program(program: &str) -> Self {
        let args = match program {
            "aplay" => vec!["-q".to_string()],
            _ => Vec::new(),
        };
        Self {
            program: program.to_string(),
            args,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

/// Audio player backed by a child process
pub struct ProcessPlayer {
    command: PlayerCommand,

    /// Stream waiting to be started
    stream: Option<AudioStream>,

    /// Running (or exited but not yet dropped) player process
    child: Option<Child>,

    /// Thread copying the stream into the child's stdin
    feeder: Option<JoinHandle<io::Result<()>>>,
}

impl ProcessPlayer {
    pub fn new(command: PlayerCommand) -> Self {
        Self {
            command,
            stream: None,
            child: None,
            feeder: None,
        }
    }

    /// Collect the feeder thread, ignoring broken pipes from cancellation
    fn join_feeder(&mut self) {
        let Some(feeder) = self.feeder.take() else {
            return;
        };
        match feeder.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let e = SaydError::Io(e);
                if e.is_interruption() {
                    debug!("Audio feed interrupted by cancellation");
                } else {
                    warn!("Feeding audio to {} failed: {}", self.command.program, e);
                }
            }
            Err(_) => warn!("Audio feeder thread panicked"),
        }
    }
}

impl AudioPlayer for ProcessPlayer {
    fn bind(&mut self, stream: AudioStream) -> Result<()> {
        if self.child.is_some() {
            return Err(SaydError::Player("Player already started".to_string()));
        }
        self.stream = Some(stream);
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        let stream = self
            .stream
            .take()
            .ok_or_else(|| SaydError::Player("No audio bound to player".to_string()))?;

        let mut child = Command::new(&self.command.program)
            .args(&self.command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                SaydError::Player(format!("Failed to start {}: {}", self.command.program, e))
            })?;

        // Writes block while the device drains, so feed from a helper thread
        if let Some(mut stdin) = child.stdin.take() {
            let bytes = stream.into_bytes();
            self.feeder = Some(thread::spawn(move || stdin.write_all(&bytes)));
        }

        debug!(
            "{} process started [pid = {}]",
            self.command.program,
            child.id()
        );
        self.child = Some(child);
        Ok(())
    }

    fn cancel(&mut self) -> Result<()> {
        self.stream = None;
        if let Some(mut child) = self.child.take() {
            debug!("Killing {} process", self.command.program);
            match child.kill() {
                Ok(_) => {
                    let _ = child.wait(); // Clean up zombie
                }
                Err(e) => {
                    debug!("Failed to kill {} process: {}", self.command.program, e);
                }
            }
        }
        self.join_feeder();
        Ok(())
    }

    fn is_finished(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return true;
        };
        match child.try_wait() {
            Ok(Some(status)) => {
                debug!("{} exited with {}", self.command.program, status);
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!("Failed to poll {}: {}", self.command.program, e);
                true
            }
        }
    }

    fn wait_stopped(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_finished() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep(EXIT_POLL_INTERVAL.min(deadline - now));
        }
    }
}

impl Drop for ProcessPlayer {
    fn drop(&mut self) {
        let _ = self.cancel();
    }
}

/// Creates [`ProcessPlayer`]s for the supervisor
pub struct ProcessPlayerFactory {
    command: PlayerCommand,
}

impl ProcessPlayerFactory {
    pub fn new(command: PlayerCommand) -> Self {
        Self { command }
    }

    /// Use the configured player, or probe for one when set to "auto"
    pub fn from_config(config: &Config) -> Result<Self> {
        if let Err(e) = setup_pulseaudio() {
            warn!("PulseAudio setup failed: {}", e);
        }

        let setting = config.player();
        let command = if setting.trim() == "auto" {
            PlayerCommand::detect().ok_or_else(|| {
                SaydError::Player(
                    "No audio player found. Install pulseaudio-utils or alsa-utils".to_string(),
                )
            })?
        } else {
            PlayerCommand::parse(&setting)
                .ok_or_else(|| SaydError::Player("Empty player command".to_string()))?
        };

        debug!("Using audio player: {:?}", command);
        Ok(Self::new(command))
    }

    pub fn command(&self) -> &PlayerCommand {
        &self.command
    }
}

impl PlayerFactory for ProcessPlayerFactory {
    fn create(&self) -> Result<Box<dyn AudioPlayer>> {
        Ok(Box::new(ProcessPlayer::new(self.command.clone())))
    }
}
