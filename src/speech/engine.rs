//! Speech synthesis engine abstraction
//!
//! The supervisor treats an engine as an opaque `text -> audio stream`
//! function that may fail per request.

use crate::config::Config;
use crate::{Result, SaydError};
use log::{debug, info};
use std::time::Duration;

/// Size of the canonical RIFF/WAVE header
const WAV_HEADER_LEN: usize = 44;

/// Synthesized audio, ready to be bound to a player
///
/// Holds a complete WAV file. Streams are transient: produced by one
/// synthesis call and consumed by one player.
#[derive(Clone, Default)]
pub struct AudioStream {
    data: Vec<u8>,
}

impl AudioStream {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Estimated play time, if the stream carries a WAV header
    ///
    /// Streaming encoders often leave the data chunk size unset, so this
    /// uses the byte rate and the actual payload length.
    pub fn wav_duration(&self) -> Option<Duration> {
        if self.data.len() < WAV_HEADER_LEN
            || &self.data[0..4] != b"RIFF"
            || &self.data[8..12] != b"WAVE"
        {
            return None;
        }

        let byte_rate = u32::from_le_bytes([
            self.data[28],
            self.data[29],
            self.data[30],
            self.data[31],
        ]);
        if byte_rate == 0 {
            return None;
        }

        let payload = (self.data.len() - WAV_HEADER_LEN) as f64;
        Some(Duration::from_secs_f64(payload / byte_rate as f64))
    }
}

impl std::fmt::Debug for AudioStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioStream")
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Text-to-speech engine
///
/// Implementations are shared across speech workers. Unless
/// [`SynthesisEngine::is_concurrent`] returns true, the supervisor
/// serializes calls to [`SynthesisEngine::synthesize`].
pub trait SynthesisEngine: Send + Sync {
    /// Short engine name for logs
    fn name(&self) -> &str;

    /// Select the voice; fails with [`SaydError::Configuration`]
    fn configure(&mut self, voice: &str) -> Result<()>;

    /// Currently selected voice
    fn voice(&self) -> &str;

    /// Render `text` to audio; fails with [`SaydError::Synthesis`]
    fn synthesize(&self, text: &str) -> Result<AudioStream>;

    /// Whether concurrent `synthesize` calls are safe
    fn is_concurrent(&self) -> bool {
        false
    }
}

/// Create and configure the engine named in the config
///
/// Any failure here is a [`SaydError::Configuration`]; the caller decides
/// whether to run degraded.
pub fn create_engine(config: &Config) -> Result<Box<dyn SynthesisEngine>> {
    let name = config.engine();
    debug!("Creating synthesis engine '{}'", name);

    let mut engine: Box<dyn SynthesisEngine> = match name.as_str() {
        "espeak-ng" | "espeak" => {
            use super::backends::espeak::EspeakEngine;
            let mut espeak = EspeakEngine::new().map_err(into_configuration)?;
            espeak.set_rate(config.rate());
            Box::new(espeak)
        }
        other => {
            return Err(SaydError::Configuration(format!(
                "Unknown synthesis engine '{}'",
                other
            )))
        }
    };

    engine.configure(&config.voice()).map_err(into_configuration)?;
    info!(
        "Synthesis engine '{}' ready [voice = {}]",
        engine.name(),
        engine.voice()
    );
    Ok(engine)
}

fn into_configuration(e: SaydError) -> SaydError {
    match e {
        SaydError::Configuration(_) => e,
        other => SaydError::Configuration(other.to_string()),
    }
}
