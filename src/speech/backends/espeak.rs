//! espeak-ng synthesis backend
//!
//! Renders text to a WAV stream by running `espeak-ng --stdout`, one
//! process per request. Each call is independent, so concurrent synthesis
//! is safe.
//!
//! Dependencies:
//! - espeak-ng (install with: sudo apt install espeak-ng)

use crate::platform::find_executable;
use crate::speech::{AudioStream, SynthesisEngine};
use crate::{Result, SaydError};
use log::debug;
use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;

/// espeak-ng backend
pub struct EspeakEngine {
    /// Path to espeak-ng (or espeak)
    espeak_path: String,

    /// Voice name passed to -v
    voice: String,

    /// Rate (0-100)
    rate: u8,
}

impl EspeakEngine {
    /// Locate espeak-ng and create an engine with the default voice
    pub fn new() -> Result<Self> {
        debug!("Creating espeak-ng backend");

        let espeak_path = find_executable(
            &["espeak-ng", "/usr/bin/espeak-ng", "espeak"],
            &["--version"],
        )
        .ok_or_else(|| {
            SaydError::Configuration(
                "espeak-ng not found. Install with: sudo apt install espeak-ng".to_string(),
            )
        })?;
        debug!("Found espeak-ng at: {}", espeak_path);

        Ok(Self {
            espeak_path,
            voice: "en".to_string(),
            rate: 50,
        })
    }

    /// Set speech rate (0-100, where 50 is normal)
    pub fn set_rate(&mut self, rate: u8) {
        self.rate = rate.min(100);
    }

    /// Convert rate (0-100) to espeak speed (80-450 wpm)
    fn rate_to_espeak_speed(rate: u8) -> u16 {
        80 + ((rate.min(100) as u16) * 370 / 100)
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new(&self.espeak_path);
        cmd.arg("-v").arg(&self.voice);
        cmd.arg("-s").arg(Self::rate_to_espeak_speed(self.rate).to_string());
        cmd
    }
}

impl SynthesisEngine for EspeakEngine {
    fn name(&self) -> &str {
        "espeak-ng"
    }

    fn configure(&mut self, voice: &str) -> Result<()> {
        debug!("Validating espeak-ng voice '{}'", voice);

        // A quiet run over empty input fails if the voice can't be loaded
        let output = Command::new(&self.espeak_path)
            .arg("-q")
            .arg("-v")
            .arg(voice)
            .arg("--stdin")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| SaydError::Configuration(format!("Failed to run espeak-ng: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SaydError::Configuration(format!(
                "espeak-ng rejected voice '{}': {}",
                voice,
                stderr.trim()
            )));
        }

        self.voice = voice.to_string();
        Ok(())
    }

    fn voice(&self) -> &str {
        &self.voice
    }

    fn synthesize(&self, text: &str) -> Result<AudioStream> {
        debug!("Synthesizing {} chars", text.len());

        let mut child = self
            .base_command()
            .arg("--stdout")
            .arg("--stdin")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SaydError::Synthesis(format!("Failed to start espeak-ng: {}", e)))?;

        // Feed stdin from a separate thread so a full stdout pipe can't deadlock us
        let feeder = child.stdin.take().map(|mut stdin| {
            let text = text.to_string();
            thread::spawn(move || stdin.write_all(text.as_bytes()))
        });

        let output = child
            .wait_with_output()
            .map_err(|e| SaydError::Synthesis(format!("espeak-ng failed: {}", e)))?;

        if let Some(Ok(Err(e))) = feeder.map(|handle| handle.join()) {
            debug!("Writing text to espeak-ng failed: {}", e);
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("espeak-ng exited with {}: {}", output.status, stderr.trim());
            return Err(SaydError::Synthesis(format!(
                "espeak-ng exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        if output.stdout.is_empty() {
            return Err(SaydError::Synthesis("espeak-ng produced no audio".to_string()));
        }

        Ok(AudioStream::new(output.stdout))
    }

    fn is_concurrent(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_conversion() {
        assert_eq!(EspeakEngine::rate_to_espeak_speed(0), 80);
        assert_eq!(EspeakEngine::rate_to_espeak_speed(50), 265);
        assert_eq!(EspeakEngine::rate_to_espeak_speed(100), 450);
        assert_eq!(EspeakEngine::rate_to_espeak_speed(200), 450);
    }

    #[test]
    fn test_synthesize_when_available() {
        match EspeakEngine::new() {
            Ok(engine) => {
                let stream = engine.synthesize("Hello world!").expect("synthesis failed");
                assert!(stream.wav_duration().is_some());
            }
            Err(e) => println!("⚠ espeak-ng not available: {}", e),
        }
    }

    #[test]
    fn test_bad_voice_is_rejected() {
        if let Ok(mut engine) = EspeakEngine::new() {
            let result = engine.configure("no-such-voice-xyz");
            assert!(matches!(result, Err(SaydError::Configuration(_))));
            assert_eq!(engine.voice(), "en");
        }
    }
}
