//! Platform detection utilities

use crate::{Result, SaydError};
use log::{debug, info, warn};
use std::fs;
use std::process::{Command, Stdio};

/// WSLg exposes its PulseAudio server here
const WSLG_PULSE_PATH: &str = "/mnt/wslg/PulseServer";

/// Detect if running in WSL (Windows Subsystem for Linux)
///
/// Checks for WSL-specific indicators in /proc/version and environment variables.
pub fn is_wsl() -> bool {
    if let Ok(contents) = fs::read_to_string("/proc/version") {
        let lower = contents.to_lowercase();
        if lower.contains("microsoft") || lower.contains("wsl") {
            return true;
        }
    }

    std::env::var("WSL_DISTRO_NAME").is_ok()
}

/// Point PulseAudio clients at the WSLg server when needed
///
/// Player subprocesses inherit `PULSE_SERVER` from us.
pub fn setup_pulseaudio() -> Result<()> {
    if std::env::var("PULSE_SERVER").is_ok() {
        debug!("PULSE_SERVER already set via environment");
        return Ok(());
    }

    if std::path::Path::new(WSLG_PULSE_PATH).exists() {
        info!("Auto-detected WSLG PulseAudio server at {}", WSLG_PULSE_PATH);
        std::env::set_var("PULSE_SERVER", WSLG_PULSE_PATH);
        return Ok(());
    }

    if is_wsl() {
        warn!("WSLG PulseAudio server not found at {}", WSLG_PULSE_PATH);
        warn!("Make sure WSLg is installed, or set PULSE_SERVER");
        return Err(SaydError::Player(
            "PulseAudio server not found. Install WSLg or set PULSE_SERVER environment variable."
                .to_string(),
        ));
    }

    debug!("Native Linux - PulseAudio will use default configuration");
    Ok(())
}

/// Check whether `program` can be executed with the given probe arguments
pub fn probe_executable(program: &str, probe_args: &[&str]) -> bool {
    Command::new(program)
        .args(probe_args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Return the first candidate that answers the probe
pub fn find_executable(candidates: &[&str], probe_args: &[&str]) -> Option<String> {
    candidates
        .iter()
        .find(|candidate| probe_executable(candidate, probe_args))
        .map(|candidate| candidate.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_wsl() {
        // Result depends on the host, only check it doesn't panic
        let _ = is_wsl();
    }

    #[test]
    fn test_missing_executable() {
        assert!(!probe_executable("sayd-no-such-binary", &["--version"]));
        assert_eq!(
            find_executable(&["sayd-no-such-binary", "sayd-also-missing"], &[]),
            None
        );
    }
}
