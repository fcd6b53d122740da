//! Configuration management

use crate::{Result, SaydError};
use ini::Ini;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default pause between canceling a player and reusing the device
pub const DEFAULT_GRACE_INTERVAL_MS: u64 = 100;
/// Default bound on how long stop/shutdown waits for speech workers
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 2000;
/// Default interval at which a worker checks its player for completion
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Persistent settings for the speech supervisor
///
/// Backed by an INI file (~/.sayd.cfg) with a `[speech]` section for the
/// synthesis engine and a `[playback]` section for the output side.
pub struct Config {
    /// INI configuration storage
    ini: Ini,

    /// Config file path, if loaded from disk
    path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from ~/.sayd.cfg, creating it with defaults if missing
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        debug!("Loading config from {:?}", path);

        if !path.exists() {
            info!("Config file not found, creating default");
            let default = Self::default_ini();
            default
                .write_to_file(&path)
                .map_err(|e| SaydError::IniParse(format!("Failed to write config: {}", e)))?;
        }

        Self::load_from(&path)
    }

    /// Load configuration from an explicit path
    ///
    /// Missing keys fall back to their defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let ini = Ini::load_from_file(path)
            .map_err(|e| SaydError::IniParse(format!("Failed to load config: {}", e)))?;

        Ok(Self {
            ini,
            path: Some(path.to_path_buf()),
        })
    }

    /// Save configuration back to the file it was loaded from
    pub fn save(&self) -> Result<()> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| SaydError::Configuration("Config has no backing file".to_string()))?;
        debug!("Saving config to {:?}", path);
        self.ini
            .write_to_file(path)
            .map_err(|e| SaydError::IniParse(format!("Failed to save config: {}", e)))
    }

    fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| SaydError::Configuration("Could not find home directory".to_string()))?;
        Ok(home.join(".sayd.cfg"))
    }

    /// Config file path, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn default_ini() -> Ini {
        let mut ini = Ini::new();

        ini.with_section(Some("speech"))
            .set("engine", "espeak-ng")
            .set("voice", "en-us")
            .set("rate", "50");

        ini.with_section(Some("playback"))
            .set("player", "auto")
            .set("grace_interval_ms", DEFAULT_GRACE_INTERVAL_MS.to_string())
            .set("shutdown_timeout_ms", DEFAULT_SHUTDOWN_TIMEOUT_MS.to_string())
            .set("poll_interval_ms", DEFAULT_POLL_INTERVAL_MS.to_string());

        ini
    }

    /// Get a boolean value from config
    pub fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.ini
            .get_from(Some(section), key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Get a string value from config
    pub fn get_string(&self, section: &str, key: &str, default: &str) -> String {
        self.ini
            .get_from(Some(section), key)
            .unwrap_or(default)
            .to_string()
    }

    /// Get an integer value from config
    pub fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.ini
            .get_from(Some(section), key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Set a value in config
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        self.ini.with_section(Some(section)).set(key, value);
    }

    fn get_millis(&self, key: &str, default: u64) -> Duration {
        let value = self.get_int("playback", key, default as i64);
        match u64::try_from(value) {
            Ok(ms) => Duration::from_millis(ms),
            Err(_) => {
                warn!("Ignoring negative {} = {}, using {}ms", key, value, default);
                Duration::from_millis(default)
            }
        }
    }

    // ========== [speech] ==========

    /// Name of the synthesis engine to use
    pub fn engine(&self) -> String {
        self.get_string("speech", "engine", "espeak-ng")
    }

    /// Voice passed to the engine at construction time
    pub fn voice(&self) -> String {
        self.get_string("speech", "voice", "en-us")
    }

    /// Speech rate (0-100, 50 is normal)
    pub fn rate(&self) -> u8 {
        self.get_int("speech", "rate", 50)
            .try_into()
            .ok()
            .filter(|&r: &u8| r <= 100)
            .unwrap_or(50)
    }

    // ========== [playback] ==========

    /// Audio player command line, or "auto" to probe the system
    pub fn player(&self) -> String {
        self.get_string("playback", "player", "auto")
    }

    /// Pause after canceling a player before the next one may start
    pub fn grace_interval(&self) -> Duration {
        self.get_millis("grace_interval_ms", DEFAULT_GRACE_INTERVAL_MS)
    }

    /// Upper bound on waiting for speech workers during stop/shutdown
    pub fn shutdown_timeout(&self) -> Duration {
        self.get_millis("shutdown_timeout_ms", DEFAULT_SHUTDOWN_TIMEOUT_MS)
    }

    /// How often a worker checks whether its playback finished
    pub fn poll_interval(&self) -> Duration {
        self.get_millis("poll_interval_ms", DEFAULT_POLL_INTERVAL_MS)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ini: Self::default_ini(),
            path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.engine(), "espeak-ng");
        assert_eq!(config.voice(), "en-us");
        assert_eq!(config.rate(), 50);
        assert_eq!(config.player(), "auto");
        assert_eq!(config.grace_interval(), Duration::from_millis(100));
        assert_eq!(config.shutdown_timeout(), Duration::from_millis(2000));
        assert!(config.path().is_none());
    }

    #[test]
    fn test_out_of_range_values_fall_back() {
        let mut config = Config::default();
        config.set("speech", "rate", "250");
        config.set("playback", "grace_interval_ms", "-5");
        config.set("playback", "poll_interval_ms", "soon");

        assert_eq!(config.rate(), 50);
        assert_eq!(config.grace_interval(), Duration::from_millis(100));
        assert_eq!(config.poll_interval(), Duration::from_millis(50));
    }

    #[test]
    fn test_save_without_file_fails() {
        let config = Config::default();
        assert!(matches!(config.save(), Err(SaydError::Configuration(_))));
    }
}
