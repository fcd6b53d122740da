//! Configuration loading tests
//!
//! Tests that settings load from an INI file and fall back to defaults

use sayd::config::Config;
use sayd::supervisor::SupervisorOptions;
use sayd::SaydError;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(contents.as_bytes())
        .expect("Failed to write config");
    file
}

#[test]
fn test_load_custom_values() {
    let file = write_config(
        "[speech]\n\
         voice = en-gb\n\
         rate = 70\n\
         [playback]\n\
         player = aplay -q\n\
         grace_interval_ms = 250\n\
         shutdown_timeout_ms = 500\n",
    );

    let config = Config::load_from(file.path()).expect("Failed to load config");
    assert_eq!(config.voice(), "en-gb");
    assert_eq!(config.rate(), 70);
    assert_eq!(config.player(), "aplay -q");

    // Missing keys use defaults
    assert_eq!(config.engine(), "espeak-ng");
    assert_eq!(config.poll_interval(), Duration::from_millis(50));

    let options = SupervisorOptions::from_config(&config);
    assert_eq!(options.grace_interval, Duration::from_millis(250));
    assert_eq!(options.shutdown_timeout, Duration::from_millis(500));
}

#[test]
fn test_save_and_reload() {
    let file = write_config("[speech]\nvoice = en-us\n");

    let mut config = Config::load_from(file.path()).unwrap();
    config.set("speech", "voice", "de");
    config.set("playback", "grace_interval_ms", "40");
    config.save().unwrap();

    let reloaded = Config::load_from(file.path()).unwrap();
    assert_eq!(reloaded.voice(), "de");
    assert_eq!(reloaded.grace_interval(), Duration::from_millis(40));
    assert_eq!(reloaded.path(), Some(file.path()));
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = Config::load_from(&dir.path().join("absent.cfg"));
    assert!(matches!(result, Err(SaydError::IniParse(_))));
}

#[test]
fn test_default_options_match_default_config() {
    let options = SupervisorOptions::from_config(&Config::default());
    assert_eq!(options, SupervisorOptions::default());
    assert_eq!(options.grace_interval, Duration::from_millis(100));
}
