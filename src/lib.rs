//! sayd - speech output supervisor
//!
//! Synthesizes text to audio and plays it back, keeping at most one
//! utterance on the output device. A new request preempts the one in flight.

pub mod audio;
pub mod config;
pub mod error;
pub mod platform;
pub mod plugin;
pub mod speech;
pub mod supervisor;

pub use error::{Result, SaydError};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "sayd";
