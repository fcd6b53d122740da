//! Synthesis engine backends

// espeak-ng subprocess backend
pub mod espeak;
