//! Speech synthesis

pub mod backends;
pub mod engine;

pub use engine::{create_engine, AudioStream, SynthesisEngine};
