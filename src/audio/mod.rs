//! Audio output

pub mod player;
pub mod process;

pub use player::{AudioPlayer, PlayerFactory};
pub use process::{PlayerCommand, ProcessPlayer, ProcessPlayerFactory};
