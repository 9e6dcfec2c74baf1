//! Exclusive audio playback

mod controller;
mod player;

pub use controller::{PlaybackController, PlaybackSource, PlaybackState};
pub use player::{AudioOutput, CommandPlayer, PlaybackError};
