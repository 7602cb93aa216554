pub mod analysis;
pub mod audio;
pub mod audio_api;
pub mod loader;
pub mod middle;
pub mod pipeline;
pub mod sequencer;
pub mod shared;
pub mod tui;
