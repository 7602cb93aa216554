mod clock;
mod effects_chain;
mod pattern;
mod sound_bank;

pub use clock::{StepClock, Tick};
pub use effects_chain::{distortion_curve, EffectsChain, CURVE_POINTS};
pub use pattern::{Grid, PatternStore};
pub use sound_bank::{waveform_for, LoadFailure, LoadReport, SoundBank, SynthParams, TrackSource};
