use std::sync::Arc;

pub use crate::audio::{PreparedKernel, SampleBuffer, SampleId, Waveform};
use crate::pipeline::effects::{EffectKind, FilterType, Oversample};

/// What a track plays when its step fires.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TriggerSource {
    Sample(SampleId),
    Synth {
        waveform: Waveform,
        frequency_hz: f32,
        decay_seconds: f32,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TriggerParams {
    pub track: usize,
    pub source: TriggerSource,
    // frames into the next rendered block before the voice starts, keeps
    // ticks that were due in the same advance one interval apart
    pub offset_frames: u32,
}

#[derive(Clone, Debug)]
pub enum AudioCommand {
    // The engine can't load files (it would stall the callback), so a buffer is
    // decoded on a loader thread, registered once, then triggered by id
    RegisterSample { id: SampleId, buffer: Arc<SampleBuffer> },
    // The track moved on to another buffer. Voices already playing it finish.
    UnregisterSample(SampleId),

    Trigger(TriggerParams),

    // Which live nodes the master bus runs through, in order. Only the
    // enabled effects are listed.
    SetRoute(Vec<EffectKind>),

    // Live parameter updates. These reach the node whether or not it is
    // routed, so a disabled effect comes back exactly as it was left.
    SetFilter { filter_type: FilterType, frequency_hz: f32, q: f32 },
    SetReverbWet(f32),
    SetImpulse(PreparedKernel),
    SetDelay { time_seconds: f32, feedback: f32, mix: f32 },
    SetDistortionOversample(Oversample),
    SetCurve(Arc<Vec<f32>>),
}
