//! Control side of the master effects chain.
//!
//! Holds the [`EffectsState`], decides the route through the live nodes and
//! builds the heavy resources (reverb impulse, distortion curve) off the audio
//! thread. Every operation returns the commands that bring the render engine
//! in line with the new state.

use std::f32::consts::PI;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::audio::{ConvolutionKernel, ImpulseResponse, PreparedKernel};
use crate::audio_api::AudioCommand;
use crate::pipeline::effects::{EffectKind, EffectPatch, EffectsState};

pub const CURVE_POINTS: usize = 44_100;

pub struct EffectsChain {
    state: EffectsState,
    sample_rate: u32,
    rng: StdRng,
    impulse_len: usize,
    kernel: Option<Arc<ConvolutionKernel>>,
    curve: Arc<Vec<f32>>,
}

impl EffectsChain {
    pub fn new(sample_rate: u32) -> Self {
        Self::with_rng(sample_rate, StdRng::from_entropy())
    }

    pub fn with_rng(sample_rate: u32, rng: StdRng) -> Self {
        Self {
            state: EffectsState::default(),
            sample_rate,
            rng,
            impulse_len: 0,
            kernel: None,
            curve: Arc::new(Vec::new()),
        }
    }

    pub fn state(&self) -> &EffectsState {
        &self.state
    }

    pub fn impulse_len(&self) -> usize {
        self.impulse_len
    }

    pub fn curve(&self) -> &Arc<Vec<f32>> {
        &self.curve
    }

    /// Build the resources and push the whole state, used once at startup and
    /// for every fresh render engine.
    pub fn init(&mut self) -> Vec<AudioCommand> {
        self.regenerate_reverb_impulse(self.state.reverb.decay_seconds);
        self.regenerate_distortion_curve(self.state.distortion.amount);
        self.sync_commands()
    }

    /// Parameters and route for the current state, without regenerating
    /// anything. The impulse and curve are resent as they are.
    pub fn sync_commands(&self) -> Vec<AudioCommand> {
        let s = &self.state;
        // each engine gets its own zeroed history, built here rather than in the callback
        let mut cmds: Vec<AudioCommand> = self
            .kernel
            .iter()
            .map(|k| AudioCommand::SetImpulse(PreparedKernel::new(Arc::clone(k))))
            .collect();
        cmds.extend([
            AudioCommand::SetFilter {
                filter_type: s.filter.filter_type,
                frequency_hz: s.filter.frequency_hz,
                q: s.filter.q,
            },
            AudioCommand::SetReverbWet(s.reverb.wet_level),
            AudioCommand::SetDelay {
                time_seconds: s.delay.time_seconds,
                feedback: s.delay.feedback,
                mix: s.delay.mix,
            },
            AudioCommand::SetDistortionOversample(s.distortion.oversample),
            AudioCommand::SetCurve(Arc::clone(&self.curve)),
            self.rebuild(),
        ]);
        cmds
    }

    /// Enabled effects in signal order. A disabled effect is simply not on
    /// the path.
    pub fn topology(&self) -> Vec<EffectKind> {
        EffectKind::ORDER.into_iter().filter(|k| self.state.is_enabled(*k)).collect()
    }

    pub fn rebuild(&self) -> AudioCommand {
        AudioCommand::SetRoute(self.topology())
    }

    pub fn set_parameter(&mut self, patch: EffectPatch) -> Vec<AudioCommand> {
        let mut cmds = Vec::new();
        let kind = patch.kind();
        let was_enabled = self.state.is_enabled(kind);

        match patch {
            EffectPatch::Filter { enabled, filter_type, frequency_hz, q } => {
                let f = &mut self.state.filter;
                if let Some(e) = enabled {
                    f.enabled = e;
                }
                if filter_type.is_some() || frequency_hz.is_some() || q.is_some() {
                    f.merge(filter_type, frequency_hz, q);
                    cmds.push(AudioCommand::SetFilter {
                        filter_type: f.filter_type,
                        frequency_hz: f.frequency_hz,
                        q: f.q,
                    });
                }
            }
            EffectPatch::Reverb { enabled, wet_level, decay_seconds } => {
                let before = self.state.reverb.decay_seconds;
                let r = &mut self.state.reverb;
                if let Some(e) = enabled {
                    r.enabled = e;
                }
                r.merge(wet_level, decay_seconds);
                let (wet, decay) = (r.wet_level, r.decay_seconds);
                if wet_level.is_some() {
                    cmds.push(AudioCommand::SetReverbWet(wet));
                }
                if decay != before || self.impulse_len == 0 {
                    cmds.push(self.regenerate_reverb_impulse(decay));
                }
            }
            EffectPatch::Delay { enabled, time_seconds, feedback, mix } => {
                let d = &mut self.state.delay;
                if let Some(e) = enabled {
                    d.enabled = e;
                }
                if time_seconds.is_some() || feedback.is_some() || mix.is_some() {
                    d.merge(time_seconds, feedback, mix);
                    cmds.push(AudioCommand::SetDelay {
                        time_seconds: d.time_seconds,
                        feedback: d.feedback,
                        mix: d.mix,
                    });
                }
            }
            EffectPatch::Distortion { enabled, amount, oversample } => {
                let before = self.state.distortion.amount;
                let d = &mut self.state.distortion;
                if let Some(e) = enabled {
                    d.enabled = e;
                }
                d.merge(amount, oversample);
                let (amt, os) = (d.amount, d.oversample);
                if oversample.is_some() {
                    cmds.push(AudioCommand::SetDistortionOversample(os));
                }
                if amt != before || self.curve.is_empty() {
                    cmds.push(self.regenerate_distortion_curve(amt));
                }
            }
        }

        if self.state.is_enabled(kind) != was_enabled {
            log::debug!("{} {}", kind.label(), if was_enabled { "off" } else { "on" });
            cmds.push(self.rebuild());
        }
        cmds
    }

    /// Fresh stereo noise burst, `decay * sample_rate` frames per channel,
    /// shaped by `(1 - i/n)^decay`.
    pub fn regenerate_reverb_impulse(&mut self, decay_seconds: f32) -> AudioCommand {
        let ir = self.impulse_response(decay_seconds);
        self.impulse_len = ir.len();
        log::debug!("reverb impulse: {} frames", ir.len());
        let kernel = Arc::new(ConvolutionKernel::new(&ir));
        self.kernel = Some(Arc::clone(&kernel));
        AudioCommand::SetImpulse(PreparedKernel::new(kernel))
    }

    pub fn impulse_response(&mut self, decay_seconds: f32) -> ImpulseResponse {
        let n = (decay_seconds.max(0.0) * self.sample_rate as f32).round() as usize;
        let channel = |rng: &mut StdRng| -> Vec<f32> {
            (0..n)
                .map(|i| {
                    let env = (1.0 - i as f32 / n as f32).powf(decay_seconds);
                    rng.gen_range(-1.0f32..1.0) * env
                })
                .collect()
        };
        let left = channel(&mut self.rng);
        let right = channel(&mut self.rng);
        ImpulseResponse { sample_rate: self.sample_rate, left, right }
    }

    pub fn regenerate_distortion_curve(&mut self, amount: f32) -> AudioCommand {
        self.curve = Arc::new(distortion_curve(amount));
        AudioCommand::SetCurve(Arc::clone(&self.curve))
    }

    /// Back to defaults everywhere, resources included.
    pub fn reset(&mut self) -> Vec<AudioCommand> {
        self.state = EffectsState::default();
        self.init()
    }

    /// Replace the whole state (pattern import).
    pub fn load_state(&mut self, state: &EffectsState) -> Vec<AudioCommand> {
        let mut cmds = Vec::new();
        for patch in EffectPatch::replay_all(state) {
            cmds.extend(self.set_parameter(patch));
        }
        cmds
    }
}

/// `f(x) = (3 + k) * x * 20deg / (pi + k * |x|)` sampled over -1..1.
pub fn distortion_curve(amount: f32) -> Vec<f32> {
    let deg = PI / 180.0;
    (0..CURVE_POINTS)
        .map(|i| {
            let x = i as f32 * 2.0 / CURVE_POINTS as f32 - 1.0;
            (3.0 + amount) * x * 20.0 * deg / (PI + amount * x.abs())
        })
        .collect()
}
