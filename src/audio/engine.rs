use std::collections::HashMap;
use std::sync::Arc;

use crossbeam_channel::Sender;

use super::convolver::{ConvolutionKernel, Convolver, ImpulseResponse, PreparedKernel};
use super::effect::{Effect, FeedbackDelay, SvfFilter, Waveshaper};
use super::frame::{self, StereoFrame};
use super::sample_buffer::SampleBuffer;
use super::sample_id::SampleId;
use super::voice::Voice;
use crate::audio_api::{AudioCommand, TriggerParams, TriggerSource};
use crate::pipeline::effects::{EffectKind, EffectsState, DELAY_TIME_RANGE};

const MAX_VOICES: usize = 32; // hard cap so we wont grow the pool in the callback
pub const SAMPLE_GAIN: f32 = 0.8;
pub const MASTER_GAIN: f32 = 0.8;

// The live effect nodes. They are built once and never torn down; the route
// only decides which of them the bus passes through.
struct RenderChain {
    filter: SvfFilter,
    reverb: Convolver,
    delay: FeedbackDelay,
    distortion: Waveshaper,
    route: Vec<EffectKind>,
}

impl RenderChain {
    fn new(sample_rate: f32) -> Self {
        let d = EffectsState::default();
        let silent = ImpulseResponse { sample_rate: sample_rate as u32, left: Vec::new(), right: Vec::new() };
        Self {
            filter: SvfFilter::new(sample_rate, d.filter.filter_type, d.filter.frequency_hz, d.filter.q),
            reverb: Convolver::new(Arc::new(ConvolutionKernel::new(&silent)), d.reverb.wet_level),
            delay: FeedbackDelay::new(
                sample_rate,
                DELAY_TIME_RANGE.1,
                d.delay.time_seconds,
                d.delay.feedback,
                d.delay.mix,
            ),
            distortion: Waveshaper::new(Arc::new(Vec::new()), d.distortion.oversample),
            route: Vec::with_capacity(EffectKind::ORDER.len()),
        }
    }

    fn node(&mut self, kind: EffectKind) -> &mut dyn Effect {
        match kind {
            EffectKind::Filter => &mut self.filter,
            EffectKind::Reverb => &mut self.reverb,
            EffectKind::Delay => &mut self.delay,
            EffectKind::Distortion => &mut self.distortion,
        }
    }

    fn set_route(&mut self, route: Vec<EffectKind>) {
        // nodes that just left the path should not ring back in later
        for kind in EffectKind::ORDER {
            if self.route.contains(&kind) && !route.contains(&kind) {
                self.node(kind).reset();
            }
        }
        self.route = route;
    }

    fn process(&mut self, buf: &mut [StereoFrame]) {
        for i in 0..self.route.len() {
            let kind = self.route[i];
            self.node(kind).process(buf);
        }
    }
}

/// Resources the engine let go of. Freeing them can take a while, so they
/// are shipped off the audio thread instead of dropped in the callback.
pub enum Retired {
    Sample(Arc<SampleBuffer>),
    Reverb(PreparedKernel),
    Curve(Arc<Vec<f32>>),
}

// a voice that may still be waiting for its start frame
struct Scheduled {
    start_in: usize,
    voice: Voice,
}

impl Scheduled {
    fn render_into(&mut self, out: &mut [StereoFrame]) -> bool {
        let wait = self.start_in.min(out.len());
        self.start_in -= wait;
        if wait == out.len() {
            return true;
        }
        self.voice.render_into(&mut out[wait..])
    }
}

pub struct Engine {
    sample_rate: f32,
    samples: HashMap<SampleId, Arc<SampleBuffer>>,
    voices: Vec<Scheduled>, // fixed capacity pool of sounding voices
    chain: RenderChain,
    retired: Option<Sender<Retired>>,
}

impl Engine {
    pub fn new(sample_rate: u32) -> Self {
        let sample_rate = sample_rate as f32;
        Self {
            sample_rate,
            samples: HashMap::new(),
            voices: Vec::with_capacity(MAX_VOICES),
            chain: RenderChain::new(sample_rate),
            retired: None,
        }
    }

    // without this, replaced resources are dropped in place (fine offline)
    pub fn with_retired(mut self, tx: Sender<Retired>) -> Self {
        self.retired = Some(tx);
        self
    }

    fn retire(&self, item: Retired) {
        if let Some(tx) = &self.retired {
            // a full queue means the item drops here after all
            let _ = tx.try_send(item);
        }
    }

    pub fn handle_cmd(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::RegisterSample { id, buffer } => {
                if let Some(old) = self.samples.insert(id, buffer) {
                    self.retire(Retired::Sample(old));
                }
            }
            AudioCommand::UnregisterSample(id) => {
                if let Some(buffer) = self.samples.remove(&id) {
                    self.retire(Retired::Sample(buffer));
                }
            }
            AudioCommand::Trigger(t) => self.trigger_voice(t),
            AudioCommand::SetRoute(route) => self.chain.set_route(route),
            AudioCommand::SetFilter { filter_type, frequency_hz, q } => {
                self.chain.filter.set_type(filter_type);
                self.chain.filter.set_frequency(frequency_hz);
                self.chain.filter.set_q(q);
            }
            AudioCommand::SetReverbWet(wet) => self.chain.reverb.set_wet_level(wet),
            AudioCommand::SetImpulse(prepared) => {
                let old = self.chain.reverb.set_kernel(prepared);
                self.retire(Retired::Reverb(old));
            }
            AudioCommand::SetDelay { time_seconds, feedback, mix } => {
                self.chain.delay.set_time(time_seconds);
                self.chain.delay.set_feedback(feedback);
                self.chain.delay.set_mix(mix);
            }
            AudioCommand::SetDistortionOversample(o) => self.chain.distortion.set_oversample(o),
            AudioCommand::SetCurve(curve) => {
                let old = self.chain.distortion.set_curve(curve);
                self.retire(Retired::Curve(old));
            }
        }
    }

    fn trigger_voice(&mut self, t: TriggerParams) {
        let voice = match t.source {
            TriggerSource::Sample(id) => match self.samples.get(&id) {
                Some(buffer) => Voice::sample(Arc::clone(buffer), SAMPLE_GAIN),
                None => return, // not registered (yet), nothing to play
            },
            TriggerSource::Synth { waveform, frequency_hz, decay_seconds } => {
                Voice::synth(waveform, frequency_hz, decay_seconds, self.sample_rate)
            }
        };

        // out of slots: the oldest voice gives way
        if self.voices.len() >= MAX_VOICES {
            let oldest = self.voices.remove(0);
            self.retire_voice(oldest.voice);
        }
        self.voices.push(Scheduled { start_in: t.offset_frames as usize, voice });
    }

    fn retire_voice(&self, voice: Voice) {
        if let Some(buffer) = voice.into_buffer() {
            // last holder of an unregistered buffer
            if Arc::strong_count(&buffer) == 1 {
                self.retire(Retired::Sample(buffer));
            }
        }
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    pub fn registered_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn render_block(&mut self, out: &mut [StereoFrame]) {
        frame::clear(out);
        let mut i = 0;
        while i < self.voices.len() {
            if self.voices[i].render_into(out) {
                i += 1;
            } else {
                let done = self.voices.remove(i);
                self.retire_voice(done.voice);
            }
        }
        self.chain.process(out);
        for f in out.iter_mut() {
            *f = f.scaled(MASTER_GAIN);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::Waveform;
    use crate::pipeline::effects::FilterType;

    fn synth_hit(track: usize) -> AudioCommand {
        AudioCommand::Trigger(TriggerParams {
            track,
            source: TriggerSource::Synth { waveform: Waveform::Square, frequency_hz: 500.0, decay_seconds: 0.2 },
            offset_frames: 0,
        })
    }

    fn sample_hit(id: SampleId, offset_frames: u32) -> AudioCommand {
        AudioCommand::Trigger(TriggerParams { track: 0, source: TriggerSource::Sample(id), offset_frames })
    }

    #[test]
    fn registered_sample_plays_at_sample_and_master_gain() {
        let mut engine = Engine::new(44100);
        let id = SampleId::next();
        let buffer = Arc::new(SampleBuffer { data: vec![StereoFrame::mono(1.0); 8] });
        engine.handle_cmd(AudioCommand::RegisterSample { id, buffer });
        engine.handle_cmd(sample_hit(id, 0));

        let mut out = vec![StereoFrame::zero(); 16];
        engine.render_block(&mut out);
        assert!((out[0].left - SAMPLE_GAIN * MASTER_GAIN).abs() < 1e-6);
        assert_eq!(out[8], StereoFrame::zero());
        assert_eq!(engine.active_voices(), 0);
    }

    #[test]
    fn unknown_sample_is_skipped() {
        let mut engine = Engine::new(44100);
        engine.handle_cmd(AudioCommand::Trigger(TriggerParams {
            track: 1,
            source: TriggerSource::Sample(SampleId(u64::MAX)),
            offset_frames: 0,
        }));
        assert_eq!(engine.active_voices(), 0);
    }

    #[test]
    fn voice_pool_is_capped() {
        let mut engine = Engine::new(44100);
        for _ in 0..MAX_VOICES + 5 {
            engine.handle_cmd(synth_hit(2));
        }
        assert_eq!(engine.active_voices(), MAX_VOICES);
    }

    #[test]
    fn unrouted_filter_leaves_the_signal_alone() {
        let mut dry = Engine::new(44100);
        let mut wet = Engine::new(44100);
        // a drastic filter setting that is never routed
        wet.handle_cmd(AudioCommand::SetFilter { filter_type: FilterType::Highpass, frequency_hz: 20000.0, q: 5.0 });
        for e in [&mut dry, &mut wet] {
            e.handle_cmd(synth_hit(0));
        }
        let mut a = vec![StereoFrame::zero(); 256];
        let mut b = vec![StereoFrame::zero(); 256];
        dry.render_block(&mut a);
        wet.render_block(&mut b);
        assert_eq!(a, b);

        wet.handle_cmd(AudioCommand::SetRoute(vec![EffectKind::Filter]));
        wet.handle_cmd(synth_hit(0));
        dry.handle_cmd(synth_hit(0));
        dry.render_block(&mut a);
        wet.render_block(&mut b);
        assert_ne!(a, b);
    }

    #[test]
    fn offset_hits_start_later_in_the_block_and_across_blocks() {
        let mut engine = Engine::new(44100);
        let id = SampleId::next();
        let buffer = Arc::new(SampleBuffer { data: vec![StereoFrame::mono(1.0); 2] });
        engine.handle_cmd(AudioCommand::RegisterSample { id, buffer });
        engine.handle_cmd(sample_hit(id, 0));
        engine.handle_cmd(sample_hit(id, 6));

        let mut out = vec![StereoFrame::zero(); 4];
        engine.render_block(&mut out);
        assert!(out[0].left > 0.0 && out[1].left > 0.0);
        assert_eq!(out[2], StereoFrame::zero());
        assert_eq!(engine.active_voices(), 1); // the second one is still waiting

        engine.render_block(&mut out);
        assert_eq!(out[1], StereoFrame::zero());
        assert!(out[2].left > 0.0 && out[3].left > 0.0);
    }

    #[test]
    fn unregistered_samples_are_retired_off_the_engine() {
        let (tx, rx) = crossbeam_channel::bounded(64);
        let mut engine = Engine::new(44100).with_retired(tx);
        let mut last = None;
        for _ in 0..10 {
            let id = SampleId::next();
            let buffer = Arc::new(SampleBuffer { data: vec![StereoFrame::mono(0.5); 4] });
            engine.handle_cmd(AudioCommand::RegisterSample { id, buffer });
            if let Some(old) = last.replace(id) {
                engine.handle_cmd(AudioCommand::UnregisterSample(old));
            }
        }
        assert_eq!(engine.registered_samples(), 1);
        assert_eq!(rx.try_iter().filter(|r| matches!(r, Retired::Sample(_))).count(), 9);

        // a voice outlives its registration and hands the buffer back when done
        let id = last.unwrap();
        engine.handle_cmd(sample_hit(id, 0));
        engine.handle_cmd(AudioCommand::UnregisterSample(id));
        assert_eq!(rx.try_iter().count(), 1);
        let mut out = vec![StereoFrame::zero(); 8];
        engine.render_block(&mut out);
        assert!(out[0].left > 0.0);
        assert_eq!(engine.registered_samples(), 0);
        assert_eq!(engine.active_voices(), 0);
    }

    #[test]
    fn replaced_impulse_and_curve_leave_through_the_retired_channel() {
        let (tx, rx) = crossbeam_channel::bounded(8);
        let mut engine = Engine::new(44100).with_retired(tx);
        let ir = ImpulseResponse { sample_rate: 44100, left: vec![1.0; 600], right: vec![1.0; 600] };
        let kernel = Arc::new(ConvolutionKernel::new(&ir));
        engine.handle_cmd(AudioCommand::SetImpulse(PreparedKernel::new(Arc::clone(&kernel))));
        engine.handle_cmd(AudioCommand::SetImpulse(PreparedKernel::new(Arc::new(ConvolutionKernel::new(&ir)))));
        engine.handle_cmd(AudioCommand::SetCurve(Arc::new(vec![0.0; 16])));

        let retired: Vec<Retired> = rx.try_iter().collect();
        assert_eq!(retired.len(), 3);
        match &retired[1] {
            Retired::Reverb(old) => {
                assert!(Arc::ptr_eq(&old.kernel, &kernel));
                assert_eq!(old.history_len(), 3);
            }
            _ => panic!("expected the first impulse back"),
        }
        assert!(matches!(retired[2], Retired::Curve(_)));
    }
}
