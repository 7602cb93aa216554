use std::f32::consts::TAU;
use std::sync::Arc;

use super::frame::StereoFrame;
use super::sample_buffer::SampleBuffer;

// envelope endpoints for synthesized hits, full gain down to near-silence
pub const SYNTH_PEAK_GAIN: f32 = 0.8;
pub const SYNTH_FLOOR_GAIN: f32 = 0.001;

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Triangle,
    Square,
}

impl Waveform {
    #[inline]
    fn sample(self, phase: f32) -> f32 {
        // phase is 0..1
        match self {
            Waveform::Sine => (phase * TAU).sin(),
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
            Waveform::Square => {
                if phase < 0.5 { 1.0 } else { -1.0 }
            }
        }
    }
}

// one-shot playback of a registered buffer
#[derive(Clone, Debug)]
pub struct SampleVoice {
    buffer: Arc<SampleBuffer>,
    pos: f32,
    gain: f32,
}

// oscillator with an exponential decay, released at the end of the window
#[derive(Clone, Debug)]
pub struct SynthVoice {
    waveform: Waveform,
    phase: f32,
    phase_inc: f32,
    amp: f32,
    decay_mul: f32, // per-frame envelope multiplier
    remaining: usize, // frames until the oscillator is released
}

#[derive(Clone, Debug)]
pub enum Voice {
    Sample(SampleVoice),
    Synth(SynthVoice),
}

impl Voice {
    pub fn sample(buffer: Arc<SampleBuffer>, gain: f32) -> Self {
        Voice::Sample(SampleVoice { buffer, pos: 0.0, gain })
    }

    pub fn synth(waveform: Waveform, frequency: f32, decay_seconds: f32, sample_rate: f32) -> Self {
        let frames = (decay_seconds.max(0.0) * sample_rate).round() as usize;
        // gain(t) = peak * (floor/peak)^(t/decay), stepped per frame
        let decay_mul = if frames > 0 {
            (SYNTH_FLOOR_GAIN / SYNTH_PEAK_GAIN).powf(1.0 / frames as f32)
        } else {
            0.0
        };
        Voice::Synth(SynthVoice {
            waveform,
            phase: 0.0,
            phase_inc: frequency.max(0.0) / sample_rate,
            amp: SYNTH_PEAK_GAIN,
            decay_mul,
            remaining: frames,
        })
    }

    // the buffer a finished sample voice still holds, so it can be freed elsewhere
    pub fn into_buffer(self) -> Option<Arc<SampleBuffer>> {
        match self {
            Voice::Sample(v) => Some(v.buffer),
            Voice::Synth(_) => None,
        }
    }

    // mix this voice into `out`, returns false once it has finished
    pub fn render_into(&mut self, out: &mut [StereoFrame]) -> bool {
        match self {
            Voice::Sample(v) => v.render_into(out),
            Voice::Synth(v) => v.render_into(out),
        }
    }
}

impl SampleVoice {
    fn render_into(&mut self, out: &mut [StereoFrame]) -> bool {
        let data = &self.buffer.data;
        let len = data.len();
        for frame in out.iter_mut() {
            let i = self.pos as usize;
            if i >= len {
                return false;
            }
            let frac = self.pos - i as f32;
            let s0 = data[i];
            let s1 = data.get(i + 1).copied().unwrap_or(s0);
            frame.left += lerp(s0.left, s1.left, frac) * self.gain;
            frame.right += lerp(s0.right, s1.right, frac) * self.gain;
            self.pos += 1.0;
        }
        (self.pos as usize) < len
    }
}

impl SynthVoice {
    fn render_into(&mut self, out: &mut [StereoFrame]) -> bool {
        for frame in out.iter_mut() {
            if self.remaining == 0 {
                return false;
            }
            let s = self.waveform.sample(self.phase) * self.amp;
            frame.left += s;
            frame.right += s;
            self.phase += self.phase_inc;
            if self.phase >= 1.0 {
                self.phase -= self.phase.floor();
            }
            self.amp *= self.decay_mul;
            self.remaining -= 1;
        }
        self.remaining > 0
    }

    pub fn amplitude(&self) -> f32 {
        self.amp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synth_voice_decays_to_the_floor_and_releases() {
        let mut voice = Voice::synth(Waveform::Sine, 60.0, 0.1, 1000.0);
        let mut out = vec![StereoFrame::zero(); 100];
        let still_going = voice.render_into(&mut out);
        assert!(!still_going);
        assert!(voice.clone().into_buffer().is_none());
        if let Voice::Synth(v) = &voice {
            assert!((v.amplitude() - SYNTH_FLOOR_GAIN).abs() < 1e-4);
        }
    }

    #[test]
    fn sample_voice_plays_once_at_fixed_gain() {
        let buffer = Arc::new(SampleBuffer { data: vec![StereoFrame::mono(1.0); 4] });
        let mut voice = Voice::sample(buffer, 0.8);
        let mut out = vec![StereoFrame::zero(); 6];
        assert!(!voice.render_into(&mut out));
        assert_eq!(out[0].left, 0.8);
        assert_eq!(out[3].right, 0.8);
        assert_eq!(out[4], StereoFrame::zero());
    }

    #[test]
    fn square_and_triangle_stay_in_range() {
        for w in [Waveform::Triangle, Waveform::Square, Waveform::Sine] {
            for i in 0..100 {
                let s = w.sample(i as f32 / 100.0);
                assert!((-1.0..=1.0).contains(&s));
            }
        }
    }
}
