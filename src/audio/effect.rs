use std::f32::consts::PI;
use std::sync::Arc;

use super::frame::StereoFrame;
use crate::pipeline::effects::{FilterType, Oversample};

// Every live node in the master chain is one of these. Nodes keep their state
// across route rebuilds, the chain just stops calling the ones that are
// switched off.
pub trait Effect: Send {
    fn process(&mut self, buf: &mut [StereoFrame]);

    // forget any ringing state (delay tails, filter memory)
    fn reset(&mut self) {}
}

// ── Filter ────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default)]
struct SvfState {
    ic1eq: f32,
    ic2eq: f32,
}

/// State variable filter, one instance of state per channel.
pub struct SvfFilter {
    filter_type: FilterType,
    frequency_hz: f32,
    q: f32,
    sample_rate: f32,
    // cached coefficients
    k: f32,
    a1: f32,
    a2: f32,
    a3: f32,
    state: [SvfState; 2],
}

impl SvfFilter {
    pub fn new(sample_rate: f32, filter_type: FilterType, frequency_hz: f32, q: f32) -> Self {
        let mut f = Self {
            filter_type,
            frequency_hz,
            q,
            sample_rate,
            k: 0.0,
            a1: 0.0,
            a2: 0.0,
            a3: 0.0,
            state: [SvfState::default(); 2],
        };
        f.recalc_coeffs();
        f
    }

    pub fn set_type(&mut self, filter_type: FilterType) {
        self.filter_type = filter_type;
    }

    pub fn set_frequency(&mut self, frequency_hz: f32) {
        self.frequency_hz = frequency_hz;
        self.recalc_coeffs();
    }

    pub fn set_q(&mut self, q: f32) {
        self.q = q;
        self.recalc_coeffs();
    }

    fn recalc_coeffs(&mut self) {
        // keep the cutoff below nyquist or tan() blows up
        let cutoff = self.frequency_hz.clamp(20.0, self.sample_rate * 0.49);
        let g = (PI * cutoff / self.sample_rate).tan();
        self.k = 1.0 / self.q.max(0.01);
        self.a1 = 1.0 / (1.0 + g * (g + self.k));
        self.a2 = g * self.a1;
        self.a3 = g * self.a2;
    }

    #[inline]
    fn tick(&mut self, ch: usize, input: f32) -> f32 {
        let s = &mut self.state[ch];
        let v3 = input - s.ic2eq;
        let v1 = self.a1 * s.ic1eq + self.a2 * v3;
        let v2 = s.ic2eq + self.a2 * s.ic1eq + self.a3 * v3;
        s.ic1eq = 2.0 * v1 - s.ic1eq;
        s.ic2eq = 2.0 * v2 - s.ic2eq;

        match self.filter_type {
            FilterType::Lowpass => v2,
            FilterType::Highpass => input - self.k * v1 - v2,
            FilterType::Bandpass => self.k * v1,
            FilterType::Notch => input - self.k * v1,
            FilterType::Allpass => input - 2.0 * self.k * v1,
        }
    }
}

impl Effect for SvfFilter {
    fn process(&mut self, buf: &mut [StereoFrame]) {
        for f in buf.iter_mut() {
            f.left = self.tick(0, f.left);
            f.right = self.tick(1, f.right);
        }
    }

    fn reset(&mut self) {
        self.state = [SvfState::default(); 2];
    }
}

// ── Delay ─────────────────────────────────────────────────────────

/// Feedback delay; output is dry plus `mix` times the delayed signal.
pub struct FeedbackDelay {
    line: Vec<StereoFrame>, // circular, sized for the longest allowed time
    write: usize,
    delay_frames: usize,
    feedback: f32,
    mix: f32,
    sample_rate: f32,
}

impl FeedbackDelay {
    pub fn new(sample_rate: f32, max_seconds: f32, time_seconds: f32, feedback: f32, mix: f32) -> Self {
        let capacity = (max_seconds * sample_rate).ceil() as usize + 1;
        let mut d = Self {
            line: vec![StereoFrame::zero(); capacity.max(2)],
            write: 0,
            delay_frames: 1,
            feedback,
            mix,
            sample_rate,
        };
        d.set_time(time_seconds);
        d
    }

    pub fn set_time(&mut self, seconds: f32) {
        let frames = (seconds * self.sample_rate).round() as usize;
        self.delay_frames = frames.clamp(1, self.line.len() - 1);
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback;
    }

    pub fn set_mix(&mut self, mix: f32) {
        self.mix = mix;
    }
}

impl Effect for FeedbackDelay {
    fn process(&mut self, buf: &mut [StereoFrame]) {
        let len = self.line.len();
        for f in buf.iter_mut() {
            let read = (self.write + len - self.delay_frames) % len;
            let wet = self.line[read];
            self.line[self.write] = StereoFrame {
                left: f.left + wet.left * self.feedback,
                right: f.right + wet.right * self.feedback,
            };
            self.write = (self.write + 1) % len;
            f.add_scaled(wet, self.mix);
        }
    }

    fn reset(&mut self) {
        self.line.fill(StereoFrame::zero());
    }
}

// ── Distortion ────────────────────────────────────────────────────

/// Curve-lookup waveshaper with optional oversampling.
pub struct Waveshaper {
    curve: Arc<Vec<f32>>,
    oversample: Oversample,
    prev: [f32; 2], // last input per channel, for the upsampling ramp
}

impl Waveshaper {
    pub fn new(curve: Arc<Vec<f32>>, oversample: Oversample) -> Self {
        Self { curve, oversample, prev: [0.0; 2] }
    }

    // returns the curve it replaced
    pub fn set_curve(&mut self, curve: Arc<Vec<f32>>) -> Arc<Vec<f32>> {
        std::mem::replace(&mut self.curve, curve)
    }

    pub fn set_oversample(&mut self, oversample: Oversample) {
        self.oversample = oversample;
    }

    // map -1..1 onto the curve and interpolate between points
    #[inline]
    pub fn shape(curve: &[f32], x: f32) -> f32 {
        let n = curve.len();
        if n == 0 {
            return x;
        }
        let v = (n - 1) as f32 * 0.5 * (x + 1.0);
        if v <= 0.0 {
            return curve[0];
        }
        if v >= (n - 1) as f32 {
            return curve[n - 1];
        }
        let k = v as usize;
        let frac = v - k as f32;
        curve[k] * (1.0 - frac) + curve[k + 1] * frac
    }

    #[inline]
    fn tick(&mut self, ch: usize, x: f32) -> f32 {
        let factor = self.oversample.factor();
        if factor == 1 {
            return Self::shape(&self.curve, x);
        }
        // ramp from the previous input, shape every sub-sample, average back down
        let prev = self.prev[ch];
        let mut acc = 0.0;
        for i in 1..=factor {
            let t = i as f32 / factor as f32;
            acc += Self::shape(&self.curve, prev + (x - prev) * t);
        }
        self.prev[ch] = x;
        acc / factor as f32
    }
}

impl Effect for Waveshaper {
    fn process(&mut self, buf: &mut [StereoFrame]) {
        for f in buf.iter_mut() {
            f.left = self.tick(0, f.left);
            f.right = self.tick(1, f.right);
        }
    }

    fn reset(&mut self) {
        self.prev = [0.0; 2];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn impulse(len: usize) -> Vec<StereoFrame> {
        let mut buf = vec![StereoFrame::zero(); len];
        buf[0] = StereoFrame::mono(1.0);
        buf
    }

    #[test]
    fn delay_repeats_the_input_after_the_delay_time() {
        let mut delay = FeedbackDelay::new(1000.0, 1.0, 0.01, 0.5, 1.0);
        let mut buf = impulse(25);
        delay.process(&mut buf);
        assert_eq!(buf[0].left, 1.0);
        assert_eq!(buf[10].left, 1.0); // first echo at full mix
        assert_eq!(buf[20].left, 0.5); // feedback halves the second one
    }

    #[test]
    fn lowpass_at_max_frequency_passes_dc() {
        let mut filter = SvfFilter::new(44100.0, FilterType::Lowpass, 22050.0, 0.707);
        let mut buf = vec![StereoFrame::mono(0.5); 2000];
        filter.process(&mut buf);
        assert!((buf[1999].left - 0.5).abs() < 1e-3);
    }

    #[test]
    fn highpass_removes_dc() {
        let mut filter = SvfFilter::new(44100.0, FilterType::Highpass, 1000.0, 0.707);
        let mut buf = vec![StereoFrame::mono(0.5); 4000];
        filter.process(&mut buf);
        assert!(buf[3999].left.abs() < 1e-3);
    }

    #[test]
    fn shaper_interpolates_and_clamps() {
        let curve = vec![-1.0, 0.0, 1.0];
        assert_eq!(Waveshaper::shape(&curve, 0.0), 0.0);
        assert_eq!(Waveshaper::shape(&curve, 0.5), 0.5);
        assert_eq!(Waveshaper::shape(&curve, 3.0), 1.0);
        assert_eq!(Waveshaper::shape(&curve, -3.0), -1.0);
    }
}
