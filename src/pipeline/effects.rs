// The Effect Data
//
// Plain serializable state for the four master effects. The live nodes that
// actually process audio are in audio/effect.rs; sequencer/effects_chain.rs
// keeps the two in sync.

use serde::{Deserialize, Serialize};

pub const FILTER_FREQ_RANGE: (f32, f32) = (20.0, 22050.0);
pub const FILTER_Q_RANGE: (f32, f32) = (0.1, 20.0);
pub const REVERB_DECAY_RANGE: (f32, f32) = (0.1, 10.0);
pub const DELAY_TIME_RANGE: (f32, f32) = (0.01, 5.0);
pub const DELAY_FEEDBACK_MAX: f32 = 0.95;
pub const DISTORTION_AMOUNT_MAX: f32 = 100.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    Filter,
    Reverb,
    Delay,
    Distortion,
}

impl EffectKind {
    // signal order, the chain is always spliced in this order
    pub const ORDER: [EffectKind; 4] = [
        EffectKind::Filter,
        EffectKind::Reverb,
        EffectKind::Delay,
        EffectKind::Distortion,
    ];

    pub fn label(self) -> &'static str {
        match self {
            EffectKind::Filter => "filter",
            EffectKind::Reverb => "reverb",
            EffectKind::Delay => "delay",
            EffectKind::Distortion => "distortion",
        }
    }

    pub fn next(self) -> Self {
        match self {
            EffectKind::Filter => EffectKind::Reverb,
            EffectKind::Reverb => EffectKind::Delay,
            EffectKind::Delay => EffectKind::Distortion,
            EffectKind::Distortion => EffectKind::Filter,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    #[default]
    Lowpass,
    Highpass,
    Bandpass,
    Notch,
    Allpass,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Oversample {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "2x")]
    X2,
    #[default]
    #[serde(rename = "4x")]
    X4,
}

impl Oversample {
    pub fn factor(self) -> usize {
        match self {
            Oversample::None => 1,
            Oversample::X2 => 2,
            Oversample::X4 => 4,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSpec {
    pub enabled: bool,
    #[serde(rename = "type")]
    pub filter_type: FilterType,
    pub frequency_hz: f32,
    #[serde(rename = "Q")]
    pub q: f32,
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self {
            enabled: false,
            filter_type: FilterType::Lowpass,
            frequency_hz: 22050.0,
            q: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverbSpec {
    pub enabled: bool,
    pub wet_level: f32,
    pub decay_seconds: f32,
}

impl Default for ReverbSpec {
    fn default() -> Self {
        Self { enabled: false, wet_level: 0.3, decay_seconds: 2.0 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelaySpec {
    pub enabled: bool,
    pub time_seconds: f32,
    pub feedback: f32,
    pub mix: f32,
}

impl Default for DelaySpec {
    fn default() -> Self {
        Self { enabled: false, time_seconds: 0.3, feedback: 0.4, mix: 0.3 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistortionSpec {
    pub enabled: bool,
    pub amount: f32,
    pub oversample: Oversample,
}

impl Default for DistortionSpec {
    fn default() -> Self {
        Self { enabled: false, amount: 20.0, oversample: Oversample::X4 }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectsState {
    #[serde(default)]
    pub filter: FilterSpec,
    #[serde(default)]
    pub reverb: ReverbSpec,
    #[serde(default)]
    pub delay: DelaySpec,
    #[serde(default)]
    pub distortion: DistortionSpec,
}

impl EffectsState {
    pub fn is_enabled(&self, kind: EffectKind) -> bool {
        match kind {
            EffectKind::Filter => self.filter.enabled,
            EffectKind::Reverb => self.reverb.enabled,
            EffectKind::Delay => self.delay.enabled,
            EffectKind::Distortion => self.distortion.enabled,
        }
    }

    pub fn summary(&self, kind: EffectKind) -> String {
        match kind {
            EffectKind::Filter => format!(
                "{:?} {:.0}Hz q{:.1}",
                self.filter.filter_type, self.filter.frequency_hz, self.filter.q
            ),
            EffectKind::Reverb => format!(
                "wet {:.2} decay {:.1}s",
                self.reverb.wet_level, self.reverb.decay_seconds
            ),
            EffectKind::Delay => format!(
                "{:.2}s fb {:.2} mix {:.2}",
                self.delay.time_seconds, self.delay.feedback, self.delay.mix
            ),
            EffectKind::Distortion => format!(
                "amt {:.0} {:?}",
                self.distortion.amount, self.distortion.oversample
            ),
        }
    }
}

// A partial update for one effect. Only the fields that are Some get merged,
// everything else keeps its current value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EffectPatch {
    Filter {
        enabled: Option<bool>,
        filter_type: Option<FilterType>,
        frequency_hz: Option<f32>,
        q: Option<f32>,
    },
    Reverb {
        enabled: Option<bool>,
        wet_level: Option<f32>,
        decay_seconds: Option<f32>,
    },
    Delay {
        enabled: Option<bool>,
        time_seconds: Option<f32>,
        feedback: Option<f32>,
        mix: Option<f32>,
    },
    Distortion {
        enabled: Option<bool>,
        amount: Option<f32>,
        oversample: Option<Oversample>,
    },
}

impl EffectPatch {
    pub fn kind(&self) -> EffectKind {
        match self {
            EffectPatch::Filter { .. } => EffectKind::Filter,
            EffectPatch::Reverb { .. } => EffectKind::Reverb,
            EffectPatch::Delay { .. } => EffectKind::Delay,
            EffectPatch::Distortion { .. } => EffectKind::Distortion,
        }
    }

    pub fn enable(kind: EffectKind, enabled: bool) -> Self {
        match kind {
            EffectKind::Filter => EffectPatch::Filter {
                enabled: Some(enabled),
                filter_type: None,
                frequency_hz: None,
                q: None,
            },
            EffectKind::Reverb => EffectPatch::Reverb {
                enabled: Some(enabled),
                wet_level: None,
                decay_seconds: None,
            },
            EffectKind::Delay => EffectPatch::Delay {
                enabled: Some(enabled),
                time_seconds: None,
                feedback: None,
                mix: None,
            },
            EffectKind::Distortion => EffectPatch::Distortion {
                enabled: Some(enabled),
                amount: None,
                oversample: None,
            },
        }
    }

    // patches that replay a whole spec, used by pattern import
    pub fn from_filter(spec: FilterSpec) -> Self {
        EffectPatch::Filter {
            enabled: Some(spec.enabled),
            filter_type: Some(spec.filter_type),
            frequency_hz: Some(spec.frequency_hz),
            q: Some(spec.q),
        }
    }

    pub fn from_reverb(spec: ReverbSpec) -> Self {
        EffectPatch::Reverb {
            enabled: Some(spec.enabled),
            wet_level: Some(spec.wet_level),
            decay_seconds: Some(spec.decay_seconds),
        }
    }

    pub fn from_delay(spec: DelaySpec) -> Self {
        EffectPatch::Delay {
            enabled: Some(spec.enabled),
            time_seconds: Some(spec.time_seconds),
            feedback: Some(spec.feedback),
            mix: Some(spec.mix),
        }
    }

    pub fn from_distortion(spec: DistortionSpec) -> Self {
        EffectPatch::Distortion {
            enabled: Some(spec.enabled),
            amount: Some(spec.amount),
            oversample: Some(spec.oversample),
        }
    }

    pub fn replay_all(state: &EffectsState) -> [EffectPatch; 4] {
        [
            Self::from_filter(state.filter),
            Self::from_reverb(state.reverb),
            Self::from_delay(state.delay),
            Self::from_distortion(state.distortion),
        ]
    }
}

fn clamp_finite(value: f32, lo: f32, hi: f32, fallback: f32) -> f32 {
    if value.is_finite() { value.clamp(lo, hi) } else { fallback }
}

impl FilterSpec {
    pub fn merge(&mut self, filter_type: Option<FilterType>, frequency_hz: Option<f32>, q: Option<f32>) {
        if let Some(t) = filter_type {
            self.filter_type = t;
        }
        if let Some(f) = frequency_hz {
            self.frequency_hz = clamp_finite(f, FILTER_FREQ_RANGE.0, FILTER_FREQ_RANGE.1, self.frequency_hz);
        }
        if let Some(q) = q {
            self.q = clamp_finite(q, FILTER_Q_RANGE.0, FILTER_Q_RANGE.1, self.q);
        }
    }
}

impl ReverbSpec {
    pub fn merge(&mut self, wet_level: Option<f32>, decay_seconds: Option<f32>) {
        if let Some(w) = wet_level {
            self.wet_level = clamp_finite(w, 0.0, 1.0, self.wet_level);
        }
        if let Some(d) = decay_seconds {
            self.decay_seconds = clamp_finite(d, REVERB_DECAY_RANGE.0, REVERB_DECAY_RANGE.1, self.decay_seconds);
        }
    }
}

impl DelaySpec {
    pub fn merge(&mut self, time_seconds: Option<f32>, feedback: Option<f32>, mix: Option<f32>) {
        if let Some(t) = time_seconds {
            self.time_seconds = clamp_finite(t, DELAY_TIME_RANGE.0, DELAY_TIME_RANGE.1, self.time_seconds);
        }
        if let Some(fb) = feedback {
            self.feedback = clamp_finite(fb, 0.0, DELAY_FEEDBACK_MAX, self.feedback);
        }
        if let Some(m) = mix {
            self.mix = clamp_finite(m, 0.0, 1.0, self.mix);
        }
    }
}

impl DistortionSpec {
    pub fn merge(&mut self, amount: Option<f32>, oversample: Option<Oversample>) {
        if let Some(a) = amount {
            self.amount = clamp_finite(a, 0.0, DISTORTION_AMOUNT_MAX, self.amount);
        }
        if let Some(o) = oversample {
            self.oversample = o;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_clamps_out_of_range_values() {
        let mut delay = DelaySpec::default();
        delay.merge(Some(9.0), Some(1.5), Some(-0.2));
        assert_eq!(delay.time_seconds, 5.0);
        assert_eq!(delay.feedback, 0.95);
        assert_eq!(delay.mix, 0.0);

        let mut filter = FilterSpec::default();
        filter.merge(None, Some(f32::NAN), Some(0.0));
        assert_eq!(filter.frequency_hz, 22050.0);
        assert_eq!(filter.q, 0.1);
    }

    #[test]
    fn effects_state_uses_the_interchange_field_names() {
        let json = serde_json::to_value(EffectsState::default()).unwrap();
        assert_eq!(json["filter"]["type"], "lowpass");
        assert_eq!(json["filter"]["Q"], 1.0);
        assert_eq!(json["reverb"]["decaySeconds"], 2.0);
        assert_eq!(json["distortion"]["oversample"], "4x");
    }

    #[test]
    fn missing_effects_fall_back_to_defaults() {
        let state: EffectsState = serde_json::from_str(r#"{"delay":{"enabled":true,"timeSeconds":0.5,"feedback":0.2,"mix":0.4}}"#).unwrap();
        assert!(state.delay.enabled);
        assert_eq!(state.filter, FilterSpec::default());
    }
}
