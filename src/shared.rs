// The current input plan:
//
// Grid (8 tracks x 16 steps):
//   arrows / h j k l   //  cursor, stays inside the tui
//   Enter              //  ToggleCell(row, col) at the cursor
//
// Transport:
//   Space              //  PlayPress (start/stop)
//   + / -              //  TempoUp / TempoDown (5 bpm per press)
//
// Effects (toggle enabled):
//   f r d x            //  ToggleEffect(Filter | Reverb | Delay | Distortion)
//   [ / ]              //  KnobTurn on the selected effect's main parameter
//   Tab                //  NextEffect (which effect the knob edits)
//   0                  //  ResetEffects
//
// Pattern:
//   1 2 3              //  ApplyRecommendation(0..3)
//   a                  //  ToggleRecommendations (persisted)
//   g                  //  Randomize
//   c                  //  Clear
//   s / o              //  ExportPattern / ImportPattern
//   w                  //  ExportAudio
//   n                  //  NextSample(row) for the cursor row
//
// Quit:
//   Esc / q            //  Quit
//
// The middle layer owns all sequencer and parameter state,
// the TUI only renders the DisplayState it gets handed every frame.

use crate::analysis::Recommendation;
use crate::pipeline::effects::EffectKind;

pub const NUM_TRACKS: usize = 8;
pub const STEPS_PER_PATTERN: usize = 16;

pub const TEMPO_MIN: f32 = 60.0;
pub const TEMPO_MAX: f32 = 180.0;
pub const DEFAULT_TEMPO: f32 = 120.0;

// recommendations only recompute once edits have settled for this long
pub const RECOMMEND_DEBOUNCE_MS: u64 = 1000;

/// One row of the grid.
pub type StepRow = [bool; STEPS_PER_PATTERN];

// ye olde tracks. row index is the identity, this is just the name table
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Kick,
    Snare,
    HiHat,
    Percussion,
    Bass,
    Synth,
    Fx1,
    Fx2,
}

impl TrackKind {
    pub const ALL: [TrackKind; NUM_TRACKS] = [
        TrackKind::Kick,
        TrackKind::Snare,
        TrackKind::HiHat,
        TrackKind::Percussion,
        TrackKind::Bass,
        TrackKind::Synth,
        TrackKind::Fx1,
        TrackKind::Fx2,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn display_name(self) -> &'static str {
        match self {
            TrackKind::Kick => "Kick",
            TrackKind::Snare => "Snare",
            TrackKind::HiHat => "Hi-Hat",
            TrackKind::Percussion => "Percussion",
            TrackKind::Bass => "Bass",
            TrackKind::Synth => "Synth",
            TrackKind::Fx1 => "FX 1",
            TrackKind::Fx2 => "FX 2",
        }
    }

    // the sound library groups samples by these folder names
    pub fn category(self) -> &'static str {
        match self {
            TrackKind::Kick => "kicks",
            TrackKind::Snare => "snares",
            TrackKind::HiHat => "hi_hats",
            TrackKind::Percussion => "percussion",
            TrackKind::Bass => "bass",
            TrackKind::Synth => "synth",
            TrackKind::Fx1 | TrackKind::Fx2 => "fx",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    // grid, resolved by the tui against its cursor
    ToggleCell(u8, u8), // row, col

    // transport
    PlayPress,
    TempoUp,
    TempoDown,

    // effects
    ToggleEffect(EffectKind),
    NextEffect,
    KnobTurn(f32),
    ResetEffects,

    // pattern
    ApplyRecommendation(usize),
    ToggleRecommendations,
    Randomize,
    Clear,
    ExportPattern,
    ImportPattern,
    ExportAudio,
    NextSample(u8), // row

    Quit,
}

#[derive(Clone, Debug)]
pub struct DisplayState {
    pub grid: [StepRow; NUM_TRACKS],
    pub track_names: [&'static str; NUM_TRACKS],
    pub track_sources: [String; NUM_TRACKS], // "kick.wav", "synth 60Hz", "--"
    pub playing_step: Option<u8>, // only while running
    pub playing: bool,
    pub tempo: f32,
    pub effects: Vec<(EffectKind, bool, String)>, // kind, enabled, short param summary
    pub selected_effect: EffectKind,
    pub recommendations: Vec<Recommendation>,
    pub recommendations_enabled: bool,
    pub status: String, // last thing that happened, shown in the footer
}
