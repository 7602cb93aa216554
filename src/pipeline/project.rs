// the pattern file: what export writes and import reads back
//
// {
//   "version": "1.0",
//   "tempo": 120,
//   "timestamp": "2024-05-01T12:00:00.000Z",
//   "tracks": [[0, 4, 8, 12], [4, 12], [], [], [], [], [], []],
//   "effects": { "filter": {..}, "reverb": {..}, "delay": {..}, "distortion": {..} }
// }
//
// tracks holds the active column indices per row, row 0 is the kick.

use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::effects::EffectsState;
use crate::sequencer::Grid;
use crate::shared::{NUM_TRACKS, STEPS_PER_PATTERN};

pub const FORMAT_VERSION: &str = "1.0";
pub const PATTERN_FILE_PREFIX: &str = "zoundboard-pattern";

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("malformed pattern file: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("pattern has {0} tracks, expected 8")]
    TrackCount(usize),
    #[error("track {track} has step {step}, steps run 0..16")]
    StepOutOfRange { track: usize, step: i64 },
    #[error("tempo {0} is not a usable bpm")]
    BadTempo(f64),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatternFile {
    #[serde(default = "default_version")]
    pub version: String,
    // older files may leave it out; import then keeps the current tempo
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tempo: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub tracks: Vec<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effects: Option<EffectsState>,
}

fn default_version() -> String {
    FORMAT_VERSION.to_string()
}

/// A pattern file that passed validation, ready to apply.
#[derive(Clone, Debug, PartialEq)]
pub struct ImportedPattern {
    pub grid: Grid,
    pub tempo: Option<f32>,
    pub effects: Option<EffectsState>,
}

impl PatternFile {
    pub fn from_grid(grid: &Grid, tempo: f32, effects: &EffectsState) -> Self {
        let tracks = grid
            .iter()
            .map(|row| {
                row.iter().enumerate().filter(|(_, on)| **on).map(|(c, _)| c as i64).collect()
            })
            .collect();
        Self {
            version: FORMAT_VERSION.to_string(),
            tempo: Some(tempo as f64),
            timestamp: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
            tracks,
            effects: Some(*effects),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn parse(json: &str) -> Result<ImportedPattern, ImportError> {
        let file: PatternFile = serde_json::from_str(json)?;
        file.validate()
    }

    /// Checks everything up front so a bad file never half-applies.
    pub fn validate(&self) -> Result<ImportedPattern, ImportError> {
        if self.tracks.len() != NUM_TRACKS {
            return Err(ImportError::TrackCount(self.tracks.len()));
        }
        let tempo = match self.tempo {
            Some(t) if !t.is_finite() || t <= 0.0 => return Err(ImportError::BadTempo(t)),
            other => other.map(|t| t as f32),
        };

        let mut grid = [[false; STEPS_PER_PATTERN]; NUM_TRACKS];
        for (track, steps) in self.tracks.iter().enumerate() {
            for &step in steps {
                if !(0..STEPS_PER_PATTERN as i64).contains(&step) {
                    return Err(ImportError::StepOutOfRange { track, step });
                }
                grid[track][step as usize] = true;
            }
        }
        Ok(ImportedPattern { grid, tempo, effects: self.effects })
    }
}

/// Newest `zoundboard-pattern-*.json` in `dir`. The timestamped names sort
/// chronologically, so the largest name wins.
pub fn latest_pattern_export(dir: &Path) -> Option<PathBuf> {
    std::fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(PATTERN_FILE_PREFIX) && n.ends_with(".json"))
        })
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::effects::{EffectsState, FilterType};

    fn sample_grid() -> Grid {
        let mut grid = [[false; STEPS_PER_PATTERN]; NUM_TRACKS];
        for c in [0, 4, 8, 12] {
            grid[0][c] = true;
        }
        grid[1][4] = true;
        grid[7][15] = true;
        grid
    }

    #[test]
    fn export_then_import_keeps_grid_tempo_and_effects() {
        let mut effects = EffectsState::default();
        effects.filter.enabled = true;
        effects.filter.filter_type = FilterType::Bandpass;
        effects.delay.mix = 0.6;

        let json = PatternFile::from_grid(&sample_grid(), 133.0, &effects).to_json().unwrap();
        let imported = PatternFile::parse(&json).unwrap();
        assert_eq!(imported.grid, sample_grid());
        assert_eq!(imported.tempo, Some(133.0));
        assert_eq!(imported.effects, Some(effects));
    }

    #[test]
    fn tracks_are_column_lists() {
        let file = PatternFile::from_grid(&sample_grid(), 120.0, &EffectsState::default());
        let value = serde_json::to_value(&file).unwrap();
        assert_eq!(value["version"], "1.0");
        assert_eq!(value["tracks"][0], serde_json::json!([0, 4, 8, 12]));
        assert_eq!(value["tracks"][2], serde_json::json!([]));
    }

    #[test]
    fn seven_tracks_are_rejected() {
        let json = r#"{"version":"1.0","tempo":120,"tracks":[[],[],[],[],[],[],[]]}"#;
        assert!(matches!(PatternFile::parse(json), Err(ImportError::TrackCount(7))));
    }

    #[test]
    fn bad_steps_and_tempos_are_rejected() {
        let json = r#"{"tempo":120,"tracks":[[16],[],[],[],[],[],[],[]]}"#;
        assert!(matches!(PatternFile::parse(json), Err(ImportError::StepOutOfRange { track: 0, step: 16 })));
        let json = r#"{"tempo":120,"tracks":[[],[-1],[],[],[],[],[],[]]}"#;
        assert!(matches!(PatternFile::parse(json), Err(ImportError::StepOutOfRange { track: 1, .. })));
        let json = r#"{"tempo":0,"tracks":[[],[],[],[],[],[],[],[]]}"#;
        assert!(matches!(PatternFile::parse(json), Err(ImportError::BadTempo(_))));
        assert!(matches!(PatternFile::parse("{not json"), Err(ImportError::Malformed(_))));
    }

    #[test]
    fn latest_export_is_picked_by_name() {
        let dir = std::env::temp_dir().join(format!("zoundboard-project-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        assert!(latest_pattern_export(&dir).is_none());
        for name in [
            "zoundboard-pattern-2024-05-01T12-00-00.json",
            "zoundboard-pattern-2024-06-01T08-30-00.json",
            "zoundboard-2024-07-01T00-00-00.wav",
        ] {
            std::fs::write(dir.join(name), "{}").unwrap();
        }
        let latest = latest_pattern_export(&dir).unwrap();
        assert!(latest.ends_with("zoundboard-pattern-2024-06-01T08-30-00.json"));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn tempo_and_effects_are_optional() {
        let json = r#"{"tracks":[[0],[],[],[],[],[],[],[]]}"#;
        let imported = PatternFile::parse(json).unwrap();
        assert_eq!(imported.tempo, None);
        assert_eq!(imported.effects, None);
        assert!(imported.grid[0][0]);
    }
}
