// everything the app keeps between runs lives under <project_dir>/.zoundboard/
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::pipeline::project::PatternFile;

pub const ZOUNDBOARD_DIR: &str = ".zoundboard";
const PREFERENCES_FILE: &str = "preferences.json";
const SESSION_FILE: &str = "session.json";
pub const LOG_FILE: &str = "zoundboard.log";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub recommendations_enabled: bool,
    // how often each kind of suggestion was accepted, keyed like "track_snares_backbeat"
    #[serde(default)]
    pub accepted_counts: BTreeMap<String, u32>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self { recommendations_enabled: true, accepted_counts: BTreeMap::new() }
    }
}

impl Preferences {
    pub fn record_accepted(&mut self, key: String) {
        *self.accepted_counts.entry(key).or_insert(0) += 1;
    }
}

pub fn app_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(ZOUNDBOARD_DIR)
}

pub fn log_path(project_dir: &Path) -> PathBuf {
    app_dir(project_dir).join(LOG_FILE)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("could not create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("could not write {}", path.display()))?;
    Ok(())
}

// a missing or unreadable file just means defaults
pub fn load_preferences(project_dir: &Path) -> Preferences {
    let path = app_dir(project_dir).join(PREFERENCES_FILE);
    let Ok(data) = std::fs::read_to_string(&path) else {
        return Preferences::default();
    };
    serde_json::from_str(&data).unwrap_or_else(|e| {
        log::warn!("ignoring {}: {e}", path.display());
        Preferences::default()
    })
}

pub fn save_preferences(project_dir: &Path, prefs: &Preferences) -> anyhow::Result<()> {
    write_json(&app_dir(project_dir).join(PREFERENCES_FILE), prefs)
}

/// The pattern that was up when the app last quit, as raw json so the
/// normal import path validates it.
pub fn load_session(project_dir: &Path) -> Option<String> {
    std::fs::read_to_string(app_dir(project_dir).join(SESSION_FILE)).ok()
}

pub fn save_session(project_dir: &Path, pattern: &PatternFile) -> anyhow::Result<()> {
    write_json(&app_dir(project_dir).join(SESSION_FILE), pattern)
}
