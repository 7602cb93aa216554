// The middle layer: owns the pattern, the clock, the sounds, the effects and
// the recommender, turns input into AudioCommands and hands the tui a
// DisplayState. Nothing here touches the audio device.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::analysis::{recommend, Recommendation, RecommendationKind};
use crate::audio_api::AudioCommand;
use crate::loader::SampleLibrary;
use crate::pipeline::effects::{EffectKind, EffectPatch};
use crate::pipeline::export::{self, ExportOutcome, ExportSettings, LoopSnapshot};
use crate::pipeline::persistence::{self, Preferences};
use crate::pipeline::project::{self, ImportError, PatternFile, PATTERN_FILE_PREFIX};
use crate::sequencer::{EffectsChain, LoadFailure, PatternStore, SoundBank, StepClock, TrackSource};
use crate::shared::{DisplayState, InputEvent, TrackKind, DEFAULT_TEMPO, NUM_TRACKS, RECOMMEND_DEBOUNCE_MS};

const TEMPO_STEP: f32 = 5.0;

pub type StepListener = Box<dyn FnMut(u8)>;
pub type RecommendationListener = Box<dyn FnMut(&[Recommendation])>;

pub struct SequencerEngine {
    pattern: PatternStore,
    clock: StepClock,
    sounds: SoundBank,
    effects: EffectsChain,
    library: SampleLibrary,
    project_dir: PathBuf,
    rng: StdRng,

    recommendations: Vec<Recommendation>,
    preferences: Preferences,
    recommend_in: Option<Duration>, // pending debounced recompute

    selected_effect: EffectKind,
    last_step: Option<u8>,
    status: String,

    step_listeners: Vec<StepListener>,
    recommendation_listeners: Vec<RecommendationListener>,

    // audio exports render on a worker thread and report back here
    export_tx: Sender<anyhow::Result<ExportOutcome>>,
    export_rx: Receiver<anyhow::Result<ExportOutcome>>,
    exporting: bool,
}

impl SequencerEngine {
    pub fn new(sample_rate: u32, project_dir: &Path) -> Self {
        let mut sounds = SoundBank::new(sample_rate);
        sounds.install_synth_defaults();
        let (export_tx, export_rx) = crossbeam_channel::unbounded();
        Self {
            pattern: PatternStore::new(),
            clock: StepClock::new(DEFAULT_TEMPO),
            sounds,
            effects: EffectsChain::new(sample_rate),
            library: SampleLibrary::default(),
            project_dir: project_dir.to_path_buf(),
            rng: StdRng::from_entropy(),
            recommendations: Vec::new(),
            preferences: persistence::load_preferences(project_dir),
            recommend_in: None,
            selected_effect: EffectKind::Filter,
            last_step: None,
            status: String::from("ready"),
            step_listeners: Vec::new(),
            recommendation_listeners: Vec::new(),
            export_tx,
            export_rx,
            exporting: false,
        }
    }

    /// Deterministic randomizer and reverb noise.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        let effects_seed = self.rng.r#gen();
        self.effects = EffectsChain::with_rng(self.sounds.sample_rate(), StdRng::seed_from_u64(effects_seed));
        self
    }

    pub fn with_library(mut self, library: SampleLibrary) -> Self {
        self.library = library;
        self
    }

    // called with the column index on every tick, after the triggers went out
    pub fn on_step(mut self, listener: impl FnMut(u8) + 'static) -> Self {
        self.step_listeners.push(Box::new(listener));
        self
    }

    pub fn on_recommendations_changed(mut self, listener: impl FnMut(&[Recommendation]) + 'static) -> Self {
        self.recommendation_listeners.push(Box::new(listener));
        self
    }

    /// Everything a fresh render engine needs: effect resources, params,
    /// route and whatever samples are already in.
    pub fn init(&mut self) -> Vec<AudioCommand> {
        let mut cmds = self.effects.init();
        cmds.extend(self.sounds.registrations());
        cmds
    }

    // accessors
    pub fn pattern(&self) -> &PatternStore {
        &self.pattern
    }

    pub fn clock(&self) -> &StepClock {
        &self.clock
    }

    pub fn sounds(&self) -> &SoundBank {
        &self.sounds
    }

    pub fn effects(&self) -> &EffectsChain {
        &self.effects
    }

    pub fn recommendations(&self) -> &[Recommendation] {
        &self.recommendations
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    // ---- pattern ----

    pub fn toggle_cell(&mut self, row: usize, col: usize) -> Option<bool> {
        let on = self.pattern.toggle_cell(row, col)?;
        self.pattern_changed();
        Some(on)
    }

    pub fn randomize(&mut self) {
        self.pattern.randomize(&mut self.rng);
        self.pattern_changed();
        self.status = String::from("randomized");
    }

    pub fn clear(&mut self) {
        self.pattern.clear();
        self.pattern_changed();
        self.status = String::from("cleared");
    }

    // every grid edit pushes the recompute back a full debounce window
    fn pattern_changed(&mut self) {
        self.recommend_in = Some(Duration::from_millis(RECOMMEND_DEBOUNCE_MS));
    }

    // ---- transport ----

    pub fn start(&mut self) {
        if !self.clock.is_running() {
            self.last_step = None;
        }
        self.clock.start();
    }

    pub fn stop(&mut self) {
        self.clock.stop();
    }

    pub fn toggle_playback(&mut self) -> bool {
        if self.clock.is_running() {
            self.stop();
        } else {
            self.start();
        }
        self.clock.is_running()
    }

    pub fn set_tempo(&mut self, bpm: f32) -> f32 {
        let applied = self.clock.set_tempo(bpm);
        self.status = format!("{applied:.0} bpm");
        applied
    }

    /// Advance time: fire due steps, then run the recommender if edits have
    /// settled. When a long advance makes several steps due at once, each
    /// later one is offset by its distance from the first, so the engine
    /// still plays them an interval apart.
    pub fn tick(&mut self, elapsed: Duration) -> Vec<AudioCommand> {
        let mut cmds = Vec::new();
        let ticks = self.clock.advance(elapsed);
        let batch_start = ticks.first().map_or(Duration::ZERO, |t| t.at);
        let rate = self.sounds.sample_rate() as f64;
        for tick in ticks {
            let offset = ((tick.at - batch_start).as_secs_f64() * rate).round() as u32;
            let col = tick.step as usize;
            for row in self.pattern.active_rows(col) {
                cmds.extend(self.sounds.trigger(row, offset));
            }
            self.last_step = Some(tick.step);
            for listener in self.step_listeners.iter_mut() {
                listener(tick.step);
            }
        }

        if let Some(remaining) = self.recommend_in {
            if elapsed >= remaining {
                self.recommend_in = None;
                self.refresh_recommendations();
            } else {
                self.recommend_in = Some(remaining - elapsed);
            }
        }
        cmds
    }

    // ---- recommendations ----

    pub fn refresh_recommendations(&mut self) {
        self.recommendations = if self.preferences.recommendations_enabled {
            recommend(self.pattern.grid())
        } else {
            Vec::new()
        };
        log::debug!("{} recommendations", self.recommendations.len());
        self.notify_recommendations();
    }

    fn notify_recommendations(&mut self) {
        for listener in self.recommendation_listeners.iter_mut() {
            listener(&self.recommendations);
        }
    }

    pub fn set_recommendations_enabled(&mut self, enabled: bool) {
        self.preferences.recommendations_enabled = enabled;
        self.refresh_recommendations();
    }

    /// Fill and improve suggestions replace their row. Genre hints only
    /// show their text. Either way the acceptance is counted.
    pub fn apply_recommendation(&mut self, rec: &Recommendation) -> bool {
        match (rec.kind, rec.target_track, rec.proposed_pattern) {
            (RecommendationKind::GenreHint, _, _) => {}
            (_, Some(track), Some(steps)) => {
                if !self.pattern.set_row(track, steps) {
                    return false;
                }
                self.pattern_changed();
            }
            _ => return false,
        }
        self.preferences.record_accepted(rec.preference_key());
        self.status = rec.rationale.clone();
        self.recommendations.retain(|r| r != rec);
        self.notify_recommendations();
        true
    }

    pub fn apply_recommendation_at(&mut self, index: usize) -> bool {
        match self.recommendations.get(index).cloned() {
            Some(rec) => self.apply_recommendation(&rec),
            None => false,
        }
    }

    // ---- effects ----

    pub fn set_effect(&mut self, patch: EffectPatch) -> Vec<AudioCommand> {
        self.effects.set_parameter(patch)
    }

    pub fn reset_effects(&mut self) -> Vec<AudioCommand> {
        self.status = String::from("effects reset");
        self.effects.reset()
    }

    fn toggle_effect(&mut self, kind: EffectKind) -> Vec<AudioCommand> {
        let enabled = !self.effects.state().is_enabled(kind);
        self.selected_effect = kind;
        self.status = format!("{} {}", kind.label(), if enabled { "on" } else { "off" });
        self.set_effect(EffectPatch::enable(kind, enabled))
    }

    // the knob moves the selected effect's main parameter, merge clamps it
    fn knob_patch(&self, delta: f32) -> EffectPatch {
        let s = self.effects.state();
        match self.selected_effect {
            EffectKind::Filter => EffectPatch::Filter {
                enabled: None,
                filter_type: None,
                frequency_hz: Some(s.filter.frequency_hz * 2f32.powf(delta * 10.0)),
                q: None,
            },
            EffectKind::Reverb => EffectPatch::Reverb {
                enabled: None,
                wet_level: Some(s.reverb.wet_level + delta),
                decay_seconds: None,
            },
            EffectKind::Delay => EffectPatch::Delay {
                enabled: None,
                time_seconds: Some(s.delay.time_seconds + delta),
                feedback: None,
                mix: None,
            },
            EffectKind::Distortion => EffectPatch::Distortion {
                enabled: None,
                amount: Some(s.distortion.amount + delta * 200.0),
                oversample: None,
            },
        }
    }

    // ---- sounds ----

    pub fn load_sample(&mut self, track: usize, path: &Path) -> Result<(), LoadFailure> {
        self.sounds.load_sample(track, path)
    }

    /// Queue the first library sample for every row that has one.
    pub fn load_default_samples(&mut self) {
        for track in 0..NUM_TRACKS {
            let Some(path) = self.library.default_for(track).map(Path::to_path_buf) else {
                continue;
            };
            if let Err(e) = self.sounds.load_sample(track, &path) {
                log::warn!("{e}");
            }
        }
    }

    fn next_sample(&mut self, track: usize) {
        let current = match self.sounds.source(track) {
            Some(TrackSource::Sample { path, .. }) => Some(path.clone()),
            _ => None,
        };
        let Some(next) = self.library.next_after(track, current.as_deref()).map(Path::to_path_buf) else {
            self.status = String::from("no samples for this track");
            return;
        };
        match self.sounds.load_sample(track, &next) {
            Ok(()) => self.status = format!("loading {}", next.display()),
            Err(e) => self.status = e.to_string(),
        }
    }

    /// Install finished loads, returns their registrations.
    pub fn poll_loads(&mut self) -> Vec<AudioCommand> {
        let report = self.sounds.poll_loads();
        if let Some((track, path)) = report.loaded.last() {
            let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            self.status = format!("track {}: {name}", track + 1);
        }
        if let Some(failure) = report.failures.last() {
            self.status = format!("{failure}, using synth");
        }
        report.commands
    }

    // ---- import / export ----

    /// Validate first, then apply grid, tempo and effects. A rejected file
    /// leaves everything as it was.
    pub fn import_pattern(&mut self, json: &str) -> Result<Vec<AudioCommand>, ImportError> {
        let imported = PatternFile::parse(json)?;
        self.pattern.set_grid(imported.grid);
        if let Some(tempo) = imported.tempo {
            self.clock.set_tempo(tempo);
        }
        let cmds = match imported.effects {
            Some(state) => self.effects.load_state(&state),
            None => Vec::new(),
        };
        self.pattern_changed();
        Ok(cmds)
    }

    pub fn export_pattern(&self) -> PatternFile {
        PatternFile::from_grid(self.pattern.grid(), self.clock.tempo(), self.effects.state())
    }

    fn snapshot(&self, settings: ExportSettings) -> LoopSnapshot {
        LoopSnapshot::capture(
            self.pattern.grid(),
            self.clock.tempo(),
            &self.sounds,
            settings.include_effects.then_some(&self.effects),
        )
    }

    /// Render and write right away, blocking the caller.
    pub fn export_audio(&self, settings: ExportSettings) -> anyhow::Result<ExportOutcome> {
        export::export_audio(&self.project_dir, settings, &self.snapshot(settings))
    }

    /// Same as `export_audio` on a worker thread; the result shows up in
    /// `poll_exports`. Returns false while an earlier export is still running.
    pub fn spawn_audio_export(&mut self, settings: ExportSettings) -> bool {
        if self.exporting {
            return false;
        }
        let snapshot = self.snapshot(settings);
        let dir = self.project_dir.clone();
        let tx = self.export_tx.clone();
        thread::spawn(move || {
            // receiver gone means the engine was dropped
            let _ = tx.send(export::export_audio(&dir, settings, &snapshot));
        });
        self.exporting = true;
        true
    }

    pub fn poll_exports(&mut self) {
        while let Ok(result) = self.export_rx.try_recv() {
            self.exporting = false;
            self.status = match result {
                Ok(outcome) => match outcome.warning {
                    Some(w) => format!("{w}: {}", outcome.path.display()),
                    None => format!("rendered {}", outcome.path.display()),
                },
                Err(e) => {
                    log::warn!("audio export failed: {e:#}");
                    format!("audio export failed: {e}")
                }
            };
        }
    }

    fn write_pattern_file(&mut self) {
        let file_name = export::export_file_name(PATTERN_FILE_PREFIX, "json");
        let path = self.project_dir.join(file_name);
        let result = self
            .export_pattern()
            .to_json()
            .map_err(anyhow::Error::from)
            .and_then(|json| std::fs::write(&path, json).map_err(anyhow::Error::from));
        self.status = match result {
            Ok(()) => format!("saved {}", path.display()),
            Err(e) => {
                log::warn!("pattern export failed: {e:#}");
                format!("export failed: {e}")
            }
        };
    }

    fn read_latest_pattern_file(&mut self) -> Vec<AudioCommand> {
        let Some(path) = project::latest_pattern_export(&self.project_dir) else {
            self.status = String::from("no pattern files to import");
            return Vec::new();
        };
        let json = match std::fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) => {
                self.status = format!("could not read {}: {e}", path.display());
                return Vec::new();
            }
        };
        match self.import_pattern(&json) {
            Ok(cmds) => {
                self.status = format!("loaded {}", path.display());
                cmds
            }
            Err(e) => {
                log::warn!("{}: {e}", path.display());
                self.status = format!("import failed: {e}");
                Vec::new()
            }
        }
    }

    fn write_audio_file(&mut self) {
        self.status = if self.spawn_audio_export(ExportSettings::default()) {
            String::from("rendering...")
        } else {
            String::from("still rendering the last export")
        };
    }

    // ---- session ----

    /// Pick up the pattern from the last run, if there is a usable one.
    pub fn restore_session(&mut self) -> Vec<AudioCommand> {
        let Some(json) = persistence::load_session(&self.project_dir) else {
            return Vec::new();
        };
        match self.import_pattern(&json) {
            Ok(cmds) => cmds,
            Err(e) => {
                log::warn!("ignoring saved session: {e}");
                Vec::new()
            }
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        persistence::save_preferences(&self.project_dir, &self.preferences)?;
        persistence::save_session(&self.project_dir, &self.export_pattern())?;
        Ok(())
    }

    // ---- input ----

    pub fn handle_input(&mut self, event: InputEvent) -> Vec<AudioCommand> {
        match event {
            InputEvent::ToggleCell(row, col) => {
                self.toggle_cell(row as usize, col as usize);
                vec![]
            }
            InputEvent::PlayPress => {
                let running = self.toggle_playback();
                self.status = String::from(if running { "playing" } else { "stopped" });
                vec![]
            }
            InputEvent::TempoUp => {
                self.set_tempo(self.clock.tempo() + TEMPO_STEP);
                vec![]
            }
            InputEvent::TempoDown => {
                self.set_tempo(self.clock.tempo() - TEMPO_STEP);
                vec![]
            }
            InputEvent::ToggleEffect(kind) => self.toggle_effect(kind),
            InputEvent::NextEffect => {
                self.selected_effect = self.selected_effect.next();
                vec![]
            }
            InputEvent::KnobTurn(delta) => {
                let patch = self.knob_patch(delta);
                self.set_effect(patch)
            }
            InputEvent::ResetEffects => self.reset_effects(),
            InputEvent::ToggleRecommendations => {
                let enabled = !self.preferences.recommendations_enabled;
                self.set_recommendations_enabled(enabled);
                self.status = format!("suggestions {}", if enabled { "on" } else { "off" });
                vec![]
            }
            InputEvent::ApplyRecommendation(i) => {
                if !self.apply_recommendation_at(i) {
                    self.status = format!("no recommendation {}", i + 1);
                }
                vec![]
            }
            InputEvent::Randomize => {
                self.randomize();
                vec![]
            }
            InputEvent::Clear => {
                self.clear();
                vec![]
            }
            InputEvent::ExportPattern => {
                self.write_pattern_file();
                vec![]
            }
            InputEvent::ImportPattern => self.read_latest_pattern_file(),
            InputEvent::ExportAudio => {
                self.write_audio_file();
                vec![]
            }
            InputEvent::NextSample(row) => {
                self.next_sample(row as usize);
                vec![]
            }
            InputEvent::Quit => vec![],
        }
    }

    pub fn display_state(&self) -> DisplayState {
        let state = self.effects.state();
        DisplayState {
            grid: *self.pattern.grid(),
            track_names: TrackKind::ALL.map(TrackKind::display_name),
            track_sources: std::array::from_fn(|i| self.sounds.sources()[i].label()),
            playing_step: if self.clock.is_running() { self.last_step } else { None },
            playing: self.clock.is_running(),
            tempo: self.clock.tempo(),
            effects: EffectKind::ORDER.iter().map(|&k| (k, state.is_enabled(k), state.summary(k))).collect(),
            selected_effect: self.selected_effect,
            recommendations: self.recommendations.clone(),
            recommendations_enabled: self.preferences.recommendations_enabled,
            status: self.status.clone(),
        }
    }
}
