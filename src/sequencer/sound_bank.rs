//! Per-track sound sources.
//!
//! A track plays either a decoded WAV or a synthesized hit. Sources are swapped
//! wholesale, never edited in place, so a step always sees one complete
//! source. Decoding happens on short-lived loader threads; results come back
//! over a channel and are installed by [`SoundBank::poll_loads`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender};

use crate::audio::{SampleBuffer, SampleId, Waveform};
use crate::audio_api::{AudioCommand, TriggerParams, TriggerSource};
use crate::shared::{NUM_TRACKS, TrackKind};

#[derive(Debug, thiserror::Error)]
pub enum LoadFailure {
    #[error("no track {0}")]
    NoSuchTrack(usize),
    #[error("could not decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },
    #[error("loader for {0} went away")]
    Disconnected(PathBuf),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SynthParams {
    pub waveform: Waveform,
    pub frequency_hz: f32,
    pub decay_seconds: f32,
}

impl SynthParams {
    pub fn default_for(kind: TrackKind) -> Self {
        let (frequency_hz, decay_seconds) = match kind {
            TrackKind::Kick => (60.0, 0.4),
            TrackKind::Snare => (200.0, 0.2),
            TrackKind::HiHat => (800.0, 0.05),
            TrackKind::Percussion => (300.0, 0.1),
            TrackKind::Bass => (40.0, 0.6),
            TrackKind::Synth => (300.0, 0.3),
            TrackKind::Fx1 => (500.0, 0.2),
            TrackKind::Fx2 => (1200.0, 0.1),
        };
        Self { waveform: waveform_for(kind), frequency_hz, decay_seconds }
    }
}

pub fn waveform_for(kind: TrackKind) -> Waveform {
    match kind {
        TrackKind::Kick | TrackKind::Bass => Waveform::Sine,
        TrackKind::Snare | TrackKind::Percussion => Waveform::Triangle,
        _ => Waveform::Square,
    }
}

#[derive(Clone, Debug, Default)]
pub enum TrackSource {
    #[default]
    Empty,
    Sample {
        id: SampleId,
        buffer: Arc<SampleBuffer>,
        path: PathBuf,
    },
    Synth(SynthParams),
}

impl TrackSource {
    pub fn label(&self) -> String {
        match self {
            TrackSource::Empty => "--".to_string(),
            TrackSource::Sample { path, .. } => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            TrackSource::Synth(p) => format!("synth {:.0}Hz", p.frequency_hz),
        }
    }

    pub fn trigger_source(&self) -> Option<TriggerSource> {
        match self {
            TrackSource::Empty => None,
            TrackSource::Sample { id, .. } => Some(TriggerSource::Sample(*id)),
            TrackSource::Synth(p) => Some(TriggerSource::Synth {
                waveform: p.waveform,
                frequency_hz: p.frequency_hz,
                decay_seconds: p.decay_seconds,
            }),
        }
    }
}

// what a loader thread hands back
struct Loaded {
    track: usize,
    ticket: u64,
    path: PathBuf,
    result: Result<SampleBuffer, String>,
}

/// What one `poll_loads` pass installed.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub commands: Vec<AudioCommand>,
    pub loaded: Vec<(usize, PathBuf)>,
    pub failures: Vec<LoadFailure>,
}

pub struct SoundBank {
    sources: [TrackSource; NUM_TRACKS],
    sample_rate: u32,
    retired: Vec<SampleId>, // replaced samples the engine has not been told about yet
    tickets: [u64; NUM_TRACKS], // latest request per track, older results are dropped
    done_tx: Sender<Loaded>,
    done_rx: Receiver<Loaded>,
}

impl SoundBank {
    pub fn new(sample_rate: u32) -> Self {
        let (done_tx, done_rx) = crossbeam_channel::unbounded();
        Self {
            sources: Default::default(),
            sample_rate,
            retired: Vec::new(),
            tickets: [0; NUM_TRACKS],
            done_tx,
            done_rx,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn source(&self, track: usize) -> Option<&TrackSource> {
        self.sources.get(track)
    }

    pub fn sources(&self) -> &[TrackSource; NUM_TRACKS] {
        &self.sources
    }

    // every track starts out playable
    pub fn install_synth_defaults(&mut self) {
        for kind in TrackKind::ALL {
            self.install_fallback(kind.index());
        }
    }

    fn install_fallback(&mut self, track: usize) {
        if let Some(kind) = TrackKind::from_index(track) {
            self.replace_source(track, TrackSource::Synth(SynthParams::default_for(kind)));
        }
    }

    fn replace_source(&mut self, track: usize, source: TrackSource) {
        if let TrackSource::Sample { id, .. } = std::mem::replace(&mut self.sources[track], source) {
            self.retired.push(id);
        }
    }

    // unregister commands for every sample replaced since the last drain
    fn drain_retired(&mut self) -> impl Iterator<Item = AudioCommand> + '_ {
        self.retired.drain(..).map(AudioCommand::UnregisterSample)
    }

    /// Decode in the background; the source is swapped on a later `poll_loads`.
    pub fn load_sample(&mut self, track: usize, path: &Path) -> Result<(), LoadFailure> {
        if track >= NUM_TRACKS {
            return Err(LoadFailure::NoSuchTrack(track));
        }
        self.tickets[track] += 1;
        let ticket = self.tickets[track];
        let tx = self.done_tx.clone();
        let path = path.to_path_buf();
        let rate = self.sample_rate;

        log::debug!("loading {} for track {track}", path.display());
        thread::spawn(move || {
            let result = SampleBuffer::load_wav(&path, rate).map_err(|e| format!("{e:#}"));
            // receiver gone means the bank was dropped, nothing left to tell
            let _ = tx.send(Loaded { track, ticket, path, result });
        });
        Ok(())
    }

    /// Install whatever the loader threads finished since the last call.
    pub fn poll_loads(&mut self) -> LoadReport {
        let mut report = LoadReport::default();
        while let Ok(done) = self.done_rx.try_recv() {
            if done.ticket != self.tickets[done.track] {
                log::debug!("dropping stale load of {}", done.path.display());
                continue;
            }
            match self.install(done.track, done.path, done.result) {
                Ok((cmd, path)) => {
                    report.commands.push(cmd);
                    report.loaded.push((done.track, path));
                }
                Err(failure) => report.failures.push(failure),
            }
        }
        report.commands.extend(self.drain_retired());
        report
    }

    /// Blocking variant for callers that need the outcome right away: the
    /// registration followed by the unregistration of whatever it replaced.
    /// On failure the synth fallback is still installed and the unregistration
    /// goes out with the next `poll_loads`.
    pub fn load_sample_now(&mut self, track: usize, path: &Path) -> Result<Vec<AudioCommand>, LoadFailure> {
        if track >= NUM_TRACKS {
            return Err(LoadFailure::NoSuchTrack(track));
        }
        // also invalidates anything still in flight for this track
        self.tickets[track] += 1;
        let result = SampleBuffer::load_wav(path, self.sample_rate).map_err(|e| format!("{e:#}"));
        let (cmd, _) = self.install(track, path.to_path_buf(), result)?;
        let mut cmds = vec![cmd];
        cmds.extend(self.drain_retired());
        Ok(cmds)
    }

    fn install(
        &mut self,
        track: usize,
        path: PathBuf,
        result: Result<SampleBuffer, String>,
    ) -> Result<(AudioCommand, PathBuf), LoadFailure> {
        match result {
            Ok(buffer) => {
                let id = SampleId::next();
                let buffer = Arc::new(buffer);
                log::info!("track {track}: {} ({} frames) as {id}", path.display(), buffer.len());
                self.replace_source(track, TrackSource::Sample { id, buffer: Arc::clone(&buffer), path: path.clone() });
                Ok((AudioCommand::RegisterSample { id, buffer }, path))
            }
            Err(reason) => {
                log::warn!("track {track}: {} failed ({reason}), using synth fallback", path.display());
                self.install_fallback(track);
                Err(LoadFailure::Decode { path, reason })
            }
        }
    }

    /// Everything the render engine needs to know about the current samples,
    /// e.g. for a fresh offline engine.
    pub fn registrations(&self) -> Vec<AudioCommand> {
        self.sources
            .iter()
            .filter_map(|s| match s {
                TrackSource::Sample { id, buffer, .. } => {
                    Some(AudioCommand::RegisterSample { id: *id, buffer: Arc::clone(buffer) })
                }
                _ => None,
            })
            .collect()
    }

    /// `offset_frames` delays the hit inside the next rendered block.
    pub fn trigger(&self, track: usize, offset_frames: u32) -> Option<AudioCommand> {
        let source = match self.sources.get(track).and_then(TrackSource::trigger_source) {
            Some(s) => s,
            None => {
                log::warn!("track {track} has no sound loaded, skipping");
                return None;
            }
        };
        Some(AudioCommand::Trigger(TriggerParams { track, source, offset_frames }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn write_wav(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("zoundboard-{}-{name}", std::process::id()));
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..441 {
            writer.write_sample(((i % 50) * 200) as i16).unwrap();
        }
        writer.finalize().unwrap();
        path
    }

    #[test]
    fn default_synth_table() {
        let kick = SynthParams::default_for(TrackKind::Kick);
        assert_eq!((kick.waveform, kick.frequency_hz, kick.decay_seconds), (Waveform::Sine, 60.0, 0.4));
        let hat = SynthParams::default_for(TrackKind::HiHat);
        assert_eq!((hat.waveform, hat.frequency_hz, hat.decay_seconds), (Waveform::Square, 800.0, 0.05));
        assert_eq!(SynthParams::default_for(TrackKind::Percussion).waveform, Waveform::Triangle);
        assert_eq!(SynthParams::default_for(TrackKind::Fx2).frequency_hz, 1200.0);
    }

    #[test]
    fn unloaded_track_does_not_trigger() {
        let bank = SoundBank::new(44100);
        assert!(bank.trigger(0, 0).is_none());
        assert!(bank.trigger(99, 0).is_none());
    }

    #[test]
    fn failed_load_falls_back_to_synth() {
        let mut bank = SoundBank::new(44100);
        let err = bank.load_sample_now(1, Path::new("/definitely/not/here.wav"));
        assert!(matches!(err, Err(LoadFailure::Decode { .. })));
        match bank.source(1) {
            Some(TrackSource::Synth(p)) => assert_eq!(p.frequency_hz, 200.0),
            other => panic!("expected synth fallback, got {other:?}"),
        }
        assert!(matches!(
            bank.trigger(1, 0),
            Some(AudioCommand::Trigger(TriggerParams { track: 1, source: TriggerSource::Synth { .. }, .. }))
        ));
    }

    #[test]
    fn background_load_installs_on_poll() {
        let path = write_wav("bg.wav");
        let mut bank = SoundBank::new(44100);
        bank.install_synth_defaults();
        bank.load_sample(0, &path).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut report = bank.poll_loads();
        while report.loaded.is_empty() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
            report = bank.poll_loads();
        }
        assert_eq!(report.loaded.len(), 1);
        assert!(matches!(report.commands[0], AudioCommand::RegisterSample { .. }));
        assert!(matches!(bank.source(0), Some(TrackSource::Sample { .. })));
        assert_eq!(bank.registrations().len(), 1);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn blocking_load_beats_an_older_background_one() {
        let path = write_wav("stale.wav");
        let mut bank = SoundBank::new(44100);
        bank.load_sample(2, Path::new("/nope.wav")).unwrap();
        bank.load_sample_now(2, &path).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        let report = bank.poll_loads();
        assert!(report.failures.is_empty());
        assert!(matches!(bank.source(2), Some(TrackSource::Sample { .. })));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn replacing_a_sample_unregisters_the_old_one() {
        let path = write_wav("swap.wav");
        let mut bank = SoundBank::new(44100);
        let first = bank.load_sample_now(0, &path).unwrap();
        assert_eq!(first.len(), 1);
        let first_id = match bank.source(0) {
            Some(TrackSource::Sample { id, .. }) => *id,
            other => panic!("expected a sample, got {other:?}"),
        };

        for _ in 0..5 {
            let cmds = bank.load_sample_now(0, &path).unwrap();
            assert!(matches!(cmds[0], AudioCommand::RegisterSample { .. }));
            assert!(matches!(cmds[1], AudioCommand::UnregisterSample(_)));
        }
        assert_eq!(bank.registrations().len(), 1);

        // falling back to the synth retires the sample too, on the next poll
        let live = match bank.source(0) {
            Some(TrackSource::Sample { id, .. }) => *id,
            other => panic!("expected a sample, got {other:?}"),
        };
        assert_ne!(live, first_id);
        assert!(bank.load_sample_now(0, Path::new("/not/a/file.wav")).is_err());
        let report = bank.poll_loads();
        assert!(matches!(report.commands[..], [AudioCommand::UnregisterSample(id)] if id == live));
        let _ = std::fs::remove_file(path);
    }
}
