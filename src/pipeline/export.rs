// Offline rendering of one pass through the pattern, written out with hound.
// Uses the same engine, voices and effect nodes as live playback, it just
// runs them as fast as it can instead of on the output callback.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Local;

use crate::audio::{Engine, StereoFrame};
use crate::audio_api::AudioCommand;
use crate::sequencer::{EffectsChain, Grid, SoundBank, StepClock};
use crate::shared::{NUM_TRACKS, STEPS_PER_PATTERN};

// rendered after the last step so tails ring out
pub const TAIL_SECONDS: f64 = 0.5;
const BLOCK: usize = 512;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Wav,
    Mp3,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Wav => "wav",
            ExportFormat::Mp3 => "mp3",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExportQuality {
    Low,    // 8-bit
    Medium, // 16-bit
    #[default]
    High, // 32-bit float
}

impl ExportQuality {
    fn wav_spec(self, sample_rate: u32) -> hound::WavSpec {
        let (bits_per_sample, sample_format) = match self {
            ExportQuality::Low => (8, hound::SampleFormat::Int),
            ExportQuality::Medium => (16, hound::SampleFormat::Int),
            ExportQuality::High => (32, hound::SampleFormat::Float),
        };
        hound::WavSpec { channels: 2, sample_rate, bits_per_sample, sample_format }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExportSettings {
    pub format: ExportFormat,
    pub quality: ExportQuality,
    pub include_effects: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self { format: ExportFormat::Wav, quality: ExportQuality::High, include_effects: true }
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ExportWarning {
    #[error("{0} encoding is not available, wrote wav instead")]
    UnsupportedFormat(&'static str),
}

#[derive(Debug)]
pub struct ExportOutcome {
    pub path: PathBuf,
    pub frames: usize,
    pub warning: Option<ExportWarning>,
}

/// Everything an offline render needs, owned so it can run on a worker thread
/// while the live pattern keeps changing.
#[derive(Clone, Debug)]
pub struct LoopSnapshot {
    pub grid: Grid,
    pub tempo: f32,
    pub sample_rate: u32,
    setup: Vec<AudioCommand>,
    hits: Vec<Option<AudioCommand>>, // one per track, None for silent rows
}

impl LoopSnapshot {
    pub fn capture(grid: &Grid, tempo: f32, bank: &SoundBank, effects: Option<&EffectsChain>) -> Self {
        let mut setup = bank.registrations();
        if let Some(chain) = effects {
            setup.extend(chain.sync_commands());
        }
        let hits = (0..NUM_TRACKS)
            .map(|row| if grid[row].contains(&true) { bank.trigger(row, 0) } else { None })
            .collect();
        Self { grid: *grid, tempo, sample_rate: bank.sample_rate(), setup, hits }
    }
}

/// Render 16 steps at the snapshot's tempo plus a short tail. Step 0 lands
/// on frame 0.
pub fn render_loop(snapshot: &LoopSnapshot) -> Vec<StereoFrame> {
    let sample_rate = snapshot.sample_rate;
    let mut engine = Engine::new(sample_rate);
    for cmd in snapshot.setup.iter().cloned() {
        engine.handle_cmd(cmd);
    }

    let step_secs = StepClock::new(snapshot.tempo).step_interval_ms() / 1000.0;
    let frame_at = |secs: f64| (secs * sample_rate as f64).round() as usize;
    let total = frame_at(step_secs * STEPS_PER_PATTERN as f64 + TAIL_SECONDS);

    let mut out = vec![StereoFrame::zero(); total];
    let mut pos = 0;
    for step in 0..STEPS_PER_PATTERN {
        let start = frame_at(step_secs * step as f64).min(total);
        render_range(&mut engine, &mut out[pos..start]);
        pos = start;
        for row in (0..NUM_TRACKS).filter(|&r| snapshot.grid[r][step]) {
            if let Some(cmd) = &snapshot.hits[row] {
                engine.handle_cmd(cmd.clone());
            }
        }
    }
    render_range(&mut engine, &mut out[pos..]);
    out
}

fn render_range(engine: &mut Engine, out: &mut [StereoFrame]) {
    for block in out.chunks_mut(BLOCK) {
        engine.render_block(block);
    }
}

pub fn write_wav(path: &Path, frames: &[StereoFrame], quality: ExportQuality, sample_rate: u32) -> anyhow::Result<()> {
    let spec = quality.wav_spec(sample_rate);
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("could not create {}", path.display()))?;
    for f in frames {
        for s in [f.left, f.right] {
            let s = s.clamp(-1.0, 1.0);
            match quality {
                ExportQuality::Low => writer.write_sample((s * i8::MAX as f32) as i8)?,
                ExportQuality::Medium => writer.write_sample((s * i16::MAX as f32) as i16)?,
                ExportQuality::High => writer.write_sample(s)?,
            }
        }
    }
    writer.finalize().context("could not finish the wav file")?;
    Ok(())
}

// zoundboard-2024-05-01T12-00-00-250.wav, millis so quick repeats don't overwrite
pub fn export_file_name(prefix: &str, extension: &str) -> String {
    format!("{prefix}-{}.{extension}", Local::now().format("%Y-%m-%dT%H-%M-%S-%3f"))
}

/// Render and write into `dir`. An encoder we don't have falls back to wav
/// and says so in the outcome.
pub fn export_audio(dir: &Path, settings: ExportSettings, snapshot: &LoopSnapshot) -> anyhow::Result<ExportOutcome> {
    let warning = match settings.format {
        ExportFormat::Wav => None,
        ExportFormat::Mp3 => {
            let w = ExportWarning::UnsupportedFormat(ExportFormat::Mp3.extension());
            log::warn!("{w}");
            Some(w)
        }
    };

    let frames = render_loop(snapshot);
    std::fs::create_dir_all(dir).with_context(|| format!("could not create {}", dir.display()))?;
    let path = dir.join(export_file_name("zoundboard", ExportFormat::Wav.extension()));
    write_wav(&path, &frames, settings.quality, snapshot.sample_rate)?;
    log::info!("exported {} frames to {}", frames.len(), path.display());

    Ok(ExportOutcome { path, frames: frames.len(), warning })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use crate::pipeline::effects::{EffectKind, EffectPatch};

    const RATE: u32 = 8000;

    fn kick_on_one() -> Grid {
        let mut grid = [[false; STEPS_PER_PATTERN]; NUM_TRACKS];
        grid[0][0] = true;
        grid
    }

    fn synth_bank() -> SoundBank {
        let mut bank = SoundBank::new(RATE);
        bank.install_synth_defaults();
        bank
    }

    fn render(grid: &Grid, tempo: f32, bank: &SoundBank, effects: Option<&EffectsChain>) -> Vec<StereoFrame> {
        render_loop(&LoopSnapshot::capture(grid, tempo, bank, effects))
    }

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("zoundboard-export-{}-{name}", std::process::id()))
    }

    #[test]
    fn loop_length_is_sixteen_steps_plus_tail() {
        let frames = render(&kick_on_one(), 120.0, &synth_bank(), None);
        // 16 * 125 ms + 500 ms at 8 kHz
        assert_eq!(frames.len(), 20_000);
        assert!(frames[..100].iter().any(|f| f.peak() > 0.1));
        // kick decays over 0.4 s, nothing after that
        assert!(frames[4_000..].iter().all(|f| f.peak() == 0.0));
    }

    #[test]
    fn empty_grid_renders_silence() {
        let grid = [[false; STEPS_PER_PATTERN]; NUM_TRACKS];
        let frames = render(&grid, 90.0, &synth_bank(), None);
        assert!(frames.iter().all(|f| *f == StereoFrame::zero()));
    }

    #[test]
    fn effects_change_the_render_only_when_included() {
        let bank = synth_bank();
        let mut chain = EffectsChain::with_rng(RATE, StdRng::seed_from_u64(3));
        chain.init();
        chain.set_parameter(EffectPatch::enable(EffectKind::Delay, true));

        let dry = render(&kick_on_one(), 120.0, &bank, None);
        let wet = render(&kick_on_one(), 120.0, &bank, Some(&chain));
        assert_ne!(dry, wet);
        // delay repeats the kick 0.3 s later, past where the dry hit died
        assert!(wet[4_000..].iter().any(|f| f.peak() > 0.0));
    }

    #[test]
    fn qualities_map_to_bit_depths() {
        let dir = scratch_dir("depths");
        std::fs::create_dir_all(&dir).unwrap();
        let frames = vec![StereoFrame::mono(0.5); 64];
        for (quality, bits, format) in [
            (ExportQuality::Low, 8, hound::SampleFormat::Int),
            (ExportQuality::Medium, 16, hound::SampleFormat::Int),
            (ExportQuality::High, 32, hound::SampleFormat::Float),
        ] {
            let path = dir.join(format!("{bits}.wav"));
            write_wav(&path, &frames, quality, RATE).unwrap();
            let reader = hound::WavReader::open(&path).unwrap();
            assert_eq!(reader.spec().bits_per_sample, bits);
            assert_eq!(reader.spec().sample_format, format);
            assert_eq!(reader.duration(), 64);
        }
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn mp3_falls_back_to_wav() {
        let dir = scratch_dir("mp3");
        let settings = ExportSettings { format: ExportFormat::Mp3, ..Default::default() };
        let mut chain = EffectsChain::with_rng(RATE, StdRng::seed_from_u64(1));
        chain.init();
        let snapshot = LoopSnapshot::capture(&kick_on_one(), 120.0, &synth_bank(), Some(&chain));
        let outcome = export_audio(&dir, settings, &snapshot).unwrap();
        assert_eq!(outcome.warning, Some(ExportWarning::UnsupportedFormat("mp3")));
        assert_eq!(outcome.path.extension().and_then(|e| e.to_str()), Some("wav"));
        assert!(outcome.path.exists());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn snapshot_is_independent_of_later_edits() {
        let mut grid = kick_on_one();
        let snapshot = LoopSnapshot::capture(&grid, 120.0, &synth_bank(), None);
        grid[0][0] = false;
        let frames = std::thread::spawn(move || render_loop(&snapshot)).join().unwrap();
        assert!(frames[..100].iter().any(|f| f.peak() > 0.1));
    }

    #[test]
    fn file_names_carry_milliseconds() {
        let name = export_file_name("zoundboard-pattern", "json");
        let stamp = name
            .strip_prefix("zoundboard-pattern-")
            .and_then(|rest| rest.strip_suffix(".json"))
            .unwrap();
        // 2024-05-01T12-00-00-250
        assert_eq!(stamp.len(), 23);
        assert!(stamp[20..].chars().all(|c| c.is_ascii_digit()));
    }
}
