use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::shared::NUM_TRACKS;

pub const SOUNDS_DIR: &str = "sounds";

// folder under sounds/ and the samples offered for each row, first one is the
// default. synth borrows the bass folder, the fx rows borrow percussion
const TRACK_SAMPLES: [(&str, &[&str]); NUM_TRACKS] = [
    ("kicks", &["Kick-Drum-1.wav", "Kick-Drum-2.wav"]),
    ("snares", &["Snare-Drum-1.wav", "Snare-Drum-2.wav", "Ensoniq-ESQ-1-Snare.wav"]),
    ("hi_hats", &["Closed-Hi-Hat-1.wav", "Open-Hi-Hat-1.wav", "Ensoniq-SQ-1-Open-Hi-Hat.wav"]),
    ("percussion", &["Clap-1.wav", "Cowbell-1.wav", "Shaker-1.wav"]),
    (
        "bass",
        &["Bass-C1-16bit.wav", "Bass-E1-16bit.wav", "Bass-G1-16bit.wav", "Alesis-Fusion-Acoustic-Bass-C2.wav"],
    ),
    ("bass", &["Bass-E1-16bit.wav", "Bass-G1-16bit.wav", "Bass-C1-16bit.wav"]),
    ("percussion", &["Cowbell-1.wav", "Shaker-1.wav"]),
    ("percussion", &["Shaker-1.wav", "Clap-1.wav"]),
];

// every .wav directly inside `dir`, sorted by name
pub fn index_wav_in_dir(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).with_context(|| format!("could not read {}", dir.display()))?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_wav(p))
        .collect();
    paths.sort();
    Ok(paths)
}

fn is_wav(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()).is_some_and(|e| e.eq_ignore_ascii_case("wav"))
}

/// The samples each row can cycle through, resolved against a project dir.
/// Rows with nothing on disk just keep their synth voice.
#[derive(Clone, Debug, Default)]
pub struct SampleLibrary {
    by_track: [Vec<PathBuf>; NUM_TRACKS],
}

impl SampleLibrary {
    /// Known names first, in their listed order, then any other wavs found in
    /// the row's folder.
    pub fn scan(project_dir: &Path) -> Self {
        let mut library = Self::default();
        let sounds = project_dir.join(SOUNDS_DIR);
        for (track, (folder, names)) in TRACK_SAMPLES.iter().enumerate() {
            let dir = sounds.join(folder);
            let on_disk = match index_wav_in_dir(&dir) {
                Ok(paths) => paths,
                Err(e) => {
                    log::debug!("{e:#}");
                    continue;
                }
            };
            let mut paths: Vec<PathBuf> =
                names.iter().map(|n| dir.join(n)).filter(|p| on_disk.contains(p)).collect();
            let extras: Vec<PathBuf> = on_disk.into_iter().filter(|p| !paths.contains(p)).collect();
            paths.extend(extras);
            library.by_track[track] = paths;
        }
        library
    }

    pub fn for_track(&self, track: usize) -> &[PathBuf] {
        self.by_track.get(track).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn default_for(&self, track: usize) -> Option<&Path> {
        self.for_track(track).first().map(PathBuf::as_path)
    }

    /// The sample after `current` in the row's list, wrapping around. A path
    /// not in the list (or none) starts from the top.
    pub fn next_after(&self, track: usize, current: Option<&Path>) -> Option<&Path> {
        let paths = self.for_track(track);
        if paths.is_empty() {
            return None;
        }
        let next = current
            .and_then(|c| paths.iter().position(|p| p == c))
            .map_or(0, |i| (i + 1) % paths.len());
        Some(&paths[next])
    }

    pub fn is_empty(&self) -> bool {
        self.by_track.iter().all(Vec::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project_with(files: &[&str]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("zoundboard-loader-{}-{}", std::process::id(), files.len()));
        let _ = std::fs::remove_dir_all(&dir);
        for f in files {
            let path = dir.join(SOUNDS_DIR).join(f);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, b"").unwrap();
        }
        dir
    }

    #[test]
    fn known_samples_come_first_then_extras() {
        let dir = project_with(&[
            "kicks/Kick-Drum-2.wav",
            "kicks/Kick-Drum-1.wav",
            "kicks/aaa-extra.wav",
            "kicks/notes.txt",
        ]);
        let library = SampleLibrary::scan(&dir);
        let names: Vec<_> = library.for_track(0).iter().map(|p| p.file_name().unwrap().to_string_lossy().into_owned()).collect();
        assert_eq!(names, ["Kick-Drum-1.wav", "Kick-Drum-2.wav", "aaa-extra.wav"]);
        assert!(library.for_track(1).is_empty());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn rows_share_folders_and_cycle() {
        let dir = project_with(&["percussion/Clap-1.wav", "percussion/Shaker-1.wav"]);
        let library = SampleLibrary::scan(&dir);
        // fx 2 lists shaker before clap
        let first = library.default_for(7).unwrap().to_path_buf();
        assert!(first.ends_with("Shaker-1.wav"));
        let second = library.next_after(7, Some(&first)).unwrap().to_path_buf();
        assert!(second.ends_with("Clap-1.wav"));
        assert_eq!(library.next_after(7, Some(&second)), Some(first.as_path()));
        assert!(library.next_after(0, None).is_none());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn missing_project_is_an_empty_library() {
        let library = SampleLibrary::scan(Path::new("/definitely/not/here"));
        assert!(library.is_empty());
        assert!(index_wav_in_dir(Path::new("/definitely/not/here")).is_err());
    }
}
