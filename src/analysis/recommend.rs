//! Rule-table recommender.
//!
//! Reads the grid, never writes it. Empty tracks get a fixed suggestion per
//! track type, rows that match no template well get nudged toward the closest
//! template their track usually plays, and a genre hint tops up short lists.

use super::relationships::{complementary, reinforcement, support};
use super::templates::{best_match_among, best_template_match, Template, TemplateMatch};
use crate::sequencer::Grid;
use crate::shared::{NUM_TRACKS, STEPS_PER_PATTERN, StepRow, TrackKind};

const MAX_RECOMMENDATIONS: usize = 3;
const IMPROVE_BELOW: f32 = 0.5;
const GOOD_ENOUGH: f32 = 0.7;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecommendationKind {
    FillEmptyTrack,
    ImproveTrack,
    GenreHint,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Genre {
    House,
    HipHop,
    Trap,
    Techno,
    Electronic,
}

impl Genre {
    pub fn name(self) -> &'static str {
        match self {
            Genre::House => "house",
            Genre::HipHop => "hip-hop",
            Genre::Trap => "trap",
            Genre::Techno => "techno",
            Genre::Electronic => "electronic",
        }
    }

    fn hint(self) -> (&'static str, f32) {
        match self {
            Genre::House => ("Try adding a four-on-the-floor kick and offbeat hi-hats for a house feel", 0.8),
            Genre::HipHop => ("Add syncopated hi-hats and a strong backbeat for a hip-hop groove", 0.75),
            Genre::Trap => ("Try adding rapid hi-hat rolls and 808-style bass for a trap sound", 0.7),
            Genre::Techno => ("Add a steady kick and minimal percussion for a techno vibe", 0.75),
            Genre::Electronic => ("Try adding more rhythmic variation to make your pattern more interesting", 0.6),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub target_track: Option<usize>,
    pub proposed_pattern: Option<StepRow>,
    pub pattern_name: Option<&'static str>,
    pub genre: Option<Genre>,
    pub rationale: String,
    pub relevance: f32,
}

impl Recommendation {
    fn for_track(kind: RecommendationKind, track: TrackKind, steps: StepRow, name: &'static str, relevance: f32) -> Self {
        let kind_name = track.category().replace('_', " ");
        let rationale = match kind {
            RecommendationKind::ImproveTrack => format!("Try a {name} pattern for {kind_name}"),
            _ => format!("Add {name} {kind_name}"),
        };
        Self {
            kind,
            target_track: Some(track.index()),
            proposed_pattern: Some(steps),
            pattern_name: Some(name),
            genre: None,
            rationale,
            relevance,
        }
    }

    /// Counter key for accepted suggestions, e.g. `track_hi_hats_eighth notes`.
    pub fn preference_key(&self) -> String {
        let track = self.target_track.and_then(TrackKind::from_index).map(TrackKind::category).unwrap_or("unknown");
        let pattern = self.pattern_name.unwrap_or("");
        match self.kind {
            RecommendationKind::FillEmptyTrack => format!("track_{track}_{pattern}"),
            RecommendationKind::ImproveTrack => format!("improve_{track}_{pattern}"),
            RecommendationKind::GenreHint => {
                format!("genre_{}", self.genre.unwrap_or(Genre::Electronic).name())
            }
        }
    }
}

/// Pairwise scores for the three pairings the rules care about, present
/// only when both rows have hits.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Relationships {
    pub kick_snare: Option<f32>,
    pub hihat_kick: Option<f32>,
    pub bass_kick: Option<f32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Characteristics {
    pub density: [f32; NUM_TRACKS],
    pub matches: [TemplateMatch; NUM_TRACKS],
    pub empty_tracks: Vec<usize>,
    pub relationships: Relationships,
}

impl Characteristics {
    fn has_hits(&self, kind: TrackKind) -> bool {
        self.density[kind.index()] > 0.0
    }

    fn best(&self, kind: TrackKind) -> Template {
        self.matches[kind.index()].template
    }
}

pub fn characteristics(grid: &Grid) -> Characteristics {
    let density = std::array::from_fn(|r| {
        grid[r].iter().filter(|c| **c).count() as f32 / STEPS_PER_PATTERN as f32
    });
    let matches = std::array::from_fn(|r| best_template_match(&grid[r]));
    let empty_tracks = (0..NUM_TRACKS).filter(|&r| grid[r].iter().all(|c| !c)).collect();

    let [kick, snare, hihat, _, bass, ..] = grid;
    let present = |row: &StepRow| row.iter().any(|c| *c);
    let pair = |a: &StepRow, b: &StepRow, score: fn(&StepRow, &StepRow) -> f32| {
        (present(a) && present(b)).then(|| score(a, b))
    };
    let relationships = Relationships {
        kick_snare: pair(kick, snare, complementary),
        hihat_kick: pair(hihat, kick, support),
        bass_kick: pair(bass, kick, reinforcement),
    };

    Characteristics { density, matches, empty_tracks, relationships }
}

pub fn detect_genre(c: &Characteristics) -> Genre {
    let density = |k: TrackKind| c.density[k.index()];
    let total: f32 = c.density.iter().sum();

    if c.best(TrackKind::Kick) == Template::FourOnFloor && density(TrackKind::HiHat) > 0.5 {
        Genre::House
    } else if c.best(TrackKind::Snare) == Template::Backbeat && density(TrackKind::Kick) < 0.3 {
        Genre::HipHop
    } else if density(TrackKind::HiHat) > 0.7 && c.best(TrackKind::Kick) == Template::Downbeat {
        Genre::Trap
    } else if c.best(TrackKind::Kick) == Template::FourOnFloor && total < 2.0 {
        Genre::Techno
    } else {
        Genre::Electronic
    }
}

// suggestion for a track with nothing on it
fn fill_empty(kind: TrackKind, grid: &Grid, c: &Characteristics) -> Recommendation {
    use Template::*;
    let kick = c.has_hits(TrackKind::Kick);
    let snare = c.has_hits(TrackKind::Snare);

    let (steps, name, relevance) = match kind {
        TrackKind::Kick if c.has_hits(TrackKind::HiHat) => (FourOnFloor.steps(), "four-on-the-floor", 0.9),
        TrackKind::Kick if snare => (Downbeat.steps(), "downbeat", 0.85),
        TrackKind::Kick => (FourOnFloor.steps(), "four-on-the-floor", 0.7),
        TrackKind::Snare if kick => (Backbeat.steps(), "backbeat", 0.9),
        TrackKind::Snare => (Offbeat.steps(), "offbeat", 0.7),
        TrackKind::HiHat if kick && snare => (Sixteenth.steps(), "sixteenth notes", 0.95),
        TrackKind::HiHat if kick => (Eighth.steps(), "eighth notes", 0.85),
        TrackKind::HiHat => (Offbeat.steps(), "offbeat", 0.7),
        TrackKind::Percussion => (Syncopated.steps(), "syncopated", 0.75),
        TrackKind::Bass if kick => (grid[TrackKind::Kick.index()], "follow kick", 0.9),
        TrackKind::Bass => (Downbeat.steps(), "downbeat", 0.7),
        TrackKind::Synth => {
            let busy: Vec<f32> = c.density.iter().copied().filter(|d| *d > 0.0).collect();
            let mean = if busy.is_empty() { 0.0 } else { busy.iter().sum::<f32>() / busy.len() as f32 };
            if mean > 0.5 {
                (Downbeat.steps(), "sparse melody", 0.8)
            } else {
                (Syncopated.steps(), "syncopated melody", 0.75)
            }
        }
        TrackKind::Fx1 | TrackKind::Fx2 => (Fill.steps(), "fill", 0.6),
    };
    Recommendation::for_track(RecommendationKind::FillEmptyTrack, kind, steps, name, relevance)
}

// templates each track type is usually played with
fn usual_templates(kind: TrackKind) -> &'static [Template] {
    use Template::*;
    match kind {
        TrackKind::Kick => &[FourOnFloor, Downbeat],
        TrackKind::Snare => &[Backbeat, Offbeat, Fill],
        TrackKind::HiHat => &[Eighth, Sixteenth, Offbeat],
        TrackKind::Percussion => &[Syncopated, Fill, Offbeat],
        TrackKind::Bass | TrackKind::Synth | TrackKind::Fx1 | TrackKind::Fx2 => &[],
    }
}

fn improve(kind: TrackKind, row: &StepRow) -> Option<Recommendation> {
    // tracks without usual templates have nothing to suggest
    let best = best_match_among(row, usual_templates(kind))?;
    if best.score > GOOD_ENOUGH {
        return None;
    }
    let relevance = 0.7 + 0.2 * (1.0 - best.score);
    Some(Recommendation::for_track(
        RecommendationKind::ImproveTrack,
        kind,
        best.template.steps(),
        best.template.name(),
        relevance,
    ))
}

fn genre_hint(c: &Characteristics) -> Recommendation {
    let genre = detect_genre(c);
    let (text, relevance) = genre.hint();
    Recommendation {
        kind: RecommendationKind::GenreHint,
        target_track: None,
        proposed_pattern: None,
        pattern_name: None,
        genre: Some(genre),
        rationale: text.to_string(),
        relevance,
    }
}

/// Up to three suggestions, most relevant first. Same grid, same list.
pub fn recommend(grid: &Grid) -> Vec<Recommendation> {
    let c = characteristics(grid);
    if c.empty_tracks.len() == NUM_TRACKS {
        return Vec::new();
    }

    let mut recs: Vec<Recommendation> = Vec::new();
    for &r in &c.empty_tracks {
        if let Some(kind) = TrackKind::from_index(r) {
            recs.push(fill_empty(kind, grid, &c));
        }
    }

    for kind in TrackKind::ALL {
        let r = kind.index();
        if c.empty_tracks.contains(&r) || c.matches[r].score >= IMPROVE_BELOW {
            continue;
        }
        if let Some(rec) = improve(kind, &grid[r]) {
            recs.push(rec);
        }
    }

    if recs.len() < 2 {
        recs.push(genre_hint(&c));
    }

    // stable, so equal scores keep track order
    recs.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
    recs.truncate(MAX_RECOMMENDATIONS);
    recs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_with(rows: &[(TrackKind, StepRow)]) -> Grid {
        let mut grid = [[false; STEPS_PER_PATTERN]; NUM_TRACKS];
        for (kind, steps) in rows {
            grid[kind.index()] = *steps;
        }
        grid
    }

    fn full_kit(kick: Template, snare: Template, hihat: Template) -> Grid {
        grid_with(&[
            (TrackKind::Kick, kick.steps()),
            (TrackKind::Snare, snare.steps()),
            (TrackKind::HiHat, hihat.steps()),
            (TrackKind::Percussion, Template::Syncopated.steps()),
            (TrackKind::Bass, Template::Downbeat.steps()),
            (TrackKind::Synth, Template::Downbeat.steps()),
            (TrackKind::Fx1, Template::Fill.steps()),
            (TrackKind::Fx2, Template::Fill.steps()),
        ])
    }

    #[test]
    fn empty_grid_gets_nothing() {
        assert!(recommend(&[[false; STEPS_PER_PATTERN]; NUM_TRACKS]).is_empty());
    }

    #[test]
    fn kick_only_suggests_eighth_note_hats() {
        let grid = grid_with(&[(TrackKind::Kick, Template::FourOnFloor.steps())]);
        let recs = recommend(&grid);
        assert_eq!(recs.len(), 3);

        // snare backbeat and bass follow-kick tie at 0.9 and keep track order
        assert_eq!(recs[0].target_track, Some(TrackKind::Snare.index()));
        assert_eq!(recs[0].pattern_name, Some("backbeat"));
        assert_eq!(recs[1].pattern_name, Some("follow kick"));
        assert_eq!(recs[1].proposed_pattern, Some(Template::FourOnFloor.steps()));

        let hats = &recs[2];
        assert_eq!(hats.kind, RecommendationKind::FillEmptyTrack);
        assert_eq!(hats.target_track, Some(TrackKind::HiHat.index()));
        assert_eq!(hats.proposed_pattern, Some(Template::Eighth.steps()));
        assert_eq!(hats.relevance, 0.85);
        assert_eq!(hats.preference_key(), "track_hi_hats_eighth notes");
    }

    #[test]
    fn kick_and_snare_suggest_sixteenth_hats() {
        let grid = grid_with(&[
            (TrackKind::Kick, Template::FourOnFloor.steps()),
            (TrackKind::Snare, Template::Backbeat.steps()),
        ]);
        let recs = recommend(&grid);
        assert_eq!(recs[0].target_track, Some(TrackKind::HiHat.index()));
        assert_eq!(recs[0].proposed_pattern, Some(Template::Sixteenth.steps()));
        assert_eq!(recs[0].relevance, 0.95);
    }

    #[test]
    fn recommend_is_deterministic() {
        let grid = grid_with(&[
            (TrackKind::Snare, Template::Offbeat.steps()),
            (TrackKind::Synth, Template::Eighth.steps()),
        ]);
        assert_eq!(recommend(&grid), recommend(&grid));
    }

    #[test]
    fn messy_row_gets_an_improve_suggestion() {
        let mut grid = full_kit(Template::FourOnFloor, Template::Backbeat, Template::Eighth);
        // snare on 1, 3 and 9: nothing fits better than half
        grid[TrackKind::Snare.index()] = [false; STEPS_PER_PATTERN];
        for c in [1, 3, 9] {
            grid[TrackKind::Snare.index()][c] = true;
        }
        let recs = recommend(&grid);
        let improve = recs.iter().find(|r| r.kind == RecommendationKind::ImproveTrack).unwrap();
        assert_eq!(improve.target_track, Some(TrackKind::Snare.index()));
        assert_eq!(improve.pattern_name, Some("backbeat")); // first of the all-zero ties
        assert!((improve.relevance - 0.9).abs() < 1e-6);
        assert!(improve.preference_key().starts_with("improve_snares_"));
        // only one specific suggestion, so a genre hint tops up
        assert!(recs.iter().any(|r| r.kind == RecommendationKind::GenreHint));
    }

    #[test]
    fn genre_rules() {
        let house = characteristics(&full_kit(Template::FourOnFloor, Template::Backbeat, Template::Sixteenth));
        assert_eq!(detect_genre(&house), Genre::House);

        let hip_hop = characteristics(&full_kit(Template::Downbeat, Template::Backbeat, Template::Eighth));
        assert_eq!(detect_genre(&hip_hop), Genre::HipHop);

        let techno = characteristics(&full_kit(Template::FourOnFloor, Template::Offbeat, Template::Offbeat));
        assert_eq!(detect_genre(&techno), Genre::Techno);

        let recs = recommend(&full_kit(Template::FourOnFloor, Template::Backbeat, Template::Sixteenth));
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].genre, Some(Genre::House));
        assert_eq!(recs[0].preference_key(), "genre_house");
    }

    #[test]
    fn relationships_need_both_rows() {
        let kick_only = characteristics(&grid_with(&[(TrackKind::Kick, Template::FourOnFloor.steps())]));
        assert_eq!(kick_only.relationships, Relationships::default());

        let both = characteristics(&grid_with(&[
            (TrackKind::Kick, Template::FourOnFloor.steps()),
            (TrackKind::Bass, Template::FourOnFloor.steps()),
        ]));
        assert_eq!(both.relationships.bass_kick, Some(1.0));
    }
}
