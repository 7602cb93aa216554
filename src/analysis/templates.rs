use crate::shared::{STEPS_PER_PATTERN, StepRow};

/// The reference rhythms every row is scored against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Template {
    FourOnFloor,
    Backbeat,
    Offbeat,
    Downbeat,
    Eighth,
    Sixteenth,
    Syncopated,
    Fill,
}

const fn steps(on: &[usize]) -> StepRow {
    let mut out = [false; STEPS_PER_PATTERN];
    let mut i = 0;
    while i < on.len() {
        out[on[i]] = true;
        i += 1;
    }
    out
}

const EVERY_OTHER: StepRow = {
    let mut out = [false; STEPS_PER_PATTERN];
    let mut i = 0;
    while i < STEPS_PER_PATTERN {
        out[i] = true;
        i += 2;
    }
    out
};

impl Template {
    // tie-breaks go to the earlier entry, keep this order
    pub const ALL: [Template; 8] = [
        Template::FourOnFloor,
        Template::Backbeat,
        Template::Offbeat,
        Template::Downbeat,
        Template::Eighth,
        Template::Sixteenth,
        Template::Syncopated,
        Template::Fill,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Template::FourOnFloor => "four-on-floor",
            Template::Backbeat => "backbeat",
            Template::Offbeat => "offbeat",
            Template::Downbeat => "downbeat",
            Template::Eighth => "eighth",
            Template::Sixteenth => "sixteenth",
            Template::Syncopated => "syncopated",
            Template::Fill => "fill",
        }
    }

    pub fn steps(self) -> StepRow {
        match self {
            Template::FourOnFloor => steps(&[0, 4, 8, 12]),
            Template::Backbeat => steps(&[4, 12]),
            Template::Offbeat => steps(&[2, 6, 10, 14]),
            Template::Downbeat => steps(&[0, 8]),
            Template::Eighth => EVERY_OTHER,
            Template::Sixteenth => [true; STEPS_PER_PATTERN],
            Template::Syncopated => steps(&[2, 4, 10, 12]),
            Template::Fill => steps(&[12, 13, 14, 15]),
        }
    }
}

/// Agreement over the positions where either row has a hit; 0 when both are empty.
pub fn similarity(a: &StepRow, b: &StepRow) -> f32 {
    let mut total = 0u32;
    let mut matches = 0u32;
    for (x, y) in a.iter().zip(b) {
        if *x || *y {
            total += 1;
            if x == y {
                matches += 1;
            }
        }
    }
    if total == 0 { 0.0 } else { matches as f32 / total as f32 }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TemplateMatch {
    pub template: Template,
    pub score: f32,
}

/// Best template among `candidates`, the first one wins a tie. None only
/// when there are no candidates.
pub fn best_match_among(row: &StepRow, candidates: &[Template]) -> Option<TemplateMatch> {
    let mut best: Option<TemplateMatch> = None;
    for &template in candidates {
        let score = similarity(row, &template.steps());
        if best.is_none_or(|b| score > b.score) {
            best = Some(TemplateMatch { template, score });
        }
    }
    best
}

pub fn best_template_match(row: &StepRow) -> TemplateMatch {
    best_match_among(row, &Template::ALL)
        .unwrap_or(TemplateMatch { template: Template::FourOnFloor, score: 0.0 })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_rows_are_fully_similar() {
        for t in Template::ALL {
            assert_eq!(similarity(&t.steps(), &t.steps()), 1.0, "{}", t.name());
        }
        let empty = [false; STEPS_PER_PATTERN];
        assert_eq!(similarity(&empty, &empty), 0.0);
    }

    #[test]
    fn similarity_is_symmetric_and_bounded() {
        for a in Template::ALL {
            for b in Template::ALL {
                let s = similarity(&a.steps(), &b.steps());
                assert_eq!(s, similarity(&b.steps(), &a.steps()));
                assert!((0.0..=1.0).contains(&s));
            }
        }
        // four-on-floor vs eighth: 8 positions in play, 4 agree
        assert_eq!(similarity(&Template::FourOnFloor.steps(), &Template::Eighth.steps()), 0.5);
    }

    #[test]
    fn best_match_prefers_the_earlier_template_on_ties() {
        let m = best_template_match(&Template::Backbeat.steps());
        assert_eq!(m.template, Template::Backbeat);
        assert_eq!(m.score, 1.0);

        // all zeros everywhere: first template wins
        let empty = [false; STEPS_PER_PATTERN];
        assert_eq!(best_template_match(&empty).template, Template::FourOnFloor);
        assert!(best_match_among(&empty, &[]).is_none());
    }
}
