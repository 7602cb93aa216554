use crate::shared::StepRow;

// Pairwise scores between two rows, each in 0..1.

/// How well two rows fill each other's gaps: positions where exactly one
/// row plays, over positions where either plays.
pub fn complementary(a: &StepRow, b: &StepRow) -> f32 {
    let mut alone = 0u32;
    let mut both = 0u32;
    for (x, y) in a.iter().zip(b) {
        match (x, y) {
            (true, true) => both += 1,
            (true, false) | (false, true) => alone += 1,
            _ => {}
        }
    }
    ratio(alone, alone + both)
}

/// Share of `main`'s hits that have a `support` hit on the same step or
/// one step either side.
pub fn support(support: &StepRow, main: &StepRow) -> f32 {
    let n = main.len();
    let mut backed = 0u32;
    let mut total = 0u32;
    for i in (0..n).filter(|&i| main[i]) {
        total += 1;
        let before = i > 0 && support[i - 1];
        let after = i + 1 < n && support[i + 1];
        if before || support[i] || after {
            backed += 1;
        }
    }
    ratio(backed, total)
}

/// Steps both rows play, over steps either plays.
pub fn reinforcement(a: &StepRow, b: &StepRow) -> f32 {
    let mut both = 0u32;
    let mut either = 0u32;
    for (x, y) in a.iter().zip(b) {
        if *x || *y {
            either += 1;
            if *x && *y {
                both += 1;
            }
        }
    }
    ratio(both, either)
}

fn ratio(num: u32, den: u32) -> f32 {
    if den == 0 { 0.0 } else { num as f32 / den as f32 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Template;

    #[test]
    fn complementary_counts_only_the_steps_played_alone() {
        let kick = Template::FourOnFloor.steps();
        let snare = Template::Backbeat.steps();
        // snare hits 4 and 12 land on kicks
        assert_eq!(complementary(&kick, &snare), 2.0 / 4.0);
        assert_eq!(complementary(&Template::Downbeat.steps(), &snare), 1.0);
    }

    #[test]
    fn support_looks_one_step_either_side() {
        let hats = Template::Offbeat.steps();
        let kick = Template::FourOnFloor.steps();
        // offbeat hats sit two steps from every kick
        assert_eq!(support(&hats, &kick), 0.0);
        assert_eq!(support(&Template::Eighth.steps(), &kick), 1.0);
    }

    #[test]
    fn identical_rows_fully_reinforce() {
        let kick = Template::FourOnFloor.steps();
        assert_eq!(reinforcement(&kick, &kick), 1.0);
        assert_eq!(reinforcement(&kick, &Template::Offbeat.steps()), 0.0);
        assert_eq!(reinforcement(&[false; 16], &[false; 16]), 0.0);
    }
}
