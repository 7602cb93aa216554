use rand::Rng;
use rand::seq::SliceRandom;

use crate::shared::{NUM_TRACKS, STEPS_PER_PATTERN, StepRow, TrackKind};

pub type Grid = [StepRow; NUM_TRACKS];

// bit strings read left to right, step 0 first
const fn row(bits: [u8; STEPS_PER_PATTERN]) -> StepRow {
    let mut out = [false; STEPS_PER_PATTERN];
    let mut i = 0;
    while i < STEPS_PER_PATTERN {
        out[i] = bits[i] != 0;
        i += 1;
    }
    out
}

// pattern banks the randomizer draws from
const KICK_BANK: [StepRow; 3] = [
    row([1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0]),
    row([1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 1, 0]),
    row([1, 0, 0, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 0, 0]),
];
const SNARE_BANK: [StepRow; 3] = [
    row([0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0]),
    row([0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 1, 0, 1, 0]),
    row([0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 0]),
];
const HIHAT_BANK: [StepRow; 3] = [
    row([1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0]),
    row([1; STEPS_PER_PATTERN]),
    row([1, 0, 0, 1, 0, 0, 1, 0, 0, 1, 0, 0, 1, 0, 0, 1]),
];
const PERCUSSION_BANK: [StepRow; 3] = [
    row([0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 0]),
    row([0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0]),
    row([1, 0, 0, 0, 0, 1, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0]),
];
const BASS_BANK: [StepRow; 3] = [
    row([1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]),
    row([1, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0]),
    row([1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0]),
];

/// The 8x16 step grid. Row index is the track.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PatternStore {
    grid: Grid,
}

impl PatternStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn cell(&self, row: usize, col: usize) -> bool {
        self.grid.get(row).and_then(|r| r.get(col)).copied().unwrap_or(false)
    }

    /// Returns the new value, or None when (row, col) is off the grid.
    pub fn toggle_cell(&mut self, row: usize, col: usize) -> Option<bool> {
        let cell = self.grid.get_mut(row)?.get_mut(col)?;
        *cell = !*cell;
        Some(*cell)
    }

    pub fn set_cell(&mut self, row: usize, col: usize, on: bool) -> bool {
        match self.grid.get_mut(row).and_then(|r| r.get_mut(col)) {
            Some(cell) => {
                *cell = on;
                true
            }
            None => false,
        }
    }

    pub fn row(&self, row: usize) -> Option<&StepRow> {
        self.grid.get(row)
    }

    pub fn set_row(&mut self, row: usize, steps: StepRow) -> bool {
        match self.grid.get_mut(row) {
            Some(r) => {
                *r = steps;
                true
            }
            None => false,
        }
    }

    pub fn set_grid(&mut self, grid: Grid) {
        self.grid = grid;
    }

    pub fn clear(&mut self) {
        self.grid = [[false; STEPS_PER_PATTERN]; NUM_TRACKS];
    }

    pub fn is_empty(&self) -> bool {
        self.grid.iter().all(|r| r.iter().all(|c| !c))
    }

    /// Rows with something on the given step, in track order.
    pub fn active_rows(&self, col: usize) -> impl Iterator<Item = usize> + '_ {
        (0..NUM_TRACKS).filter(move |&r| self.cell(r, col))
    }

    pub fn active_columns(&self, row: usize) -> Vec<usize> {
        match self.grid.get(row) {
            Some(r) => r.iter().enumerate().filter(|(_, on)| **on).map(|(c, _)| c).collect(),
            None => Vec::new(),
        }
    }

    /// Fill the grid with a plausible groove: a stock pattern per drum, sparse
    /// quarter-note synth hits, scattered fx, then a humanizing pass.
    pub fn randomize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.clear();
        for kind in TrackKind::ALL {
            let r = kind.index();
            self.grid[r] = match kind {
                TrackKind::Kick => pick(&KICK_BANK, rng),
                TrackKind::Snare => pick(&SNARE_BANK, rng),
                TrackKind::HiHat => pick(&HIHAT_BANK, rng),
                TrackKind::Percussion => pick(&PERCUSSION_BANK, rng),
                TrackKind::Bass => pick(&BASS_BANK, rng),
                TrackKind::Synth => std::array::from_fn(|c| c % 4 == 0 && rng.gen_bool(0.6)),
                TrackKind::Fx1 | TrackKind::Fx2 => std::array::from_fn(|_| rng.gen_bool(0.15)),
            };
        }
        self.humanize(rng);
    }

    fn humanize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for kind in TrackKind::ALL {
            let add_chance = match kind {
                TrackKind::HiHat => 0.1,
                TrackKind::Fx1 | TrackKind::Fx2 => 0.03,
                _ => 0.05,
            };
            for cell in self.grid[kind.index()].iter_mut() {
                if *cell {
                    if rng.gen_bool(0.1) {
                        *cell = false;
                    }
                } else if rng.gen_bool(add_chance) {
                    *cell = true;
                }
            }
        }
    }
}

fn pick<R: Rng + ?Sized>(bank: &[StepRow], rng: &mut R) -> StepRow {
    bank.choose(rng).copied().unwrap_or([false; STEPS_PER_PATTERN])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn toggling_twice_restores_the_grid() {
        let mut store = PatternStore::new();
        store.set_row(2, HIHAT_BANK[0]);
        let before = store.clone();
        assert_eq!(store.toggle_cell(2, 1), Some(true));
        assert_eq!(store.toggle_cell(2, 1), Some(false));
        assert_eq!(store, before);
    }

    #[test]
    fn out_of_range_cells_are_ignored() {
        let mut store = PatternStore::new();
        assert_eq!(store.toggle_cell(8, 0), None);
        assert_eq!(store.toggle_cell(0, 16), None);
        assert!(!store.set_cell(9, 9, true));
        assert!(store.is_empty());
    }

    #[test]
    fn active_rows_and_columns() {
        let mut store = PatternStore::new();
        store.set_row(0, KICK_BANK[0]);
        store.set_cell(1, 4, true);
        assert_eq!(store.active_columns(0), vec![0, 4, 8, 12]);
        assert_eq!(store.active_rows(4).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(store.active_rows(1).count(), 0);
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn randomize_is_repeatable_with_a_seed() {
        let mut a = PatternStore::new();
        let mut b = PatternStore::new();
        a.randomize(&mut StdRng::seed_from_u64(42));
        b.randomize(&mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }
}
