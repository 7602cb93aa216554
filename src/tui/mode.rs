use crate::shared::{NUM_TRACKS, STEPS_PER_PATTERN};

// state local to the tui: where the cursor sits on the grid.
// playing is synced from DisplayState per loop
#[derive(Clone, Debug, Default)]
pub struct TuiState {
    pub cursor_row: u8,
    pub cursor_col: u8,
    pub playing: bool,
}

impl TuiState {
    // wraps at the edges in both directions
    pub fn move_cursor(&mut self, rows: i32, cols: i32) {
        let r = (self.cursor_row as i32 + rows).rem_euclid(NUM_TRACKS as i32);
        let c = (self.cursor_col as i32 + cols).rem_euclid(STEPS_PER_PATTERN as i32);
        self.cursor_row = r as u8;
        self.cursor_col = c as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_wraps_around_the_grid() {
        let mut ts = TuiState::default();
        ts.move_cursor(-1, -1);
        assert_eq!((ts.cursor_row, ts.cursor_col), (7, 15));
        ts.move_cursor(1, 1);
        assert_eq!((ts.cursor_row, ts.cursor_col), (0, 0));
        ts.move_cursor(3, 20);
        assert_eq!((ts.cursor_row, ts.cursor_col), (3, 4));
    }
}
