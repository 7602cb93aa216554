use std::time::Duration;

use crate::shared::{DEFAULT_TEMPO, STEPS_PER_PATTERN, TEMPO_MAX, TEMPO_MIN};

/// One step firing. `at` is the logical time since `start()`, every track
/// triggered by this tick shares it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tick {
    pub step: u8,
    pub at: Duration,
}

// Sixteenth-note clock. Nothing runs by itself: the host loop hands it the
// wall time that passed and gets back every tick that came due.
#[derive(Clone, Debug)]
pub struct StepClock {
    tempo_bpm: f32,
    running: bool,
    current_step: u8,
    until_next: Duration, // countdown to the pending tick
    since_start: Duration,
}

impl Default for StepClock {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPO)
    }
}

impl StepClock {
    pub fn new(tempo_bpm: f32) -> Self {
        let mut clock = Self {
            tempo_bpm: DEFAULT_TEMPO,
            running: false,
            current_step: 0,
            until_next: Duration::ZERO,
            since_start: Duration::ZERO,
        };
        clock.set_tempo(tempo_bpm);
        clock
    }

    pub fn tempo(&self) -> f32 {
        self.tempo_bpm
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn current_step(&self) -> u8 {
        self.current_step
    }

    /// A sixteenth note at the current tempo: `(60_000 / bpm) / 4`.
    pub fn step_interval_ms(&self) -> f64 {
        15_000.0 / self.tempo_bpm as f64
    }

    pub fn step_interval(&self) -> Duration {
        Duration::from_secs_f64(self.step_interval_ms() / 1000.0)
    }

    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
        self.current_step = 0;
        self.since_start = Duration::ZERO;
        // first tick lands one interval from now
        self.until_next = self.step_interval();
    }

    // keeps current_step where it was
    pub fn stop(&mut self) {
        self.running = false;
        self.until_next = Duration::ZERO;
    }

    /// Clamps into the supported range and returns what was applied.
    /// Non-finite input is ignored.
    pub fn set_tempo(&mut self, bpm: f32) -> f32 {
        if !bpm.is_finite() {
            return self.tempo_bpm;
        }
        self.tempo_bpm = bpm.clamp(TEMPO_MIN, TEMPO_MAX);
        if self.running {
            // the pending step is not fired early or twice, it just waits a
            // full new interval
            self.until_next = self.step_interval();
        }
        self.tempo_bpm
    }

    /// Move the clock forward, returning every tick whose deadline passed, in order.
    pub fn advance(&mut self, elapsed: Duration) -> Vec<Tick> {
        let mut ticks = Vec::new();
        if !self.running {
            return ticks;
        }

        let mut remaining = elapsed;
        while remaining >= self.until_next {
            remaining -= self.until_next;
            self.since_start += self.until_next;
            ticks.push(Tick { step: self.current_step, at: self.since_start });
            self.current_step = (self.current_step + 1) % STEPS_PER_PATTERN as u8;
            self.until_next = self.step_interval();
        }
        self.until_next -= remaining;
        self.since_start += remaining;
        ticks
    }
}
