//! Time utilities for the simulation tick

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Tick rate configuration
pub const SIMULATION_TPS: u32 = 60; // one tick per rendered frame at 60 Hz
pub const TICK_DURATION_MICROS: u64 = 1_000_000 / SIMULATION_TPS as u64;

/// Delta time of a nominal tick (in seconds)
pub fn tick_delta() -> f32 {
    1.0 / SIMULATION_TPS as f32
}

/// Countdown advanced by the simulation clock.
///
/// Replaces host-runtime delayed callbacks: the owner calls [`Countdown::tick`]
/// every frame and applies its transition when it reports completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Countdown {
    duration: f32,
    remaining: f32,
    fired: bool,
}

impl Countdown {
    pub fn new(duration: f32) -> Self {
        let duration = duration.max(0.0);
        Self {
            duration,
            remaining: duration,
            fired: false,
        }
    }

    /// Advance by `dt` seconds. Returns true on the tick the countdown reaches zero.
    pub fn tick(&mut self, dt: f32) -> bool {
        if self.fired {
            return false;
        }
        self.remaining = (self.remaining - dt).max(0.0);
        self.fired = self.remaining <= 0.0;
        self.fired
    }

    pub fn remaining(&self) -> f32 {
        self.remaining
    }

    pub fn elapsed(&self) -> f32 {
        self.duration - self.remaining
    }

    /// Fraction completed in 0..=1
    pub fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            1.0
        } else {
            (self.elapsed() / self.duration).clamp(0.0, 1.0)
        }
    }

    pub fn is_done(&self) -> bool {
        self.fired
    }
}

/// A simple wall-clock timer for measuring frame cost
#[derive(Debug, Clone)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_micros(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    pub fn reset(&mut self) {
        self.start = Instant::now();
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countdown_fires_once() {
        let mut c = Countdown::new(0.1);
        assert!(!c.tick(0.05));
        assert!(c.tick(0.06));
        assert!(c.is_done());
        assert!(!c.tick(0.06), "a finished countdown never fires again");
    }

    #[test]
    fn zero_length_countdown_fires_on_first_tick() {
        let mut c = Countdown::new(0.0);
        assert!(!c.is_done());
        assert!(c.tick(0.016));
        assert!(!c.tick(0.016));
    }

    #[test]
    fn countdown_progress() {
        let mut c = Countdown::new(2.0);
        c.tick(0.5);
        assert!((c.progress() - 0.25).abs() < 1e-6);
        assert!((c.elapsed() - 0.5).abs() < 1e-6);
    }
}
