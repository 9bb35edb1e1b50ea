//! Virtual Time
//!
//! The simulation never reads the wall clock. Time is a monotonic tick
//! counter owned by the caller and passed into every time-dependent operation.
//!
//! # Example
//!
//! ```
//! use trader_events::SimTime;
//!
//! let start = SimTime::new(10);
//! let later = start.advance(14);
//! assert_eq!(later.ticks_since(start), 14);
//! assert_eq!(later.to_string(), "t24");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default number of ticks per simulated day (one tick per hour).
pub const DEFAULT_TICKS_PER_DAY: u64 = 24;

/// A point on the virtual clock, measured in ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimTime(pub u64);

impl SimTime {
    /// The start of the simulation.
    pub const ZERO: SimTime = SimTime(0);

    pub fn new(tick: u64) -> Self {
        Self(tick)
    }

    /// Returns the raw tick count.
    pub fn tick(self) -> u64 {
        self.0
    }

    /// Returns a time `ticks` later than this one.
    pub fn advance(self, ticks: u64) -> Self {
        Self(self.0.saturating_add(ticks))
    }

    /// Ticks elapsed since `earlier`. Zero if `earlier` is in the future.
    pub fn ticks_since(self, earlier: SimTime) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Days elapsed since `earlier` as a fraction.
    pub fn days_since(self, earlier: SimTime, ticks_per_day: u64) -> f64 {
        self.ticks_since(earlier) as f64 / ticks_per_day.max(1) as f64
    }

    /// Converts a day count into a tick span.
    pub fn days_to_ticks(days: u64, ticks_per_day: u64) -> u64 {
        days.saturating_mul(ticks_per_day)
    }

    /// Index of the window of `window_ticks` ticks this time falls into.
    pub fn window_index(self, window_ticks: u64) -> u64 {
        self.0 / window_ticks.max(1)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticks_since_saturates() {
        let early = SimTime::new(5);
        let late = SimTime::new(20);
        assert_eq!(late.ticks_since(early), 15);
        assert_eq!(early.ticks_since(late), 0);
    }

    #[test]
    fn test_days_since() {
        let start = SimTime::ZERO;
        let later = start.advance(36);
        assert!((later.days_since(start, 24) - 1.5).abs() < 1e-12);
        assert_eq!(SimTime::days_to_ticks(90, 24), 2160);
    }

    #[test]
    fn test_window_index() {
        assert_eq!(SimTime::new(0).window_index(168), 0);
        assert_eq!(SimTime::new(167).window_index(168), 0);
        assert_eq!(SimTime::new(168).window_index(168), 1);
        // zero-width windows never divide by zero
        assert_eq!(SimTime::new(7).window_index(0), 7);
    }

    #[test]
    fn test_serializes_as_plain_number() {
        let json = serde_json::to_string(&SimTime::new(42)).unwrap();
        assert_eq!(json, "42");
        let parsed: SimTime = serde_json::from_str("42").unwrap();
        assert_eq!(parsed, SimTime::new(42));
    }
}
