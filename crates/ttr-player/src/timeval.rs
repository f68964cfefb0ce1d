// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Second/microsecond pair arithmetic for record timestamps.
//!
//! Recordings carry absolute capture timestamps but only differences are
//! meaningful, so the operations here are additions, subtractions, and the
//! single speed division. The microsecond field is kept normalized to
//! `[0, 1_000_000)` with an explicit carry/borrow; the seconds field is
//! signed so that differences and drift values can go negative.

use std::ops::{Add, Sub};
use std::time::Duration;

pub const MICROS_PER_SEC: i64 = 1_000_000;

/// A `(seconds, microseconds)` pair, normalized so that
/// `0 <= usec < 1_000_000`.
///
/// The derived lexicographic ordering is correct under that normalization,
/// including for negative values (`-0.5s` is `{ sec: -1, usec: 500_000 }`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timeval {
    pub sec: i64,
    pub usec: i32,
}

impl Timeval {
    pub const ZERO: Timeval = Timeval { sec: 0, usec: 0 };

    /// Build a normalized value from possibly out-of-range parts.
    pub fn new(sec: i64, usec: i64) -> Self {
        let carry = usec.div_euclid(MICROS_PER_SEC);
        Timeval {
            sec: sec + carry,
            usec: usec.rem_euclid(MICROS_PER_SEC) as i32,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.sec == 0 && self.usec == 0
    }

    pub fn is_negative(&self) -> bool {
        self.sec < 0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.sec as f64 + self.usec as f64 / MICROS_PER_SEC as f64
    }

    pub fn from_secs_f64(secs: f64) -> Self {
        let whole = secs.floor();
        Timeval::new(
            whole as i64,
            ((secs - whole) * MICROS_PER_SEC as f64).round() as i64,
        )
    }

    /// Divide by a positive factor, the only place floating point enters
    /// the timing path.
    pub fn div(&self, factor: f64) -> Self {
        Timeval::from_secs_f64(self.as_secs_f64() / factor)
    }

    /// Convert to a `Duration`, clamping negative values to zero.
    pub fn to_duration(&self) -> Duration {
        if self.is_negative() {
            Duration::ZERO
        } else {
            Duration::new(self.sec as u64, (self.usec as u32) * 1_000)
        }
    }

    pub fn from_duration(d: Duration) -> Self {
        Timeval::new(d.as_secs() as i64, d.subsec_micros() as i64)
    }

    /// Clamp negative values to zero.
    pub fn max_zero(&self) -> Self {
        if self.is_negative() {
            Timeval::ZERO
        } else {
            *self
        }
    }
}

impl Add for Timeval {
    type Output = Timeval;

    fn add(self, rhs: Timeval) -> Timeval {
        Timeval::new(self.sec + rhs.sec, self.usec as i64 + rhs.usec as i64)
    }
}

impl Sub for Timeval {
    type Output = Timeval;

    fn sub(self, rhs: Timeval) -> Timeval {
        Timeval::new(self.sec - rhs.sec, self.usec as i64 - rhs.usec as i64)
    }
}
