// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sample timestamps.
//!
//! A [`TimeValue`] splits seconds since the Unix epoch into a whole part and
//! a fractional part so that sub-nanosecond offsets survive on large epoch
//! values. Valid values keep `fraction` in `[0, 1)`; every constructor and
//! arithmetic operator renormalizes.
//!
//! Values with [`TimeStatus::Invalid`] pass through arithmetic unchanged and
//! render as `not-set`.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::time::{SystemTime, UNIX_EPOCH};

/// Whether a timestamp carries a meaningful value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeStatus {
    #[default]
    Valid,
    Invalid,
}

/// Clock source that produced a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeCode {
    Off,
    #[default]
    Cpu,
    Ztc,
    Sdn,
    Sms,
    Dtl,
    Irb,
    Sdds,
}

/// Seconds since the Unix epoch as `whole + fraction`.
#[derive(Debug, Clone, Copy)]
pub struct TimeValue {
    pub whole: f64,
    pub fraction: f64,
    pub status: TimeStatus,
    pub mode: TimeCode,
}

impl TimeValue {
    /// Valid timestamp from whole and fractional seconds, normalized.
    ///
    /// Either part may be negative or carry into the other:
    /// `TimeValue::new(100.75, 2.75)` is `103 + 0.5`.
    pub fn new(whole: f64, fraction: f64) -> Self {
        let mut time = Self {
            whole,
            fraction,
            status: TimeStatus::Valid,
            mode: TimeCode::Cpu,
        };
        time.normalize();
        time
    }

    /// Current system time.
    pub fn now() -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self::new(
            since_epoch.as_secs() as f64,
            f64::from(since_epoch.subsec_nanos()) / 1e9,
        )
    }

    /// Placeholder for packets without a meaningful timestamp.
    pub fn not_set() -> Self {
        Self {
            whole: 0.0,
            fraction: 0.0,
            status: TimeStatus::Invalid,
            mode: TimeCode::Off,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.status == TimeStatus::Valid
    }

    /// Fold any integral part of `fraction` (and any fractional part of
    /// `whole`) so that `whole` is integral and `fraction` is in `[0, 1)`.
    pub fn normalize(&mut self) {
        let carried = self.whole.fract();
        self.whole = self.whole.trunc();

        let sum = self.fraction + carried;
        let mut fraction = sum.fract();
        let mut whole_adjust = sum.trunc();
        if fraction < 0.0 {
            fraction += 1.0;
            whole_adjust -= 1.0;
        }
        // A tiny negative remainder can round up to exactly 1.0 above.
        if fraction >= 1.0 {
            fraction -= 1.0;
            whole_adjust += 1.0;
        }
        self.fraction = fraction;
        self.whole += whole_adjust;
    }

    /// Seconds from `other` to `self`; NaN if either is invalid.
    pub fn diff(&self, other: &TimeValue) -> f64 {
        if !self.is_valid() || !other.is_valid() {
            return f64::NAN;
        }
        (self.whole - other.whole) + (self.fraction - other.fraction)
    }

    /// Timestamp of the sample `samples` positions later at `xdelta` spacing.
    pub fn add_sample_offset(&self, samples: usize, xdelta: f64) -> TimeValue {
        *self + samples as f64 * xdelta
    }

    /// Total order on `(whole, fraction)` for values of equal status.
    pub fn compare(&self, other: &TimeValue) -> Option<Ordering> {
        self.partial_cmp(other)
    }

    /// Seconds as a single float (loses precision on large epochs).
    pub fn as_secs_f64(&self) -> f64 {
        self.whole + self.fraction
    }
}

impl Default for TimeValue {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl Add<f64> for TimeValue {
    type Output = TimeValue;

    fn add(self, offset: f64) -> TimeValue {
        if !self.is_valid() {
            return self;
        }
        let mut result = self;
        result.whole += offset.trunc();
        result.fraction += offset.fract();
        result.normalize();
        result
    }
}

impl Sub<f64> for TimeValue {
    type Output = TimeValue;

    fn sub(self, offset: f64) -> TimeValue {
        self + (-offset)
    }
}

impl AddAssign<f64> for TimeValue {
    fn add_assign(&mut self, offset: f64) {
        *self = *self + offset;
    }
}

impl SubAssign<f64> for TimeValue {
    fn sub_assign(&mut self, offset: f64) {
        *self = *self - offset;
    }
}

impl Sub<TimeValue> for TimeValue {
    type Output = f64;

    fn sub(self, other: TimeValue) -> f64 {
        self.diff(&other)
    }
}

impl PartialEq for TimeValue {
    fn eq(&self, other: &Self) -> bool {
        self.status == other.status && self.whole == other.whole && self.fraction == other.fraction
    }
}

impl PartialOrd for TimeValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.status != other.status {
            return None;
        }
        match self.whole.partial_cmp(&other.whole)? {
            Ordering::Equal => self.fraction.partial_cmp(&other.fraction),
            ord => Some(ord),
        }
    }
}

impl fmt::Display for TimeValue {
    /// `YYYY:MM:DD::HH:MM:SS.ffffff` in UTC, microseconds rounded.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return write!(f, "not-set");
        }
        let mut seconds = self.whole as i64;
        let mut micros = (self.fraction * 1e6).round() as i64;
        if micros >= 1_000_000 {
            micros -= 1_000_000;
            seconds += 1;
        }
        match chrono::DateTime::from_timestamp(seconds, 0) {
            Some(datetime) => write!(
                f,
                "{}.{:06}",
                datetime.format("%Y:%m:%d::%H:%M:%S"),
                micros
            ),
            None => write!(f, "{}.{:06}", seconds, micros),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_parts(time: TimeValue, whole: f64, fraction: f64) {
        assert_eq!(time.whole, whole, "whole of {:?}", time);
        assert_eq!(time.fraction, fraction, "fraction of {:?}", time);
    }

    #[test]
    fn test_normalize_positive_carry() {
        assert_parts(TimeValue::new(100.25, 0.25), 100.0, 0.5);
        assert_parts(TimeValue::new(100.75, 0.75), 101.0, 0.5);
        assert_parts(TimeValue::new(100.0, 2.5), 102.0, 0.5);
        assert_parts(TimeValue::new(100.75, 2.75), 103.0, 0.5);
    }

    #[test]
    fn test_normalize_negative_borrow() {
        assert_parts(TimeValue::new(100.0, -0.25), 99.0, 0.75);
        assert_parts(TimeValue::new(100.0, -3.125), 96.0, 0.875);
        assert_parts(TimeValue::new(100.5, -0.125), 100.0, 0.375);
        assert_parts(TimeValue::new(100.125, -0.5), 99.0, 0.625);
        assert_parts(TimeValue::new(100.75, -2.5), 98.0, 0.25);
    }

    #[test]
    fn test_normalize_keeps_range() {
        let mut rng = fastrand::Rng::with_seed(0x5167);
        for _ in 0..1000 {
            let whole = rng.f64() * 2e9 - 1e9;
            let fraction = rng.f64() * 20.0 - 10.0;
            let time = TimeValue::new(whole, fraction);
            assert!(time.fraction >= 0.0 && time.fraction < 1.0, "{:?}", time);
            assert_eq!(time.whole, time.whole.trunc());
        }
    }

    #[test]
    fn test_arithmetic() {
        let base = TimeValue::new(100.0, 0.5);
        assert_parts(base + 1.75, 102.0, 0.25);
        assert_parts(base + -1.75, 98.0, 0.75);
        assert_parts(base - 1.25, 99.0, 0.25);
        assert_parts(base - -4.875, 105.0, 0.375);
        assert_eq!(TimeValue::new(105.0, 0.375) - TimeValue::new(96.0, 0.5), 8.875);

        let mut t = base;
        t += 0.75;
        assert_parts(t, 101.0, 0.25);
        t -= 0.75;
        assert_eq!(t, base);
    }

    #[test]
    fn test_add_then_sub_is_identity() {
        let base = TimeValue::new(1_451_933_967.0, 0.25);
        for offset in [0.0, 0.5, -0.5, 1.125, -7.75, 3600.0625] {
            assert_eq!((base + offset) - offset, base, "offset {}", offset);
        }
        assert_eq!(base - base, 0.0);
    }

    #[test]
    fn test_ordering() {
        let a = TimeValue::new(100.0, 0.25);
        let b = TimeValue::new(100.0, 0.5);
        let c = TimeValue::new(101.0, 0.0);
        assert!(a < b && b < c && a < c);
        assert!(c >= b && b <= b);
        assert_eq!(a.compare(&a), Some(Ordering::Equal));
        assert_eq!(a.compare(&TimeValue::not_set()), None);
    }

    #[test]
    fn test_to_string() {
        assert_eq!(TimeValue::new(0.0, 0.0).to_string(), "1970:01:01::00:00:00.000000");
        assert_eq!(
            TimeValue::new(1_451_933_967.0, 0.2893569).to_string(),
            "2016:01:04::18:59:27.289357"
        );
        // Rounding carries into the seconds field.
        assert_eq!(
            TimeValue::new(59.0, 0.9999996).to_string(),
            "1970:01:01::00:01:00.000000"
        );
    }

    #[test]
    fn test_invalid_short_circuits() {
        let unset = TimeValue::not_set();
        assert_eq!(unset + 5.0, unset);
        assert_eq!(unset - 5.0, unset);
        assert!(unset.diff(&TimeValue::new(1.0, 0.0)).is_nan());
        assert_eq!(unset.to_string(), "not-set");
    }

    #[test]
    fn test_sample_offset() {
        let t = TimeValue::new(10.0, 0.0);
        assert_parts(t.add_sample_offset(4, 0.25), 11.0, 0.0);
        assert_parts(t.add_sample_offset(4096, 0.0625), 266.0, 0.0);
        assert_eq!(t.add_sample_offset(0, 0.5), t);
    }
}
