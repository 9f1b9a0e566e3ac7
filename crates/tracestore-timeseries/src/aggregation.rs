//! Tracestore Aggregation
//!
//! Summary values produced by range queries: `HiLo` min/max envelopes and
//! time-weighted `IntervalAverage`s. Both are plain values; caches store them
//! per bucket and queries fold them together.
//!
//! @version 0.1.0
//! @author Tracestore Development Team

use std::fmt;

// =============================================================================
// HiLo
// =============================================================================

/// Minimum and maximum of a set of samples.
///
/// Only finite samples contribute. A summary of zero finite samples is
/// [`HiLo::EMPTY`], whose bounds are both NaN. Negative zero is stored as
/// positive zero so that merging is order independent bit for bit.
#[derive(Debug, Clone, Copy)]
pub struct HiLo {
    lo: f32,
    hi: f32,
}

impl HiLo {
    pub const EMPTY: HiLo = HiLo {
        lo: f32::NAN,
        hi: f32::NAN,
    };

    /// Envelope of two bounds, in either order. Non-finite bounds give `EMPTY`.
    pub fn new(a: f32, b: f32) -> Self {
        if !Self::is_valid_number(a) || !Self::is_valid_number(b) {
            return Self::EMPTY;
        }
        let (a, b) = (a + 0.0, b + 0.0);
        if a <= b {
            Self { lo: a, hi: b }
        } else {
            Self { lo: b, hi: a }
        }
    }

    pub fn from_value(value: f32) -> Self {
        Self::new(value, value)
    }

    #[inline]
    pub fn is_valid_number(value: f32) -> bool {
        value.is_finite()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lo.is_nan()
    }

    pub fn lo(&self) -> f32 {
        self.lo
    }

    pub fn hi(&self) -> f32 {
        self.hi
    }

    /// `hi - lo`, NaN when empty.
    pub fn range(&self) -> f32 {
        self.hi - self.lo
    }

    pub fn contains(&self, value: f32) -> bool {
        !self.is_empty() && self.lo <= value && value <= self.hi
    }

    /// Fold one sample into an optional running summary.
    pub fn merge_value(prev: Option<HiLo>, value: f32) -> HiLo {
        let prev = prev.unwrap_or(Self::EMPTY);
        if !Self::is_valid_number(value) {
            return prev;
        }
        Self::merge(prev, Self::from_value(value))
    }

    pub fn merge(a: HiLo, b: HiLo) -> HiLo {
        if a.is_empty() {
            return b;
        }
        if b.is_empty() {
            return a;
        }
        HiLo {
            lo: if b.lo < a.lo { b.lo } else { a.lo },
            hi: if b.hi > a.hi { b.hi } else { a.hi },
        }
    }

    pub fn merge_many(items: &[HiLo]) -> HiLo {
        items.iter().fold(Self::EMPTY, |acc, item| Self::merge(acc, *item))
    }

    /// Summary of a slice of samples.
    pub fn of_slice(values: &[f32]) -> HiLo {
        values
            .iter()
            .fold(Self::EMPTY, |acc, v| Self::merge_value(Some(acc), *v))
    }
}

impl Default for HiLo {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl PartialEq for HiLo {
    fn eq(&self, other: &Self) -> bool {
        self.lo.to_bits() == other.lo.to_bits() && self.hi.to_bits() == other.hi.to_bits()
    }
}

impl Eq for HiLo {}

impl fmt::Display for HiLo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "[empty]")
        } else {
            write!(f, "[{}, {}]", self.lo, self.hi)
        }
    }
}

// =============================================================================
// Interval Average
// =============================================================================

/// Time-weighted mean of a signal over `[start, stop]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalAverage {
    mean: f64,
    start: f64,
    stop: f64,
}

impl IntervalAverage {
    /// `None` for empty or inverted spans.
    pub fn new(mean: f64, start: f64, stop: f64) -> Option<Self> {
        if stop > start {
            Some(Self { mean, start, stop })
        } else {
            None
        }
    }

    /// Build from an integral over the span.
    pub fn from_integral(integral: f64, start: f64, stop: f64) -> Option<Self> {
        Self::new(integral / (stop - start), start, stop)
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn stop(&self) -> f64 {
        self.stop
    }

    pub fn span(&self) -> f64 {
        self.stop - self.start
    }

    pub fn integral(&self) -> f64 {
        self.mean * self.span()
    }

    /// Span-weighted merge. The result ends where `other` ends.
    pub fn append(&mut self, other: &IntervalAverage) {
        let (s1, s2) = (self.span(), other.span());
        self.mean = (self.mean * s1 + other.mean * s2) / (s1 + s2);
        self.stop = other.stop;
    }

    /// Merge two optional averages, keeping whichever exists.
    pub fn merge(acc: Option<IntervalAverage>, next: Option<IntervalAverage>) -> Option<IntervalAverage> {
        match (acc, next) {
            (Some(mut a), Some(b)) => {
                a.append(&b);
                Some(a)
            }
            (a, None) => a,
            (None, b) => b,
        }
    }
}

impl fmt::Display for IntervalAverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mean {} over [{}, {}]", self.mean, self.start, self.stop)
    }
}

// =============================================================================
// Linear Integration
// =============================================================================

/// Integral over `[a, b]` of the line through `(t0, v0)` and `(t1, v1)`.
///
/// `[a, b]` is clipped to `[t0, t1]`. Segments touching a non-finite sample
/// contribute nothing.
pub fn linear_integral(t0: f64, t1: f64, v0: f64, v1: f64, a: f64, b: f64) -> f64 {
    let (a, b) = (a.max(t0), b.min(t1));
    if b <= a || t1 <= t0 || !v0.is_finite() || !v1.is_finite() {
        return 0.0;
    }
    let slope = (v1 - v0) / (t1 - t0);
    let va = v0 + slope * (a - t0);
    let vb = v0 + slope * (b - t0);
    0.5 * (va + vb) * (b - a)
}

// =============================================================================
// Tests
// =============================================================================
