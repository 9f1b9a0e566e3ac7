//! Tracestore Time Axis
//!
//! Strictly increasing sample times stored as constant-step segments. A
//! fixed-step simulation needs a single segment however long it runs; every
//! change of the step size opens a new one, so time to index lookups stay
//! exact across any number of step changes.
//!
//! @version 0.1.0
//! @author Tracestore Development Team

use parking_lot::RwLock;
use std::ops::Range;
use tracestore_common::{Result, TraceError};

// =============================================================================
// Constants
// =============================================================================

/// Relative deviation from the current step still treated as the same step.
const STEP_TOLERANCE: f64 = 1e-6;

/// Fraction of a step by which a lookup may fall short and still reach a sample.
const LOOKUP_EPSILON: f64 = 1e-6;

// =============================================================================
// Time Segment
// =============================================================================

/// Samples `start_index .. start_index + len` at `start_time + k * dt`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSegment {
    pub start_index: usize,
    pub start_time: f64,
    pub dt: f64,
    pub len: usize,
}

impl TimeSegment {
    fn single(start_index: usize, time: f64) -> Self {
        Self {
            start_index,
            start_time: time,
            dt: 0.0,
            len: 1,
        }
    }

    #[inline]
    pub fn time_at(&self, offset: usize) -> f64 {
        self.start_time + self.dt * offset as f64
    }

    pub fn last_time(&self) -> f64 {
        self.time_at(self.len - 1)
    }

    pub fn end_index(&self) -> usize {
        self.start_index + self.len
    }

    /// Offset of the last sample at or before `time`.
    fn floor_offset(&self, time: f64) -> usize {
        if self.dt <= 0.0 || time <= self.start_time {
            return 0;
        }
        let steps = ((time - self.start_time) / self.dt + LOOKUP_EPSILON).floor();
        (steps as usize).min(self.len - 1)
    }
}

// =============================================================================
// Time Axis
// =============================================================================

/// Append-only time axis shared by the writer and all readers.
#[derive(Debug, Default)]
pub struct TimeAxis {
    segments: RwLock<Vec<TimeSegment>>,
}

impl TimeAxis {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the time of the next column and return its index.
    pub fn append(&self, time: f64) -> Result<usize> {
        let mut segments = self.segments.write();

        let Some(last) = segments.last_mut() else {
            if !time.is_finite() {
                return Err(TraceError::NonMonotonicTime {
                    previous: f64::NEG_INFINITY,
                    given: time,
                });
            }
            segments.push(TimeSegment::single(0, time));
            return Ok(0);
        };

        let previous = last.last_time();
        if !time.is_finite() || time <= previous {
            return Err(TraceError::NonMonotonicTime {
                previous,
                given: time,
            });
        }

        let index = last.end_index();
        if last.len == 1 {
            last.dt = time - last.start_time;
            last.len = 2;
        } else if (time - (previous + last.dt)).abs() <= STEP_TOLERANCE * last.dt {
            last.len += 1;
        } else {
            segments.push(TimeSegment::single(index, time));
        }
        Ok(index)
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.segments.read().last().map_or(0, |s| s.end_index())
    }

    pub fn is_empty(&self) -> bool {
        self.segments.read().is_empty()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.read().len()
    }

    pub fn segments(&self) -> Vec<TimeSegment> {
        self.segments.read().clone()
    }

    pub fn first_time(&self) -> Option<f64> {
        self.segments.read().first().map(|s| s.start_time)
    }

    pub fn last_time(&self) -> Option<f64> {
        self.segments.read().last().map(|s| s.last_time())
    }

    /// Time of sample `index`.
    pub fn value(&self, index: usize) -> Result<f64> {
        let segments = self.segments.read();
        let len = segments.last().map_or(0, |s| s.end_index());
        if index >= len {
            return Err(TraceError::IndexOutOfRange { index, len });
        }
        let seg = &segments[segment_for_index(&segments, index)];
        Ok(seg.time_at(index - seg.start_index))
    }

    /// Times of samples `range.start .. range.end`.
    pub fn values(&self, range: Range<usize>) -> Result<Vec<f64>> {
        let segments = self.segments.read();
        let len = segments.last().map_or(0, |s| s.end_index());
        if range.end > len {
            return Err(TraceError::IndexOutOfRange {
                index: range.end.saturating_sub(1),
                len,
            });
        }

        let mut out = Vec::with_capacity(range.len());
        let mut seg = segment_for_index(&segments, range.start);
        for index in range {
            while segments[seg].end_index() <= index {
                seg += 1;
            }
            let s = &segments[seg];
            out.push(s.time_at(index - s.start_index));
        }
        Ok(out)
    }

    /// Index of the last sample at or before `time`.
    ///
    /// Times before the first sample map to 0 and times after the last sample
    /// map to the last index. A sample counts as reached when `time` is within
    /// a millionth of a step of it. An empty axis returns 0.
    pub fn find_time_index(&self, time: f64) -> usize {
        let segments = self.segments.read();
        if segments.is_empty() {
            return 0;
        }
        let pos = segments.partition_point(|s| s.start_time <= time);
        if pos == 0 {
            return 0;
        }
        let seg = &segments[pos - 1];
        seg.start_index + seg.floor_offset(time)
    }

    /// Drop every sample.
    pub fn clear(&self) {
        self.segments.write().clear();
    }

    /// Memory held by the segment table.
    pub fn size_in_bytes(&self) -> usize {
        self.segments.read().capacity() * std::mem::size_of::<TimeSegment>()
    }
}

fn segment_for_index(segments: &[TimeSegment], index: usize) -> usize {
    segments
        .partition_point(|s| s.start_index <= index)
        .saturating_sub(1)
}

// =============================================================================
// Tests
// =============================================================================
