// Copyright (C) 2022-2025 Michael Herstine <sp1ff@pobox.com>
//
// This file is part of gelf-tracing.
//
// gelf-tracing is free software: you can redistribute it and/or modify it under the terms of the
// GNU General Public License as published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// mpdpopm is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even
// the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details.
//
// You should have received a copy of the GNU General Public License along with mpdpopm.  If not,
// see <http://www.gnu.org/licenses/>.

//! GELF timestamp handling.
//!
//! GELF wants "seconds since UNIX epoch with optional decimal places for milliseconds"; i.e. a
//! decimal number, not an RFC 3339 string and not an integer. [`unix_timestamp`] performs that
//! encoding. [`TimestampDeduper`] optionally disambiguates records that carry identical source
//! timestamps, a common occurrence when a burst of events lands within the clock's resolution
//! and one that makes Graylog's sort order for the burst arbitrary.

use chrono::prelude::*;

use std::sync::atomic::{AtomicI64, Ordering};

/// Microseconds per millisecond; the deduper will never push a synthetic timestamp further than
/// this past its source.
const MAX_NUDGE_MICROS: i64 = 1_000;

/// Express `timestamp` as decimal seconds since the UNIX epoch, UTC.
///
/// Microsecond resolution; an `f64` carries about half a microsecond of precision at
/// present-day epoch-seconds magnitudes, so nothing is lost on the wire.
pub fn unix_timestamp(timestamp: DateTime<Utc>) -> f64 {
    timestamp.timestamp_micros() as f64 / 1_000_000_f64
}

/// Produce collision-free, order-preserving timestamps.
///
/// A single shared "last emitted tick" (in microseconds) is advanced by compare-and-swap, so any
/// number of threads may feed records through one instance without locks. A record whose source
/// timestamp is ahead of everything seen so far passes through untouched; a record that collides
/// with (or trails) the last emitted tick is nudged one microsecond past it, capped at one
/// millisecond past its own source time. Output ticks are therefore monotonic non-decreasing,
/// and pairwise-distinct for up to a thousand records sharing one source timestamp.
pub struct TimestampDeduper {
    last_micros: AtomicI64,
}

impl std::default::Default for TimestampDeduper {
    fn default() -> Self {
        TimestampDeduper {
            last_micros: AtomicI64::new(i64::MIN),
        }
    }
}

impl TimestampDeduper {
    pub fn new() -> TimestampDeduper {
        TimestampDeduper::default()
    }

    /// Map a source timestamp to the tick that should be written to the wire.
    pub fn next(&self, timestamp: DateTime<Utc>) -> DateTime<Utc> {
        let source = timestamp.timestamp_micros();
        let mut prev = self.last_micros.load(Ordering::Relaxed);
        loop {
            let next = if source > prev {
                source
            } else {
                // Collision (or a source behind an already-emitted tick): nudge forward, but
                // never more than a millisecond past the true time.
                (prev + 1).min(source + MAX_NUDGE_MICROS)
            };
            match self.last_micros.compare_exchange_weak(
                prev,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    return if next == source {
                        timestamp
                    } else {
                        Utc.timestamp_nanos(next * 1_000)
                    }
                }
                Err(seen) => prev = seen,
            }
        }
    }
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn test_unix_timestamp() {
        let t = Utc.timestamp_opt(0, 0).unwrap();
        assert_eq!(unix_timestamp(t), 0.0);

        let t = Utc.timestamp_opt(1_651_232_123, 456_000_000).unwrap();
        assert_eq!(unix_timestamp(t), 1_651_232_123.456);
    }

    #[test]
    fn test_distinct_timestamps_advance() {
        let deduper = TimestampDeduper::new();
        let t0 = Utc.timestamp_opt(1_651_232_123, 0).unwrap();
        let t1 = Utc.timestamp_opt(1_651_232_124, 0).unwrap();
        // Non-colliding sources pass through untouched.
        assert_eq!(deduper.next(t0), t0);
        assert_eq!(deduper.next(t1), t1);
    }

    #[test]
    fn test_colliding_timestamps_are_nudged() {
        let deduper = TimestampDeduper::new();
        let t = Utc.timestamp_opt(1_651_232_123, 0).unwrap();

        let out: Vec<DateTime<Utc>> = (0..100).map(|_| deduper.next(t)).collect();

        assert_eq!(out[0], t);
        for pair in out.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        for synth in &out {
            let skew = synth.timestamp_micros() - t.timestamp_micros();
            assert!((0..=MAX_NUDGE_MICROS).contains(&skew));
        }
    }

    #[test]
    fn test_nudge_is_bounded() {
        let deduper = TimestampDeduper::new();
        let t = Utc.timestamp_opt(1_651_232_123, 0).unwrap();
        for _ in 0..2_000 {
            let synth = deduper.next(t);
            assert!(synth.timestamp_micros() - t.timestamp_micros() <= MAX_NUDGE_MICROS);
        }
    }

    #[test]
    fn test_concurrent_callers() {
        use std::sync::{Arc, Mutex};

        let deduper = Arc::new(TimestampDeduper::new());
        let t = Utc.timestamp_opt(1_651_232_123, 0).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let deduper = Arc::clone(&deduper);
                let seen = Arc::clone(&seen);
                std::thread::spawn(move || {
                    let local: Vec<i64> = (0..100)
                        .map(|_| deduper.next(t).timestamp_micros())
                        .collect();
                    seen.lock().unwrap().extend(local);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut all = seen.lock().unwrap().clone();
        all.sort_unstable();
        let n = all.len();
        all.dedup();
        // 800 colliding records: all pairwise-distinct, none more than 1ms past the source.
        assert_eq!(n, all.len());
        assert!(all
            .iter()
            .all(|&micros| (0..=MAX_NUDGE_MICROS).contains(&(micros - t.timestamp_micros()))));
    }
}
