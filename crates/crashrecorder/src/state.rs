//! Shared recorder state.
//!
//! The ring buffer and the signal cache live behind one mutex. Every append,
//! snapshot and post-dump discard goes through it, which is what keeps a
//! sample from being lost or written twice when a dump races the sampler.
//! The lock is never held across an `.await` or while the snapshot file is
//! being written.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::cache::SignalCache;
use crate::error::Result;
use crate::ring::{RingBuffer, Snapshot};
use crate::sample::{Sample, Signal, SignalReadings};

/// The mutable state guarded by [`SharedState`].
#[derive(Debug)]
pub struct RecorderState {
    /// Retained samples.
    pub buffer: RingBuffer<Sample>,
    /// Latest signal values.
    pub cache: SignalCache,
}

/// Cloneable handle to the recorder's buffer and cache.
#[derive(Debug, Clone)]
pub struct SharedState {
    inner: Arc<Mutex<RecorderState>>,
}

impl SharedState {
    /// Create state with an empty buffer of the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RecorderState {
                buffer: RingBuffer::with_capacity(capacity),
                cache: SignalCache::new(),
            })),
        }
    }

    // A panic while holding the lock can't leave the buffer half-updated, so
    // a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, RecorderState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a signal update to the cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the value doesn't fit the signal's slot.
    pub fn update_signal(&self, signal: Signal, value: &Value) -> Result<()> {
        self.lock().cache.update(signal, value)
    }

    /// Current cached readings.
    #[must_use]
    pub fn readings(&self) -> SignalReadings {
        self.lock().cache.snapshot()
    }

    /// Build a sample from the cache at `timestamp` and append it.
    ///
    /// Returns the sample that was recorded.
    pub fn record(&self, timestamp: DateTime<Utc>) -> Sample {
        let mut state = self.lock();
        let sample = Sample::new(timestamp, state.cache.snapshot());
        state.buffer.append(sample);
        sample
    }

    /// Append an already-built sample.
    pub fn append(&self, sample: Sample) {
        self.lock().buffer.append(sample);
    }

    /// Copy the retained samples for a dump.
    #[must_use]
    pub fn begin_dump(&self) -> Snapshot<Sample> {
        self.lock().buffer.snapshot()
    }

    /// Drop the samples captured by `snapshot` once they're safely on disk.
    ///
    /// Samples appended after the snapshot was taken are kept for the next
    /// dump. Returns how many samples were removed.
    pub fn commit_dump(&self, snapshot: &Snapshot<Sample>) -> usize {
        match snapshot.through {
            Some(seq) => self.lock().buffer.discard_through(seq),
            None => 0,
        }
    }

    /// Copy the retained samples, oldest first.
    #[must_use]
    pub fn samples(&self) -> Vec<Sample> {
        self.lock().buffer.drain_to_sequence()
    }

    /// Number of retained samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().buffer.len()
    }

    /// Check if no samples are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_with_speed(speed: f64) -> Sample {
        Sample::now(SignalReadings {
            speed,
            ..SignalReadings::default()
        })
    }

    fn speeds(samples: &[Sample]) -> Vec<f64> {
        samples.iter().map(|s| s.readings.speed).collect()
    }

    #[test]
    fn test_record_uses_cached_readings() {
        let state = SharedState::new(10);
        state.update_signal(Signal::Speed, &json!(12.5)).unwrap();
        state
            .update_signal(Signal::ObstacleWarning, &json!(true))
            .unwrap();

        let sample = state.record(Utc::now());
        assert_eq!(sample.readings.speed, 12.5);
        assert!(sample.readings.obstacle_warning);
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_record_before_any_update_is_default() {
        let state = SharedState::new(10);
        let sample = state.record(Utc::now());
        assert_eq!(sample.readings, SignalReadings::default());
    }

    #[test]
    fn test_commit_dump_clears_snapshotted_samples() {
        let state = SharedState::new(10);
        for i in 0..3 {
            state.append(sample_with_speed(f64::from(i)));
        }

        let snapshot = state.begin_dump();
        assert_eq!(speeds(&snapshot.items), vec![0.0, 1.0, 2.0]);

        assert_eq!(state.commit_dump(&snapshot), 3);
        assert!(state.is_empty());
    }

    #[test]
    fn test_commit_empty_snapshot_is_noop() {
        let state = SharedState::new(10);
        let snapshot = state.begin_dump();
        state.append(sample_with_speed(1.0));
        assert_eq!(state.commit_dump(&snapshot), 0);
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_appends_during_dump_are_accounted_for() {
        let state = SharedState::new(300);
        for i in 0..300 {
            state.append(sample_with_speed(f64::from(i)));
        }

        let snapshot = state.begin_dump();
        for i in 300..305 {
            state.append(sample_with_speed(f64::from(i)));
        }
        state.commit_dump(&snapshot);

        let mut seen = speeds(&snapshot.items);
        seen.extend(speeds(&state.samples()));
        let expected: Vec<f64> = (0..305).map(f64::from).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_abandoned_dump_keeps_samples() {
        let state = SharedState::new(10);
        state.append(sample_with_speed(1.0));
        state.append(sample_with_speed(2.0));

        let _snapshot = state.begin_dump();
        // Write failed, commit never happens.
        assert_eq!(speeds(&state.samples()), vec![1.0, 2.0]);
    }

    #[test]
    fn test_concurrent_record_and_dump_lose_nothing() {
        let state = SharedState::new(100_000);
        let writer = {
            let state = state.clone();
            std::thread::spawn(move || {
                for i in 0..5_000 {
                    state.append(sample_with_speed(f64::from(i)));
                }
            })
        };

        let mut dumped = Vec::new();
        while !writer.is_finished() {
            let snapshot = state.begin_dump();
            state.commit_dump(&snapshot);
            dumped.extend(speeds(&snapshot.items));
        }
        writer.join().unwrap();
        dumped.extend(speeds(&state.samples()));

        let expected: Vec<f64> = (0..5_000).map(f64::from).collect();
        assert_eq!(dumped, expected);
    }
}
