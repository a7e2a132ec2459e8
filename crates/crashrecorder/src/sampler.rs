//! Periodic sampling task.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, trace};

use crate::state::SharedState;

/// Appends one sample from the signal cache to the ring buffer every period.
///
/// The ticker skips missed ticks rather than bursting to catch up, so a stall
/// elsewhere never produces a run of identical samples.
#[derive(Debug, Clone)]
pub struct Sampler {
    state: SharedState,
    period: Duration,
}

impl Sampler {
    /// Create a sampler over `state` ticking every `period`.
    #[must_use]
    pub fn new(state: SharedState, period: Duration) -> Self {
        Self { state, period }
    }

    /// The sampling period.
    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Sample until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// Returns the number of samples taken.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> u64 {
        debug!(
            period_ms = self.period.as_millis(),
            "Starting sampler"
        );

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut taken = 0u64;

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    let sample = self.state.record(Utc::now());
                    taken += 1;
                    trace!(speed = sample.readings.speed, "Sampled");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        debug!(samples = taken, "Sampler stopped");
        taken
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::sample::Signal;

    #[tokio::test(start_paused = true)]
    async fn test_sampler_appends_on_each_tick() {
        let state = SharedState::new(100);
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(Sampler::new(state.clone(), Duration::from_millis(100)).run(rx));

        tokio::time::sleep(Duration::from_millis(450)).await;
        tx.send(true).unwrap();
        let taken = task.await.unwrap();

        // Ticks at 0, 100, 200, 300 and 400 ms.
        assert_eq!(taken, 5);
        assert_eq!(state.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sampler_reads_latest_cache_values() {
        let state = SharedState::new(100);
        let (tx, rx) = watch::channel(false);
        state.update_signal(Signal::Speed, &json!(33.0)).unwrap();

        let task = tokio::spawn(Sampler::new(state.clone(), Duration::from_millis(100)).run(rx));
        tokio::time::sleep(Duration::from_millis(150)).await;
        state.update_signal(Signal::Speed, &json!(44.0)).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        tx.send(true).unwrap();
        task.await.unwrap();

        let speeds: Vec<f64> = state.samples().iter().map(|s| s.readings.speed).collect();
        assert_eq!(speeds, vec![33.0, 33.0, 44.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sampler_respects_capacity() {
        let state = SharedState::new(3);
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(Sampler::new(state.clone(), Duration::from_millis(10)).run(rx));

        tokio::time::sleep(Duration::from_millis(200)).await;
        tx.send(true).unwrap();
        let taken = task.await.unwrap();

        assert!(taken > 3);
        assert_eq!(state.len(), 3);
    }

    #[tokio::test]
    async fn test_sampler_stops_when_sender_dropped() {
        let state = SharedState::new(10);
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(Sampler::new(state, Duration::from_secs(3600)).run(rx));

        drop(tx);
        let taken = task.await.unwrap();
        assert!(taken <= 1);
    }

    #[tokio::test]
    async fn test_sampler_already_stopped() {
        let state = SharedState::new(10);
        let (_tx, rx) = watch::channel(true);
        let taken = Sampler::new(state.clone(), Duration::from_millis(10))
            .run(rx)
            .await;
        assert_eq!(taken, 0);
        assert!(state.is_empty());
    }
}
