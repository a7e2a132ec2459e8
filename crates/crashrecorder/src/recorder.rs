//! The running recorder.
//!
//! [`Recorder::run`] subscribes one listener per tracked signal, starts the
//! sampler, and handles triggers one at a time until it's stopped through a
//! [`RecorderHandle`] or the trigger channel closes.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::bus::{EventBus, SignalBus};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::sample::Signal;
use crate::sampler::Sampler;
use crate::state::SharedState;
use crate::storage::SnapshotWriter;
use crate::trigger::TriggerHandler;

/// A cloneable handle that stops a running recorder.
#[derive(Debug, Clone)]
pub struct RecorderHandle {
    shutdown: Arc<watch::Sender<bool>>,
}

impl RecorderHandle {
    /// Signal the recorder to stop.
    ///
    /// A dump already in progress is allowed to finish.
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    /// Check if the stop signal has been sent.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        *self.shutdown.borrow()
    }
}

/// Black-box recorder wired to a signal bus and an event bus.
#[derive(Debug)]
pub struct Recorder<S, E> {
    config: Config,
    state: SharedState,
    signals: Arc<S>,
    events: Arc<E>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl<S, E> Recorder<S, E>
where
    S: SignalBus + 'static,
    E: EventBus + 'static,
{
    /// Create a recorder from validated configuration.
    #[must_use]
    pub fn new(config: Config, signals: Arc<S>, events: Arc<E>) -> Self {
        let state = SharedState::new(config.sampler.capacity);
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            state,
            signals,
            events,
            shutdown: Arc::new(shutdown),
        }
    }

    /// Get a handle that can stop the recorder from another task.
    #[must_use]
    pub fn handle(&self) -> RecorderHandle {
        RecorderHandle {
            shutdown: Arc::clone(&self.shutdown),
        }
    }

    /// Get the shared buffer and cache.
    #[must_use]
    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    /// Run until stopped.
    ///
    /// # Errors
    ///
    /// Returns an error if a bus subscription fails, or [`Error::Fatal`] if
    /// the sampler dies while the recorder is running.
    pub async fn run(self) -> Result<()> {
        let mut listeners = JoinSet::new();
        for signal in Signal::ALL {
            let path = self.config.signals.path(signal);
            let updates = self.signals.subscribe(path).await?;
            listeners.spawn(listen(
                signal,
                updates,
                self.state.clone(),
                self.shutdown.subscribe(),
            ));
        }

        let mut triggers = self
            .events
            .subscribe_topic(&self.config.channels.trigger)
            .await?;

        let sampler = Sampler::new(self.state.clone(), self.config.sample_period());
        let mut sampler_task = tokio::spawn(sampler.run(self.shutdown.subscribe()));

        let mut handler = TriggerHandler::new(
            self.state.clone(),
            SnapshotWriter::new(self.config.output_path()),
            Arc::clone(&self.events),
            self.config.channels.response.clone(),
            self.config.trigger.clone(),
        );

        info!(
            capacity = self.config.sampler.capacity,
            period_ms = self.config.sampler.period_ms,
            trigger = %self.config.channels.trigger,
            output = %self.config.output.path.display(),
            "Recorder started"
        );

        let mut shutdown = self.shutdown.subscribe();
        let mut sampler_exit = None;
        let result = loop {
            if *shutdown.borrow_and_update() {
                break Ok(());
            }

            tokio::select! {
                biased;

                _ = shutdown.changed() => {}
                finished = &mut sampler_task => {
                    let stopping = *self.shutdown.borrow();
                    let outcome = match (&finished, stopping) {
                        (Ok(_), true) => Ok(()),
                        (Ok(samples), false) => Err(Error::fatal(format!(
                            "sampler exited after {samples} samples"
                        ))),
                        (Err(e), _) => Err(Error::fatal(format!("sampler task failed: {e}"))),
                    };
                    sampler_exit = Some(finished);
                    break outcome;
                }
                message = triggers.recv() => match message {
                    Some(payload) => {
                        handler.handle(&payload).await;
                    }
                    None => {
                        warn!("Trigger channel closed");
                        break Ok(());
                    }
                },
            }
        };

        self.shutdown.send_replace(true);
        let finished = match sampler_exit {
            Some(finished) => finished,
            None => sampler_task.await,
        };
        let result = match (result, finished) {
            (Ok(()), Err(e)) => Err(Error::fatal(format!("sampler task failed: {e}"))),
            (result, Ok(samples)) => {
                debug!(samples, "Sampler joined");
                result
            }
            (result, Err(_)) => result,
        };
        while listeners.join_next().await.is_some() {}

        if result.is_ok() {
            info!(retained = self.state.len(), "Recorder stopped");
        }
        result
    }
}

/// Feed updates for one signal into the cache until shutdown.
async fn listen(
    signal: Signal,
    mut updates: mpsc::Receiver<Value>,
    state: SharedState,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow_and_update() {
            break;
        }

        tokio::select! {
            update = updates.recv() => match update {
                Some(value) => {
                    if let Err(e) = state.update_signal(signal, &value) {
                        warn!(error = %e, "Dropping signal update");
                    }
                }
                None => {
                    debug!(%signal, "Signal subscription closed");
                    break;
                }
            },
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
}
