//! Crash trigger handling.
//!
//! A trigger carries a `status` field. Zero (or `false`) means nothing
//! happened and the message is dropped. Anything else dumps the ring buffer to
//! the snapshot file, clears what was dumped, and acknowledges on the response
//! channel with `{"result": {"status": 0}}`.
//!
//! The buffer is only cleared once the file is safely on disk. A failed write
//! keeps every sample for the next trigger and, unless disabled, acknowledges
//! with [`ACK_FAILURE`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::bus::EventBus;
use crate::config::TriggerConfig;
use crate::error::{Error, Result};
use crate::state::SharedState;
use crate::storage::SnapshotWriter;

/// Acknowledgment status for a successful dump.
pub const ACK_SUCCESS: i64 = 0;

/// Acknowledgment status for a dump whose snapshot couldn't be written.
pub const ACK_FAILURE: i64 = 1;

/// Where the handler is in the dump protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerState {
    /// Waiting for a trigger.
    #[default]
    Idle,
    /// Persisting a snapshot.
    Dumping,
}

/// What a trigger payload asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerDecision {
    /// No event; do nothing.
    Ignore,
    /// An event happened; dump the buffer.
    Dump,
}

impl TriggerDecision {
    /// Decide from a raw trigger payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TriggerParse`] if the payload isn't a JSON object with
    /// a numeric or boolean `status` field.
    pub fn from_payload(payload: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(payload)
            .map_err(|e| Error::trigger_parse(format!("not JSON: {e}")))?;

        let status = value
            .get("status")
            .ok_or_else(|| Error::trigger_parse("missing 'status' field"))?;

        let fired = match status {
            Value::Bool(flag) => *flag,
            Value::Number(n) => n
                .as_f64()
                .map(|v| v != 0.0)
                .ok_or_else(|| Error::trigger_parse(format!("unrepresentable status {n}")))?,
            other => {
                return Err(Error::trigger_parse(format!(
                    "'status' must be a number or boolean, got {other}"
                )))
            }
        };

        Ok(if fired { Self::Dump } else { Self::Ignore })
    }
}

/// Result of handling one trigger.
#[derive(Debug)]
pub enum TriggerOutcome {
    /// The trigger didn't request a dump.
    Ignored,
    /// The snapshot was written and the dumped samples cleared.
    Dumped {
        /// Number of data rows written.
        rows: usize,
    },
    /// The snapshot couldn't be written; the buffer is unchanged.
    Failed {
        /// Why the write failed.
        error: Error,
    },
}

impl TriggerOutcome {
    /// Check if a snapshot was written.
    #[must_use]
    pub fn is_dumped(&self) -> bool {
        matches!(self, Self::Dumped { .. })
    }
}

/// Acknowledgment message published on the response channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgment {
    /// Outcome of the trigger.
    pub result: AckResult,
}

/// Body of an [`Acknowledgment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckResult {
    /// [`ACK_SUCCESS`] or [`ACK_FAILURE`].
    pub status: i64,
}

impl Acknowledgment {
    /// Create an acknowledgment with the given status.
    #[must_use]
    pub const fn new(status: i64) -> Self {
        Self {
            result: AckResult { status },
        }
    }

    /// Serialize to the wire payload.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_payload(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Reacts to trigger messages by dumping the shared ring buffer.
#[derive(Debug)]
pub struct TriggerHandler<E> {
    state: SharedState,
    writer: SnapshotWriter,
    events: Arc<E>,
    response_topic: String,
    policy: TriggerConfig,
    current: TriggerState,
}

impl<E: EventBus> TriggerHandler<E> {
    /// Create a handler dumping `state` through `writer` and acknowledging on
    /// `response_topic`.
    #[must_use]
    pub fn new(
        state: SharedState,
        writer: SnapshotWriter,
        events: Arc<E>,
        response_topic: impl Into<String>,
        policy: TriggerConfig,
    ) -> Self {
        Self {
            state,
            writer,
            events,
            response_topic: response_topic.into(),
            policy,
            current: TriggerState::Idle,
        }
    }

    /// Current protocol state.
    #[must_use]
    pub fn state(&self) -> TriggerState {
        self.current
    }

    /// Handle one raw trigger payload.
    ///
    /// Never fails: malformed payloads are logged and treated as no-ops, and
    /// storage failures are reported in the returned outcome.
    pub async fn handle(&mut self, payload: &str) -> TriggerOutcome {
        let decision = TriggerDecision::from_payload(payload).unwrap_or_else(|e| {
            warn!(error = %e, "Ignoring trigger");
            TriggerDecision::Ignore
        });

        match decision {
            TriggerDecision::Ignore => {
                debug!("Trigger reports no event");
                if self.policy.ack_on_noop {
                    self.acknowledge(ACK_SUCCESS).await;
                }
                TriggerOutcome::Ignored
            }
            TriggerDecision::Dump => self.dump().await,
        }
    }

    async fn dump(&mut self) -> TriggerOutcome {
        self.current = TriggerState::Dumping;
        let snapshot = self.state.begin_dump();
        info!(samples = snapshot.len(), "Crash trigger received, dumping buffer");

        let writer = self.writer.clone();
        let written = tokio::task::spawn_blocking(move || {
            let result = writer.write(&snapshot.items);
            (snapshot, result)
        })
        .await;

        let outcome = match written {
            Ok((snapshot, Ok(rows))) => {
                let cleared = self.state.commit_dump(&snapshot);
                debug!(cleared, retained = self.state.len(), "Buffer cleared");
                self.acknowledge(ACK_SUCCESS).await;
                TriggerOutcome::Dumped { rows }
            }
            Ok((_, Err(error))) => self.fail(error).await,
            Err(join_error) => {
                let error = Error::StorageWrite {
                    path: self.writer.path().to_path_buf(),
                    source: std::io::Error::other(join_error.to_string()),
                };
                self.fail(error).await
            }
        };

        self.current = TriggerState::Idle;
        outcome
    }

    async fn fail(&self, error: Error) -> TriggerOutcome {
        error!(
            error = %error,
            retained = self.state.len(),
            "Snapshot failed, keeping buffer"
        );
        if self.policy.ack_on_failure {
            self.acknowledge(ACK_FAILURE).await;
        }
        TriggerOutcome::Failed { error }
    }

    async fn acknowledge(&self, status: i64) {
        let payload = match Acknowledgment::new(status).to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Failed to encode acknowledgment");
                return;
            }
        };

        if let Err(e) = self.events.publish(&self.response_topic, payload).await {
            warn!(error = %e, topic = %self.response_topic, "Failed to send acknowledgment");
        }
    }
}
