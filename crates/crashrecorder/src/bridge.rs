//! JSON-lines bridge between stdio and a [`LocalBus`].
//!
//! Each input line is one JSON object, either a signal update
//! `{"signal": "Vehicle.Speed", "value": 42.0}` or an event
//! `{"topic": "crashdetect/crashed", "payload": {"status": 1}}`. Event payloads
//! may also be given as a pre-encoded string. Messages published on watched
//! topics are written back out as `{"topic": ..., "payload": ...}` lines.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::bus::{EventBus, LocalBus};
use crate::error::Result;

/// One line of bridge input.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum BridgeMessage {
    /// A new value for a signal.
    Signal {
        /// Signal bus path.
        signal: String,
        /// The new value, passed through untouched.
        value: Value,
    },
    /// A message for an event bus topic.
    Event {
        /// Topic to publish on.
        topic: String,
        /// Message payload.
        payload: Value,
    },
}

/// One line of bridge output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BridgeEvent<'a> {
    /// Topic the message was published on.
    pub topic: &'a str,
    /// Decoded payload, or the raw string if it isn't JSON.
    pub payload: Value,
}

/// Parse one input line. Blank lines yield `None`.
///
/// # Errors
///
/// Returns an error if the line isn't a recognised JSON message.
pub fn parse_line(line: &str) -> Result<Option<BridgeMessage>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(line)?))
}

/// Deliver `message` to its subscribers on `bus`.
///
/// # Errors
///
/// Returns an error if publishing an event fails.
pub async fn route(bus: &LocalBus, message: BridgeMessage) -> Result<()> {
    match message {
        BridgeMessage::Signal { signal, value } => {
            let delivered = bus.push_signal(&signal, value).await;
            if delivered == 0 {
                debug!(signal = %signal, "No subscriber for signal");
            }
        }
        BridgeMessage::Event { topic, payload } => {
            let payload = match payload {
                Value::String(raw) => raw,
                other => other.to_string(),
            };
            bus.publish(&topic, payload).await?;
        }
    }
    Ok(())
}

/// Read messages from `reader` and route them until end of input.
///
/// Malformed lines are logged and skipped. Returns the number of messages
/// routed.
///
/// # Errors
///
/// Returns an error if reading from `reader` fails.
pub async fn pump_input<R>(reader: R, bus: LocalBus) -> Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut routed = 0;

    while let Some(line) = lines.next_line().await? {
        match parse_line(&line) {
            Ok(Some(message)) => {
                if let Err(e) = route(&bus, message).await {
                    warn!(error = %e, "Failed to route bridge message");
                } else {
                    routed += 1;
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, line = %line, "Skipping malformed bridge input"),
        }
    }

    debug!(routed, "Bridge input closed");
    Ok(routed)
}

/// Write every message received on `rx` to `writer` as a bridge event line.
///
/// Runs until `rx` closes. Returns the number of lines written.
///
/// # Errors
///
/// Returns an error if writing to `writer` fails.
pub async fn pump_output<W>(mut rx: mpsc::Receiver<String>, topic: &str, mut writer: W) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0;
    while let Some(raw) = rx.recv().await {
        let payload = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
        let mut line = serde_json::to_string(&BridgeEvent { topic, payload })?;
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        written += 1;
    }
    Ok(written)
}
