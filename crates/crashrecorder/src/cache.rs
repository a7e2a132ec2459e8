//! Latest-value cache for the tracked signals.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::sample::{Signal, SignalReadings};

/// One slot per tracked signal, each overwritten independently.
///
/// Slots start at zero/false and hold whatever update arrived last. Nothing
/// ties the slots together, so a snapshot may mix values from slightly
/// different instants.
#[derive(Debug, Clone, Default)]
pub struct SignalCache {
    readings: SignalReadings,
}

impl SignalCache {
    /// Create a cache with every slot at its default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the slot for `signal` with a value delivered by the bus.
    ///
    /// The flag slot takes a boolean (or a number, non-zero meaning set); the
    /// numeric slots take any JSON number. Anything else leaves the slot
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SignalMalformed`] if the value doesn't fit the slot.
    pub fn update(&mut self, signal: Signal, value: &Value) -> Result<()> {
        match signal {
            Signal::ObstacleWarning => {
                self.readings.obstacle_warning = as_flag(signal, value)?;
            }
            Signal::LongitudinalAcceleration => {
                self.readings.longitudinal_acceleration = as_number(signal, value)?;
            }
            Signal::Speed => {
                self.readings.speed = as_number(signal, value)?;
            }
            Signal::Displacement => {
                self.readings.displacement = as_number(signal, value)?;
            }
        }
        Ok(())
    }

    /// Current value of every slot.
    #[must_use]
    pub fn snapshot(&self) -> SignalReadings {
        self.readings
    }
}

fn as_flag(signal: Signal, value: &Value) -> Result<bool> {
    match value {
        Value::Bool(flag) => Ok(*flag),
        Value::Number(n) => n
            .as_f64()
            .map(|v| v != 0.0)
            .ok_or_else(|| Error::signal_malformed(signal, format!("unrepresentable number {n}"))),
        other => Err(Error::signal_malformed(
            signal,
            format!("expected a boolean, got {other}"),
        )),
    }
}

fn as_number(signal: Signal, value: &Value) -> Result<f64> {
    value.as_f64().ok_or_else(|| {
        Error::signal_malformed(signal, format!("expected a number, got {value}"))
    })
}
