//! Core sample types for crashrecorder.
//!
//! This module defines the tracked vehicle signals and the fixed-width,
//! timestamped tuple the sampler records for each tick.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A vehicle signal tracked by the recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// ADAS obstacle detection warning flag.
    ObstacleWarning,
    /// Longitudinal acceleration in m/s^2, signed.
    LongitudinalAcceleration,
    /// Vehicle speed in km/h.
    Speed,
    /// Combustion engine displacement in cm^3, zero when not applicable.
    Displacement,
}

impl Signal {
    /// Every tracked signal, in snapshot column order.
    pub const ALL: [Signal; 4] = [
        Self::ObstacleWarning,
        Self::LongitudinalAcceleration,
        Self::Speed,
        Self::Displacement,
    ];

    /// The default VSS path this signal is subscribed under.
    #[must_use]
    pub const fn default_path(self) -> &'static str {
        match self {
            Self::ObstacleWarning => "Vehicle.ADAS.ObstacleDetection.IsWarning",
            Self::LongitudinalAcceleration => "Vehicle.Acceleration.Longitudinal",
            Self::Speed => "Vehicle.Speed",
            Self::Displacement => "Vehicle.Powertrain.CombustionEngine.Displacement",
        }
    }

    /// The column name used in the snapshot file.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::ObstacleWarning => "distance",
            Self::LongitudinalAcceleration => "accel",
            Self::Speed => "speed",
            Self::Displacement => "displacement",
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ObstacleWarning => write!(f, "obstacle_warning"),
            Self::LongitudinalAcceleration => write!(f, "longitudinal_acceleration"),
            Self::Speed => write!(f, "speed"),
            Self::Displacement => write!(f, "displacement"),
        }
    }
}

/// The latest known value of every tracked signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalReadings {
    /// Obstacle warning flag.
    pub obstacle_warning: bool,
    /// Longitudinal acceleration.
    pub longitudinal_acceleration: f64,
    /// Vehicle speed.
    pub speed: f64,
    /// Engine displacement.
    pub displacement: f64,
}

/// One timestamped reading of the tracked signals.
///
/// Samples are plain values: the sampler builds one per tick and the ring
/// buffer stores copies of it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// When the sample was taken.
    pub timestamp: DateTime<Utc>,

    /// The signal values at that instant.
    #[serde(flatten)]
    pub readings: SignalReadings,
}

impl Sample {
    /// Create a sample from readings taken at `timestamp`.
    #[must_use]
    pub const fn new(timestamp: DateTime<Utc>, readings: SignalReadings) -> Self {
        Self {
            timestamp,
            readings,
        }
    }

    /// Create a sample stamped with the current time.
    #[must_use]
    pub fn now(readings: SignalReadings) -> Self {
        Self::new(Utc::now(), readings)
    }

    /// Unix timestamp in seconds with microsecond precision.
    #[must_use]
    pub fn unix_seconds(&self) -> String {
        let secs = self.timestamp.timestamp();
        let micros = self.timestamp.timestamp_subsec_micros();
        format!("{secs}.{micros:06}")
    }

    /// Render this sample as a snapshot row, in header order.
    #[must_use]
    pub fn to_record(&self) -> [String; 5] {
        [
            self.unix_seconds(),
            self.readings.obstacle_warning.to_string(),
            self.readings.longitudinal_acceleration.to_string(),
            self.readings.speed.to_string(),
            self.readings.displacement.to_string(),
        ]
    }
}
