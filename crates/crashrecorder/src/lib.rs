//! `crashrecorder` - A black-box recorder for vehicle signals
//!
//! This library samples a fixed set of vehicle signals into a bounded ring
//! buffer and, when a crash trigger arrives, writes the retained window to a
//! CSV snapshot file and acknowledges.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod bridge;
pub mod bus;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod recorder;
pub mod ring;
pub mod sample;
pub mod sampler;
pub mod state;
pub mod storage;
pub mod trigger;

pub use bus::{EventBus, LocalBus, SignalBus};
pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use recorder::{Recorder, RecorderHandle};
pub use ring::RingBuffer;
pub use sample::{Sample, Signal, SignalReadings};
pub use storage::SnapshotWriter;
pub use trigger::{TriggerHandler, TriggerOutcome};
