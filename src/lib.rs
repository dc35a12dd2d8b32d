//! # LMS1xx Driver
//!
//! `lms1xx` is an acquisition driver for SICK LMS1xx series laser range finders.
//! It connects to the device over TCP, configures it through CoLa-A telegrams,
//! streams its scans and converts them into [`ScanFrame`]s with host-comparable
//! timestamps. Any failure tears the connection down and starts over after a fixed
//! back-off until the session is stopped.
//!
//! ```no_run
//! use lms1xx::{AcquisitionSession, ConvexHullSynchronizer, DriverConfig, Lms1xxDevice, LogSink, StopSignal};
//!
//! let config = DriverConfig::default();
//! let device = Lms1xxDevice::new(
//!     config.connect_timeout(),
//!     config.request_timeout(),
//!     config.read_timeout(),
//! );
//! let mut session = AcquisitionSession::new(
//!     config,
//!     device,
//!     ConvexHullSynchronizer::new(),
//!     LogSink,
//!     StopSignal::new(),
//! );
//! session.run();
//! ```

extern crate log;

mod answers;
pub mod base;
pub mod clock;
mod cmds;
pub mod config;
pub mod device;
pub mod frame;
mod internals;
pub mod lms1xx;
#[cfg(test)]
mod mock;
pub mod protocol;
pub mod session;
pub mod sink;
pub mod sync;
pub mod types;

pub use crate::base::{Channel, Error, Message, Result};
pub use crate::clock::ClockUnwrapper;
pub use crate::config::DriverConfig;
pub use crate::device::{DeviceStatus, LaserDevice};
pub use crate::frame::{num_values, FrameAssembler, ScanGeometry};
pub use crate::lms1xx::{ColaClient, Lms1xxDevice};
pub use crate::protocol::ColaAProtocol;
pub use crate::session::{AcquisitionSession, SessionState, StopSignal};
pub use crate::sink::{LogSink, ScanSink};
pub use crate::sync::{ClockSynchronizer, ConvexHullSynchronizer};
pub use crate::types::{DataConfig, OutputRange, RawSample, ScanConfig, ScanFrame, Timestamp};
