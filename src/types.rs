use std::time::{SystemTime, UNIX_EPOCH};

/// A host-comparable point in time, in nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    nanos: u64,
}

impl Timestamp {
    /// The current wall-clock time. Times before the epoch clamp to zero.
    pub fn now() -> Timestamp {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        Timestamp { nanos }
    }

    pub fn from_nanos(nanos: u64) -> Timestamp {
        Timestamp { nanos }
    }

    pub fn as_nanos(&self) -> u64 {
        self.nanos
    }

    /// Converts from seconds, rounding to the nearest nanosecond.
    /// Negative and non-finite inputs clamp to zero.
    pub fn from_secs_f64(secs: f64) -> Timestamp {
        let nanos = if secs.is_finite() && secs > 0.0 {
            (secs * 1e9).round() as u64
        } else {
            0
        };
        Timestamp { nanos }
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.nanos as f64 * 1e-9
    }
}

/// Scan configuration as reported by the device (`LMPscancfg`).
///
/// Angles are in 1/10000 degree, the frequency in 1/100 Hz.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanConfig {
    pub scanning_frequency: u32,
    pub angle_resolution: u32,
    pub start_angle: i32,
    pub stop_angle: i32,
}

/// The angular window the device actually reports (`LMPoutputRange`).
///
/// Same units as [`ScanConfig`]. Output arrays are sized from this window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputRange {
    pub angle_resolution: u32,
    pub start_angle: i32,
    pub stop_angle: i32,
}

/// Output selection written to the device with `LMDscandatacfg`. Never read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataConfig {
    /// Bit mask of the echo channels to output.
    pub output_channel: u8,
    /// Output remission (RSSI) values alongside the distances.
    pub remission: bool,
    /// Remission resolution, 0 = 8 bit, 1 = 16 bit.
    pub resolution: u8,
    /// Number of encoder blocks to include.
    pub encoder: u8,
    pub position: bool,
    pub device_name: bool,
    /// Append the device timestamp block.
    pub timestamp: bool,
    /// Output every n-th scan.
    pub output_interval: u16,
}

impl Default for DataConfig {
    /// The configuration pushed at session setup: first echo, 16 bit remission,
    /// timestamps on, no encoder, position or device name, every scan.
    fn default() -> DataConfig {
        DataConfig {
            output_channel: 1,
            remission: true,
            resolution: 1,
            encoder: 0,
            position: false,
            device_name: false,
            timestamp: true,
            output_interval: 1,
        }
    }
}

/// One scan as decoded from the device, before any unit conversion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSample {
    /// Distances in millimeters, in scan order.
    pub distances: Vec<u16>,
    /// Remission values, in scan order.
    pub intensities: Vec<u16>,
    /// Device time at which the scan was taken, in microseconds since power-up (wraps at 2^32).
    pub device_time_us: u32,
    /// Device time at which the telegram was sent, in microseconds (wraps at 2^32).
    pub transmit_time_us: u32,
    /// Host time at which the telegram was received.
    pub host_arrival: Timestamp,
}

/// A scan in engineering units, ready to be published.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanFrame {
    /// Strictly increasing within one streaming phase, starting at 1.
    pub sequence_number: u32,
    pub frame_id: String,
    /// Start angle of the scan in radians.
    pub angle_min: f32,
    /// End angle of the scan in radians.
    pub angle_max: f32,
    /// Angular distance between measurements in radians.
    pub angle_increment: f32,
    /// Time between measurements in seconds.
    pub time_increment: f32,
    /// Time between scans in seconds.
    pub scan_time: f32,
    /// Minimum range value in meters.
    pub range_min: f32,
    /// Maximum range value in meters.
    pub range_max: f32,
    /// Range data in meters.
    pub ranges: Vec<f32>,
    /// Remission data, unit-less.
    pub intensities: Vec<f32>,
    pub timestamp: Timestamp,
}
