//! Conversion of raw device samples into [`ScanFrame`]s.

use crate::clock::ClockUnwrapper;
use crate::sync::ClockSynchronizer;
use crate::types::{OutputRange, RawSample, ScanConfig, ScanFrame, Timestamp};
use log::trace;
use std::f64::consts::{FRAC_PI_2, PI};

/// Device angles are in 1/10000 degree.
const ANGLE_UNITS_PER_DEGREE: f64 = 10000.0;
/// Device frequencies are in 1/100 Hz.
const FREQUENCY_UNITS_PER_HERTZ: f64 = 100.0;
const MILLIMETERS_PER_METER: f32 = 1000.0;

fn device_angle_to_rad(angle: f64) -> f64 {
    angle / ANGLE_UNITS_PER_DEGREE * PI / 180.0
}

/// Number of measurements the device reports for `range`.
///
/// Both ends of the window are included when the window is an exact multiple of the
/// resolution. A zero resolution or an inverted window yields no values.
pub fn num_values(range: &OutputRange) -> usize {
    let span = i64::from(range.stop_angle) - i64::from(range.start_angle);
    let resolution = i64::from(range.angle_resolution);
    if resolution == 0 || span < 0 {
        return 0;
    }
    let inclusive = if span % resolution == 0 { 1 } else { 0 };
    (span / resolution + inclusive) as usize
}

/// Session-wide scan geometry, derived once from the negotiated configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScanGeometry {
    pub angle_min: f32,
    pub angle_max: f32,
    pub angle_increment: f32,
    pub time_increment: f32,
    pub scan_time: f32,
    pub range_min: f32,
    pub range_max: f32,
    pub num_values: usize,
}

impl ScanGeometry {
    /// Derives the geometry reported with every frame.
    ///
    /// The device measures angles from its own zero, which lies a quarter turn after
    /// the zero of the published scan, hence the `-pi/2` shift.
    pub fn new(cfg: &ScanConfig, range: &OutputRange, range_min: f32, range_max: f32) -> Self {
        let frequency_hz = f64::from(cfg.scanning_frequency) / FREQUENCY_UNITS_PER_HERTZ;
        let resolution_deg = f64::from(range.angle_resolution) / ANGLE_UNITS_PER_DEGREE;
        let (scan_time, time_increment) = if frequency_hz > 0.0 {
            (1.0 / frequency_hz, resolution_deg / 360.0 / frequency_hz)
        } else {
            (0.0, 0.0)
        };

        ScanGeometry {
            angle_min: (device_angle_to_rad(f64::from(range.start_angle)) - FRAC_PI_2) as f32,
            angle_max: (device_angle_to_rad(f64::from(range.stop_angle)) - FRAC_PI_2) as f32,
            angle_increment: device_angle_to_rad(f64::from(range.angle_resolution)) as f32,
            time_increment: time_increment as f32,
            scan_time: scan_time as f32,
            range_min,
            range_max,
            num_values: num_values(range),
        }
    }
}

/// Builds frames for one streaming phase.
///
/// Owns the two unwrappers of the device counters, so a fresh assembler must be
/// created whenever the device reconnects.
#[derive(Debug, Clone)]
pub struct FrameAssembler {
    frame_id: String,
    geometry: ScanGeometry,
    use_hw_time: bool,
    device_clock: ClockUnwrapper,
    transmit_clock: ClockUnwrapper,
}

impl FrameAssembler {
    pub fn new(frame_id: impl Into<String>, geometry: ScanGeometry, use_hw_time: bool) -> Self {
        FrameAssembler {
            frame_id: frame_id.into(),
            geometry,
            use_hw_time,
            device_clock: ClockUnwrapper::new(),
            transmit_clock: ClockUnwrapper::new(),
        }
    }

    pub fn geometry(&self) -> &ScanGeometry {
        &self.geometry
    }

    /// Unwrapper of the sample time counter.
    pub fn device_clock(&self) -> &ClockUnwrapper {
        &self.device_clock
    }

    /// Unwrapper of the transmit time counter.
    pub fn transmit_clock(&self) -> &ClockUnwrapper {
        &self.transmit_clock
    }

    /// Converts one raw sample into a frame with sequence number `seq`.
    ///
    /// Ranges and intensities always hold `num_values` entries: surplus raw values are
    /// dropped and missing ones stay zero.
    ///
    /// With hardware time enabled the transmit time calibrates `synchronizer` and
    /// the sample time is mapped through it. The first frame of a phase (`seq <= 1`)
    /// has no calibration yet and keeps the host arrival time.
    pub fn assemble<S>(&mut self, raw: RawSample, seq: u32, synchronizer: &mut S) -> ScanFrame
    where
        S: ClockSynchronizer + ?Sized,
    {
        let g = self.geometry;
        let mut ranges = vec![0.0; g.num_values];
        for (out, mm) in ranges.iter_mut().zip(&raw.distances) {
            *out = f32::from(*mm) / MILLIMETERS_PER_METER;
        }
        let mut intensities = vec![0.0; g.num_values];
        for (out, value) in intensities.iter_mut().zip(&raw.intensities) {
            *out = f32::from(*value);
        }

        let timestamp = self.resolve_timestamp(&raw, seq, synchronizer);
        trace!(
            "Assembled frame {} with {} ranges at {:?}",
            seq,
            ranges.len(),
            timestamp
        );

        ScanFrame {
            sequence_number: seq,
            frame_id: self.frame_id.clone(),
            angle_min: g.angle_min,
            angle_max: g.angle_max,
            angle_increment: g.angle_increment,
            time_increment: g.time_increment,
            scan_time: g.scan_time,
            range_min: g.range_min,
            range_max: g.range_max,
            ranges,
            intensities,
            timestamp,
        }
    }

    fn resolve_timestamp<S>(&mut self, raw: &RawSample, seq: u32, synchronizer: &mut S) -> Timestamp
    where
        S: ClockSynchronizer + ?Sized,
    {
        if !self.use_hw_time {
            return raw.host_arrival;
        }

        self.device_clock.update(raw.device_time_us);
        self.transmit_clock.update(raw.transmit_time_us);
        if seq <= 1 {
            return raw.host_arrival;
        }

        synchronizer.register_sample(
            self.transmit_clock.as_secs_f64(),
            raw.host_arrival.as_secs_f64(),
        );
        Timestamp::from_secs_f64(synchronizer.map_to_host_time(self.device_clock.as_secs_f64()))
    }
}
