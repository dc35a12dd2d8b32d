//! Mapping of device time into host time.

use log::{debug, trace, warn};
use std::collections::VecDeque;

/// Default number of hull vertices kept by [`ConvexHullSynchronizer`].
pub const DEFAULT_HULL_CAPACITY: usize = 256;

/// Estimates a mapping from the device clock into the host clock from paired samples.
///
/// Implementations must cope with irregular sample arrival and network jitter, and
/// `map_to_host_time` must return a usable estimate after any number of samples,
/// including none.
pub trait ClockSynchronizer {
    /// Feeds one calibration pair, both sides in seconds.
    fn register_sample(&mut self, device_secs: f64, host_secs: f64);

    /// Best current estimate of the host time corresponding to `device_secs`.
    fn map_to_host_time(&self, device_secs: f64) -> f64;

    /// Forgets all samples. Called whenever the device clock may have restarted.
    fn reset(&mut self) {}
}

impl<S: ClockSynchronizer + ?Sized> ClockSynchronizer for Box<S> {
    fn register_sample(&mut self, device_secs: f64, host_secs: f64) {
        (**self).register_sample(device_secs, host_secs)
    }

    fn map_to_host_time(&self, device_secs: f64) -> f64 {
        (**self).map_to_host_time(device_secs)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Point {
    device: f64,
    host: f64,
}

/// `> 0` when `o -> a -> b` turns counter-clockwise.
fn cross(o: Point, a: Point, b: Point) -> f64 {
    (a.device - o.device) * (b.host - o.host) - (a.host - o.host) * (b.device - o.device)
}

/// Jitter-robust synchronizer fitting the lower convex hull of `(device, host)` points.
///
/// Transmission delay only ever makes a telegram arrive later, so the lowest host
/// times seen for a given device time are the closest to the true offset. The hull
/// edge spanning the middle of the observed interval gives offset and drift.
///
/// Samples must arrive with increasing device time; anything else is dropped.
#[derive(Debug, Clone)]
pub struct ConvexHullSynchronizer {
    hull: VecDeque<Point>,
    capacity: usize,
}

impl Default for ConvexHullSynchronizer {
    fn default() -> Self {
        ConvexHullSynchronizer::with_capacity(DEFAULT_HULL_CAPACITY)
    }
}

impl ConvexHullSynchronizer {
    pub fn new() -> ConvexHullSynchronizer {
        ConvexHullSynchronizer::default()
    }

    /// Creates a synchronizer keeping at most `capacity` hull vertices (at least two).
    pub fn with_capacity(capacity: usize) -> ConvexHullSynchronizer {
        let capacity = capacity.max(2);
        ConvexHullSynchronizer {
            hull: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Number of points currently on the hull.
    pub fn len(&self) -> usize {
        self.hull.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hull.is_empty()
    }

    /// Offset and slope of the current model, `host = offset + slope * device`.
    ///
    /// The model is the hull edge spanning the middle of the observed device time
    /// interval. The newest edge always ends at the newest sample, so a single late
    /// telegram would tilt it.
    pub fn model(&self) -> Option<(f64, f64)> {
        let n = self.hull.len();
        match n {
            0 => None,
            1 => Some((self.hull[0].host - self.hull[0].device, 1.0)),
            _ => {
                let mid = (self.hull[0].device + self.hull[n - 1].device) / 2.0;
                let upper = self
                    .hull
                    .partition_point(|p| p.device <= mid)
                    .clamp(1, n - 1);
                let a = self.hull[upper - 1];
                let b = self.hull[upper];
                let slope = (b.host - a.host) / (b.device - a.device);
                Some((a.host - slope * a.device, slope))
            }
        }
    }
}

impl ClockSynchronizer for ConvexHullSynchronizer {
    fn register_sample(&mut self, device_secs: f64, host_secs: f64) {
        if !device_secs.is_finite() || !host_secs.is_finite() {
            warn!("Ignoring non-finite sync sample ({}, {})", device_secs, host_secs);
            return;
        }
        let p = Point {
            device: device_secs,
            host: host_secs,
        };

        if let Some(last) = self.hull.back().copied() {
            if p.device < last.device {
                warn!(
                    "Sync sample out of order ({} < {}), dropped",
                    p.device, last.device
                );
                return;
            }
            if p.device == last.device {
                if p.host < last.host {
                    self.hull.pop_back();
                } else {
                    return;
                }
            }
        }

        while self.hull.len() >= 2 {
            let n = self.hull.len();
            if cross(self.hull[n - 2], self.hull[n - 1], p) > 0.0 {
                break;
            }
            self.hull.pop_back();
        }
        self.hull.push_back(p);

        if self.hull.len() > self.capacity {
            self.hull.pop_front();
        }
        trace!(
            "Sync sample ({:.6}, {:.6}), hull size {}",
            device_secs,
            host_secs,
            self.hull.len()
        );
    }

    fn map_to_host_time(&self, device_secs: f64) -> f64 {
        match self.model() {
            Some((offset, slope)) => offset + slope * device_secs,
            None => device_secs,
        }
    }

    fn reset(&mut self) {
        debug!("Resetting clock synchronizer ({} hull points)", self.hull.len());
        self.hull.clear();
    }
}
