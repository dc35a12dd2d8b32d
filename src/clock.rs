//! Unwrapping of the device's free-running 32 bit microsecond counters.

/// Number of distinct values of the device counter, i.e. the length of one wrap in ticks.
const COUNTER_PERIOD: u64 = 1 << 32;

/// Length of one counter tick in seconds.
const TICK_SECONDS: f64 = 1e-6;

/// Turns a wrapping 32 bit microsecond counter into a monotonically increasing value.
///
/// Every time a new raw value is smaller than the previous one the counter is assumed
/// to have wrapped exactly once. The heuristic relies on in-order delivery from a
/// single, monotonically running counter; a sample delivered out of order is
/// indistinguishable from a wrap.
///
/// A session keeps one instance per counter (sample time and transmit time) and
/// replaces both with fresh ones on every reconnect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClockUnwrapper {
    wraps: u32,
    last: Option<u32>,
}

impl ClockUnwrapper {
    /// Creates an unwrapper that has not seen any value yet.
    pub fn new() -> ClockUnwrapper {
        ClockUnwrapper::default()
    }

    /// Feeds the next raw counter value.
    ///
    /// The first value never counts as a wrap; neither does a repeated value.
    pub fn update(&mut self, raw: u32) {
        if let Some(last) = self.last {
            if raw < last {
                self.wraps = self.wraps.wrapping_add(1);
            }
        }
        self.last = Some(raw);
    }

    /// Number of wraps observed so far.
    pub fn wraps(&self) -> u32 {
        self.wraps
    }

    /// The most recent raw value, or `None` before the first update.
    pub fn last_raw(&self) -> Option<u32> {
        self.last
    }

    /// `wraps * 2^32 + last`, in microseconds. Zero before the first update.
    pub fn extended_micros(&self) -> u64 {
        u64::from(self.wraps) * COUNTER_PERIOD + u64::from(self.last.unwrap_or(0))
    }

    /// The extended value converted to seconds.
    pub fn as_secs_f64(&self) -> f64 {
        let wrapped = f64::from(self.wraps) * COUNTER_PERIOD as f64 * TICK_SECONDS;
        wrapped + f64::from(self.last.unwrap_or(0)) * TICK_SECONDS
    }

    /// Forgets every observed value.
    pub fn reset(&mut self) {
        *self = ClockUnwrapper::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn first_update_never_wraps() {
        for raw in [0, 1, u32::MAX / 2, u32::MAX] {
            let mut clock = ClockUnwrapper::new();
            clock.update(raw);
            assert_eq!(clock.wraps(), 0);
            assert_eq!(clock.extended_micros(), u64::from(raw));
        }
    }

    #[test]
    fn repeated_value_does_not_wrap() {
        let mut clock = ClockUnwrapper::new();
        clock.update(42);
        clock.update(42);
        assert_eq!(clock.wraps(), 0);
        assert_eq!(clock.extended_micros(), 42);
    }

    #[test]
    fn extended_value_is_non_decreasing_with_expected_steps() {
        let raws = [
            10u32,
            4_000_000_000,
            u32::MAX,
            5,
            5,
            1_000,
            999,
            3_000_000_000,
            0,
        ];
        let mut clock = ClockUnwrapper::new();
        clock.update(raws[0]);

        for pair in raws.windows(2) {
            let (prev, next) = (pair[0], pair[1]);
            let before = clock.extended_micros();
            clock.update(next);
            let step = clock.extended_micros() - before;

            let expected = if next < prev {
                COUNTER_PERIOD - u64::from(prev) + u64::from(next)
            } else {
                u64::from(next - prev)
            };
            assert_eq!(step, expected, "step from {} to {}", prev, next);
        }
        assert_eq!(clock.wraps(), 3);
    }

    #[test]
    fn seconds_include_full_counter_period_per_wrap() {
        let mut clock = ClockUnwrapper::new();
        clock.update(4_294_000_000);
        clock.update(500_000);

        assert_eq!(clock.extended_micros(), COUNTER_PERIOD + 500_000);
        assert_approx_eq!(clock.as_secs_f64(), 4_294.967_296 + 0.5, 1e-9);
    }

    #[test]
    fn reset_forgets_history() {
        let mut clock = ClockUnwrapper::new();
        clock.update(10);
        clock.update(5);
        clock.reset();

        assert_eq!(clock, ClockUnwrapper::new());
        clock.update(1);
        assert_eq!(clock.wraps(), 0);
    }
}
