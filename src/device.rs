use crate::base::Result;
use crate::cmds::LMS_STATUS_READY_FOR_MEASUREMENT;
use crate::types::{DataConfig, OutputRange, RawSample, ScanConfig};

/// Device state as far as the acquisition session cares about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    /// The device is ready for measurement.
    Ready,
    /// The device answered with another state code.
    NotReady(u8),
    /// The state could not be determined.
    Unknown,
}

impl DeviceStatus {
    /// Maps an `STlms` state code.
    pub fn from_code(code: u8) -> DeviceStatus {
        if code == LMS_STATUS_READY_FOR_MEASUREMENT {
            DeviceStatus::Ready
        } else {
            DeviceStatus::NotReady(code)
        }
    }

    pub fn is_ready(&self) -> bool {
        *self == DeviceStatus::Ready
    }
}

/// The device capability the acquisition session drives.
///
/// All calls block until the device answers or an implementation-defined timeout
/// expires. [`crate::Lms1xxDevice`] implements this over TCP; tests substitute
/// scripted devices.
pub trait LaserDevice {
    /// Opens the transport to `host:port`.
    fn connect(&mut self, host: &str, port: u16) -> Result<()>;

    /// Gains the access level needed for configuration.
    fn login(&mut self) -> Result<()>;

    fn get_scan_config(&mut self) -> Result<ScanConfig>;

    fn get_output_range(&mut self) -> Result<OutputRange>;

    fn set_scan_data_config(&mut self, cfg: &DataConfig) -> Result<()>;

    fn start_measurement(&mut self) -> Result<()>;

    fn stop_measurement(&mut self) -> Result<()>;

    /// Queries the device state once. Failures map to [`DeviceStatus::Unknown`].
    fn query_status(&mut self) -> DeviceStatus;

    /// Leaves configuration mode so that the written configuration takes effect.
    fn start_device(&mut self) -> Result<()>;

    /// Enables or disables streaming of scan telegrams.
    fn set_continuous_mode(&mut self, enabled: bool) -> Result<()>;

    /// Blocks until the next scan arrives or the read deadline passes.
    fn read_scan_data(&mut self) -> Result<RawSample>;

    /// Closes the transport. Never fails; closing a closed device is a no-op.
    fn disconnect(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_code_seven_is_ready() {
        assert!(DeviceStatus::from_code(7).is_ready());
        assert_eq!(DeviceStatus::from_code(6), DeviceStatus::NotReady(6));
        assert!(!DeviceStatus::Unknown.is_ready());
    }
}
