use std::time::Duration;

/// CoLa-A TCP port of the LMS1xx family.
pub const LMS_DEFAULT_PORT: u16 = 2111;

/// Factory default address of an LMS1xx.
pub const LMS_DEFAULT_HOST: &str = "192.168.1.2";

/// The only scanning frequency the session accepts, in 1/100 Hz.
pub const LMS_REQUIRED_SCANNING_FREQUENCY: u32 = 5000;

/// Default deadline for a command reply.
pub const LMS_DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// Default deadline for the next scan telegram.
pub const LMS_DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Default deadline for establishing the TCP connection.
pub const LMS_DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Socket read timeout; the channel checks its own deadline at this rate.
pub const LMS_SOCKET_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default pause after any failure before reconnecting.
pub const LMS_DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Default pause between starting the measurement and querying the status.
pub const LMS_DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Granularity at which long sleeps observe the stop signal.
pub const LMS_STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub const LMS_DEFAULT_RANGE_MIN: f32 = 0.01;
pub const LMS_DEFAULT_RANGE_MAX: f32 = 20.0;
