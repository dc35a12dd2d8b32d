// Command types

/// Read a variable by name.
pub const COLA_READ_BY_NAME: &str = "sRN";
/// Reply to [`COLA_READ_BY_NAME`].
pub const COLA_READ_ANSWER: &str = "sRA";

/// Write a variable by name.
pub const COLA_WRITE_BY_NAME: &str = "sWN";
/// Reply to [`COLA_WRITE_BY_NAME`].
pub const COLA_WRITE_ANSWER: &str = "sWA";

/// Invoke a method.
pub const COLA_METHOD: &str = "sMN";
/// Reply to [`COLA_METHOD`].
pub const COLA_METHOD_ANSWER: &str = "sAN";

/// Subscribe to or unsubscribe from an event.
pub const COLA_EVENT: &str = "sEN";
/// Reply to [`COLA_EVENT`].
pub const COLA_EVENT_ANSWER: &str = "sEA";

/// Event notification, used for streamed scan telegrams.
pub const COLA_EVENT_NOTIFICATION: &str = "sSN";

/// Negative reply. The only parameter is the error code.
pub const COLA_ERROR_ANSWER: &str = "sFA";

// Command names

/// Change the user level. Takes the level and the password hash.
pub const LMS_SET_ACCESS_MODE: &str = "SetAccessMode";

/// User level "authorized client".
pub const LMS_ACCESS_LEVEL_CLIENT: &str = "03";

/// Password hash of the default "client" password.
pub const LMS_CLIENT_PASSWORD_HASH: &str = "F4724744";

/// Scanning frequency, resolution and angular range.
pub const LMS_SCAN_CONFIG: &str = "LMPscancfg";

/// Angular window of the measurement output.
pub const LMS_OUTPUT_RANGE: &str = "LMPoutputRange";

/// Content of the scan data telegram.
pub const LMS_SCAN_DATA_CONFIG: &str = "LMDscandatacfg";

/// Start the laser and the motor.
pub const LMS_START_MEASUREMENT: &str = "LMCstartmeas";

/// Stop the laser and the motor.
pub const LMS_STOP_MEASUREMENT: &str = "LMCstopmeas";

/// Device state.
pub const LMS_STATUS: &str = "STlms";

/// Log out and apply the configuration.
pub const LMS_RUN: &str = "Run";

/// Scan data, both as a subscribable event and as the notification itself.
pub const LMS_SCAN_DATA: &str = "LMDscandata";

// Status codes reported by `STlms`

/// The device measures and can stream scans.
pub const LMS_STATUS_READY_FOR_MEASUREMENT: u8 = 7;
