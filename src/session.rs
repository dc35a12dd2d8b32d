//! The connect / configure / stream / recover lifecycle.

use crate::base::Error;
use crate::config::DriverConfig;
use crate::device::{DeviceStatus, LaserDevice};
use crate::frame::{FrameAssembler, ScanGeometry};
use crate::internals::{LMS_REQUIRED_SCANNING_FREQUENCY, LMS_STOP_POLL_INTERVAL};
use crate::sink::ScanSink;
use crate::sync::ClockSynchronizer;
use crate::types::{DataConfig, OutputRange, ScanConfig};
use log::{debug, error, info, trace, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Cooperative cancellation shared between the session and whoever stops it.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> StopSignal {
        StopSignal::default()
    }

    /// Requests the session to stop. It takes effect after the call in flight returns.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Lifecycle state of an [`AcquisitionSession`].
///
/// Each state carries what the next transition needs. [`SessionState::Error`] holds
/// the failure that ended the previous attempt; the device is already torn down
/// when it is entered.
#[derive(Debug)]
pub enum SessionState {
    Disconnected,
    Connecting,
    LoggingIn,
    AwaitingConfig,
    ConfiguringOutput {
        config: ScanConfig,
        range: OutputRange,
    },
    AwaitingReady {
        geometry: ScanGeometry,
    },
    Streaming {
        assembler: FrameAssembler,
        seq: u32,
    },
    Error(Error),
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "Disconnected",
            SessionState::Connecting => "Connecting",
            SessionState::LoggingIn => "LoggingIn",
            SessionState::AwaitingConfig => "AwaitingConfig",
            SessionState::ConfiguringOutput { .. } => "ConfiguringOutput",
            SessionState::AwaitingReady { .. } => "AwaitingReady",
            SessionState::Streaming { .. } => "Streaming",
            SessionState::Error(_) => "Error",
        }
    }
}

/// Drives one device through its lifecycle and publishes the scans it delivers.
///
/// Every failure tears the device down, waits the configured back-off and starts
/// over from [`SessionState::Disconnected`]. Nothing but the [`StopSignal`] ends
/// [`AcquisitionSession::run`].
pub struct AcquisitionSession<D, S, P> {
    config: DriverConfig,
    device: D,
    synchronizer: S,
    sink: P,
    stop: StopSignal,
}

impl<D, S, P> AcquisitionSession<D, S, P>
where
    D: LaserDevice,
    S: ClockSynchronizer,
    P: ScanSink,
{
    pub fn new(config: DriverConfig, device: D, synchronizer: S, sink: P, stop: StopSignal) -> Self {
        AcquisitionSession {
            config,
            device,
            synchronizer,
            sink,
            stop,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn synchronizer(&self) -> &S {
        &self.synchronizer
    }

    pub fn sink(&self) -> &P {
        &self.sink
    }

    pub fn into_sink(self) -> P {
        self.sink
    }

    /// Runs the lifecycle until the stop signal is raised, then shuts the device down.
    ///
    /// The signal is checked before every transition, so also between two reads.
    pub fn run(&mut self) {
        info!(
            "Starting acquisition from {}:{}",
            self.config.host, self.config.port
        );
        let mut state = SessionState::Disconnected;
        while !self.stop.is_stopped() {
            state = self.step(state);
        }
        self.shutdown(state);
        info!("Acquisition stopped");
    }

    /// Performs the single transition out of `state`.
    pub fn step(&mut self, state: SessionState) -> SessionState {
        let from = state.name();
        let next = match state {
            SessionState::Disconnected => SessionState::Connecting,
            SessionState::Connecting => self.connect(),
            SessionState::LoggingIn => self.login(),
            SessionState::AwaitingConfig => self.fetch_config(),
            SessionState::ConfiguringOutput { config, range } => {
                self.configure_output(&config, &range)
            }
            SessionState::AwaitingReady { geometry } => self.await_ready(geometry),
            SessionState::Streaming { assembler, seq } => self.stream(assembler, seq),
            SessionState::Error(e) => {
                debug!("Backing off for {:?} after: {}", self.config.backoff(), e);
                self.pause(self.config.backoff());
                SessionState::Disconnected
            }
        };
        if from != next.name() {
            debug!("Session {} -> {}", from, next.name());
        }
        next
    }

    fn connect(&mut self) -> SessionState {
        match self.device.connect(&self.config.host, self.config.port) {
            Ok(()) => SessionState::LoggingIn,
            Err(e) => {
                warn!(
                    "Cannot connect to {}:{}: {}",
                    self.config.host, self.config.port, e
                );
                SessionState::Error(e)
            }
        }
    }

    fn login(&mut self) -> SessionState {
        match self.device.login() {
            Ok(()) => SessionState::AwaitingConfig,
            Err(e) => self.abort_configuration("login failed", e),
        }
    }

    fn fetch_config(&mut self) -> SessionState {
        let fetched = self
            .device
            .get_scan_config()
            .and_then(|config| Ok((config, self.device.get_output_range()?)));
        let (config, range) = match fetched {
            Ok(fetched) => fetched,
            Err(e) => return self.abort_configuration("cannot read scan configuration", e),
        };
        debug!("Scan configuration {:?}, output range {:?}", config, range);

        if config.scanning_frequency != LMS_REQUIRED_SCANNING_FREQUENCY {
            let e = Error::ConfigMismatch {
                description: format!(
                    "scanning frequency {} instead of {}",
                    config.scanning_frequency, LMS_REQUIRED_SCANNING_FREQUENCY
                ),
            };
            return self.abort_configuration("unsupported device configuration", e);
        }
        SessionState::ConfiguringOutput { config, range }
    }

    fn configure_output(&mut self, config: &ScanConfig, range: &OutputRange) -> SessionState {
        let geometry = ScanGeometry::new(
            config,
            range,
            self.config.range_min,
            self.config.range_max,
        );
        trace!("Session geometry {:?}", geometry);

        let configured = self
            .device
            .set_scan_data_config(&DataConfig::default())
            .and_then(|()| self.device.start_measurement());
        match configured {
            Ok(()) => SessionState::AwaitingReady { geometry },
            Err(e) => self.abort_configuration("cannot configure scan output", e),
        }
    }

    fn await_ready(&mut self, geometry: ScanGeometry) -> SessionState {
        let attempts = self.config.ready_attempts.max(1);
        let mut status = DeviceStatus::Unknown;
        for attempt in 1..=attempts {
            self.pause(self.config.settle_delay());
            if self.stop.is_stopped() {
                self.teardown();
                return SessionState::Disconnected;
            }
            status = self.device.query_status();
            if status.is_ready() {
                break;
            }
            debug!("Device not ready ({:?}), attempt {}/{}", status, attempt, attempts);
        }

        if !status.is_ready() {
            let e = Error::ConfigMismatch {
                description: format!("device not ready for measurement: {:?}", status),
            };
            return self.abort_configuration("device did not become ready", e);
        }

        let started = self
            .device
            .start_device()
            .and_then(|()| self.device.set_continuous_mode(true));
        if let Err(e) = started {
            warn!("Cannot start streaming: {}", e);
            self.teardown();
            return SessionState::Error(e);
        }

        self.synchronizer.reset();
        info!("Streaming {} values per scan", geometry.num_values);
        SessionState::Streaming {
            assembler: FrameAssembler::new(
                self.config.frame_id.clone(),
                geometry,
                self.config.use_hw_time,
            ),
            seq: 0,
        }
    }

    fn stream(&mut self, mut assembler: FrameAssembler, seq: u32) -> SessionState {
        match self.device.read_scan_data() {
            Ok(raw) => {
                let seq = seq.wrapping_add(1);
                let frame = assembler.assemble(raw, seq, &mut self.synchronizer);
                self.sink.publish(frame);
                SessionState::Streaming { assembler, seq }
            }
            Err(e) => {
                error!("Scan read failed after {} scans: {}", seq, e);
                self.teardown();
                SessionState::Error(e)
            }
        }
    }

    /// Disconnects after a failure before streaming started.
    fn abort_configuration(&mut self, what: &str, e: Error) -> SessionState {
        warn!("{}: {}", what, e);
        self.device.disconnect();
        SessionState::Error(e)
    }

    /// Disables streaming, stops the measurement and disconnects.
    ///
    /// All three steps run even when earlier ones fail.
    fn teardown(&mut self) {
        debug!("Tearing down device session");
        if let Err(e) = self.device.set_continuous_mode(false) {
            warn!("Cannot disable continuous mode: {}", e);
        }
        if let Err(e) = self.device.stop_measurement() {
            warn!("Cannot stop measurement: {}", e);
        }
        self.device.disconnect();
    }

    fn shutdown(&mut self, state: SessionState) {
        match state {
            SessionState::Disconnected | SessionState::Connecting | SessionState::Error(_) => {}
            SessionState::LoggingIn
            | SessionState::AwaitingConfig
            | SessionState::ConfiguringOutput { .. } => self.device.disconnect(),
            SessionState::AwaitingReady { .. } | SessionState::Streaming { .. } => {
                self.teardown()
            }
        }
    }

    /// Sleeps for `duration`, returning early once the stop signal is raised.
    fn pause(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while !self.stop.is_stopped() {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                break;
            }
            thread::sleep(left.min(LMS_STOP_POLL_INTERVAL));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::Result;
    use crate::sync::ConvexHullSynchronizer;
    use crate::types::{RawSample, ScanFrame, Timestamp};
    use std::collections::VecDeque;

    /// Scripted device recording every call.
    #[derive(Debug)]
    struct MockDevice {
        calls: Vec<&'static str>,
        connect_failures: usize,
        scanning_frequency: u32,
        statuses: VecDeque<DeviceStatus>,
        scans: VecDeque<Result<RawSample>>,
        fail_continuous_off: bool,
        fail_stop: bool,
    }

    impl Default for MockDevice {
        fn default() -> Self {
            MockDevice {
                calls: Vec::new(),
                connect_failures: 0,
                scanning_frequency: 5000,
                statuses: VecDeque::new(),
                scans: VecDeque::new(),
                fail_continuous_off: false,
                fail_stop: false,
            }
        }
    }

    impl MockDevice {
        fn with_scans(count: usize) -> MockDevice {
            MockDevice {
                scans: (0..count).map(|i| Ok(scan(i as u32))).collect(),
                ..MockDevice::default()
            }
        }

        fn count(&self, call: &str) -> usize {
            self.calls.iter().filter(|c| **c == call).count()
        }
    }

    impl LaserDevice for MockDevice {
        fn connect(&mut self, _host: &str, _port: u16) -> Result<()> {
            self.calls.push("connect");
            if self.connect_failures > 0 {
                self.connect_failures -= 1;
                return Err(Error::transport("refused"));
            }
            Ok(())
        }

        fn login(&mut self) -> Result<()> {
            self.calls.push("login");
            Ok(())
        }

        fn get_scan_config(&mut self) -> Result<ScanConfig> {
            self.calls.push("get_scan_config");
            Ok(ScanConfig {
                scanning_frequency: self.scanning_frequency,
                angle_resolution: 5000,
                start_angle: -450_000,
                stop_angle: 2_250_000,
            })
        }

        fn get_output_range(&mut self) -> Result<OutputRange> {
            self.calls.push("get_output_range");
            Ok(OutputRange {
                angle_resolution: 5000,
                start_angle: -450_000,
                stop_angle: 450_000,
            })
        }

        fn set_scan_data_config(&mut self, _cfg: &DataConfig) -> Result<()> {
            self.calls.push("set_scan_data_config");
            Ok(())
        }

        fn start_measurement(&mut self) -> Result<()> {
            self.calls.push("start_measurement");
            Ok(())
        }

        fn stop_measurement(&mut self) -> Result<()> {
            self.calls.push("stop_measurement");
            if self.fail_stop {
                return Err(Error::protocol("stop rejected"));
            }
            Ok(())
        }

        fn query_status(&mut self) -> DeviceStatus {
            self.calls.push("query_status");
            self.statuses.pop_front().unwrap_or(DeviceStatus::Ready)
        }

        fn start_device(&mut self) -> Result<()> {
            self.calls.push("start_device");
            Ok(())
        }

        fn set_continuous_mode(&mut self, enabled: bool) -> Result<()> {
            if enabled {
                self.calls.push("continuous_on");
                return Ok(());
            }
            self.calls.push("continuous_off");
            if self.fail_continuous_off {
                return Err(Error::Timeout);
            }
            Ok(())
        }

        fn read_scan_data(&mut self) -> Result<RawSample> {
            self.calls.push("read_scan_data");
            self.scans.pop_front().unwrap_or(Err(Error::Timeout))
        }

        fn disconnect(&mut self) {
            self.calls.push("disconnect");
        }
    }

    fn scan(i: u32) -> RawSample {
        RawSample {
            distances: vec![1000; 181],
            intensities: vec![100; 181],
            device_time_us: 1_000 + i * 20_000,
            transmit_time_us: 1_500 + i * 20_000,
            host_arrival: Timestamp::from_secs_f64(100.0 + f64::from(i) * 0.02),
        }
    }

    fn config() -> DriverConfig {
        DriverConfig {
            backoff_ms: 0,
            settle_ms: 0,
            ..DriverConfig::default()
        }
    }

    type TestSession = AcquisitionSession<MockDevice, ConvexHullSynchronizer, Vec<ScanFrame>>;

    fn session(device: MockDevice) -> TestSession {
        AcquisitionSession::new(
            config(),
            device,
            ConvexHullSynchronizer::new(),
            Vec::new(),
            StopSignal::new(),
        )
    }

    fn step_until(session: &mut TestSession, mut state: SessionState, name: &str) -> SessionState {
        for _ in 0..20 {
            if state.name() == name {
                return state;
            }
            state = session.step(state);
        }
        panic!("never reached {}, stuck in {}", name, state.name());
    }

    #[test]
    fn lifecycle_reaches_streaming_and_publishes_in_order() {
        let mut session = session(MockDevice::with_scans(2));
        let mut state = step_until(&mut session, SessionState::Disconnected, "Streaming");
        assert_eq!(
            session.device().calls,
            [
                "connect",
                "login",
                "get_scan_config",
                "get_output_range",
                "set_scan_data_config",
                "start_measurement",
                "query_status",
                "start_device",
                "continuous_on",
            ]
        );

        state = session.step(state);
        state = session.step(state);
        assert!(matches!(state, SessionState::Streaming { seq: 2, .. }));

        let frames = session.sink();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].sequence_number, 1);
        assert_eq!(frames[1].sequence_number, 2);
        assert_eq!(frames[0].ranges.len(), 181);
        assert_eq!(frames[0].frame_id, "laser");
    }

    #[test]
    fn unsupported_frequency_never_configures_output() {
        let device = MockDevice {
            scanning_frequency: 2500,
            ..MockDevice::default()
        };
        let mut session = session(device);
        let state = step_until(&mut session, SessionState::Disconnected, "Error");
        assert!(matches!(state, SessionState::Error(Error::ConfigMismatch { .. })));
        assert_eq!(session.device().count("disconnect"), 1);
        assert_eq!(session.device().count("set_scan_data_config"), 0);

        assert!(matches!(session.step(state), SessionState::Disconnected));
    }

    #[test]
    fn device_not_ready_disconnects_without_streaming() {
        let device = MockDevice {
            statuses: VecDeque::from([DeviceStatus::NotReady(3)]),
            ..MockDevice::default()
        };
        let mut session = session(device);
        let state = step_until(&mut session, SessionState::Disconnected, "Error");
        assert_eq!(session.device().count("query_status"), 1);
        assert_eq!(session.device().count("disconnect"), 1);
        assert_eq!(session.device().count("start_device"), 0);
        assert!(matches!(session.step(state), SessionState::Disconnected));
    }

    #[test]
    fn bounded_ready_retry() {
        let device = MockDevice {
            statuses: VecDeque::from([DeviceStatus::NotReady(6), DeviceStatus::Unknown]),
            ..MockDevice::default()
        };
        let mut session = AcquisitionSession::new(
            DriverConfig {
                ready_attempts: 3,
                ..config()
            },
            device,
            ConvexHullSynchronizer::new(),
            Vec::new(),
            StopSignal::new(),
        );
        step_until(&mut session, SessionState::Disconnected, "Streaming");
        assert_eq!(session.device().count("query_status"), 3);
    }

    #[test]
    fn connect_failure_backs_off_and_retries() {
        let device = MockDevice {
            connect_failures: 1,
            ..MockDevice::default()
        };
        let mut session = session(device);
        let state = session.step(SessionState::Connecting);
        assert!(matches!(state, SessionState::Error(Error::Transport { .. })));
        let state = session.step(state);
        assert!(matches!(state, SessionState::Disconnected));
        step_until(&mut session, state, "Streaming");
        assert_eq!(session.device().count("connect"), 2);
    }

    #[test]
    fn read_failure_tears_down_once_even_when_teardown_fails() {
        let device = MockDevice {
            fail_continuous_off: true,
            fail_stop: true,
            ..MockDevice::with_scans(1)
        };
        let mut session = session(device);
        let state = step_until(&mut session, SessionState::Disconnected, "Streaming");
        let state = session.step(state);
        let state = session.step(state);

        assert!(matches!(state, SessionState::Error(Error::Timeout)));
        let device = session.device();
        assert_eq!(device.count("continuous_off"), 1);
        assert_eq!(device.count("stop_measurement"), 1);
        assert_eq!(device.count("disconnect"), 1);
        assert_eq!(
            device.calls[device.calls.len() - 3..],
            ["continuous_off", "stop_measurement", "disconnect"]
        );
        assert_eq!(session.sink().len(), 1);
        assert!(matches!(session.step(state), SessionState::Disconnected));
    }

    #[test]
    fn reconnect_restarts_sequence_and_clock_state() {
        let mut device = MockDevice::with_scans(2);
        device.scans.push_back(Err(Error::transport("connection closed by peer")));
        device.scans.push_back(Ok(scan(7)));
        let mut session = AcquisitionSession::new(
            DriverConfig {
                use_hw_time: true,
                ..config()
            },
            device,
            ConvexHullSynchronizer::new(),
            Vec::new(),
            StopSignal::new(),
        );

        let mut state = step_until(&mut session, SessionState::Disconnected, "Streaming");
        state = session.step(state);
        state = session.step(state);
        assert!(!session.synchronizer().is_empty());

        state = step_until(&mut session, state, "Error");
        state = step_until(&mut session, state, "Streaming");
        match &state {
            SessionState::Streaming { assembler, seq } => {
                assert_eq!(*seq, 0);
                assert_eq!(assembler.device_clock().last_raw(), None);
                assert_eq!(assembler.transmit_clock().last_raw(), None);
            }
            other => panic!("unexpected {}", other.name()),
        }
        assert!(session.synchronizer().is_empty());

        session.step(state);
        let seqs: Vec<u32> = session.sink().iter().map(|f| f.sequence_number).collect();
        assert_eq!(seqs, [1, 2, 1]);
        // The first frame after reconnecting falls back to its arrival time.
        assert_eq!(session.sink()[2].timestamp, scan(7).host_arrival);
    }

    #[test]
    fn run_stops_between_reads_and_tears_down() {
        let stop = StopSignal::new();
        let stopper = stop.clone();
        let sink = move |frame: ScanFrame| {
            if frame.sequence_number == 3 {
                stopper.stop();
            }
        };
        let mut session = AcquisitionSession::new(
            config(),
            MockDevice::with_scans(10),
            ConvexHullSynchronizer::new(),
            sink,
            stop,
        );
        session.run();

        let device = session.device();
        assert_eq!(device.count("read_scan_data"), 3);
        assert_eq!(
            device.calls[device.calls.len() - 3..],
            ["continuous_off", "stop_measurement", "disconnect"]
        );
    }

    #[test]
    fn stopped_session_does_not_start() {
        let stop = StopSignal::new();
        stop.stop();
        let mut session = AcquisitionSession::new(
            config(),
            MockDevice::default(),
            ConvexHullSynchronizer::new(),
            Vec::new(),
            stop,
        );
        session.run();
        assert!(session.device().calls.is_empty());
    }

    #[test]
    fn back_off_observes_stop_signal() {
        let stop = StopSignal::new();
        let mut session = AcquisitionSession::new(
            DriverConfig {
                backoff_ms: 60_000,
                ..config()
            },
            MockDevice::default(),
            ConvexHullSynchronizer::new(),
            Vec::new(),
            stop.clone(),
        );
        stop.stop();
        let started = Instant::now();
        let state = session.step(SessionState::Error(Error::Timeout));
        assert!(matches!(state, SessionState::Disconnected));
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
