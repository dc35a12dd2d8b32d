//! CoLa-A client and the TCP [`LaserDevice`] built on it.

use crate::answers::*;
use crate::base::{Channel, Error, Message, Result};
use crate::cmds::*;
use crate::device::{DeviceStatus, LaserDevice};
use crate::internals::*;
use crate::protocol::ColaAProtocol;
use crate::types::{DataConfig, OutputRange, RawSample, ScanConfig, Timestamp};
use log::{debug, info, trace, warn};
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

/// Issues CoLa-A commands over a [`Channel`] and decodes their replies.
///
/// Covers the commands needed to configure an LMS1xx for streaming and to read
/// the scans it then pushes.
#[derive(Debug)]
pub struct ColaClient<T: ?Sized> {
    channel: Channel<ColaAProtocol, T>,
    request_timeout: Duration,
}

impl<T: ?Sized> ColaClient<T>
where
    T: Read + Write,
{
    /// Constructs a new `ColaClient` using an existing `Channel`.
    pub fn new(channel: Channel<ColaAProtocol, T>) -> ColaClient<T> {
        trace!("Creating new ColaClient");
        ColaClient {
            channel,
            request_timeout: LMS_DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Constructs a new `ColaClient` directly from a byte stream.
    ///
    /// # Arguments
    ///
    /// * `stream` - A boxed `Read + Write` object, usually a `TcpStream` with a short read timeout.
    pub fn with_stream(stream: Box<T>) -> ColaClient<T> {
        ColaClient::new(Channel::new(ColaAProtocol::new(), stream))
    }

    /// Sets the deadline applied to every command reply.
    pub fn set_request_timeout(&mut self, timeout: Duration) {
        self.request_timeout = timeout;
    }

    pub fn channel(&self) -> &Channel<ColaAProtocol, T> {
        &self.channel
    }

    /// Sends `request` and waits for its `reply_kind` answer or a negative reply.
    ///
    /// Scan telegrams and other unrelated traffic received meanwhile are dropped.
    fn request(&mut self, request: &Message, reply_kind: &str) -> Result<Message> {
        trace!("Request: {}", request.body());
        let reply = self
            .channel
            .invoke(request, self.request_timeout, |msg| {
                msg.kind == COLA_ERROR_ANSWER
                    || (msg.kind == reply_kind && msg.name == request.name)
            })
            .map_err(|e| {
                // A late reply must not be mistaken for the answer to the next request.
                self.channel.reset();
                e
            })?;
        check_reply(&reply, reply_kind, &request.name)?;
        Ok(reply)
    }

    fn call_method(&mut self, name: &str, params: &[&str], success: u32) -> Result<()> {
        let reply = self.request(
            &Message::with_params(COLA_METHOD, name, params),
            COLA_METHOD_ANSWER,
        )?;
        check_method_result(&reply, success)
    }

    fn read_variable(&mut self, name: &str) -> Result<Message> {
        self.request(&Message::new(COLA_READ_BY_NAME, name), COLA_READ_ANSWER)
    }

    /// Logs in as authorized client.
    pub fn login(&mut self) -> Result<()> {
        debug!("Logging in as authorized client");
        self.call_method(
            LMS_SET_ACCESS_MODE,
            &[LMS_ACCESS_LEVEL_CLIENT, LMS_CLIENT_PASSWORD_HASH],
            1,
        )
    }

    pub fn scan_config(&mut self) -> Result<ScanConfig> {
        let reply = self.read_variable(LMS_SCAN_CONFIG)?;
        parse_scan_config(&reply)
    }

    pub fn output_range(&mut self) -> Result<OutputRange> {
        let reply = self.read_variable(LMS_OUTPUT_RANGE)?;
        parse_output_range(&reply)
    }

    /// Selects the content of the scan telegrams.
    pub fn set_scan_data_config(&mut self, cfg: &DataConfig) -> Result<()> {
        debug!("Writing scan data configuration {:?}", cfg);
        let params = data_config_params(cfg);
        self.request(
            &Message::with_params(COLA_WRITE_BY_NAME, LMS_SCAN_DATA_CONFIG, &params),
            COLA_WRITE_ANSWER,
        )?;
        Ok(())
    }

    pub fn start_measurement(&mut self) -> Result<()> {
        self.call_method(LMS_START_MEASUREMENT, &[], 0)
    }

    pub fn stop_measurement(&mut self) -> Result<()> {
        self.call_method(LMS_STOP_MEASUREMENT, &[], 0)
    }

    pub fn status(&mut self) -> Result<DeviceStatus> {
        let reply = self.read_variable(LMS_STATUS)?;
        parse_status(&reply)
    }

    /// Logs out, which makes the device apply the written configuration.
    pub fn run(&mut self) -> Result<()> {
        self.call_method(LMS_RUN, &[], 1)
    }

    /// Subscribes to (or unsubscribes from) the scan data event.
    pub fn set_continuous_mode(&mut self, enabled: bool) -> Result<()> {
        let flag = if enabled { "1" } else { "0" };
        self.request(
            &Message::with_params(COLA_EVENT, LMS_SCAN_DATA, &[flag]),
            COLA_EVENT_ANSWER,
        )?;
        Ok(())
    }

    /// Waits up to `timeout` for the next scan telegram.
    ///
    /// The host arrival time is taken as soon as the telegram is decoded.
    pub fn read_scan(&mut self, timeout: Duration) -> Result<RawSample> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let msg = self.channel.read_until(remaining)?;
            let arrival = Timestamp::now();
            if msg.kind == COLA_EVENT_NOTIFICATION && msg.name == LMS_SCAN_DATA {
                return parse_scan_data(&msg, arrival);
            }
            trace!("Skipping {} {} while waiting for scan", msg.kind, msg.name);
        }
    }
}

/// An LMS1xx reached over TCP.
///
/// Holds no connection until [`LaserDevice::connect`] succeeds. Every other
/// operation fails with [`Error::NotConnected`] until then.
#[derive(Debug)]
pub struct Lms1xxDevice {
    client: Option<ColaClient<TcpStream>>,
    connect_timeout: Duration,
    request_timeout: Duration,
    read_timeout: Duration,
}

impl Default for Lms1xxDevice {
    fn default() -> Self {
        Lms1xxDevice::new(
            LMS_DEFAULT_CONNECT_TIMEOUT,
            LMS_DEFAULT_REQUEST_TIMEOUT,
            LMS_DEFAULT_READ_TIMEOUT,
        )
    }
}

impl Lms1xxDevice {
    /// # Arguments
    ///
    /// * `connect_timeout` - Deadline for establishing the TCP connection.
    /// * `request_timeout` - Deadline for each command reply.
    /// * `read_timeout` - Deadline for each scan telegram.
    pub fn new(
        connect_timeout: Duration,
        request_timeout: Duration,
        read_timeout: Duration,
    ) -> Lms1xxDevice {
        Lms1xxDevice {
            client: None,
            connect_timeout,
            request_timeout,
            read_timeout,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    fn client(&mut self) -> Result<&mut ColaClient<TcpStream>> {
        self.client.as_mut().ok_or(Error::NotConnected)
    }

    fn open(&self, host: &str, port: u16) -> Result<TcpStream> {
        let addrs = (host, port)
            .to_socket_addrs()
            .map_err(|e| Error::transport(format!("cannot resolve {}:{}: {}", host, port, e)))?;

        let mut last_error = None;
        for addr in addrs {
            trace!("Connecting to {}", addr);
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_error = Some(e),
            }
        }
        Err(match last_error {
            Some(e) => Error::transport(format!("cannot connect to {}:{}: {}", host, port, e)),
            None => Error::transport(format!("{}:{} resolved to no address", host, port)),
        })
    }
}

impl LaserDevice for Lms1xxDevice {
    fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        self.disconnect();
        let stream = self.open(host, port)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(LMS_SOCKET_POLL_INTERVAL))?;

        let mut client = ColaClient::with_stream(Box::new(stream));
        client.set_request_timeout(self.request_timeout);
        self.client = Some(client);
        info!("Connected to {}:{}", host, port);
        Ok(())
    }

    fn login(&mut self) -> Result<()> {
        self.client()?.login()
    }

    fn get_scan_config(&mut self) -> Result<ScanConfig> {
        self.client()?.scan_config()
    }

    fn get_output_range(&mut self) -> Result<OutputRange> {
        self.client()?.output_range()
    }

    fn set_scan_data_config(&mut self, cfg: &DataConfig) -> Result<()> {
        self.client()?.set_scan_data_config(cfg)
    }

    fn start_measurement(&mut self) -> Result<()> {
        self.client()?.start_measurement()
    }

    fn stop_measurement(&mut self) -> Result<()> {
        self.client()?.stop_measurement()
    }

    fn query_status(&mut self) -> DeviceStatus {
        match self.client().and_then(|client| client.status()) {
            Ok(status) => status,
            Err(e) => {
                warn!("Status query failed: {}", e);
                DeviceStatus::Unknown
            }
        }
    }

    fn start_device(&mut self) -> Result<()> {
        self.client()?.run()
    }

    fn set_continuous_mode(&mut self, enabled: bool) -> Result<()> {
        self.client()?.set_continuous_mode(enabled)
    }

    fn read_scan_data(&mut self) -> Result<RawSample> {
        let timeout = self.read_timeout;
        self.client()?.read_scan(timeout)
    }

    fn disconnect(&mut self) {
        if let Some(client) = self.client.take() {
            if let Err(e) = client.channel().stream().shutdown(Shutdown::Both) {
                debug!("Socket shutdown: {}", e);
            }
            info!("Disconnected");
        }
    }
}
