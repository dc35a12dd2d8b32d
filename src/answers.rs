//! Decoding of CoLa-A replies and scan telegrams into typed values.

use crate::base::{Error, Message, Result};
use crate::cmds::*;
use crate::device::DeviceStatus;
use crate::types::{DataConfig, OutputRange, RawSample, ScanConfig, Timestamp};
use log::trace;
use std::slice::Iter;

/// Parses an unsigned CoLa-A number: hexadecimal, or decimal when prefixed with `+`.
pub(crate) fn parse_u32(token: &str) -> Option<u32> {
    match token.strip_prefix('+') {
        Some(decimal) => decimal.parse().ok(),
        None => u32::from_str_radix(token, 16).ok(),
    }
}

/// Parses a signed CoLa-A number: decimal with an explicit sign, otherwise the
/// two's complement bits in hexadecimal.
pub(crate) fn parse_i32(token: &str) -> Option<i32> {
    if token.starts_with(['+', '-']) {
        token.parse().ok()
    } else {
        u32::from_str_radix(token, 16).ok().map(|bits| bits as i32)
    }
}

/// Cursor over the parameters of one telegram with field-aware error messages.
struct Params<'a> {
    name: &'a str,
    iter: Iter<'a, String>,
}

impl<'a> Params<'a> {
    fn of(msg: &'a Message) -> Params<'a> {
        Params {
            name: &msg.name,
            iter: msg.params.iter(),
        }
    }

    fn error(&self, what: &str, field: &str) -> Error {
        Error::protocol(format!("{}: {} {}", self.name, what, field))
    }

    fn remaining(&self) -> usize {
        self.iter.len()
    }

    fn next(&mut self, field: &str) -> Result<&'a str> {
        match self.iter.next() {
            Some(token) => Ok(token),
            None => Err(self.error("missing", field)),
        }
    }

    fn skip(&mut self, count: usize, field: &str) -> Result<()> {
        for _ in 0..count {
            self.next(field)?;
        }
        Ok(())
    }

    fn u32(&mut self, field: &str) -> Result<u32> {
        let token = self.next(field)?;
        parse_u32(token).ok_or_else(|| self.error("invalid", field))
    }

    fn i32(&mut self, field: &str) -> Result<i32> {
        let token = self.next(field)?;
        parse_i32(token).ok_or_else(|| self.error("invalid", field))
    }

    /// A length prefix that must not exceed the tokens left in the telegram.
    fn count(&mut self, field: &str, tokens_per_item: usize) -> Result<usize> {
        let count = self.u32(field)? as usize;
        if count.saturating_mul(tokens_per_item) > self.remaining() {
            return Err(self.error("truncated after", field));
        }
        Ok(count)
    }
}

/// Fails when `msg` is a negative reply or does not answer `name` with `kind`.
pub(crate) fn check_reply(msg: &Message, kind: &str, name: &str) -> Result<()> {
    if msg.kind == COLA_ERROR_ANSWER {
        return Err(Error::protocol(format!(
            "device rejected {} with error code {}",
            name, msg.name
        )));
    }
    if msg.kind != kind || msg.name != name {
        return Err(Error::protocol(format!(
            "expected {} {}, got {} {}",
            kind, name, msg.kind, msg.name
        )));
    }
    Ok(())
}

/// Reads the first parameter of a method reply and compares it with `success`.
pub(crate) fn check_method_result(msg: &Message, success: u32) -> Result<()> {
    let mut params = Params::of(msg);
    let code = params.u32("result")?;
    if code == success {
        Ok(())
    } else {
        Err(Error::protocol(format!(
            "{} returned {}, expected {}",
            msg.name, code, success
        )))
    }
}

/// `sRA LMPscancfg <frequency> <sectors> <resolution> <start> <stop>`
pub(crate) fn parse_scan_config(msg: &Message) -> Result<ScanConfig> {
    let mut params = Params::of(msg);
    let scanning_frequency = params.u32("scanning frequency")?;
    let _sectors = params.u32("sector count")?;
    Ok(ScanConfig {
        scanning_frequency,
        angle_resolution: params.u32("angle resolution")?,
        start_angle: params.i32("start angle")?,
        stop_angle: params.i32("stop angle")?,
    })
}

/// `sRA LMPoutputRange <sectors> <resolution> <start> <stop>`
pub(crate) fn parse_output_range(msg: &Message) -> Result<OutputRange> {
    let mut params = Params::of(msg);
    let _sectors = params.u32("sector count")?;
    Ok(OutputRange {
        angle_resolution: params.u32("angle resolution")?,
        start_angle: params.i32("start angle")?,
        stop_angle: params.i32("stop angle")?,
    })
}

/// `sRA STlms <state> ...`
pub(crate) fn parse_status(msg: &Message) -> Result<DeviceStatus> {
    let mut params = Params::of(msg);
    let code = params.u32("state")?;
    Ok(u8::try_from(code)
        .map(DeviceStatus::from_code)
        .unwrap_or(DeviceStatus::Unknown))
}

/// Parameters of `sWN LMDscandatacfg` in the order the device expects them.
pub(crate) fn data_config_params(cfg: &DataConfig) -> Vec<String> {
    vec![
        format!("{:02X}", cfg.output_channel),
        "00".to_owned(),
        u8::from(cfg.remission).to_string(),
        cfg.resolution.to_string(),
        "0".to_owned(),
        format!("{:02X}", cfg.encoder),
        "00".to_owned(),
        u8::from(cfg.position).to_string(),
        u8::from(cfg.device_name).to_string(),
        "0".to_owned(),
        u8::from(cfg.timestamp).to_string(),
        format!("+{}", cfg.output_interval),
    ]
}

/// One measurement channel block: content name followed by its values.
fn parse_channel(params: &mut Params<'_>) -> Result<(String, Vec<u16>)> {
    let content = params.next("channel content")?.to_owned();
    let scale = f32::from_bits(params.u32("scale factor")?);
    params.skip(3, "channel header")?;
    let count = params.count("value count", 1)?;
    trace!("Channel {} with {} values, scale {}", content, count, scale);

    let values = (0..count)
        .map(|_| {
            let value = params.u32("channel value")?;
            u16::try_from(value).map_err(|_| params.error("out of range", "channel value"))
        })
        .collect::<Result<Vec<u16>>>()?;
    Ok((content, values))
}

/// `sSN LMDscandata ...`: the streamed scan telegram.
///
/// Only the fields the acquisition needs are extracted: both device time stamps, the
/// first `DIST1` channel and the first `RSSI1` channel (16 or 8 bit).
pub(crate) fn parse_scan_data(msg: &Message, host_arrival: Timestamp) -> Result<RawSample> {
    let mut params = Params::of(msg);
    params.skip(3, "device header")?; // version, device number, serial number
    params.skip(2, "device status")?;
    params.skip(2, "telegram and scan counters")?;
    let device_time_us = params.u32("time since start-up")?;
    let transmit_time_us = params.u32("time of transmission")?;
    params.skip(4, "input and output status")?;
    params.skip(1, "reserved byte")?;
    params.skip(2, "scan and measurement frequency")?;

    let encoders = params.count("encoder count", 2)?;
    params.skip(encoders * 2, "encoder block")?;

    let mut distances = None;
    let mut intensities = None;

    let channels_16bit = params.count("16 bit channel count", 6)?;
    for _ in 0..channels_16bit {
        let (content, values) = parse_channel(&mut params)?;
        match content.as_str() {
            "DIST1" if distances.is_none() => distances = Some(values),
            "RSSI1" if intensities.is_none() => intensities = Some(values),
            _ => trace!("Ignoring channel {}", content),
        }
    }

    // The 8 bit block is absent in some firmware versions when empty.
    if params.remaining() > 0 {
        let channels_8bit = params.count("8 bit channel count", 6)?;
        for _ in 0..channels_8bit {
            let (content, values) = parse_channel(&mut params)?;
            if content == "RSSI1" && intensities.is_none() {
                intensities = Some(values);
            } else {
                trace!("Ignoring 8 bit channel {}", content);
            }
        }
    }

    let distances = distances.ok_or_else(|| Error::protocol("scan telegram without DIST1"))?;
    Ok(RawSample {
        distances,
        intensities: intensities.unwrap_or_default(),
        device_time_us,
        transmit_time_us,
        host_arrival,
    })
}
