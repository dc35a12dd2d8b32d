use anyhow::{Context, Result};
use clap::Parser;
use lms1xx::{
    AcquisitionSession, ConvexHullSynchronizer, DriverConfig, Lms1xxDevice, LogSink, StopSignal,
};
use log::info;
use std::path::PathBuf;

#[derive(Parser)]
#[clap(about = "Streams scans from a SICK LMS1xx laser range finder")]
struct Opts {
    /// TOML file with driver settings; command line options take precedence.
    #[clap(long)]
    pub config: Option<PathBuf>,
    #[clap(long)]
    pub host: Option<String>,
    #[clap(long)]
    pub port: Option<u16>,
    #[clap(long)]
    pub frame_id: Option<String>,
    /// Timestamp scans from the device clock.
    #[clap(long)]
    pub use_hw_time: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts = Opts::parse();

    let mut config = match &opts.config {
        Some(path) => DriverConfig::from_path(path)?,
        None => DriverConfig::default(),
    };
    if let Some(host) = opts.host {
        config.host = host;
    }
    if let Some(port) = opts.port {
        config.port = port;
    }
    if let Some(frame_id) = opts.frame_id {
        config.frame_id = frame_id;
    }
    config.use_hw_time |= opts.use_hw_time;

    let stop = StopSignal::new();
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || {
        info!("Stop requested");
        handler_stop.stop();
    })
    .context("cannot install Ctrl-C handler")?;

    let device = Lms1xxDevice::new(
        config.connect_timeout(),
        config.request_timeout(),
        config.read_timeout(),
    );
    let mut session =
        AcquisitionSession::new(config, device, ConvexHullSynchronizer::new(), LogSink, stop);
    session.run();
    Ok(())
}
