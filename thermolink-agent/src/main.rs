//! thermolink-agent
//!
//! Loads the config (fatal on failure), starts the HTTP control surface on
//! a small tokio runtime, then runs the agent loop on the main thread until
//! interrupted.

mod config;
mod hardware;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::{debug, info, warn};
use thermolink_connectors::{
    mqtt::{MqttConfig, MqttSession},
    HttpControlBuilder, TcpProbeLink,
};
use thermolink_core::{
    time::{MonotonicTime, TimeSource},
    traits::BrokerSession,
    AgentBuilder,
};

use crate::config::load_config;
use crate::hardware::{HostAdc, HostIndicator};

const DEFAULT_CONFIG_PATH: &str = "config.json";

#[derive(Parser, Debug)]
#[command(
    name = "thermolink-agent",
    version,
    about = "Connected temperature sensor agent"
)]
struct Cli {
    /// Path to the JSON configuration document.
    #[arg(long, env = "THERMOLINK_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the HTTP control port from the config.
    #[arg(long, env = "THERMOLINK_HTTP_PORT")]
    http_port: Option<u16>,

    /// Loop period in milliseconds.
    #[arg(long, default_value_t = 10)]
    tick_ms: u64,

    /// sysfs IIO attribute to sample; a simulated sensor is used when absent.
    #[arg(long, env = "THERMOLINK_ADC")]
    adc: Option<PathBuf>,

    /// LED class name under /sys/class/leds; blinks are logged when absent.
    #[arg(long, env = "THERMOLINK_LED")]
    led: Option<String>,

    /// Default log filter when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_logging(default_level: &str) {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or(default_level));
    builder.format_timestamp_millis();
    let _ = builder.try_init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let mut config = load_config(&cli.config)?;
    if let Some(port) = cli.http_port {
        config.http_port = port;
    }
    info!(
        "thermolink-agent {} starting as {} (broker {}:{})",
        thermolink_core::VERSION,
        config.device_id,
        config.mqtt_server,
        config.mqtt_port
    );

    let clock = MonotonicTime::new();
    let topics = config.topics()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("thermolink-http")
        .enable_all()
        .build()
        .context("failed to start http runtime")?;

    let listen = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let (http, mut control) = runtime
        .block_on(HttpControlBuilder::new(listen, topics).spawn())
        .context("failed to start http control surface")?;

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        runtime.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                running.store(false, Ordering::SeqCst);
            }
        });
    }

    let sensor = match &cli.adc {
        Some(path) => HostAdc::iio(path),
        None => {
            warn!("no ADC configured, using simulated sensor");
            HostAdc::simulated()
        }
    };
    let indicator = match &cli.led {
        Some(name) => HostIndicator::led(name),
        None => HostIndicator::log(),
    };

    let mut agent = AgentBuilder::from_config(&config)?
        .link(TcpProbeLink::from_config(&config))
        .session(MqttSession::new(MqttConfig::from_agent_config(&config)))
        .sensor(sensor)
        .indicator(indicator)
        .build(clock.now())?;

    info!(
        "agent loop running every {} ms, http on {}",
        cli.tick_ms,
        http.local_addr()
    );

    let period = Duration::from_millis(cli.tick_ms.max(1));
    while running.load(Ordering::SeqCst) {
        let report = agent.tick(clock.now(), &mut control);
        if let Some(reading) = report.reading {
            debug!(
                "reading raw={} corrected={:.2} published={}",
                reading.raw, reading.corrected, report.published
            );
        }
        std::thread::sleep(period);
    }

    info!("shutting down");
    agent.connectivity_mut().session_mut().close();
    runtime.block_on(http.shutdown())?;
    Ok(())
}
