//! Command-line interface for the Insteon bridge.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use insteon_bridge::dimmer::{
    DEFAULT_MANUAL_STATE_PAYLOAD, DEFAULT_STATE_PAYLOAD, DEFAULT_STATE_TOPIC,
};
use insteon_bridge::{BridgeResult, Config, DimmerBridge, InputKind, Template};
use insteon_engine::{Manual, Mode};
use insteon_message::Address;
use tracing::error;

/// Insteon MQTT bridge tools.
#[derive(Parser, Debug)]
#[command(name = "insteon-bridge")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Serve Prometheus metrics on this address (needs the `prometheus`
    /// feature).
    #[arg(long, global = true)]
    metrics_listen: Option<SocketAddr>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a configuration file and list each device's topics.
    Check {
        /// Path to the YAML configuration.
        config: PathBuf,
    },
    /// Render the state payload a dimmer would publish.
    Render {
        /// Device address, e.g. 01.02.03.
        #[arg(long)]
        address: Address,
        /// Level, 0-255.
        #[arg(long, default_value_t = 255)]
        level: u8,
        /// Mode used to reach the level.
        #[arg(long, default_value = "normal")]
        mode: Mode,
        /// Manual change (up, down, stop) to render on the manual state
        /// channel instead.
        #[arg(long)]
        manual: Option<Manual>,
        /// Reason attached to the change.
        #[arg(long, default_value = "")]
        reason: String,
        /// Configuration supplying the templates; defaults otherwise.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("insteon=info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    if let Err(err) = init_metrics(args.metrics_listen) {
        error!("{}", err);
        return ExitCode::FAILURE;
    }

    let result = match args.command {
        Command::Check { config } => check(&config),
        Command::Render {
            address,
            level,
            mode,
            manual,
            reason,
            config,
        } => render(address, level, mode, manual, &reason, config.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

#[cfg(feature = "prometheus")]
fn init_metrics(listen: Option<SocketAddr>) -> BridgeResult<()> {
    if let Some(addr) = listen {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .map_err(|e| insteon_bridge::BridgeError::config(format!("metrics exporter: {e}")))?;
        tracing::info!("serving metrics on {}", addr);
    }
    insteon_engine::telemetry::describe_metrics();
    Ok(())
}

#[cfg(not(feature = "prometheus"))]
fn init_metrics(listen: Option<SocketAddr>) -> BridgeResult<()> {
    if let Some(addr) = listen {
        tracing::warn!("built without the prometheus feature, not serving metrics on {}", addr);
    }
    insteon_engine::telemetry::describe_metrics();
    Ok(())
}

fn check(path: &std::path::Path) -> BridgeResult<()> {
    let config = Config::load(path)?;
    let modem = config.build_modem()?;
    println!("modem {}", modem.address());

    for device in &config.devices {
        let mut bridge = DimmerBridge::new(device.address, device.name.as_str())?;
        bridge.load_config(&config.dimmer, config.mqtt.qos)?;
        println!("{} '{}'", device.address, device.name);
        for (kind, topic) in bridge.input_topics() {
            let label = match kind {
                InputKind::OnOff => "on_off",
                InputKind::Level => "level",
                InputKind::Scene => "scene",
            };
            println!("  {label:<8} {topic}");
        }
    }
    Ok(())
}

fn render(
    address: Address,
    level: u8,
    mode: Mode,
    manual: Option<Manual>,
    reason: &str,
    path: Option<&std::path::Path>,
) -> BridgeResult<()> {
    let dimmer = match path {
        Some(path) => Config::load(path)?.dimmer,
        None => Default::default(),
    };
    let bridge = DimmerBridge::new(address, "")?;

    let (topic, payload, data) = match manual {
        Some(manual) => (
            dimmer.manual_state_topic,
            dimmer
                .manual_state_payload
                .unwrap_or_else(|| DEFAULT_MANUAL_STATE_PAYLOAD.to_string()),
            bridge.template_data(None, Some(manual), Some(reason)),
        ),
        None => (
            Some(
                dimmer
                    .state_topic
                    .unwrap_or_else(|| DEFAULT_STATE_TOPIC.to_string()),
            ),
            dimmer
                .state_payload
                .unwrap_or_else(|| DEFAULT_STATE_PAYLOAD.to_string()),
            bridge.template_data(Some((level, mode)), None, Some(reason)),
        ),
    };

    let topic = match topic.filter(|t| !t.trim().is_empty()) {
        Some(topic) => Template::compile(&topic)?.render(&data)?,
        None => "(disabled)".to_string(),
    };
    println!("{topic}");
    println!("{}", Template::compile(&payload)?.render(&data)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_listen_is_global() {
        let args = Args::try_parse_from([
            "insteon-bridge",
            "check",
            "bridge.yaml",
            "--metrics-listen",
            "127.0.0.1:9000",
        ])
        .unwrap();
        assert_eq!(args.metrics_listen, Some("127.0.0.1:9000".parse().unwrap()));
        assert!(matches!(args.command, Command::Check { .. }));
    }

    #[test]
    fn test_init_metrics_without_listener() {
        assert!(init_metrics(None).is_ok());
    }
}
