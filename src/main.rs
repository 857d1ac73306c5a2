//! Burrow CLI - forward a local port through an authenticated tunnel

use anyhow::{Context, Result};
use burrow_lib::{default_registry, fast_start, TunnelConfig, SSH_PROTOCOL};
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Burrow - forward local TCP ports through authenticated tunnels
#[derive(Parser, Debug)]
#[command(name = "burrow")]
#[command(about = "Burrow - forward local TCP ports through authenticated tunnels")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info", env = "BURROW_LOG_LEVEL")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Open a tunnel and forward a local port to the destination
    #[command(long_about = r#"
Open a tunnel through an intermediary host and forward a random local
port to the destination. The local endpoint is printed once the tunnel
is listening. Press Ctrl+C to close it.

EXAMPLES:
  # Reach an internal web server through an SSH bastion
  burrow connect --tunnel-endpoint 10.50.122.50:22 \
    --destination http://192.168.1.111:80 \
    --username root --password secret

  # Read the tunnel from a YAML file, overriding the password
  burrow connect --config tunnel.yaml --password "$PASSWORD"

ENVIRONMENT VARIABLES:
  BURROW_TUNNEL_PROTOCOL  Tunnel protocol (default: SSH)
  BURROW_TUNNEL_ENDPOINT  Intermediary address
  BURROW_DESTINATION      Final destination
  BURROW_USERNAME         Intermediary username
  BURROW_PASSWORD         Intermediary password
    "#)]
    Connect(ConnectArgs),

    /// List the tunnel protocols this build supports
    Protocols,
}

#[derive(Args, Debug, Default)]
struct ConnectArgs {
    /// YAML file describing the tunnel
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Tunnel protocol name
    #[arg(long, env = "BURROW_TUNNEL_PROTOCOL")]
    tunnel_protocol: Option<String>,

    /// Intermediary address (host:port, host, or a bare port)
    #[arg(long, env = "BURROW_TUNNEL_ENDPOINT")]
    tunnel_endpoint: Option<String>,

    /// Final destination ([protocol://]host[:port])
    #[arg(long, env = "BURROW_DESTINATION")]
    destination: Option<String>,

    /// Username on the intermediary
    #[arg(long, env = "BURROW_USERNAME")]
    username: Option<String>,

    /// Password on the intermediary
    #[arg(long, env = "BURROW_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

/// Tunnel description as stored in a `--config` file
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "snake_case")]
struct FileConfig {
    tunnel_protocol: Option<String>,
    tunnel_endpoint: Option<String>,
    destination: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

impl FileConfig {
    fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}

impl ConnectArgs {
    /// Merge flags over the optional config file and build the tunnel configuration
    fn into_tunnel_config(self) -> Result<TunnelConfig> {
        let file = match &self.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        let protocol = self
            .tunnel_protocol
            .or(file.tunnel_protocol)
            .unwrap_or_else(|| SSH_PROTOCOL.to_string());
        let tunnel_endpoint = self
            .tunnel_endpoint
            .or(file.tunnel_endpoint)
            .context("Missing tunnel endpoint (--tunnel-endpoint)")?;
        let destination = self
            .destination
            .or(file.destination)
            .context("Missing destination (--destination)")?;
        let username = self
            .username
            .or(file.username)
            .context("Missing username (--username)")?;
        let password = self.password.or(file.password).unwrap_or_default();

        TunnelConfig::build(protocol, tunnel_endpoint, &destination, username, password)
            .context("Invalid tunnel configuration")
    }
}

/// Setup logging, honoring RUST_LOG before the requested level
fn setup_logging(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .init();
}

async fn run_connect(args: ConnectArgs) -> Result<()> {
    let config = args.into_tunnel_config()?;
    info!(
        "Opening {} tunnel via {} as {}",
        config.protocol, config.tunnel_endpoint, config.credentials.username
    );

    let registry = default_registry();
    let tunnel = fast_start(&registry, &config)
        .await
        .context("Failed to start tunnel")?;

    println!("Local endpoint: {}", tunnel.local_endpoint());
    println!("Forwarding to:  {}", tunnel.remote_endpoint());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    info!("Received Ctrl+C, shutting down...");

    tunnel.stop().await;
    info!("Tunnel stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    match cli.command {
        Commands::Connect(args) => run_connect(args).await,
        Commands::Protocols => {
            for protocol in default_registry().protocols() {
                println!("{}", protocol);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_cli_parses_connect() {
        let cli = Cli::try_parse_from([
            "burrow",
            "connect",
            "--tunnel-endpoint",
            "10.50.122.50:22",
            "--destination",
            "http://192.168.1.111:80",
            "--username",
            "root",
            "--password",
            "secret",
        ])
        .unwrap();

        let Commands::Connect(args) = cli.command else {
            panic!("expected connect");
        };
        let config = args.into_tunnel_config().unwrap();
        assert_eq!(config.protocol, "SSH");
        assert_eq!(config.tunnel_endpoint, "10.50.122.50:22");
        assert_eq!(config.remote_addr, "192.168.1.111");
        assert_eq!(config.remote_port, 80);
        assert_eq!(config.tunneled_protocol, "http");
        assert_eq!(config.credentials.username, "root");
    }

    #[test]
    fn test_cli_parses_protocols() {
        let cli = Cli::try_parse_from(["burrow", "--log-level", "debug", "protocols"]).unwrap();
        assert!(matches!(cli.command, Commands::Protocols));
        assert_eq!(cli.log_level, "debug");
    }

    #[test]
    fn test_config_file_values() {
        let file = write_config(
            r#"
tunnel_endpoint: "bastion:2222"
destination: "https://internal.example"
username: "deploy"
password: "hunter2"
"#,
        );

        let args = ConnectArgs {
            config: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let config = args.into_tunnel_config().unwrap();
        assert_eq!(config.protocol, "SSH");
        assert_eq!(config.tunnel_endpoint, "bastion:2222");
        assert_eq!(config.remote_addr, "internal.example");
        assert_eq!(config.remote_port, 443);
        assert_eq!(config.credentials.username, "deploy");
    }

    #[test]
    fn test_flags_override_config_file() {
        let file = write_config(
            r#"
tunnel_protocol: "SSH"
tunnel_endpoint: "bastion:2222"
destination: "10.0.0.5:8080"
username: "deploy"
"#,
        );

        let args = ConnectArgs {
            config: Some(file.path().to_path_buf()),
            tunnel_endpoint: Some("22".to_string()),
            username: Some("root".to_string()),
            ..Default::default()
        };
        let config = args.into_tunnel_config().unwrap();
        assert_eq!(config.tunnel_endpoint, "22");
        assert_eq!(config.remote_addr, "10.0.0.5");
        assert_eq!(config.remote_port, 8080);
        assert_eq!(config.credentials.username, "root");
    }

    #[test]
    fn test_missing_destination() {
        let args = ConnectArgs {
            tunnel_endpoint: Some("bastion".to_string()),
            username: Some("root".to_string()),
            ..Default::default()
        };
        let err = args.into_tunnel_config().unwrap_err();
        assert!(err.to_string().contains("destination"));
    }

    #[test]
    fn test_invalid_destination_port() {
        let args = ConnectArgs {
            tunnel_endpoint: Some("bastion".to_string()),
            destination: Some("ftp://files.example".to_string()),
            username: Some("root".to_string()),
            ..Default::default()
        };
        let err = args.into_tunnel_config().unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid tunnel configuration"));
    }

    #[test]
    fn test_unreadable_config_file() {
        let args = ConnectArgs {
            config: Some(PathBuf::from("/nonexistent/burrow.yaml")),
            ..Default::default()
        };
        let err = args.into_tunnel_config().unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
