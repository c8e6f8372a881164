//! Command-line parsing.

use std::path::PathBuf;

use clap::Parser;

use dapline_config::{Config, TransportKind};

/// Connect to a debug adapter, run the configured request scenario and log
/// every response and event.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "dapline", version, long_about = None)]
pub struct CliArgs {
    /// Merge this config file over the global and project ones.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Connect to an adapter listening on TCP.
    #[arg(long, value_name = "HOST:PORT", value_parser = parse_tcp, conflicts_with = "spawn")]
    pub tcp: Option<TcpTarget>,

    /// Spawn the adapter and talk over its stdin/stdout.
    #[arg(long, value_name = "PROGRAM")]
    pub spawn: Option<String>,

    /// Arguments passed to the spawned adapter.
    #[arg(
        value_name = "ARGS",
        trailing_var_arg = true,
        allow_hyphen_values = true,
        requires = "spawn"
    )]
    pub adapter_args: Vec<String>,
}

/// `--tcp` address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpTarget {
    pub host: String,
    pub port: u16,
}

impl CliArgs {
    /// Apply the command-line target over the loaded config.
    pub fn apply(&self, config: &mut Config) {
        if let Some(target) = &self.tcp {
            config.connection.transport = TransportKind::Tcp;
            config.connection.host = target.host.clone();
            config.connection.port = target.port;
        } else if let Some(program) = &self.spawn {
            config.connection.transport = TransportKind::Spawn;
            config.connection.program = Some(program.clone());
            config.connection.args = self.adapter_args.clone();
        }
    }
}

fn parse_tcp(addr: &str) -> Result<TcpTarget, String> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| format!("expected <host:port>, got '{addr}'"))?;
    let port: u16 = port
        .parse()
        .map_err(|e| format!("invalid port in '{addr}': {e}"))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(format!("missing host in '{addr}'"));
    }
    Ok(TcpTarget {
        host: host.to_string(),
        port,
    })
}
