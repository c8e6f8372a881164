use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the probe reaches the adapter.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Connect to an adapter already listening on TCP.
    #[default]
    Tcp,
    /// Spawn the adapter and talk over its stdin/stdout.
    Spawn,
}

/// Log verbosity level.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Most verbose; includes every frame.
    Trace,
    /// Debug messages.
    Debug,
    /// Informational messages (default).
    #[default]
    Info,
    /// Warnings only.
    Warn,
    /// Errors only.
    Error,
}

impl LogLevel {
    /// The `tracing` filter directive for this level.
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Adapter connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Transport used to reach the adapter.
    #[serde(default)]
    pub transport: TransportKind,
    /// Adapter host for `tcp`.
    #[serde(default = "default_host")]
    pub host: String,
    /// Adapter port for `tcp`.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Adapter executable for `spawn`.
    #[serde(default)]
    pub program: Option<String>,
    /// Arguments passed to `program`.
    #[serde(default)]
    pub args: Vec<String>,
    /// Per-request timeout in milliseconds (0 = wait forever).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Largest inbound message body accepted, in bytes.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    4711
}
fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_max_frame_bytes() -> usize {
    16 * 1024 * 1024
}

impl ConnectionConfig {
    /// `host:port` for the tcp transport.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The request timeout, or `None` when disabled.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Tcp,
            host: default_host(),
            port: default_port(),
            program: None,
            args: Vec::new(),
            request_timeout_ms: default_request_timeout_ms(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log verbosity level.
    #[serde(default)]
    pub level: LogLevel,
    /// Optional path to a log file; stderr when absent.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            file: None,
        }
    }
}

/// One request the probe sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// DAP command name.
    pub command: String,
    /// Request arguments, passed through as JSON.
    #[serde(default)]
    pub arguments: Option<toml::Table>,
    /// Event to wait for after the response arrives.
    #[serde(default)]
    pub wait_for_event: Option<String>,
}

/// The probe's request scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// How long a step waits for its `wait_for_event`, in milliseconds.
    #[serde(default = "default_event_timeout_ms")]
    pub event_timeout_ms: u64,
    /// Abort the scenario at the first failing step.
    #[serde(default)]
    pub stop_on_error: bool,
    /// Steps in the order they are sent. Empty means the built-in
    /// initialize/disconnect handshake.
    #[serde(default)]
    pub steps: Vec<Step>,
}

fn default_event_timeout_ms() -> u64 {
    5_000
}

impl ScenarioConfig {
    /// The event wait timeout.
    pub fn event_timeout(&self) -> Duration {
        Duration::from_millis(self.event_timeout_ms)
    }
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            event_timeout_ms: default_event_timeout_ms(),
            stop_on_error: false,
            steps: Vec::new(),
        }
    }
}

/// Top-level dapline configuration.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Adapter connection.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
    /// Probe scenario.
    #[serde(default)]
    pub scenario: ScenarioConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = Config::default();
        assert_eq!(cfg.connection.transport, TransportKind::Tcp);
        assert_eq!(cfg.connection.address(), "127.0.0.1:4711");
        assert!(cfg.connection.program.is_none());
        assert!(cfg.connection.args.is_empty());
        assert_eq!(
            cfg.connection.request_timeout(),
            Some(Duration::from_secs(10))
        );
        assert_eq!(cfg.connection.max_frame_bytes, 16 * 1024 * 1024);
        assert_eq!(cfg.log.level, LogLevel::Info);
        assert!(cfg.log.file.is_none());
        assert_eq!(cfg.scenario.event_timeout(), Duration::from_secs(5));
        assert!(!cfg.scenario.stop_on_error);
        assert!(cfg.scenario.steps.is_empty());
    }

    #[test]
    fn zero_timeout_disables_it() {
        let conn = ConnectionConfig {
            request_timeout_ms: 0,
            ..ConnectionConfig::default()
        };
        assert_eq!(conn.request_timeout(), None);
    }

    #[test]
    fn serde_roundtrip_preserves_values() {
        let mut arguments = toml::Table::new();
        arguments.insert("program".into(), toml::Value::String("fib.js".into()));
        arguments.insert("stopOnEntry".into(), toml::Value::Boolean(false));

        let cfg = Config {
            connection: ConnectionConfig {
                transport: TransportKind::Spawn,
                host: "localhost".into(),
                port: 5000,
                program: Some("goja-dap".into()),
                args: vec!["--stdio".into()],
                request_timeout_ms: 2500,
                max_frame_bytes: 1024,
            },
            log: LogConfig {
                level: LogLevel::Debug,
                file: Some(PathBuf::from("/tmp/dapline.log")),
            },
            scenario: ScenarioConfig {
                event_timeout_ms: 100,
                stop_on_error: true,
                steps: vec![
                    Step {
                        command: "launch".into(),
                        arguments: Some(arguments),
                        wait_for_event: None,
                    },
                    Step {
                        command: "configurationDone".into(),
                        arguments: None,
                        wait_for_event: Some("stopped".into()),
                    },
                ],
            },
        };

        let toml_str = toml::to_string(&cfg).expect("serialize");
        let deserialized: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(cfg, deserialized);
    }

    #[test]
    fn parse_from_toml_string() {
        let input = r#"
[connection]
transport = "spawn"
program = "goja-dap"
args = ["--stdio"]

[log]
level = "trace"

[[scenario.steps]]
command = "initialize"
arguments = { adapterID = "goja", linesStartAt1 = true }
wait_for_event = "initialized"

[[scenario.steps]]
command = "threads"
"#;
        let cfg: Config = toml::from_str(input).expect("parse toml");
        assert_eq!(cfg.connection.transport, TransportKind::Spawn);
        assert_eq!(cfg.connection.program.as_deref(), Some("goja-dap"));
        assert_eq!(cfg.log.level.as_filter(), "trace");
        assert_eq!(cfg.scenario.steps.len(), 2);
        let init = &cfg.scenario.steps[0];
        assert_eq!(init.wait_for_event.as_deref(), Some("initialized"));
        let args = init.arguments.as_ref().unwrap();
        assert_eq!(args["adapterID"].as_str(), Some("goja"));
        assert!(cfg.scenario.steps[1].arguments.is_none());
        // Unspecified fields keep defaults via serde(default)
        assert_eq!(cfg.connection.port, 4711);
        assert_eq!(cfg.scenario.event_timeout_ms, 5000);
    }

    #[test]
    fn unknown_transport_is_rejected() {
        let result: Result<Config, _> = toml::from_str("[connection]\ntransport = \"pipe\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let cfg: Config = toml::from_str("").expect("parse empty toml");
        assert_eq!(cfg, Config::default());
    }
}
