//! The probe scenario: connect, send each configured request in order, and
//! log every response and event.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tokio::process::Child;
use tokio::sync::mpsc;
use tracing::{info, warn};

use dapline_config::{Config, ScenarioConfig, Step, TransportKind};
use dapline_wire::{
    connect_tcp, spawn_adapter, to_value, ConnectionOptions, DapConnection, DisconnectArguments,
    Event, InitializeRequestArguments, Sequencer,
};

/// How long a spawned adapter gets to exit after the connection closes.
const CHILD_EXIT_GRACE: Duration = Duration::from_secs(2);

/// A request ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeStep {
    pub command: String,
    pub arguments: Option<Value>,
    pub wait_for_event: Option<String>,
}

impl ProbeStep {
    fn from_config(step: &Step) -> Result<Self> {
        let arguments = step
            .arguments
            .as_ref()
            .map(to_value)
            .transpose()
            .with_context(|| format!("arguments of step '{}'", step.command))?;
        Ok(Self {
            command: step.command.clone(),
            arguments,
            wait_for_event: step.wait_for_event.clone(),
        })
    }
}

/// Steps for `scenario`; the initialize/disconnect handshake when it has none.
pub fn build_steps(scenario: &ScenarioConfig) -> Result<Vec<ProbeStep>> {
    if !scenario.steps.is_empty() {
        return scenario.steps.iter().map(ProbeStep::from_config).collect();
    }

    let initialize = InitializeRequestArguments {
        client_id: Some("dapline".into()),
        client_name: Some("dapline probe".into()),
        adapter_id: "dapline".into(),
        lines_start_at1: Some(true),
        columns_start_at1: Some(true),
        path_format: Some("path".into()),
        ..Default::default()
    };
    let disconnect = DisconnectArguments {
        terminate_debuggee: Some(true),
        ..Default::default()
    };
    Ok(vec![
        ProbeStep {
            command: "initialize".into(),
            arguments: Some(to_value(&initialize)?),
            wait_for_event: None,
        },
        ProbeStep {
            command: "disconnect".into(),
            arguments: Some(to_value(&disconnect)?),
            wait_for_event: None,
        },
    ])
}

/// Hands out event arrivals to steps waiting for them.
///
/// Each arrival satisfies one wait, so an event that lands before its
/// step starts waiting is not lost.
#[derive(Debug)]
pub struct EventWaiter {
    rx: mpsc::UnboundedReceiver<String>,
    arrived: HashMap<String, usize>,
}

impl EventWaiter {
    /// Wait up to `limit` for an unclaimed `event`.
    pub async fn wait_for(&mut self, event: &str, limit: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + limit;
        loop {
            if let Some(count) = self.arrived.get_mut(event).filter(|c| **c > 0) {
                *count -= 1;
                return true;
            }
            match tokio::time::timeout_at(deadline, self.rx.recv()).await {
                Ok(Some(name)) => *self.arrived.entry(name).or_default() += 1,
                Ok(None) | Err(_) => return false,
            }
        }
    }
}

/// Register event logging on `sequencer`, and tracking for every event a
/// step waits for.
pub fn observe(sequencer: &mut Sequencer, steps: &[ProbeStep]) -> EventWaiter {
    let (tx, rx) = mpsc::unbounded_channel();
    let awaited: HashSet<&str> = steps
        .iter()
        .filter_map(|s| s.wait_for_event.as_deref())
        .collect();

    for name in awaited {
        let tx = tx.clone();
        sequencer.on_event(
            name,
            Box::new(move |event| {
                log_event(event);
                let _ = tx.send(event.event.clone());
            }),
        );
    }
    sequencer.on_any_event(Box::new(log_event));

    EventWaiter {
        rx,
        arrived: HashMap::new(),
    }
}

fn log_event(event: &Event) {
    match &event.body {
        Some(body) => info!("event {} (seq {}): {}", event.event, event.seq, body),
        None => info!("event {} (seq {})", event.event, event.seq),
    }
}

/// Outcome of a scenario run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ProbeReport {
    /// Steps whose request and awaited event both succeeded.
    pub completed: usize,
    /// One line per failed step.
    pub failures: Vec<String>,
}

/// Run `steps` over `conn`.
///
/// A failing step is logged and recorded; the run continues unless
/// `stop_on_error` is set or the connection is gone.
pub async fn run_steps(
    conn: &DapConnection,
    steps: &[ProbeStep],
    waiter: &mut EventWaiter,
    scenario: &ScenarioConfig,
) -> Result<ProbeReport> {
    let mut report = ProbeReport::default();

    for step in steps {
        let started = Instant::now();
        match conn.request(&step.command, step.arguments.clone()).await {
            Ok(Some(body)) => info!("{} ok in {:?}: {}", step.command, started.elapsed(), body),
            Ok(None) => info!("{} ok in {:?}", step.command, started.elapsed()),
            Err(e) => {
                warn!("{} failed: {}", step.command, e);
                report.failures.push(format!("{}: {}", step.command, e));
                if !e.is_recoverable() {
                    bail!("connection lost during {}: {}", step.command, e);
                }
                if scenario.stop_on_error {
                    bail!("stopping after failed step {}: {}", step.command, e);
                }
                continue;
            }
        }

        if let Some(event) = &step.wait_for_event {
            let limit = scenario.event_timeout();
            if !waiter.wait_for(event, limit).await {
                let failure = format!("{}: no {} event within {:?}", step.command, event, limit);
                warn!("{}", failure);
                report.failures.push(failure);
                if scenario.stop_on_error {
                    bail!("stopping after step {}: no {} event", step.command, event);
                }
                continue;
            }
        }
        report.completed += 1;
    }
    Ok(report)
}

/// Connect as configured, run the scenario, and close.
pub async fn run_probe(config: &Config) -> Result<()> {
    let steps = build_steps(&config.scenario)?;
    let mut sequencer = Sequencer::new();
    let mut waiter = observe(&mut sequencer, &steps);
    let options = ConnectionOptions {
        request_timeout: config.connection.request_timeout(),
        max_frame_bytes: config.connection.max_frame_bytes,
    };

    let (conn, child) = match config.connection.transport {
        TransportKind::Tcp => {
            let addr = config.connection.address();
            let conn = connect_tcp(addr.as_str(), sequencer, options)
                .await
                .with_context(|| format!("failed to connect to {addr}"))?;
            (conn, None)
        }
        TransportKind::Spawn => {
            let program = config
                .connection
                .program
                .as_deref()
                .context("connection.program is required for spawn")?;
            let (conn, child) =
                spawn_adapter(program, &config.connection.args, sequencer, options)
                    .await
                    .with_context(|| format!("failed to spawn adapter {program}"))?;
            (conn, Some(child))
        }
    };

    let result = run_steps(&conn, &steps, &mut waiter, &config.scenario).await;
    conn.close().await;
    if let Some(child) = child {
        reap(child).await;
    }

    let report = result?;
    info!(
        "scenario finished: {} of {} steps completed",
        report.completed,
        steps.len()
    );
    for failure in &report.failures {
        warn!("failed step: {}", failure);
    }
    Ok(())
}

async fn reap(mut child: Child) {
    match tokio::time::timeout(CHILD_EXIT_GRACE, child.wait()).await {
        Ok(Ok(status)) => info!("adapter exited: {}", status),
        Ok(Err(e)) => warn!("failed to wait for adapter: {}", e),
        Err(_) => {
            warn!("adapter still running after {:?}, killing it", CHILD_EXIT_GRACE);
            if let Err(e) = child.kill().await {
                warn!("failed to kill adapter: {}", e);
            }
        }
    }
}
