//! Transport bindings: TCP, spawned adapter processes, and stdio.

use std::net::SocketAddr;
use std::process::Stdio;

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::process::{Child, Command};

use crate::connection::{ConnectionOptions, DapConnection};
use crate::error::DapError;
use crate::sequencer::Sequencer;

/// Connect to an adapter listening on TCP.
pub async fn connect_tcp<A: ToSocketAddrs>(
    addr: A,
    sequencer: Sequencer,
    options: ConnectionOptions,
) -> Result<DapConnection, DapError> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    tracing::info!("connected to adapter at {}", stream.peer_addr()?);
    let (reader, writer) = stream.into_split();
    Ok(DapConnection::start(reader, writer, sequencer, options))
}

/// Accept one client on `listener` (adapter role).
pub async fn accept_tcp(
    listener: &TcpListener,
    sequencer: Sequencer,
    options: ConnectionOptions,
) -> Result<(DapConnection, SocketAddr), DapError> {
    let (stream, peer) = listener.accept().await?;
    stream.set_nodelay(true)?;
    tracing::info!("accepted client from {}", peer);
    let (reader, writer) = stream.into_split();
    Ok((DapConnection::start(reader, writer, sequencer, options), peer))
}

/// Spawn an adapter process and talk to it over its stdin/stdout.
///
/// The adapter's stderr is inherited. The child is killed when the
/// returned handle is dropped.
pub async fn spawn_adapter(
    program: &str,
    args: &[String],
    sequencer: Sequencer,
    options: ConnectionOptions,
) -> Result<(DapConnection, Child), DapError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| std::io::Error::new(e.kind(), format!("{program}: {e}")))?;

    let stdin = child.stdin.take().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::BrokenPipe, "could not capture stdin")
    })?;
    let stdout = child.stdout.take().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::BrokenPipe, "could not capture stdout")
    })?;

    tracing::info!("spawned adapter {} (pid {:?})", program, child.id());
    Ok((DapConnection::start(stdout, stdin, sequencer, options), child))
}

/// Serve DAP over this process's own stdin/stdout (adapter role).
pub fn stdio(sequencer: Sequencer, options: ConnectionOptions) -> DapConnection {
    DapConnection::start(tokio::io::stdin(), tokio::io::stdout(), sequencer, options)
}
