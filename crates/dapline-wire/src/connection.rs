//! Async connection driver.
//!
//! A [`DapConnection`] owns one bidirectional byte stream and runs three
//! tasks over it:
//!
//! - a reader task that decodes frames sequentially,
//! - a dispatch task fed by an unbounded queue, so slow observers never
//!   stall the reader,
//! - a writer task fed by a bounded queue, writing each frame with a
//!   single `write_all`.
//!
//! Senders reserve a slot in the writer queue first, then allocate a seq
//! and enqueue under the sequencer lock, so frames reach the wire in seq
//! order. The lock is never held while waiting for queue space: a peer that
//! stops reading stalls new sends but not timeouts, cancellation, inbound
//! dispatch or teardown.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::codec::{encode, FrameReader, DEFAULT_MAX_FRAME_BYTES};
use crate::error::DapError;
use crate::protocol::{Event, Message, Request};
use crate::sequencer::{RequestOutcome, Sequencer};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Capacity of the outbound frame queue.
const WRITER_QUEUE: usize = 64;

/// How long [`DapConnection::close`] waits for queued frames to drain.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Tunables for a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Timeout applied by [`DapConnection::request`]; `None` waits forever.
    pub request_timeout: Option<Duration>,
    /// Largest inbound body accepted before the frame is skipped.
    pub max_frame_bytes: usize,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

enum Outbound {
    Frame(Vec<u8>),
    Shutdown(oneshot::Sender<()>),
}

/// A live DAP connection.
///
/// Must be created inside a tokio runtime. Dropping the connection stops
/// the reader; frames already queued are still written. Use
/// [`close`](Self::close) to flush and shut down the write half.
pub struct DapConnection {
    sequencer: Arc<Mutex<Sequencer>>,
    writer_tx: mpsc::Sender<Outbound>,
    options: ConnectionOptions,
    reader: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl DapConnection {
    /// Start a connection with default options and no observers.
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Self::start(reader, writer, Sequencer::new(), ConnectionOptions::default())
    }

    /// Start a connection around a pre-configured sequencer.
    ///
    /// Observers and command handlers registered on `sequencer` are live
    /// before the first inbound byte is read.
    pub fn start<R, W>(reader: R, writer: W, sequencer: Sequencer, options: ConnectionOptions) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let sequencer = Arc::new(Mutex::new(sequencer));
        let (writer_tx, writer_rx) = mpsc::channel(WRITER_QUEUE);
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let writer = tokio::spawn(write_loop(writer, writer_rx, sequencer.clone()));
        let frames = FrameReader::with_max_frame_bytes(reader, options.max_frame_bytes);
        let reader = tokio::spawn(read_loop(frames, inbound_tx));
        let dispatcher = tokio::spawn(dispatch_loop(
            inbound_rx,
            sequencer.clone(),
            writer_tx.clone(),
        ));

        Self {
            sequencer,
            writer_tx,
            options,
            reader,
            dispatcher,
            writer,
        }
    }

    /// The options this connection was started with.
    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Send a request without waiting for its response.
    pub async fn send_request(
        &self,
        command: &str,
        arguments: Option<Value>,
    ) -> Result<PendingReply, DapError> {
        let permit = self
            .writer_tx
            .reserve()
            .await
            .map_err(|_| DapError::ConnectionClosed)?;
        let mut sequencer = self.sequencer.lock().await;
        let (request, rx) = sequencer.issue(command, arguments)?;
        let seq = request.seq;
        let frame = match encode(&Message::Request(request)) {
            Ok(frame) => frame,
            Err(e) => {
                sequencer.cancel(seq);
                return Err(e);
            }
        };
        permit.send(Outbound::Frame(frame));
        tracing::debug!("-> request {} (seq {})", command, seq);

        Ok(PendingReply {
            seq,
            command: command.to_owned(),
            rx,
            sequencer: self.sequencer.clone(),
            settled: false,
        })
    }

    /// Send a request and wait for its response body, using the
    /// connection's default timeout.
    pub async fn request(
        &self,
        command: &str,
        arguments: Option<Value>,
    ) -> Result<Option<Value>, DapError> {
        self.request_with_timeout(command, arguments, self.options.request_timeout)
            .await
    }

    /// Send a request and wait at most `limit` for its response body.
    pub async fn request_with_timeout(
        &self,
        command: &str,
        arguments: Option<Value>,
        limit: Option<Duration>,
    ) -> Result<Option<Value>, DapError> {
        self.send_request(command, arguments)
            .await?
            .wait_timeout(limit)
            .await
    }

    /// Cancel a pending request. Its caller sees [`DapError::Cancelled`].
    ///
    /// Returns false if the request was no longer pending.
    pub async fn cancel(&self, seq: i64) -> bool {
        self.sequencer.lock().await.cancel(seq)
    }

    /// Send an event (adapter role).
    pub async fn send_event(&self, event: &str, body: Option<Value>) -> Result<(), DapError> {
        let permit = self
            .writer_tx
            .reserve()
            .await
            .map_err(|_| DapError::ConnectionClosed)?;
        let mut sequencer = self.sequencer.lock().await;
        let event = sequencer.event(event, body)?;
        let seq = event.seq;
        let name = event.event.clone();
        let frame = encode(&Message::Event(event))?;
        permit.send(Outbound::Frame(frame));
        tracing::debug!("-> event {} (seq {})", name, seq);
        Ok(())
    }

    /// Observe one event name.
    pub async fn on_event<F>(&self, event: &str, observer: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.sequencer
            .lock()
            .await
            .on_event(event, Box::new(observer));
    }

    /// Observe events nobody else subscribed to.
    pub async fn on_any_event<F>(&self, observer: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.sequencer.lock().await.on_any_event(Box::new(observer));
    }

    /// Answer incoming requests for `command` (adapter role).
    pub async fn on_request<F>(&self, command: &str, handler: F)
    where
        F: Fn(&Request) -> Result<Option<Value>, String> + Send + Sync + 'static,
    {
        self.sequencer
            .lock()
            .await
            .on_request(command, Box::new(handler));
    }

    /// Number of requests still awaiting a response.
    pub async fn pending_count(&self) -> usize {
        self.sequencer.lock().await.pending_count()
    }

    /// Whether the connection has been torn down.
    pub async fn is_closed(&self) -> bool {
        self.sequencer.lock().await.is_closed()
    }

    /// Close the connection.
    ///
    /// Pending requests resolve with [`DapError::ConnectionClosed`], frames
    /// already queued are written, then the write half is shut down. If the
    /// peer does not drain the queue within a short grace period the writer
    /// is stopped and the remaining frames are discarded.
    /// Closing twice is harmless.
    pub async fn close(&self) {
        let orphaned = self.sequencer.lock().await.close();
        if orphaned > 0 {
            tracing::info!("closing connection with {} pending request(s)", orphaned);
        }
        self.reader.abort();

        let flush = async {
            let (done_tx, done_rx) = oneshot::channel();
            if self
                .writer_tx
                .send(Outbound::Shutdown(done_tx))
                .await
                .is_ok()
            {
                let _ = done_rx.await;
            }
        };
        if tokio::time::timeout(CLOSE_GRACE, flush).await.is_err() {
            tracing::warn!("peer is not reading; dropping unsent frames");
        }
        self.writer.abort();
        self.dispatcher.abort();
    }
}

impl Drop for DapConnection {
    fn drop(&mut self) {
        // Ending the reader ends dispatch, which tears the session down.
        self.reader.abort();
    }
}

impl std::fmt::Debug for DapConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DapConnection")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Handle to an issued request.
///
/// Dropping the handle before the outcome arrives cancels the request, so
/// abandoned requests do not linger in the pending table.
#[derive(Debug)]
pub struct PendingReply {
    seq: i64,
    command: String,
    rx: oneshot::Receiver<RequestOutcome>,
    sequencer: Arc<Mutex<Sequencer>>,
    settled: bool,
}

impl PendingReply {
    /// Seq of the issued request.
    pub fn seq(&self) -> i64 {
        self.seq
    }

    /// Command of the issued request.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Wait for the outcome with no time limit.
    pub async fn wait(mut self) -> Result<Option<Value>, DapError> {
        let outcome = (&mut self.rx).await;
        self.settle(outcome)
    }

    /// Wait for the outcome, expiring the request after `limit`.
    pub async fn wait_timeout(mut self, limit: Option<Duration>) -> Result<Option<Value>, DapError> {
        let Some(limit) = limit else {
            return self.wait().await;
        };

        if let Ok(outcome) = tokio::time::timeout(limit, &mut self.rx).await {
            return self.settle(outcome);
        }

        if self.sequencer.lock().await.expire(self.seq) {
            tracing::warn!("{} (seq {}) timed out after {:?}", self.command, self.seq, limit);
        }
        // Either the expiry or a response that raced it is in the channel now.
        let outcome = (&mut self.rx).await;
        self.settle(outcome)
    }

    fn settle(
        &mut self,
        outcome: Result<RequestOutcome, oneshot::error::RecvError>,
    ) -> Result<Option<Value>, DapError> {
        self.settled = true;
        outcome
            .unwrap_or(RequestOutcome::ConnectionClosed)
            .into_result(&self.command)
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let seq = self.seq;
        match self.sequencer.try_lock() {
            Ok(mut sequencer) => {
                if sequencer.cancel(seq) {
                    tracing::debug!("{} (seq {}) abandoned", self.command, seq);
                }
            }
            Err(_) => {
                // Contended: finish the cancellation on the runtime.
                let sequencer = self.sequencer.clone();
                if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                    runtime.spawn(async move {
                        sequencer.lock().await.cancel(seq);
                    });
                }
            }
        }
    }
}

async fn read_loop<R>(mut frames: FrameReader<R>, inbound: mpsc::UnboundedSender<Message>)
where
    R: AsyncRead + Unpin,
{
    loop {
        match frames.read_message().await {
            Ok(message) => {
                tracing::debug!("<- {} (seq {})", message.kind(), message.seq());
                if inbound.send(message).is_err() {
                    break;
                }
            }
            Err(DapError::ConnectionClosed) => {
                tracing::info!("peer closed the stream");
                break;
            }
            Err(e) if e.is_recoverable() => {
                tracing::warn!("dropped inbound frame: {}", e);
            }
            Err(e) => {
                tracing::warn!("read failed: {}", e);
                break;
            }
        }
    }
}

async fn dispatch_loop(
    mut inbound: mpsc::UnboundedReceiver<Message>,
    sequencer: Arc<Mutex<Sequencer>>,
    writer_tx: mpsc::Sender<Outbound>,
) {
    while let Some(message) = inbound.recv().await {
        // Only requests produce a reply; reserve its queue slot before locking.
        let permit = match message {
            Message::Request(_) => writer_tx.reserve().await.ok(),
            _ => None,
        };
        let mut seq = sequencer.lock().await;
        match seq.on_incoming(message) {
            Ok(Some(reply)) => {
                let command = reply.command.clone();
                match (encode(&Message::Response(reply)), permit) {
                    (Ok(frame), Some(permit)) => permit.send(Outbound::Frame(frame)),
                    (Ok(_), None) => tracing::warn!("writer gone, reply to {} dropped", command),
                    (Err(e), _) => tracing::warn!("could not encode reply to {}: {}", command, e),
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("dropped inbound message: {}", e),
        }
    }

    let orphaned = sequencer.lock().await.close();
    if orphaned > 0 {
        tracing::info!("stream ended with {} pending request(s)", orphaned);
    }
}

async fn write_loop<W>(
    mut writer: W,
    mut outbound: mpsc::Receiver<Outbound>,
    sequencer: Arc<Mutex<Sequencer>>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(item) = outbound.recv().await {
        match item {
            Outbound::Frame(frame) => {
                if let Err(e) = write_frame(&mut writer, &frame).await {
                    tracing::warn!("write failed: {}", e);
                    break;
                }
            }
            Outbound::Shutdown(done) => {
                if let Err(e) = writer.shutdown().await {
                    tracing::debug!("shutdown of write half failed: {}", e);
                }
                let _ = done.send(());
                return;
            }
        }
    }
    sequencer.lock().await.close();
}

async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame).await?;
    writer.flush().await
}
