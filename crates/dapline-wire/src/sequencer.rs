//! Session sequencer.
//!
//! Allocates outgoing sequence numbers, tracks pending requests by seq,
//! routes responses back to waiting callers via oneshot channels, fans
//! events out to observers, and answers adapter-role requests from
//! registered command handlers.
//!
//! The sequencer is transport-free; [`crate::connection::DapConnection`]
//! drives it from the reader and writer tasks.

use std::collections::HashMap;
use std::time::Instant;

use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::DapError;
use crate::protocol::{Event, Message, Request, Response};

/// Callback invoked for incoming events.
pub type EventObserver = Box<dyn Fn(&Event) + Send + Sync>;

/// Callback answering an incoming request: `Ok(body)` becomes a successful
/// response, `Err(message)` a failed one.
pub type CommandHandler = Box<dyn Fn(&Request) -> Result<Option<Value>, String> + Send + Sync>;

/// How a pending request ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    /// The adapter answered.
    Resolved(Response),
    /// The caller's timeout expired first.
    TimedOut,
    /// The caller cancelled the request.
    Cancelled,
    /// The connection went away first.
    ConnectionClosed,
}

impl RequestOutcome {
    /// Collapse the outcome into the response body or an error.
    pub fn into_result(self, command: &str) -> Result<Option<Value>, DapError> {
        match self {
            RequestOutcome::Resolved(resp) if resp.success => Ok(resp.body),
            RequestOutcome::Resolved(resp) => Err(DapError::Adapter {
                command: resp.command,
                message: resp
                    .message
                    .unwrap_or_else(|| "request failed without a message".into()),
            }),
            RequestOutcome::TimedOut => Err(DapError::Timeout {
                command: command.into(),
            }),
            RequestOutcome::Cancelled => Err(DapError::Cancelled {
                command: command.into(),
            }),
            RequestOutcome::ConnectionClosed => Err(DapError::ConnectionClosed),
        }
    }
}

/// A request that has been issued and not yet answered.
#[derive(Debug)]
pub struct PendingRequest {
    /// Sequence number of the request.
    pub seq: i64,
    /// The command that was sent.
    pub command: String,
    /// When the request was issued.
    pub issued_at: Instant,
    responder: oneshot::Sender<RequestOutcome>,
}

/// Per-connection sequencing state.
pub struct Sequencer {
    next_seq: i64,
    pending: HashMap<i64, PendingRequest>,
    observers: HashMap<String, Vec<EventObserver>>,
    catch_all: Option<EventObserver>,
    handlers: HashMap<String, CommandHandler>,
    closed: bool,
}

impl Sequencer {
    /// Create a sequencer whose first outgoing seq is 1.
    pub fn new() -> Self {
        Self {
            next_seq: 1,
            pending: HashMap::new(),
            observers: HashMap::new(),
            catch_all: None,
            handlers: HashMap::new(),
            closed: false,
        }
    }

    /// Allocate the next outgoing sequence number.
    fn next_seq(&mut self) -> i64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Whether [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// How many requests are awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Look up a pending request.
    pub fn pending(&self, seq: i64) -> Option<&PendingRequest> {
        self.pending.get(&seq)
    }

    /// Issue a request: allocate its seq and register it as pending.
    ///
    /// The receiver completes exactly once with the request's outcome.
    pub fn issue(
        &mut self,
        command: &str,
        arguments: Option<Value>,
    ) -> Result<(Request, oneshot::Receiver<RequestOutcome>), DapError> {
        if self.closed {
            return Err(DapError::ConnectionClosed);
        }
        let seq = self.next_seq();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(
            seq,
            PendingRequest {
                seq,
                command: command.to_owned(),
                issued_at: Instant::now(),
                responder: tx,
            },
        );
        Ok((Request::new(seq, command, arguments), rx))
    }

    /// Build an outgoing event with the next seq.
    pub fn event(&mut self, event: &str, body: Option<Value>) -> Result<Event, DapError> {
        if self.closed {
            return Err(DapError::ConnectionClosed);
        }
        Ok(Event::new(self.next_seq(), event, body))
    }

    /// Register an observer for one event name.
    ///
    /// Observers for the same name run in registration order.
    pub fn on_event(&mut self, event: impl Into<String>, observer: EventObserver) {
        self.observers.entry(event.into()).or_default().push(observer);
    }

    /// Register the observer for events nobody else subscribed to.
    pub fn on_any_event(&mut self, observer: EventObserver) {
        self.catch_all = Some(observer);
    }

    /// Register the handler for an incoming request command.
    pub fn on_request(&mut self, command: impl Into<String>, handler: CommandHandler) {
        self.handlers.insert(command.into(), handler);
    }

    /// Route an incoming message.
    ///
    /// - Responses resolve the matching pending request; a response with
    ///   no pending entry is [`DapError::UnsolicitedResponse`] and changes
    ///   nothing.
    /// - Events go to their observers, or the catch-all, or nowhere.
    /// - Requests go to their command handler. The reply to send back is
    ///   returned; without a handler the reply is a failure.
    pub fn on_incoming(&mut self, message: Message) -> Result<Option<Response>, DapError> {
        match message {
            Message::Response(resp) => {
                let request_seq = resp.request_seq;
                let entry = self
                    .pending
                    .remove(&request_seq)
                    .ok_or(DapError::UnsolicitedResponse { request_seq })?;
                tracing::debug!(
                    "{} (seq {}) resolved after {:?}, success={}",
                    entry.command,
                    request_seq,
                    entry.issued_at.elapsed(),
                    resp.success
                );
                // The caller may have stopped waiting; that's fine.
                let _ = entry.responder.send(RequestOutcome::Resolved(resp));
                Ok(None)
            }
            Message::Event(event) => {
                match self.observers.get(&event.event) {
                    Some(observers) => observers.iter().for_each(|observe| observe(&event)),
                    None => match &self.catch_all {
                        Some(observe) => observe(&event),
                        None => tracing::debug!("dropped unobserved event: {}", event.event),
                    },
                }
                Ok(None)
            }
            Message::Request(req) => {
                if self.closed {
                    tracing::debug!("ignoring {} request on closed session", req.command);
                    return Ok(None);
                }
                let outcome = match self.handlers.get(&req.command) {
                    Some(handler) => handler(&req),
                    None => Err(format!("unsupported command: {}", req.command)),
                };
                let seq = self.next_seq();
                let reply = match outcome {
                    Ok(body) => Response::success(seq, &req, body),
                    Err(message) => Response::failure(seq, &req, message),
                };
                Ok(Some(reply))
            }
        }
    }

    /// Cancel a pending request. Returns false if it was not pending.
    pub fn cancel(&mut self, seq: i64) -> bool {
        self.finish(seq, RequestOutcome::Cancelled)
    }

    /// Time out a pending request. Returns false if it was not pending.
    pub fn expire(&mut self, seq: i64) -> bool {
        self.finish(seq, RequestOutcome::TimedOut)
    }

    /// Close the session: every pending request resolves with
    /// [`RequestOutcome::ConnectionClosed`] and further sends fail.
    ///
    /// Returns how many requests were still pending.
    pub fn close(&mut self) -> usize {
        self.closed = true;
        let count = self.pending.len();
        for (_, entry) in self.pending.drain() {
            let _ = entry.responder.send(RequestOutcome::ConnectionClosed);
        }
        count
    }

    fn finish(&mut self, seq: i64, outcome: RequestOutcome) -> bool {
        match self.pending.remove(&seq) {
            Some(entry) => {
                let _ = entry.responder.send(outcome);
                true
            }
            None => false,
        }
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequencer")
            .field("next_seq", &self.next_seq)
            .field("pending", &self.pending.len())
            .field("observed_events", &self.observers.len())
            .field("handlers", &self.handlers.len())
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn response(request_seq: i64, success: bool) -> Message {
        Message::Response(Response {
            seq: 100 + request_seq,
            request_seq,
            success,
            command: "threads".into(),
            message: (!success).then(|| "not stopped".to_string()),
            body: success.then(|| json!({"threads": []})),
        })
    }

    #[test]
    fn seqs_start_at_one_without_gaps() {
        let mut seq = Sequencer::new();
        let mut receivers = Vec::new();
        let issued: Vec<i64> = (0..5)
            .map(|_| {
                let (req, rx) = seq.issue("threads", None).unwrap();
                receivers.push(rx);
                req.seq
            })
            .collect();
        assert_eq!(issued, vec![1, 2, 3, 4, 5]);
        assert_eq!(seq.pending_count(), 5);
    }

    #[test]
    fn cancelled_seqs_are_never_reused() {
        let mut seq = Sequencer::new();
        let (first, _rx1) = seq.issue("next", None).unwrap();
        assert!(seq.cancel(first.seq));
        let (second, _rx2) = seq.issue("next", None).unwrap();
        assert_eq!(second.seq, first.seq + 1);
    }

    #[test]
    fn events_and_replies_share_the_outgoing_counter() {
        let mut seq = Sequencer::new();
        let (req, _rx) = seq.issue("initialize", None).unwrap();
        let event = seq.event("initialized", None).unwrap();
        let reply = seq
            .on_incoming(Message::Request(Request::new(1, "runInTerminal", None)))
            .unwrap()
            .unwrap();
        assert_eq!((req.seq, event.seq, reply.seq), (1, 2, 3));
    }

    #[test]
    fn pending_entry_records_command() {
        let mut seq = Sequencer::new();
        let (req, _rx) = seq.issue("stackTrace", Some(json!({"threadId": 1}))).unwrap();
        let pending = seq.pending(req.seq).unwrap();
        assert_eq!(pending.command, "stackTrace");
        assert_eq!(pending.seq, req.seq);
        assert_eq!(req.arguments.unwrap()["threadId"], 1);
    }

    #[tokio::test]
    async fn response_resolves_matching_request() {
        let mut seq = Sequencer::new();
        let (_req, rx) = seq.issue("threads", None).unwrap();
        assert!(seq.on_incoming(response(1, true)).unwrap().is_none());
        assert_eq!(seq.pending_count(), 0);

        let body = rx.await.unwrap().into_result("threads").unwrap();
        assert_eq!(body.unwrap()["threads"], json!([]));
    }

    #[tokio::test]
    async fn failed_response_is_adapter_error() {
        let mut seq = Sequencer::new();
        let (_req, rx) = seq.issue("threads", None).unwrap();
        seq.on_incoming(response(1, false)).unwrap();

        match rx.await.unwrap().into_result("threads") {
            Err(DapError::Adapter { command, message }) => {
                assert_eq!(command, "threads");
                assert_eq!(message, "not stopped");
            }
            other => panic!("expected adapter error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn out_of_order_responses_reach_their_callers() {
        let mut seq = Sequencer::new();
        let (_r1, rx1) = seq.issue("threads", None).unwrap();
        let (_r2, rx2) = seq.issue("threads", None).unwrap();

        seq.on_incoming(response(2, true)).unwrap();
        seq.on_incoming(response(1, false)).unwrap();

        assert!(rx1.await.unwrap().into_result("threads").is_err());
        assert!(rx2.await.unwrap().into_result("threads").is_ok());
    }

    #[test]
    fn response_for_unissued_seq_is_unsolicited() {
        let mut seq = Sequencer::new();
        let (_req, mut rx) = seq.issue("threads", None).unwrap();

        let err = seq.on_incoming(response(7, true)).unwrap_err();
        assert!(matches!(err, DapError::UnsolicitedResponse { request_seq: 7 }));
        assert_eq!(seq.pending_count(), 1);
        assert!(rx.try_recv().is_err(), "no caller may be unblocked");
    }

    #[test]
    fn duplicate_response_is_unsolicited() {
        let mut seq = Sequencer::new();
        let (_req, _rx) = seq.issue("threads", None).unwrap();
        seq.on_incoming(response(1, true)).unwrap();
        let err = seq.on_incoming(response(1, true)).unwrap_err();
        assert!(matches!(err, DapError::UnsolicitedResponse { request_seq: 1 }));
    }

    #[test]
    fn late_response_after_cancel_is_unsolicited() {
        let mut seq = Sequencer::new();
        let (req, mut rx) = seq.issue("next", None).unwrap();
        assert!(seq.cancel(req.seq));
        assert_eq!(rx.try_recv().unwrap(), RequestOutcome::Cancelled);
        assert!(!seq.cancel(req.seq));

        let err = seq.on_incoming(response(req.seq, true)).unwrap_err();
        assert!(matches!(err, DapError::UnsolicitedResponse { .. }));
    }

    #[test]
    fn expire_reports_timed_out() {
        let mut seq = Sequencer::new();
        let (req, mut rx) = seq.issue("evaluate", None).unwrap();
        assert!(seq.expire(req.seq));
        let outcome = rx.try_recv().unwrap();
        assert_eq!(outcome, RequestOutcome::TimedOut);
        assert!(matches!(
            outcome.into_result("evaluate"),
            Err(DapError::Timeout { .. })
        ));
    }

    #[test]
    fn close_resolves_every_pending_request_once() {
        let mut seq = Sequencer::new();
        let (_r1, _rx1) = seq.issue("initialize", None).unwrap();
        let (_r2, _rx2) = seq.issue("launch", None).unwrap();
        let (r3, mut rx3) = seq.issue("threads", None).unwrap();
        let (r4, mut rx4) = seq.issue("next", None).unwrap();
        assert_eq!((r3.seq, r4.seq), (3, 4));

        // 1 and 2 answered, 3 and 4 outstanding.
        seq.on_incoming(response(1, true)).unwrap();
        seq.on_incoming(response(2, true)).unwrap();

        assert_eq!(seq.close(), 2);
        assert_eq!(rx3.try_recv().unwrap(), RequestOutcome::ConnectionClosed);
        assert_eq!(rx4.try_recv().unwrap(), RequestOutcome::ConnectionClosed);
        assert_eq!(seq.close(), 0);
        assert!(rx3.try_recv().is_err());
    }

    #[test]
    fn sends_fail_after_close() {
        let mut seq = Sequencer::new();
        seq.close();
        assert!(seq.is_closed());
        assert!(matches!(
            seq.issue("threads", None),
            Err(DapError::ConnectionClosed)
        ));
        assert!(matches!(
            seq.event("output", None),
            Err(DapError::ConnectionClosed)
        ));
    }

    #[test]
    fn event_observers_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut seq = Sequencer::new();
        for tag in ["first", "second"] {
            let log = log.clone();
            seq.on_event(
                "stopped",
                Box::new(move |e| log.lock().unwrap().push(format!("{tag}:{}", e.seq))),
            );
        }
        let catch_all_log = log.clone();
        seq.on_any_event(Box::new(move |e| {
            catch_all_log.lock().unwrap().push(format!("any:{}", e.event))
        }));

        seq.on_incoming(Message::Event(Event::new(9, "stopped", None)))
            .unwrap();
        seq.on_incoming(Message::Event(Event::new(10, "loadedSource", None)))
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:9", "second:9", "any:loadedSource"]
        );
    }

    #[test]
    fn unobserved_event_is_dropped_silently() {
        let mut seq = Sequencer::new();
        let result = seq.on_incoming(Message::Event(Event::new(1, "process", None)));
        assert!(matches!(result, Ok(None)));
    }

    #[test]
    fn request_handler_builds_reply() {
        let mut seq = Sequencer::new();
        seq.on_request(
            "threads",
            Box::new(|_| Ok(Some(json!({"threads": [{"id": 1, "name": "main"}]})))),
        );
        seq.on_request("next", Box::new(|_| Err("not stopped".into())));

        let ok = seq
            .on_incoming(Message::Request(Request::new(4, "threads", None)))
            .unwrap()
            .unwrap();
        assert!(ok.success);
        assert_eq!(ok.request_seq, 4);
        assert_eq!(ok.body.unwrap()["threads"][0]["name"], "main");

        let failed = seq
            .on_incoming(Message::Request(Request::new(5, "next", None)))
            .unwrap()
            .unwrap();
        assert!(!failed.success);
        assert_eq!(failed.message.as_deref(), Some("not stopped"));
    }

    #[test]
    fn request_without_handler_fails_descriptively() {
        let mut seq = Sequencer::new();
        let reply = seq
            .on_incoming(Message::Request(Request::new(1, "goto", None)))
            .unwrap()
            .unwrap();
        assert!(!reply.success);
        assert_eq!(reply.command, "goto");
        assert!(reply.message.unwrap().contains("goto"));
    }

    #[test]
    fn dropped_receiver_doesnt_panic() {
        let mut seq = Sequencer::new();
        let (_req, rx) = seq.issue("threads", None).unwrap();
        drop(rx);
        assert!(seq.on_incoming(response(1, true)).is_ok());
    }
}
