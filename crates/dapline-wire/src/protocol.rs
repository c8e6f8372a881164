//! DAP protocol message types.
//!
//! [`Message`] is the envelope every frame carries. The argument and body
//! types further down describe the standard commands; the session layer
//! never looks inside them.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::DapError;

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// A single DAP message, discriminated by its `type` field on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    /// A request (client → adapter, or reverse requests).
    Request(Request),
    /// A response to an earlier request.
    Response(Response),
    /// An unsolicited event.
    Event(Event),
}

/// A DAP request message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Sequence number.
    pub seq: i64,
    /// The command to execute.
    pub command: String,
    /// Command arguments.
    #[serde(
        default,
        deserialize_with = "explicit",
        skip_serializing_if = "Option::is_none"
    )]
    pub arguments: Option<Value>,
}

/// A DAP response message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Sequence number.
    pub seq: i64,
    /// Sequence number of the request this answers.
    pub request_seq: i64,
    /// Whether the request succeeded.
    pub success: bool,
    /// The command this response is for.
    pub command: String,
    /// Error message if `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Command-specific body.
    #[serde(
        default,
        deserialize_with = "explicit",
        skip_serializing_if = "Option::is_none"
    )]
    pub body: Option<Value>,
}

/// A DAP event message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Sequence number.
    pub seq: i64,
    /// The event name.
    pub event: String,
    /// Event-specific body.
    #[serde(
        default,
        deserialize_with = "explicit",
        skip_serializing_if = "Option::is_none"
    )]
    pub body: Option<Value>,
}

/// An absent field is `None`; an explicit `null` stays `Some(Value::Null)`.
fn explicit<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl Message {
    /// Classify a decoded JSON document by its `type` field.
    ///
    /// A `response` must carry `request_seq`; anything else that does not
    /// fit one of the three shapes is a framing error.
    pub fn from_value(value: Value) -> Result<Self, DapError> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| DapError::Framing("message has no \"type\" field".into()))?
            .to_owned();

        let parsed = match kind.as_str() {
            "request" => serde_json::from_value(value).map(Message::Request),
            "response" => {
                if value.get("request_seq").is_none() {
                    return Err(DapError::Framing("response without request_seq".into()));
                }
                serde_json::from_value(value).map(Message::Response)
            }
            "event" => serde_json::from_value(value).map(Message::Event),
            other => {
                return Err(DapError::Framing(format!("unknown message type '{other}'")));
            }
        };
        parsed.map_err(|e| DapError::Framing(format!("invalid {kind}: {e}")))
    }

    /// Parse and classify a JSON body.
    pub fn from_slice(body: &[u8]) -> Result<Self, DapError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| DapError::Framing(format!("invalid JSON body: {e}")))?;
        Self::from_value(value)
    }

    /// The message's own sequence number.
    pub fn seq(&self) -> i64 {
        match self {
            Message::Request(r) => r.seq,
            Message::Response(r) => r.seq,
            Message::Event(e) => e.seq,
        }
    }

    /// The wire name of the message type.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Request(_) => "request",
            Message::Response(_) => "response",
            Message::Event(_) => "event",
        }
    }
}

impl Request {
    /// Build a request.
    pub fn new(seq: i64, command: impl Into<String>, arguments: Option<Value>) -> Self {
        Self {
            seq,
            command: command.into(),
            arguments,
        }
    }
}

impl Response {
    /// A successful response to `request`.
    pub fn success(seq: i64, request: &Request, body: Option<Value>) -> Self {
        Self {
            seq,
            request_seq: request.seq,
            success: true,
            command: request.command.clone(),
            message: None,
            body,
        }
    }

    /// A failed response to `request`.
    pub fn failure(seq: i64, request: &Request, message: impl Into<String>) -> Self {
        Self {
            seq,
            request_seq: request.seq,
            success: false,
            command: request.command.clone(),
            message: Some(message.into()),
            body: None,
        }
    }
}

impl Event {
    /// Build an event.
    pub fn new(seq: i64, event: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            seq,
            event: event.into(),
            body,
        }
    }
}

/// Convert typed arguments or bodies to a JSON value.
pub fn to_value<T: Serialize>(value: &T) -> Result<Value, DapError> {
    serde_json::to_value(value).map_err(|e| DapError::Encoding(e.to_string()))
}

/// Interpret a response or event body as `T`.
///
/// A missing or `null` body is treated as an empty object, so types whose
/// fields are all optional still parse.
pub fn from_body<T: serde::de::DeserializeOwned>(body: Option<Value>) -> Result<T, DapError> {
    let body = match body {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(body) => body,
    };
    serde_json::from_value(body)
        .map_err(|e| DapError::InvalidResponse(format!("unexpected body shape: {e}")))
}

// ---------------------------------------------------------------------------
// Initialization
// ---------------------------------------------------------------------------

/// Arguments for the `initialize` request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequestArguments {
    /// ID of the client.
    #[serde(rename = "clientID", skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Human-readable name of the client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    /// ID of the debug adapter.
    #[serde(rename = "adapterID")]
    pub adapter_id: String,
    /// Client locale, e.g. "en-US".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    /// Whether lines are 1-based.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines_start_at1: Option<bool>,
    /// Whether columns are 1-based.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns_start_at1: Option<bool>,
    /// "path" or "uri".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_variable_type: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_variable_paging: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_run_in_terminal_request: Option<bool>,
}

/// Capabilities returned in the `initialize` response body.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_configuration_done_request: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_function_breakpoints: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_conditional_breakpoints: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_evaluate_for_hovers: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_step_back: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_set_variable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_restart_frame: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_terminate_request: Option<bool>,
}

/// Arguments for the `launch` request.
///
/// Launch configuration is adapter-specific; fields this type does not
/// name are kept in `extra` and written back out unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchRequestArguments {
    /// Launch without debugging.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_debug: Option<bool>,
    /// Program to launch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    /// Command-line arguments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    /// Working directory for the debuggee.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    /// Stop at the program's entry point.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_on_entry: Option<bool>,
    /// Adapter-specific fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Arguments for the `disconnect` request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectArguments {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminate_debuggee: Option<bool>,
}

// ---------------------------------------------------------------------------
// Breakpoints
// ---------------------------------------------------------------------------

/// A source location.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// Short name of the source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// File system path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Reference for sources without a path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_reference: Option<i64>,
}

/// A client-side breakpoint request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceBreakpoint {
    pub line: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit_condition: Option<String>,
    /// Logpoint message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_message: Option<String>,
}

/// Arguments for the `setBreakpoints` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointsArguments {
    pub source: Source,
    /// Replaces every breakpoint previously set in `source`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakpoints: Option<Vec<SourceBreakpoint>>,
}

/// A breakpoint as reported by the adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Breakpoint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Whether the adapter could place the breakpoint.
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<i64>,
}

/// Response body for `setBreakpoints`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetBreakpointsResponseBody {
    pub breakpoints: Vec<Breakpoint>,
}

// ---------------------------------------------------------------------------
// Execution control
// ---------------------------------------------------------------------------

/// Arguments for the `continue` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinueArguments {
    pub thread_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub single_thread: Option<bool>,
}

/// Response body for `continue`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinueResponseBody {
    #[serde(default)]
    pub all_threads_continued: Option<bool>,
}

/// Arguments for `next`, `stepIn` and `stepOut`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepArguments {
    /// The thread to step.
    pub thread_id: i64,
    /// "statement", "line" or "instruction".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub granularity: Option<String>,
}

/// Arguments for the `pause` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseArguments {
    pub thread_id: i64,
}

// ---------------------------------------------------------------------------
// Inspection
// ---------------------------------------------------------------------------

/// A thread in the debuggee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: i64,
    pub name: String,
}

/// Response body for `threads`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadsResponseBody {
    pub threads: Vec<Thread>,
}

/// Arguments for the `stackTrace` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTraceArguments {
    pub thread_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_frame: Option<i64>,
    /// Maximum number of frames; absent means all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub levels: Option<i64>,
}

/// A stack frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackFrame {
    pub id: i64,
    /// Usually the function name.
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    pub line: i64,
    pub column: i64,
}

/// Response body for `stackTrace`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTraceResponseBody {
    pub stack_frames: Vec<StackFrame>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_frames: Option<i64>,
}

/// Arguments for the `scopes` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopesArguments {
    pub frame_id: i64,
}

/// A scope (container for variables).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    /// e.g. "Locals", "Globals".
    pub name: String,
    pub variables_reference: i64,
    #[serde(default)]
    pub expensive: bool,
}

/// Response body for `scopes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopesResponseBody {
    pub scopes: Vec<Scope>,
}

/// Arguments for the `variables` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariablesArguments {
    pub variables_reference: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
}

/// A variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub name: String,
    pub value: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub variable_type: Option<String>,
    /// Non-zero when the variable has children.
    #[serde(default)]
    pub variables_reference: i64,
}

/// Response body for `variables`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariablesResponseBody {
    pub variables: Vec<Variable>,
}

/// Arguments for the `evaluate` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateArguments {
    pub expression: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_id: Option<i64>,
    /// "watch", "repl", "hover" or "clipboard".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Response body for `evaluate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResponseBody {
    pub result: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub result_type: Option<String>,
    #[serde(default)]
    pub variables_reference: i64,
}

// ---------------------------------------------------------------------------
// Event bodies
// ---------------------------------------------------------------------------

/// Body of the `stopped` event.
///
/// `reason` stays a plain string: adapters invent their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoppedEventBody {
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_threads_stopped: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit_breakpoint_ids: Option<Vec<i64>>,
}

/// Body of the `output` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputEventBody {
    /// "console", "stdout", "stderr" or "telemetry".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub output: String,
}

/// Body of the `exited` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitedEventBody {
    pub exit_code: i64,
}

/// Body of the `terminated` event.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TerminatedEventBody {
    /// Opaque data handed back on restart; any JSON value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart: Option<Value>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serializes_with_type_tag() {
        let msg = Message::Request(Request::new(
            1,
            "initialize",
            Some(json!({"clientID": "t"})),
        ));
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({"type": "request", "seq": 1, "command": "initialize", "arguments": {"clientID": "t"}})
        );
    }

    #[test]
    fn absent_optionals_are_not_serialized() {
        let msg = Message::Event(Event::new(4, "initialized", None));
        let text = serde_json::to_string(&msg).unwrap();
        assert!(!text.contains("body"));
        assert!(text.contains("\"type\":\"event\""));
    }

    #[test]
    fn explicit_null_survives_a_round_trip() {
        let messages = [
            Message::Request(Request::new(1, "configurationDone", Some(Value::Null))),
            Message::Request(Request::new(2, "configurationDone", None)),
            Message::Event(Event::new(3, "terminated", Some(Value::Null))),
            Message::Response(Response::success(
                4,
                &Request::new(1, "configurationDone", None),
                Some(Value::Null),
            )),
        ];
        for msg in messages {
            let text = serde_json::to_vec(&msg).unwrap();
            assert_eq!(Message::from_slice(&text).unwrap(), msg);
        }
    }

    #[test]
    fn classify_response() {
        let value = json!({
            "seq": 2,
            "type": "response",
            "request_seq": 1,
            "success": false,
            "command": "launch",
            "message": "no such file"
        });
        match Message::from_value(value).unwrap() {
            Message::Response(resp) => {
                assert_eq!(resp.request_seq, 1);
                assert!(!resp.success);
                assert_eq!(resp.message.as_deref(), Some("no such file"));
                assert!(resp.body.is_none());
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn classify_event() {
        let value = json!({"seq": 9, "type": "event", "event": "stopped", "body": {"reason": "step"}});
        let msg = Message::from_value(value).unwrap();
        assert_eq!(msg.kind(), "event");
        assert_eq!(msg.seq(), 9);
    }

    #[test]
    fn response_without_request_seq_is_rejected() {
        let value = json!({"seq": 2, "type": "response", "success": true, "command": "threads"});
        let err = Message::from_value(value).unwrap_err();
        assert!(matches!(err, DapError::Framing(_)));
        assert!(err.to_string().contains("request_seq"), "got: {err}");
    }

    #[test]
    fn missing_or_unknown_type_is_rejected() {
        let err = Message::from_value(json!({"seq": 1})).unwrap_err();
        assert!(err.to_string().contains("\"type\""), "got: {err}");

        let err = Message::from_value(json!({"seq": 1, "type": "notification"})).unwrap_err();
        assert!(err.to_string().contains("notification"), "got: {err}");
    }

    #[test]
    fn request_missing_command_is_rejected() {
        let err = Message::from_value(json!({"seq": 1, "type": "request"})).unwrap_err();
        assert!(err.to_string().contains("invalid request"), "got: {err}");
    }

    #[test]
    fn from_slice_rejects_invalid_json() {
        let err = Message::from_slice(b"{\"seq\":").unwrap_err();
        assert!(err.to_string().contains("invalid JSON body"), "got: {err}");
    }

    #[test]
    fn response_constructors_copy_request_fields() {
        let req = Request::new(5, "threads", None);
        let ok = Response::success(11, &req, Some(json!({"threads": []})));
        assert_eq!(ok.request_seq, 5);
        assert_eq!(ok.command, "threads");
        assert!(ok.success);

        let failed = Response::failure(12, &req, "not stopped");
        assert!(!failed.success);
        assert_eq!(failed.message.as_deref(), Some("not stopped"));
    }

    #[test]
    fn initialize_arguments_use_dap_field_names() {
        let args = InitializeRequestArguments {
            client_id: Some("dapline".into()),
            adapter_id: "goja".into(),
            lines_start_at1: Some(true),
            columns_start_at1: Some(true),
            ..Default::default()
        };
        let value = to_value(&args).unwrap();
        assert_eq!(value["clientID"], "dapline");
        assert_eq!(value["adapterID"], "goja");
        assert_eq!(value["linesStartAt1"], true);
        assert!(value.get("locale").is_none());
    }

    #[test]
    fn launch_arguments_keep_adapter_specific_fields() {
        let value = json!({"program": "/tmp/test.js", "stopOnEntry": false, "console": "internal"});
        let args: LaunchRequestArguments = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(args.program.as_deref(), Some("/tmp/test.js"));
        assert_eq!(args.extra["console"], "internal");
        assert_eq!(to_value(&args).unwrap(), value);
    }

    #[test]
    fn to_value_reports_encoding_error() {
        let mut map = std::collections::HashMap::new();
        map.insert((1, 2), "tuple keys are not JSON object keys");
        let err = to_value(&map).unwrap_err();
        assert!(matches!(err, DapError::Encoding(_)));
    }

    #[test]
    fn from_body_parses_typed_bodies() {
        let body = Some(json!({"threads": [{"id": 1, "name": "main"}]}));
        let threads: ThreadsResponseBody = from_body(body).unwrap();
        assert_eq!(threads.threads[0].name, "main");

        let caps: Capabilities = from_body(Some(json!({}))).unwrap();
        assert_eq!(caps, Capabilities::default());
        let caps: Capabilities = from_body(None).unwrap();
        assert_eq!(caps, Capabilities::default());
        let caps: Capabilities = from_body(Some(Value::Null)).unwrap();
        assert_eq!(caps, Capabilities::default());

        let err = from_body::<ThreadsResponseBody>(None).unwrap_err();
        assert!(matches!(err, DapError::InvalidResponse(_)));
    }

    #[test]
    fn terminated_body_is_optional() {
        let plain: TerminatedEventBody = from_body(None).unwrap();
        assert_eq!(plain, TerminatedEventBody::default());
        assert_eq!(to_value(&plain).unwrap(), json!({}));

        let restart: TerminatedEventBody =
            from_body(Some(json!({"restart": {"port": 4711}}))).unwrap();
        assert_eq!(restart.restart.unwrap()["port"], 4711);
    }

    #[test]
    fn pause_arguments_use_thread_id() {
        let value = to_value(&PauseArguments { thread_id: 3 }).unwrap();
        assert_eq!(value, json!({"threadId": 3}));
    }

    #[test]
    fn stopped_event_body_serde() {
        let body = StoppedEventBody {
            reason: "breakpoint".into(),
            description: None,
            thread_id: Some(1),
            all_threads_stopped: Some(true),
            hit_breakpoint_ids: Some(vec![3]),
        };
        let value = to_value(&body).unwrap();
        assert_eq!(value["threadId"], 1);
        assert_eq!(value["hitBreakpointIds"], json!([3]));
        let decoded: StoppedEventBody = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, body);
    }
}
