//! High-level DAP client.
//!
//! Thin typed wrappers over [`DapConnection::request`] for the standard
//! command set. The connection stays reachable for anything not covered
//! here.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::connection::DapConnection;
use crate::error::DapError;
use crate::protocol::{
    from_body, to_value, Breakpoint, Capabilities, ContinueArguments, ContinueResponseBody,
    DisconnectArguments, EvaluateArguments, EvaluateResponseBody, InitializeRequestArguments,
    LaunchRequestArguments, PauseArguments, Scope, ScopesArguments, ScopesResponseBody, SetBreakpointsArguments,
    SetBreakpointsResponseBody, Source, SourceBreakpoint, StackTraceArguments,
    StackTraceResponseBody, StepArguments, Thread, ThreadsResponseBody, Variable,
    VariablesArguments, VariablesResponseBody,
};

/// A DAP client bound to one connection.
#[derive(Debug)]
pub struct DapClient {
    connection: DapConnection,
    capabilities: Option<Capabilities>,
}

impl DapClient {
    /// Wrap a started connection.
    pub fn new(connection: DapConnection) -> Self {
        Self {
            connection,
            capabilities: None,
        }
    }

    /// The underlying connection.
    pub fn connection(&self) -> &DapConnection {
        &self.connection
    }

    /// Capabilities reported by `initialize`, once it has succeeded.
    pub fn capabilities(&self) -> Option<&Capabilities> {
        self.capabilities.as_ref()
    }

    async fn call<A, B>(&self, command: &str, arguments: &A) -> Result<B, DapError>
    where
        A: Serialize,
        B: DeserializeOwned,
    {
        let body = self
            .connection
            .request(command, Some(to_value(arguments)?))
            .await?;
        from_body(body)
    }

    async fn call_unit<A: Serialize>(&self, command: &str, arguments: &A) -> Result<(), DapError> {
        self.connection
            .request(command, Some(to_value(arguments)?))
            .await?;
        Ok(())
    }

    /// `initialize`: negotiate capabilities.
    pub async fn initialize(
        &mut self,
        arguments: &InitializeRequestArguments,
    ) -> Result<Capabilities, DapError> {
        let caps: Capabilities = self.call("initialize", arguments).await?;
        self.capabilities = Some(caps.clone());
        Ok(caps)
    }

    /// `launch`.
    pub async fn launch(&self, arguments: &LaunchRequestArguments) -> Result<(), DapError> {
        self.call_unit("launch", arguments).await
    }

    /// `setBreakpoints` for one source, replacing any earlier set.
    pub async fn set_breakpoints(
        &self,
        source: Source,
        breakpoints: Vec<SourceBreakpoint>,
    ) -> Result<Vec<Breakpoint>, DapError> {
        let arguments = SetBreakpointsArguments {
            source,
            breakpoints: Some(breakpoints),
        };
        let body: SetBreakpointsResponseBody = self.call("setBreakpoints", &arguments).await?;
        Ok(body.breakpoints)
    }

    /// `configurationDone`.
    pub async fn configuration_done(&self) -> Result<(), DapError> {
        self.connection.request("configurationDone", None).await?;
        Ok(())
    }

    /// `threads`.
    pub async fn threads(&self) -> Result<Vec<Thread>, DapError> {
        let body = self.connection.request("threads", None).await?;
        Ok(from_body::<ThreadsResponseBody>(body)?.threads)
    }

    /// `stackTrace` for a thread.
    pub async fn stack_trace(
        &self,
        arguments: &StackTraceArguments,
    ) -> Result<StackTraceResponseBody, DapError> {
        self.call("stackTrace", arguments).await
    }

    /// `scopes` for a frame.
    pub async fn scopes(&self, frame_id: i64) -> Result<Vec<Scope>, DapError> {
        let body: ScopesResponseBody = self.call("scopes", &ScopesArguments { frame_id }).await?;
        Ok(body.scopes)
    }

    /// `variables` under a reference.
    pub async fn variables(&self, variables_reference: i64) -> Result<Vec<Variable>, DapError> {
        let arguments = VariablesArguments {
            variables_reference,
            start: None,
            count: None,
        };
        let body: VariablesResponseBody = self.call("variables", &arguments).await?;
        Ok(body.variables)
    }

    /// `evaluate`.
    pub async fn evaluate(
        &self,
        arguments: &EvaluateArguments,
    ) -> Result<EvaluateResponseBody, DapError> {
        self.call("evaluate", arguments).await
    }

    /// `continue`.
    pub async fn continue_(&self, thread_id: i64) -> Result<ContinueResponseBody, DapError> {
        let arguments = ContinueArguments {
            thread_id,
            single_thread: None,
        };
        self.call("continue", &arguments).await
    }

    /// `next` (step over).
    pub async fn next(&self, thread_id: i64) -> Result<(), DapError> {
        self.call_unit("next", &step(thread_id)).await
    }

    /// `stepIn`.
    pub async fn step_in(&self, thread_id: i64) -> Result<(), DapError> {
        self.call_unit("stepIn", &step(thread_id)).await
    }

    /// `stepOut`.
    pub async fn step_out(&self, thread_id: i64) -> Result<(), DapError> {
        self.call_unit("stepOut", &step(thread_id)).await
    }

    /// `pause`. The adapter reports the stop with a `stopped` event.
    pub async fn pause(&self, thread_id: i64) -> Result<(), DapError> {
        self.call_unit("pause", &PauseArguments { thread_id }).await
    }

    /// `disconnect`, then close the connection.
    pub async fn disconnect(self, arguments: &DisconnectArguments) -> Result<(), DapError> {
        let result = self.call_unit("disconnect", arguments).await;
        self.connection.close().await;
        result
    }
}

fn step(thread_id: i64) -> StepArguments {
    StepArguments {
        thread_id,
        granularity: None,
    }
}
