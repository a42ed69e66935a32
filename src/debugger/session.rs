use super::breakpoints::Breakpoints;
use super::variables::{NodeId, VariableTree};
use crate::config::Config;
use crate::dap::{
    framer, DapMessage, DapMessageContent, Inbox, Incoming, ScopesResponseBody,
    SetBreakpointsResponseBody, StackFrame, StackTraceResponseBody, StoppedEventBody,
    VariablesResponseBody,
};
use crate::error::{Error, Result};
use crate::presenter::Presenter;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::sync::mpsc::TryRecvError;
use std::time::Instant;

/// Lifecycle of one debugger conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// `initialize` not sent yet
    Uninitialized,
    /// Waiting for the `initialize` response
    Initializing,
    /// Debugger ready, no program launched
    Initialized,
    /// `launch` sent, waiting for `configurationDone`
    Launched,
    Running,
    /// Debuggee stopped; `continue` and `next` are possible
    Stopped,
    /// Debugger gone or debuggee exited
    Terminated,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Initializing => write!(f, "initializing"),
            Self::Initialized => write!(f, "initialized"),
            Self::Launched => write!(f, "launched"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}

/// What a response should trigger once it arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    Initialize,
    Launch,
    SetBreakpoints,
    ConfigurationDone,
    Resume,
    StackTrace,
    Scopes,
    Variables,
}

impl Intent {
    /// Responses that only make sense for the stop they were requested in.
    fn is_per_stop(self) -> bool {
        matches!(self, Intent::StackTrace | Intent::Scopes | Intent::Variables)
    }
}

#[derive(Debug)]
struct PendingRequest {
    command: &'static str,
    intent: Intent,
    generation: u64,
    sent_at: Instant,
}

/// Protocol session with one debugger process.
///
/// The session never blocks: requests are written and forgotten, and incoming messages
/// are drained from the inbox by [`Session::poll`], which the owner calls periodically.
pub struct Session<W: Write, P: Presenter> {
    writer: W,
    inbox: Inbox,
    presenter: P,
    config: Config,
    state: SessionState,
    next_seq: u64,
    thread_id: Option<i64>,
    pending_program: Option<String>,
    program: Option<String>,
    breakpoints: Breakpoints,
    pending: HashMap<u64, PendingRequest>,
    // Bumped on every stop, so late answers for an older stop are dropped.
    generation: u64,
    frames: Vec<StackFrame>,
    variables: VariableTree,
}

impl<W: Write, P: Presenter> Session<W, P> {
    pub fn new(writer: W, inbox: Inbox, presenter: P, config: Config) -> Self {
        Self {
            writer,
            inbox,
            presenter,
            config,
            state: SessionState::Uninitialized,
            next_seq: 1,
            thread_id: None,
            pending_program: None,
            program: None,
            breakpoints: Breakpoints::new(),
            pending: HashMap::new(),
            generation: 0,
            frames: Vec::new(),
            variables: VariableTree::new(),
        }
    }

    /// Send `initialize`.
    pub fn start(&mut self) -> Result<()> {
        self.expect_state("start", &[SessionState::Uninitialized])?;
        let args = json!({ "adapterID": self.config.adapter_id });
        self.send_request("initialize", Some(args), Intent::Initialize)?;
        self.set_state(SessionState::Initializing);
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn thread_id(&self) -> Option<i64> {
        self.thread_id
    }

    /// Executable waiting for `initialize` to complete.
    pub fn pending_program(&self) -> Option<&str> {
        self.pending_program.as_deref()
    }

    /// Last selected executable.
    pub fn program(&self) -> Option<&str> {
        self.program.as_deref()
    }

    pub fn breakpoints(&self) -> &Breakpoints {
        &self.breakpoints
    }

    pub fn frames(&self) -> &[StackFrame] {
        &self.frames
    }

    pub fn variables(&self) -> &VariableTree {
        &self.variables
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn writer_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Number of requests still waiting for a response.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    // --------------------------------- caller commands -------------------------------------------

    /// Launch `path` now if the debugger is initialized, otherwise once it is.
    pub fn select_program(&mut self, path: &str) -> Result<()> {
        match self.state {
            SessionState::Uninitialized | SessionState::Initializing => {
                if let Some(prev) = self.pending_program.replace(path.to_string()) {
                    log::debug!("pending program {prev} replaced by {path}");
                }
            }
            SessionState::Initialized | SessionState::Launched => self.launch(path)?,
            state => {
                return Err(Error::InvalidState {
                    action: "select a program",
                    state,
                })
            }
        }
        self.program = Some(path.to_string());
        Ok(())
    }

    /// Add a breakpoint at `line`, or with `None` clear every breakpoint in every file.
    pub fn set_breakpoint(&mut self, path: &str, line: Option<u64>) -> Result<()> {
        self.expect_alive("set breakpoints")?;
        match line {
            Some(line) => {
                let lines = self.breakpoints.add(path, line);
                self.send_breakpoints(path, Some(&lines))
            }
            None => {
                for source in self.breakpoints.clear() {
                    self.send_breakpoints(&source, None)?;
                }
                Ok(())
            }
        }
    }

    pub fn remove_breakpoint(&mut self, path: &str, line: u64) -> Result<()> {
        self.expect_alive("remove breakpoints")?;
        let lines = self.breakpoints.remove(path, line);
        self.send_breakpoints(path, Some(&lines))
    }

    /// Finish configuration and let the debuggee run.
    pub fn run(&mut self) -> Result<()> {
        if self.program.is_none() {
            return Err(Error::NoProgram);
        }
        self.expect_state(
            "run",
            &[
                SessionState::Initialized,
                SessionState::Launched,
                SessionState::Stopped,
            ],
        )?;
        self.send_request("configurationDone", None, Intent::ConfigurationDone)?;
        self.set_state(SessionState::Running);
        Ok(())
    }

    pub fn continue_(&mut self) -> Result<()> {
        self.resume("continue")
    }

    /// Step over the current line.
    pub fn step(&mut self) -> Result<()> {
        self.resume("next")
    }

    /// Request the children of `node`. Returns false if its reference was already requested
    /// during this stop.
    pub fn expand_variable(&mut self, node: NodeId) -> Result<bool> {
        self.expect_state("expand variables", &[SessionState::Stopped])?;
        Ok(self.expand(node)?.is_some())
    }

    // --------------------------------- incoming messages -----------------------------------------

    /// Drain the inbox without blocking, then expire stalled requests.
    pub fn poll(&mut self) -> Result<()> {
        loop {
            match self.inbox.try_recv() {
                Ok(Incoming::Payload(payload)) => self.handle_payload(&payload)?,
                Ok(Incoming::Failed(e)) => {
                    self.terminate(e);
                    break;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.terminate(Error::Disconnected);
                    break;
                }
            }
        }
        self.expire_stalled(Instant::now());
        Ok(())
    }

    /// Decode and process one raw payload. Undecodable payloads are skipped.
    pub fn handle_payload(&mut self, payload: &[u8]) -> Result<()> {
        log::trace!("received: {}", String::from_utf8_lossy(payload).trim());
        match serde_json::from_slice::<DapMessage>(payload) {
            Ok(msg) => self.handle_message(msg),
            Err(e) => {
                log::warn!("ignoring malformed message: {e}");
                Ok(())
            }
        }
    }

    pub fn handle_message(&mut self, msg: DapMessage) -> Result<()> {
        match msg.content {
            DapMessageContent::Event { event, body } => self.handle_event(&event, body),
            DapMessageContent::Response {
                request_seq,
                success,
                command,
                message,
                body,
            } => self.handle_response(request_seq, success, command, message, body),
            DapMessageContent::Request { command, .. } => {
                log::debug!("ignoring reverse request `{command}` ({})", msg.seq);
                Ok(())
            }
        }
    }

    /// Drop every request sent before `now - request_timeout` and report it.
    pub fn expire_stalled(&mut self, now: Instant) {
        let Some(timeout) = self.config.request_timeout else {
            return;
        };

        let mut expired: Vec<u64> = self
            .pending
            .iter()
            .filter(|(_, p)| now.saturating_duration_since(p.sent_at) >= timeout)
            .map(|(seq, _)| *seq)
            .collect();
        expired.sort_unstable();

        for seq in expired {
            let Some(request) = self.pending.remove(&seq) else {
                continue;
            };
            let err = Error::RequestTimedOut {
                command: request.command.to_string(),
                seq,
            };
            if request.intent == Intent::Initialize {
                self.terminate(err);
            } else {
                log::warn!("{err}");
                self.presenter.on_error(&err);
            }
        }
    }

    fn handle_event(&mut self, event: &str, body: Option<Value>) -> Result<()> {
        match event {
            "stopped" => {
                let Some(body) = parse_body::<StoppedEventBody>(event, body) else {
                    return Ok(());
                };
                self.on_stopped(body)
            }
            "continued" => {
                if self.state == SessionState::Stopped {
                    self.set_state(SessionState::Running);
                }
                Ok(())
            }
            "exited" | "terminated" => {
                log::info!("debuggee {event}");
                self.pending.clear();
                self.set_state(SessionState::Terminated);
                Ok(())
            }
            "output" => {
                if let Some(text) = body
                    .as_ref()
                    .and_then(|b| b.get("output"))
                    .and_then(Value::as_str)
                {
                    log::info!(target: "debuggee", "{}", text.trim_end());
                }
                Ok(())
            }
            _ => {
                log::debug!("event `{event}`");
                Ok(())
            }
        }
    }

    fn on_stopped(&mut self, body: StoppedEventBody) -> Result<()> {
        if self.state == SessionState::Terminated {
            return Ok(());
        }
        let Some(thread_id) = body.thread_id.or(self.thread_id) else {
            log::warn!("stopped ({}) without a thread id", body.reason);
            return Ok(());
        };

        self.thread_id = Some(thread_id);
        self.generation += 1;
        self.set_state(SessionState::Stopped);

        // Nodes from the previous stop carry references the debugger no longer honors.
        self.variables.clear();
        self.presenter.on_variable_tree(&self.variables);

        if !self.config.stop_policy.inspects(&body.reason) {
            log::info!("stopped ({}), not inspecting", body.reason);
            return Ok(());
        }
        let args = json!({ "threadId": thread_id });
        self.send_request("stackTrace", Some(args), Intent::StackTrace)?;
        Ok(())
    }

    fn handle_response(
        &mut self,
        request_seq: u64,
        success: bool,
        command: String,
        message: Option<String>,
        body: Option<Value>,
    ) -> Result<()> {
        let Some(request) = self.pending.remove(&request_seq) else {
            log::trace!("ignoring response to {request_seq} ({command})");
            return Ok(());
        };
        if request.intent.is_per_stop() && request.generation != self.generation {
            log::trace!("ignoring stale `{command}` response to {request_seq}");
            return Ok(());
        }

        if !success {
            let err = Error::RequestFailed {
                command,
                message: message.unwrap_or_default(),
            };
            if request.intent == Intent::Initialize {
                self.terminate(err);
            } else {
                log::warn!("{err}");
                self.presenter.on_error(&err);
            }
            return Ok(());
        }

        match request.intent {
            Intent::Initialize => {
                self.set_state(SessionState::Initialized);
                if let Some(program) = self.pending_program.take() {
                    self.launch(&program)?;
                }
            }
            Intent::Launch => log::info!("launch acknowledged"),
            Intent::SetBreakpoints => {
                if let Some(body) = parse_body::<SetBreakpointsResponseBody>(&command, body) {
                    for bp in body.breakpoints.iter().filter(|bp| !bp.verified) {
                        log::warn!("breakpoint at line {:?} not verified", bp.line);
                    }
                }
            }
            Intent::ConfigurationDone | Intent::Resume => {}
            Intent::StackTrace => {
                if let Some(body) = parse_body::<StackTraceResponseBody>(&command, body) {
                    self.on_stack_trace(body.stack_frames)?;
                }
            }
            Intent::Scopes => {
                if let Some(body) = parse_body::<ScopesResponseBody>(&command, body) {
                    self.on_scopes(body)?;
                }
            }
            Intent::Variables => {
                if let Some(body) = parse_body::<VariablesResponseBody>(&command, body) {
                    self.on_variables(request_seq, body)?;
                }
            }
        }
        Ok(())
    }

    fn on_stack_trace(&mut self, frames: Vec<StackFrame>) -> Result<()> {
        self.frames = frames;
        self.presenter.on_stack_frames(&self.frames);

        let Some(top) = self.frames.first() else {
            log::warn!("empty stack trace");
            return Ok(());
        };
        let frame_id = top.id;
        let location = top.path().map(|p| (p.to_string(), top.line));

        self.send_request("scopes", Some(json!({ "frameId": frame_id })), Intent::Scopes)?;
        if let Some((path, line)) = location {
            self.presenter.on_current_line(&path, line);
        }
        Ok(())
    }

    fn on_scopes(&mut self, body: ScopesResponseBody) -> Result<()> {
        self.variables.clear();
        for scope in body.scopes {
            if !self.config.scope_names.contains(&scope.name) {
                continue;
            }
            if !self.variables.claim_reference(scope.variables_reference) {
                continue;
            }
            let args = json!({ "variablesReference": scope.variables_reference });
            self.send_request("variables", Some(args), Intent::Variables)?;
        }
        Ok(())
    }

    fn on_variables(&mut self, request_seq: u64, body: VariablesResponseBody) -> Result<()> {
        let added = self.variables.insert(request_seq, body.variables);
        for id in added {
            let auto = self
                .variables
                .node(id)
                .is_some_and(|n| n.is_expandable() && self.config.expand_depth.allows(n.depth));
            if auto {
                self.expand(id)?;
            }
        }
        self.presenter.on_variable_tree(&self.variables);
        Ok(())
    }

    // --------------------------------- outgoing requests -----------------------------------------

    fn launch(&mut self, program: &str) -> Result<()> {
        let args = json!({ "nodebug": false, "program": program });
        self.send_request("launch", Some(args), Intent::Launch)?;
        self.set_state(SessionState::Launched);
        Ok(())
    }

    fn resume(&mut self, command: &'static str) -> Result<()> {
        self.expect_state(command, &[SessionState::Stopped])?;
        let args = json!({ "threadId": self.thread_id.unwrap_or_default() });
        self.send_request(command, Some(args), Intent::Resume)?;
        self.set_state(SessionState::Running);
        Ok(())
    }

    fn expand(&mut self, node: NodeId) -> Result<Option<u64>> {
        let Some(reference) = self.variables.expansion_target(node)? else {
            return Ok(None);
        };
        let args = json!({ "variablesReference": reference });
        let seq = self.send_request("variables", Some(args), Intent::Variables)?;
        self.variables.record_expansion(node, seq);
        Ok(Some(seq))
    }

    fn send_breakpoints(&mut self, path: &str, lines: Option<&[u64]>) -> Result<()> {
        let mut args = json!({ "source": { "path": path } });
        if let Some(lines) = lines {
            let breakpoints: Vec<Value> = lines.iter().map(|l| json!({ "line": l })).collect();
            args["breakpoints"] = Value::Array(breakpoints);
        }
        self.send_request("setBreakpoints", Some(args), Intent::SetBreakpoints)?;
        Ok(())
    }

    fn send_request(
        &mut self,
        command: &'static str,
        arguments: Option<Value>,
        intent: Intent,
    ) -> Result<u64> {
        let seq = self.next_seq;
        self.next_seq += 1;

        let msg = DapMessage::request(seq, command, arguments);
        log::debug!("sending {seq}: {command}");
        framer::write_message(&mut self.writer, &msg)?;

        self.pending.insert(
            seq,
            PendingRequest {
                command,
                intent,
                generation: self.generation,
                sent_at: Instant::now(),
            },
        );
        Ok(seq)
    }

    // --------------------------------- state helpers ---------------------------------------------

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            log::info!("session {} -> {}", self.state, state);
            self.state = state;
            self.presenter.on_state_changed(state);
        }
    }

    fn terminate(&mut self, reason: Error) {
        if self.state == SessionState::Terminated {
            return;
        }
        log::error!("session terminated: {reason}");
        self.presenter.on_error(&reason);
        self.pending.clear();
        self.set_state(SessionState::Terminated);
    }

    fn expect_state(&self, action: &'static str, allowed: &[SessionState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::InvalidState {
                action,
                state: self.state,
            })
        }
    }

    fn expect_alive(&self, action: &'static str) -> Result<()> {
        if self.state == SessionState::Terminated {
            Err(Error::InvalidState {
                action,
                state: self.state,
            })
        } else {
            Ok(())
        }
    }
}

fn parse_body<T: DeserializeOwned>(what: &str, body: Option<Value>) -> Option<T> {
    let body = body.unwrap_or(Value::Null);
    match serde_json::from_value(body) {
        Ok(body) => Some(body),
        Err(e) => {
            log::warn!("malformed `{what}` body: {e}");
            None
        }
    }
}
