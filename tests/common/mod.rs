// Shared harness: an in-memory session plus a fake debugger on the other end of the inbox.
#![allow(dead_code)]

use serde_json::{json, Value};
use simple_debugger::dap::{framer, Incoming, StackFrame};
use simple_debugger::debugger::{Session, SessionState, VariableTree};
use simple_debugger::{Config, Error, Presenter};
use std::io::Cursor;
use std::sync::mpsc::{channel, Sender};

#[derive(Debug, Default)]
pub struct Recorder {
    pub frames: Vec<Vec<StackFrame>>,
    pub lines: Vec<(String, u64)>,
    /// Each published tree as `(depth, name, value)` in pre-order.
    pub trees: Vec<Vec<(usize, String, String)>>,
    pub states: Vec<SessionState>,
    pub errors: Vec<String>,
}

impl Presenter for Recorder {
    fn on_stack_frames(&mut self, frames: &[StackFrame]) {
        self.frames.push(frames.to_vec());
    }

    fn on_current_line(&mut self, path: &str, line: u64) {
        self.lines.push((path.to_string(), line));
    }

    fn on_variable_tree(&mut self, tree: &VariableTree) {
        let flat = tree
            .walk()
            .into_iter()
            .map(|(depth, id)| {
                let node = tree.node(id).unwrap();
                (depth, node.name.clone(), node.value.clone())
            })
            .collect();
        self.trees.push(flat);
    }

    fn on_state_changed(&mut self, state: SessionState) {
        self.states.push(state);
    }

    fn on_error(&mut self, error: &Error) {
        self.errors.push(error.to_string());
    }
}

pub type TestSession = Session<Vec<u8>, Recorder>;

pub struct Harness {
    pub session: TestSession,
    pub debugger: Sender<Incoming>,
    next_seq: u64,
}

impl Harness {
    pub fn new(config: Config) -> Self {
        let (tx, rx) = channel();
        Self {
            session: Session::new(Vec::new(), rx, Recorder::default(), config),
            debugger: tx,
            next_seq: 1,
        }
    }

    /// Every request written since the last call, decoded.
    pub fn sent(&mut self) -> Vec<Value> {
        let bytes = std::mem::take(self.session.writer_mut());
        let mut cursor = Cursor::new(bytes);
        let mut out = Vec::new();
        while let Some(payload) = framer::decode_next(&mut cursor).unwrap() {
            out.push(serde_json::from_slice(&payload).unwrap());
        }
        out
    }

    /// Exactly one request must have been written; return it.
    pub fn sent_one(&mut self) -> Value {
        let mut sent = self.sent();
        assert_eq!(sent.len(), 1, "expected one request, got {sent:?}");
        sent.remove(0)
    }

    /// Queue a message from the debugger and let the session drain it.
    pub fn deliver(&mut self, mut message: Value) {
        message["seq"] = json!(self.next_seq);
        self.next_seq += 1;
        self.debugger
            .send(Incoming::Payload(serde_json::to_vec(&message).unwrap()))
            .unwrap();
        self.session.poll().unwrap();
    }

    pub fn reply(&mut self, request: &Value, body: Value) {
        self.deliver(json!({
            "type": "response",
            "request_seq": request["seq"],
            "success": true,
            "command": request["command"],
            "body": body,
        }));
    }

    pub fn fail(&mut self, request: &Value, message: &str) {
        self.deliver(json!({
            "type": "response",
            "request_seq": request["seq"],
            "success": false,
            "command": request["command"],
            "message": message,
        }));
    }

    pub fn stopped(&mut self, reason: &str, thread_id: i64) {
        self.deliver(json!({
            "type": "event",
            "event": "stopped",
            "body": {"reason": reason, "threadId": thread_id},
        }));
    }

    /// start, initialize, launch `a.out`, configurationDone.
    pub fn running(&mut self) {
        self.session.start().unwrap();
        let init = self.sent_one();
        self.reply(&init, json!({"supportsConfigurationDoneRequest": true}));
        self.session.select_program("a.out").unwrap();
        let launch = self.sent_one();
        self.reply(&launch, Value::Null);
        self.session.run().unwrap();
        let done = self.sent_one();
        self.reply(&done, Value::Null);
    }

    /// Stop at x.c:42 and answer stackTrace and scopes. Returns the `variables` requests
    /// for Locals (reference 100) and Arguments (reference 101).
    pub fn stopped_with_scopes(&mut self) -> Vec<Value> {
        self.stopped("breakpoint", 7);
        let trace = self.sent_one();
        self.reply(
            &trace,
            json!({"stackFrames": [
                {"id": 1, "name": "main", "line": 42, "source": {"name": "x.c", "path": "x.c"}},
                {"id": 2, "name": "_start", "line": 1, "source": {"name": "start.S", "path": "start.S"}}
            ]}),
        );
        let scopes = self.sent_one();
        self.reply(
            &scopes,
            json!({"scopes": [
                {"name": "Locals", "variablesReference": 100},
                {"name": "Arguments", "variablesReference": 101},
                {"name": "Registers", "variablesReference": 102}
            ]}),
        );
        self.sent()
    }

    pub fn recorder(&self) -> &Recorder {
        self.session.presenter()
    }
}

pub fn var(name: &str, value: &str, reference: i64) -> Value {
    json!({"name": name, "value": value, "variablesReference": reference})
}
