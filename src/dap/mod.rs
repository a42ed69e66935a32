pub mod framer;
mod protocol;
mod receiver;

pub use protocol::{
    Breakpoint, DapMessage, DapMessageContent, Scope, ScopesResponseBody,
    SetBreakpointsResponseBody, Source, StackFrame, StackTraceResponseBody, StoppedEventBody,
    Variable, VariablesResponseBody,
};
pub use receiver::{spawn as spawn_receiver, Inbox, Incoming};
