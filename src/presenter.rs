//! Callbacks from the session into whatever displays it.
//!
//! All callbacks run synchronously inside [`Session::poll`](crate::debugger::Session::poll)
//! or the caller command that triggered them.

use crate::dap::StackFrame;
use crate::debugger::{SessionState, VariableTree};
use crate::error::Error;

pub trait Presenter {
    /// A fresh stack trace; replaces the previous one.
    fn on_stack_frames(&mut self, frames: &[StackFrame]);

    /// Location of the innermost frame.
    fn on_current_line(&mut self, path: &str, line: u64);

    /// The variable forest, republished after every batch.
    fn on_variable_tree(&mut self, tree: &VariableTree);

    fn on_state_changed(&mut self, _state: SessionState) {}

    /// Failed or timed out requests, and the fatal end of the session.
    fn on_error(&mut self, _error: &Error) {}
}
