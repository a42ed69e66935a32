use crate::debugger::{NodeId, SessionState};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // --------------------------------- transport errors ------------------------------------------
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("malformed message header {0:?}")]
    Framing(String),
    #[error("debugger connection closed")]
    Disconnected,

    // --------------------------------- launch errors ---------------------------------------------
    #[error("no debugger available, tried: {}", .0.join("; "))]
    NoDebugger(Vec<String>),
    #[error("no program selected")]
    NoProgram,

    // --------------------------------- protocol errors -------------------------------------------
    #[error("`{command}` request {seq} timed out")]
    RequestTimedOut { command: String, seq: u64 },
    #[error("`{command}` request failed: {message}")]
    RequestFailed { command: String, message: String },
    #[error("cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: SessionState,
    },

    // --------------------------------- variable errors -------------------------------------------
    #[error("unknown variable {0}")]
    UnknownVariable(NodeId),
    #[error("variable {0} has no children")]
    NotExpandable(NodeId),
}

impl Error {
    /// True for conditions after which the session can no longer talk to the debugger.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::Framing(_) | Error::Disconnected | Error::NoDebugger(_)
        )
    }
}
