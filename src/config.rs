use crate::debugger::{ExpandDepth, StopPolicy};
use std::time::Duration;

/// Candidate debugger command lines, tried in order.
pub const DEFAULT_DEBUGGERS: &[&[&str]] = &[
    &["gdb", "-i=dap"],
    &["xcrun", "lldb-dap"],
    &["lldb-dap"],
    &["lldb-dap-20"],
];

pub const DEFAULT_SCOPES: &[&str] = &["Locals", "Arguments"];

/// Session configuration (set once, before the debugger is started).
#[derive(Debug, Clone)]
pub struct Config {
    /// Command lines tried by the locator.
    pub debuggers: Vec<Vec<String>>,
    /// `adapterID` sent with `initialize`.
    pub adapter_id: String,
    pub stop_policy: StopPolicy,
    /// Deadline for every request. `None` waits forever.
    pub request_timeout: Option<Duration>,
    /// Automatic variable expansion after a stop.
    pub expand_depth: ExpandDepth,
    /// Scopes whose variables are fetched after a stop.
    pub scope_names: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debuggers: DEFAULT_DEBUGGERS
                .iter()
                .map(|cmd| cmd.iter().map(|s| s.to_string()).collect())
                .collect(),
            adapter_id: "debugger".to_string(),
            stop_policy: StopPolicy::default(),
            request_timeout: Some(Duration::from_secs(30)),
            expand_depth: ExpandDepth::default(),
            scope_names: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Split a shell-like command line (`xcrun "lldb-dap"`) into program and arguments.
pub fn parse_command_line(line: &str) -> Option<Vec<String>> {
    shlex::split(line).filter(|parts| !parts.is_empty())
}
