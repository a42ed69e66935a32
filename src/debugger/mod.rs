mod breakpoints;
mod launcher;
mod session;
mod stop;
mod variables;

pub use breakpoints::Breakpoints;
pub use launcher::DebuggerProcess;
pub use session::{Session, SessionState};
pub use stop::StopPolicy;
pub use variables::{ExpandDepth, NodeId, VariableNode, VariableTree};
