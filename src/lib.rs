//! Client side of the debug adapter protocol: drives one external debugger process
//! (`gdb -i=dap`, `lldb-dap`, ...) through launch, breakpoints, stepping and inspection.

pub mod config;
pub mod dap;
pub mod debugger;
mod error;
pub mod presenter;

pub use config::Config;
pub use error::{Error, Result};
pub use presenter::Presenter;
