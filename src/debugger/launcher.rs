use crate::error::{Error, Result};
use std::io;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

/// A running debugger subprocess speaking the adapter protocol on its stdio.
pub struct DebuggerProcess {
    child: Child,
    command: Vec<String>,
}

impl DebuggerProcess {
    /// Start the first candidate command line that spawns. Only a missing executable moves on
    /// to the next candidate; any other spawn failure is returned.
    pub fn start(candidates: &[Vec<String>]) -> Result<Self> {
        for command in candidates {
            let Some((program, args)) = command.split_first() else {
                continue;
            };
            log::info!("Trying to run {}", command.join(" "));

            match Command::new(program)
                .args(args)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .spawn()
            {
                Ok(child) => {
                    log::info!("debugger started: {} (pid {})", command.join(" "), child.id());
                    return Ok(Self {
                        child,
                        command: command.clone(),
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    log::info!("{}: {e}, trying next command line", command.join(" "));
                }
                Err(e) => {
                    log::error!("{}: {e}", command.join(" "));
                    return Err(e.into());
                }
            }
        }

        Err(Error::NoDebugger(
            candidates.iter().map(|c| c.join(" ")).collect(),
        ))
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    /// Hand out the stdio pipes. Only the first call returns them.
    pub fn take_stdio(&mut self) -> Option<(ChildStdin, ChildStdout)> {
        let stdin = self.child.stdin.take()?;
        let stdout = self.child.stdout.take()?;
        Some((stdin, stdout))
    }

    /// Whether the subprocess is still alive.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }
}

impl Drop for DebuggerProcess {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}
