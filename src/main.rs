mod console;

use clap::Parser;
use console::{Command, ConsolePresenter};
use simple_debugger::config::{self, Config};
use simple_debugger::debugger::{DebuggerProcess, ExpandDepth, Session, SessionState, StopPolicy};
use simple_debugger::{dap, Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Console front end for DAP debuggers", long_about = None)]
struct Args {
    /// Set executable to debug
    #[clap(short = 'e', long)]
    executable: Option<String>,

    /// Default source to show
    #[clap(short = 's', long)]
    source: Option<String>,

    /// Debugger command line to try (repeatable, tried in order). Replaces the built-in list.
    #[clap(long = "debugger", value_name = "COMMAND LINE")]
    debuggers: Vec<String>,

    /// Do not inspect the stack when the debuggee stops on a signal.
    #[clap(long)]
    no_signal_stop: bool,

    /// Seconds to wait for any response before reporting it (0 waits forever).
    #[clap(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Variable levels expanded automatically below the scope variables.
    #[clap(long, default_value_t = 0, conflicts_with = "eager")]
    expand_depth: usize,

    /// Expand every reachable variable on each stop.
    #[clap(long)]
    eager: bool,

    /// Interval between inbox polls, in milliseconds.
    #[clap(long, default_value_t = 10)]
    tick_ms: u64,

    /// Write log output to this file instead of stderr.
    #[clap(long, env = "SIMPLE_DEBUGGER_LOG")]
    log_file: Option<PathBuf>,
}

impl Args {
    fn config(&self) -> Config {
        let mut config = Config::default();

        if !self.debuggers.is_empty() {
            config.debuggers = self
                .debuggers
                .iter()
                .filter_map(|line| {
                    let parsed = config::parse_command_line(line);
                    if parsed.is_none() {
                        log::warn!("ignoring debugger command line {line:?}");
                    }
                    parsed
                })
                .collect();
        }
        if self.no_signal_stop {
            config.stop_policy = StopPolicy::without_signal();
        }
        config.request_timeout =
            (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs));
        config.expand_depth = if self.eager {
            ExpandDepth::Unbounded
        } else {
            ExpandDepth::Depth(self.expand_depth)
        };
        config
    }
}

fn init_logger(log_file: Option<&Path>) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(path) = log_file {
        let file = fs::OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(args.log_file.as_deref())?;

    let config = args.config();
    let mut process = DebuggerProcess::start(&config.debuggers).inspect_err(|e| {
        log::error!("{e}");
    })?;
    let (stdin, stdout) = process.take_stdio().ok_or(Error::Disconnected)?;
    let (_receiver, inbox) = dap::spawn_receiver(stdout)?;

    let mut presenter = ConsolePresenter::new(None);
    if let Some(source) = &args.source {
        presenter.show_source(source);
    }

    let mut session = Session::new(stdin, inbox, presenter, config);
    session.start()?;
    if let Some(executable) = &args.executable {
        session.select_program(executable)?;
    }

    let commands = console::spawn_reader()?;
    let tick = Duration::from_millis(args.tick_ms.max(1));
    println!("{}", console::HELP);

    loop {
        match commands.recv_timeout(tick) {
            Ok(Command::Quit) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(cmd) => {
                if let Err(e) = console::execute(&mut session, cmd) {
                    println!("{e}");
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
        }

        if let Err(e) = session.poll() {
            if e.is_fatal() {
                log::error!("{e}");
                return Err(e);
            }
            log::warn!("{e}");
        }
        if session.state() == SessionState::Terminated {
            println!("debug session ended");
            break;
        }
    }

    log::info!("exiting, stopping {}", process.command().join(" "));
    Ok(())
}
