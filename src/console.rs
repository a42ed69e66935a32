use simple_debugger::dap::StackFrame;
use simple_debugger::debugger::{NodeId, Session, SessionState, VariableTree};
use simple_debugger::{Error, Presenter, Result};
use std::fs;
use std::io::{self, BufRead, Write};
use std::sync::mpsc::{channel, Receiver};
use std::thread;

pub const HELP: &str = "\
commands:
  program <path>          select the executable
  source <path>           set the file `break <line>` refers to
  break [<file>:]<line>   add a breakpoint
  delete [<file>:]<line>  remove a breakpoint
  clear                   remove every breakpoint
  run | r                 start the program
  continue | c            continue after a stop
  next | n                step over
  expand | x <id>         fetch the children of a variable
  vars | v                show variables
  bt                      show the stack
  quit | q";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Program(String),
    Source(String),
    Break(Option<String>, u64),
    Delete(Option<String>, u64),
    Clear,
    Run,
    Continue,
    Next,
    Expand(NodeId),
    Vars,
    Backtrace,
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> std::result::Result<Option<Self>, String> {
        let Some(words) = shlex::split(line) else {
            return Err("unbalanced quotes".to_string());
        };
        let Some((head, rest)) = words.split_first() else {
            return Ok(None);
        };

        let cmd = match (head.as_str(), rest) {
            ("program" | "exe", [path]) => Command::Program(path.clone()),
            ("source", [path]) => Command::Source(path.clone()),
            ("break" | "b", [loc]) => {
                let (file, line) = parse_location(loc)?;
                Command::Break(file, line)
            }
            ("delete" | "d", [loc]) => {
                let (file, line) = parse_location(loc)?;
                Command::Delete(file, line)
            }
            ("clear", []) => Command::Clear,
            ("run" | "r", []) => Command::Run,
            ("continue" | "c", []) => Command::Continue,
            ("next" | "n", []) => Command::Next,
            ("expand" | "x", [id]) => Command::Expand(
                id.parse()
                    .map_err(|_| format!("not a variable id: {id}"))?,
            ),
            ("vars" | "v", []) => Command::Vars,
            ("bt", []) => Command::Backtrace,
            ("help" | "h", []) => Command::Help,
            ("quit" | "q", []) => Command::Quit,
            _ => return Err(format!("unknown command `{}`, try `help`", line.trim())),
        };
        Ok(Some(cmd))
    }
}

fn parse_location(loc: &str) -> std::result::Result<(Option<String>, u64), String> {
    let (file, line) = match loc.rsplit_once(':') {
        Some((file, line)) => (Some(file.to_string()), line),
        None => (None, loc),
    };
    let line = line
        .parse()
        .map_err(|_| format!("not a line number: {line}"))?;
    Ok((file, line))
}

/// Read commands from stdin on a dedicated thread.
pub fn spawn_reader() -> io::Result<Receiver<Command>> {
    let (tx, rx) = channel();
    thread::Builder::new()
        .name("console".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                match Command::parse(&line) {
                    Ok(Some(cmd)) => {
                        if tx.send(cmd).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(msg) => println!("{msg}"),
                }
            }
        })?;
    Ok(rx)
}

pub fn execute<W: Write>(session: &mut Session<W, ConsolePresenter>, cmd: Command) -> Result<()> {
    match cmd {
        Command::Program(path) => session.select_program(&path)?,
        Command::Source(path) => session.presenter_mut().show_source(&path),
        Command::Break(file, line) => {
            let Some(file) = resolve_source(session, file) else {
                println!("no source file selected, use `source <path>`");
                return Ok(());
            };
            session.set_breakpoint(&file, Some(line))?;
            println!("breakpoint at {file}:{line}");
        }
        Command::Delete(file, line) => {
            let Some(file) = resolve_source(session, file) else {
                println!("no source file selected, use `source <path>`");
                return Ok(());
            };
            session.remove_breakpoint(&file, line)?;
        }
        Command::Clear => session.set_breakpoint("", None)?,
        Command::Run => session.run()?,
        Command::Continue => session.continue_()?,
        Command::Next => session.step()?,
        Command::Expand(id) => {
            if !session.expand_variable(id)? {
                println!("variable {id} already expanded");
            }
        }
        Command::Vars => print_tree(session.variables()),
        Command::Backtrace => print_frames(session.frames()),
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
    Ok(())
}

fn resolve_source<W: Write>(
    session: &Session<W, ConsolePresenter>,
    file: Option<String>,
) -> Option<String> {
    file.or_else(|| session.presenter().source().map(str::to_string))
}

/// Prints everything the session reports to stdout.
#[derive(Debug, Default)]
pub struct ConsolePresenter {
    source: Option<String>,
}

impl ConsolePresenter {
    pub fn new(source: Option<String>) -> Self {
        Self { source }
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn show_source(&mut self, path: &str) {
        if fs::metadata(path).is_err() {
            println!("File {path} not found!");
        }
        self.source = Some(path.to_string());
    }
}

impl Presenter for ConsolePresenter {
    fn on_stack_frames(&mut self, frames: &[StackFrame]) {
        print_frames(frames);
    }

    fn on_current_line(&mut self, path: &str, line: u64) {
        self.source = Some(path.to_string());
        let text = fs::read_to_string(path).ok().and_then(|src| {
            let idx = usize::try_from(line).ok()?.checked_sub(1)?;
            src.lines().nth(idx).map(str::to_string)
        });
        match text {
            Some(text) => println!("-> {path}:{line}  {}", text.trim_end()),
            None => println!("-> {path}:{line}"),
        }
    }

    fn on_variable_tree(&mut self, tree: &VariableTree) {
        print_tree(tree);
    }

    fn on_state_changed(&mut self, state: SessionState) {
        let status = match state {
            SessionState::Uninitialized | SessionState::Initializing => "NOT RUNNING",
            SessionState::Initialized | SessionState::Launched => "Ready",
            SessionState::Running => "Running",
            SessionState::Stopped => "Stopped",
            SessionState::Terminated => "Terminated",
        };
        println!("Status: {status}");
    }

    fn on_error(&mut self, error: &Error) {
        println!("error: {error}");
    }
}

fn print_frames(frames: &[StackFrame]) {
    for (i, frame) in frames.iter().enumerate() {
        let file = frame
            .source
            .as_ref()
            .and_then(|s| s.name.as_deref().or(s.path.as_deref()))
            .unwrap_or("??");
        println!("  #{i} {} at {file}:{}", frame.name, frame.line);
    }
}

fn print_tree(tree: &VariableTree) {
    for (depth, id) in tree.walk() {
        let Some(node) = tree.node(id) else { continue };
        let marker = if node.is_expandable() && node.expansion_seq.is_none() {
            "+"
        } else {
            " "
        };
        println!(
            "{:indent$}{marker}[{id}] {}: {}",
            "",
            node.name,
            node.value,
            indent = depth * 2
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_breakpoint_locations() {
        assert_eq!(
            Command::parse("break main.c:12").unwrap(),
            Some(Command::Break(Some("main.c".to_string()), 12))
        );
        assert_eq!(
            Command::parse("b 7").unwrap(),
            Some(Command::Break(None, 7))
        );
        assert_eq!(
            Command::parse(r#"break "C:\src\a b.c:3""#).unwrap(),
            Some(Command::Break(Some(r"C:\src\a b.c".to_string()), 3))
        );
        assert!(Command::parse("break main.c:x").is_err());
    }

    #[test]
    fn parses_simple_commands() {
        assert_eq!(Command::parse("  ").unwrap(), None);
        assert_eq!(Command::parse("c").unwrap(), Some(Command::Continue));
        assert_eq!(Command::parse("x 4").unwrap(), Some(Command::Expand(4)));
        assert_eq!(
            Command::parse("program ./a.out").unwrap(),
            Some(Command::Program("./a.out".to_string()))
        );
        assert!(Command::parse("run now").is_err());
        assert!(Command::parse("frobnicate").is_err());
    }
}
