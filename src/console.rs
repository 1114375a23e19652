//! Console implementation of `EditorHost`.
//!
//! Lines typed on stdin are either answers to a pending question or commands
//! such as `explain src/main.rs:10-20`. A command with a `path:start-end`
//! target makes that file the active editor, with those lines selected,
//! before it is dispatched. Terminals are child processes that inherit the
//! console's output.

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    process::Stdio,
    sync::{Arc, Mutex, PoisonError},
};

use async_lsp::lsp_types::{Diagnostic, Position, Range};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader},
    process::{Child, Command},
    sync::{mpsc, oneshot},
};

use crate::{
    commands::HostCommand,
    editor::{ActiveEditor, DocumentSnapshot, EditorHost, MessageKind, TerminalId, TerminalOptions},
    error::{BridgeError, Result},
    status::StatusItem,
};

const COMMAND_BUFFER: usize = 16;

pub const HELP: &str = "\
Commands:
  connect | disconnect | start-cli | split
  ask|explain|refactor <file>:<start>-<end>
  add|explain-range|improve|fix <file>:<start>-<end>
  terminal-output | bot | focus | walkthrough | commit | abort-commit | history
  show-diff <diff id>
  <command id>, e.g. coder.explainCode
  help | quit";

/// Short names accepted in addition to full command ids.
const ALIASES: &[(&str, &str)] = &[
    ("connect", "coder.connect"),
    ("disconnect", "coder.disconnect"),
    ("start-cli", "coder.startCli"),
    ("split", "coder.openSplitTerminal"),
    ("ask", "coder.askAboutCode"),
    ("explain", "coder.explainCode"),
    ("refactor", "coder.refactorCode"),
    ("add", "coder.addToChat"),
    ("explain-range", "coder.ide.explainCode"),
    ("improve", "coder.improveCode"),
    ("fix", "coder.fixWithCoder"),
    ("focus", "coder.focusChatInput"),
    ("walkthrough", "coder.openWalkthrough"),
    ("commit", "coder.generateGitCommitMessage"),
    ("abort-commit", "coder.abortGitCommitMessage"),
    ("history", "coder.reconstructTaskHistory"),
    ("terminal-output", "coder.addTerminalOutputToChat"),
    ("bot", "openclawbot.showMenu"),
    ("show-diff", "coder.showDiff"),
];

/// File and optional 1-indexed inclusive line span a command operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub path: PathBuf,
    pub lines: Option<(u32, u32)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Command {
        command: HostCommand,
        target: Option<Target>,
    },
    Help,
    Quit,
}

/// Parse one console line.
pub fn parse_line(line: &str) -> Result<Input> {
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(Input::Help);
    };
    match name {
        "help" | "?" => return Ok(Input::Help),
        "quit" | "exit" => return Ok(Input::Quit),
        _ => {}
    }
    let id = ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map_or(name, |&(_, id)| id);
    let command = match HostCommand::from_id(id)? {
        HostCommand::ShowDiff { .. } => {
            let id = words.next().ok_or(BridgeError::MissingArgument {
                command: "show-diff",
                argument: "diff id",
            })?;
            return Ok(Input::Command {
                command: HostCommand::ShowDiff { id: id.to_string() },
                target: None,
            });
        }
        command => command,
    };
    let target = words.next().map(parse_target).transpose()?;
    Ok(Input::Command { command, target })
}

fn parse_target(arg: &str) -> Result<Target> {
    let Some((path, span)) = arg.rsplit_once(':') else {
        return Ok(Target {
            path: arg.into(),
            lines: None,
        });
    };
    if span.is_empty() || !span.chars().all(|c| c.is_ascii_digit() || c == '-') {
        // A colon that is part of the path.
        return Ok(Target {
            path: arg.into(),
            lines: None,
        });
    }
    let parse = |n: &str| {
        n.parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| BridgeError::InvalidSelection(format!("bad line number in {arg}")))
    };
    let (start, end) = match span.split_once('-') {
        Some((start, end)) => (parse(start)?, parse(end)?),
        None => {
            let line = parse(span)?;
            (line, line)
        }
    };
    if end < start {
        return Err(BridgeError::InvalidSelection(format!("{start}-{end} is reversed")).into());
    }
    Ok(Target {
        path: path.into(),
        lines: Some((start, end)),
    })
}

/// Open `target` as the active editor. Without a line span nothing is selected.
pub fn load_editor(target: &Target) -> Result<ActiveEditor> {
    let text = fs::read_to_string(&target.path)?;
    let path = fs::canonicalize(&target.path).unwrap_or_else(|_| target.path.clone());
    let document = DocumentSnapshot::new(path, text);
    let selection = match target.lines {
        Some((start, end)) => {
            let last = document.last_line();
            let start = start.saturating_sub(1).min(last);
            let end = end.saturating_sub(1).min(last);
            Range::new(Position::new(start, 0), Position::new(end, document.line_len(end)))
        }
        None => Range::default(),
    };
    Ok(ActiveEditor {
        document,
        selection,
    })
}

#[derive(Default)]
struct Shared {
    active: Option<ActiveEditor>,
    documents: Vec<PathBuf>,
    pending: Option<oneshot::Sender<String>>,
}

type SharedState = Arc<Mutex<Shared>>;

fn lock(shared: &SharedState) -> std::sync::MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

fn make_active(shared: &SharedState, editor: Option<ActiveEditor>) {
    let mut shared = lock(shared);
    if let Some(editor) = &editor {
        if !shared.documents.contains(&editor.document.path) {
            shared.documents.push(editor.document.path.clone());
        }
    }
    shared.active = editor;
}

pub struct ConsoleHost {
    workspace: Option<PathBuf>,
    shared: SharedState,
    terminals: RefCell<HashMap<TerminalId, (TerminalOptions, Vec<Child>)>>,
    last_terminal: Cell<Option<TerminalId>>,
    next_terminal: Cell<u64>,
    clipboard: RefCell<String>,
}

impl ConsoleHost {
    pub fn new(workspace: Option<PathBuf>) -> Self {
        Self {
            workspace,
            shared: SharedState::default(),
            terminals: RefCell::default(),
            last_terminal: Cell::new(None),
            next_terminal: Cell::new(1),
            clipboard: RefCell::default(),
        }
    }

    pub fn set_active_editor(&self, editor: Option<ActiveEditor>) {
        make_active(&self.shared, editor);
    }

    /// Route stdin into host commands.
    pub fn spawn_stdin(&self) -> mpsc::Receiver<HostCommand> {
        self.spawn_input(BufReader::new(tokio::io::stdin()))
    }

    pub fn spawn_input<R>(&self, reader: R) -> mpsc::Receiver<HostCommand>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        tokio::spawn(route_lines(reader, Arc::clone(&self.shared), tx));
        rx
    }

    /// Wait until every process started in a terminal has exited.
    pub async fn wait_terminals(&self) {
        let children: Vec<Child> = self
            .terminals
            .borrow_mut()
            .values_mut()
            .flat_map(|(_, children)| children.drain(..))
            .collect();
        for mut child in children {
            match child.wait().await {
                Ok(status) => tracing::info!("Terminal process exited with {status}"),
                Err(e) => tracing::warn!("Failed to wait for terminal process: {e}"),
            }
        }
    }

    /// Wait for the next line typed while a question is pending.
    async fn answer(&self) -> Option<String> {
        let (tx, rx) = oneshot::channel();
        lock(&self.shared).pending = Some(tx);
        rx.await.ok()
    }

    fn spawn_in_terminal(options: &TerminalOptions, text: &str) -> Result<Child> {
        let mut command = match &options.shell {
            Some((program, args)) => {
                let mut command = Command::new(program);
                command.args(args).args(text.split_whitespace());
                command
            }
            None if cfg!(windows) => {
                let mut command = Command::new("cmd");
                command.args(["/C", text]);
                command
            }
            None => {
                let mut command = Command::new("sh");
                command.args(["-c", text]);
                command
            }
        };
        if let Some(cwd) = &options.cwd {
            command.current_dir(cwd);
        }
        let child = command
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;
        Ok(child)
    }
}

async fn route_lines<R>(reader: R, shared: SharedState, commands: mpsc::Sender<HostCommand>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim().to_string();
        let pending = lock(&shared).pending.take();
        if let Some(pending) = pending {
            let _ = pending.send(line);
            continue;
        }
        if line.is_empty() {
            continue;
        }
        match parse_line(&line) {
            Ok(Input::Command { command, target }) => {
                if let Some(target) = target {
                    match load_editor(&target) {
                        Ok(editor) => make_active(&shared, Some(editor)),
                        Err(e) => {
                            println!("[error] {}: {e}", target.path.display());
                            continue;
                        }
                    }
                }
                if commands.send(command).await.is_err() {
                    break;
                }
            }
            Ok(Input::Help) => println!("{HELP}"),
            Ok(Input::Quit) => break,
            Err(e) => println!("[error] {e}"),
        }
    }
    tracing::info!("Console input closed");
}

impl EditorHost for ConsoleHost {
    fn workspace_folder(&self) -> Option<PathBuf> {
        self.workspace.clone()
    }

    fn open_documents(&self) -> Vec<PathBuf> {
        lock(&self.shared).documents.clone()
    }

    fn active_editor(&self) -> Option<ActiveEditor> {
        lock(&self.shared).active.clone()
    }

    fn diagnostics(&self, _path: &Path) -> Vec<Diagnostic> {
        Vec::new()
    }

    fn all_diagnostics(&self) -> Vec<(PathBuf, Vec<Diagnostic>)> {
        Vec::new()
    }

    fn show_message(&self, kind: MessageKind, text: &str) {
        let tag = match kind {
            MessageKind::Info => "info",
            MessageKind::Warning => "warning",
            MessageKind::Error => "error",
        };
        println!("[{tag}] {text}");
    }

    async fn ask(&self, kind: MessageKind, text: &str, actions: &[&str]) -> Option<String> {
        self.show_message(kind, text);
        for (i, action) in actions.iter().enumerate() {
            println!("  {}) {action}", i + 1);
        }
        let answer = self.answer().await?;
        if let Ok(n) = answer.parse::<usize>() {
            return actions.get(n.checked_sub(1)?).map(ToString::to_string);
        }
        actions
            .iter()
            .find(|a| a.eq_ignore_ascii_case(&answer))
            .map(ToString::to_string)
    }

    async fn prompt_input(&self, prompt: &str, placeholder: &str) -> Option<String> {
        println!("{prompt} ({placeholder})");
        self.answer().await.filter(|a| !a.is_empty())
    }

    fn update_status(&self, item: &StatusItem) {
        tracing::debug!("Status: {} ({})", item.label, item.tooltip);
        println!("[status] {} | {}", item.label, item.tooltip);
    }

    fn open_terminal(&self, options: &TerminalOptions) -> Result<TerminalId> {
        let id = TerminalId(self.next_terminal.get());
        self.next_terminal.set(id.0 + 1);
        self.terminals
            .borrow_mut()
            .insert(id, (options.clone(), Vec::new()));
        self.last_terminal.set(Some(id));
        println!("[terminal] {} opened", options.name);
        Ok(id)
    }

    fn send_terminal_text(&self, terminal: TerminalId, text: &str) -> Result<()> {
        let mut terminals = self.terminals.borrow_mut();
        let (options, children) = terminals
            .get_mut(&terminal)
            .ok_or(BridgeError::Unsupported("Sending text to a closed terminal"))?;
        println!("[terminal] {}$ {text}", options.name);
        children.push(Self::spawn_in_terminal(options, text)?);
        Ok(())
    }

    fn dispose_terminal(&self, terminal: TerminalId) {
        if let Some((options, children)) = self.terminals.borrow_mut().remove(&terminal) {
            for mut child in children {
                if let Err(e) = child.start_kill() {
                    tracing::debug!("Terminal {} process already gone: {e}", options.name);
                }
            }
        }
        if self.last_terminal.get() == Some(terminal) {
            self.last_terminal.set(None);
        }
    }

    fn has_active_terminal(&self) -> bool {
        self.last_terminal.get().is_some()
    }

    async fn copy_terminal_selection(&self) -> Result<()> {
        Err(BridgeError::Unsupported("Terminal selection").into())
    }

    async fn read_clipboard(&self) -> Result<String> {
        Ok(self.clipboard.borrow().clone())
    }

    async fn write_clipboard(&self, text: &str) -> Result<()> {
        text.clone_into(&mut self.clipboard.borrow_mut());
        Ok(())
    }
}

impl Drop for ConsoleHost {
    fn drop(&mut self) {
        for (_, (_, children)) in self.terminals.get_mut().drain() {
            for mut child in children {
                let _ = child.start_kill();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;
    use crate::commands::SelectionAction;

    #[test]
    fn aliases_and_ids_parse() {
        assert_eq!(
            parse_line("connect").unwrap(),
            Input::Command {
                command: HostCommand::Connect,
                target: None
            }
        );
        assert_eq!(
            parse_line("coder.refactorCode a.rs:3").unwrap(),
            Input::Command {
                command: HostCommand::Selection(SelectionAction::Refactor),
                target: Some(Target {
                    path: "a.rs".into(),
                    lines: Some((3, 3))
                })
            }
        );
        assert_eq!(
            parse_line("show-diff tool-2").unwrap(),
            Input::Command {
                command: HostCommand::ShowDiff { id: "tool-2".into() },
                target: None
            }
        );
        assert!(parse_line("show-diff").is_err());
        assert_eq!(parse_line("quit").unwrap(), Input::Quit);
        assert!(parse_line("launch-rockets").is_err());
    }

    #[test]
    fn target_spans() {
        assert_eq!(parse_target("src/x.rs:10-20").unwrap().lines, Some((10, 20)));
        assert_eq!(parse_target("src/x.rs").unwrap().lines, None);
        assert_eq!(
            parse_target(r"C:\work\x.rs").unwrap().path,
            PathBuf::from(r"C:\work\x.rs")
        );
        assert!(parse_target("x.rs:0").is_err());
        assert!(parse_target("x.rs:9-2").is_err());
    }

    #[test]
    fn loaded_editor_selects_whole_lines() {
        let mut file = temp_file("load_editor.txt");
        writeln!(file.1, "one\ntwo\nthree").unwrap();
        let editor = load_editor(&Target {
            path: file.0.clone(),
            lines: Some((2, 9)),
        })
        .unwrap();
        assert_eq!(editor.selected_text(), "two\nthree");
        let _ = fs::remove_file(&file.0);
    }

    fn temp_file(name: &str) -> (PathBuf, fs::File) {
        let path = std::env::temp_dir().join(format!("coder-bridge-{}-{name}", std::process::id()));
        let file = fs::File::create(&path).unwrap();
        (path, file)
    }

    #[tokio::test]
    async fn answers_go_to_pending_question() {
        let host = ConsoleHost::new(None);
        let (mut writer, reader) = tokio::io::duplex(256);
        let mut commands = host.spawn_input(BufReader::new(reader));

        let ask = host.ask(MessageKind::Info, "Pick", &["Start CLI", "Reconnect"]);
        let write = async {
            use tokio::io::AsyncWriteExt as _;
            tokio::task::yield_now().await;
            writer.write_all(b"2\ndisconnect\n").await.unwrap();
        };
        let (answer, ()) = tokio::join!(ask, write);
        assert_eq!(answer.as_deref(), Some("Reconnect"));
        assert_eq!(commands.recv().await, Some(HostCommand::Disconnect));
    }

    #[tokio::test]
    async fn clipboard_round_trips() {
        let host = ConsoleHost::new(None);
        host.write_clipboard("saved").await.unwrap();
        assert_eq!(host.read_clipboard().await.unwrap(), "saved");
        assert!(host.copy_terminal_selection().await.is_err());
    }
}
