#![allow(dead_code)]

use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
    path::{Path, PathBuf},
    time::Duration,
};

use async_lsp::lsp_types::{Diagnostic, Position, Range};
use coder_bridge::{
    config::Settings,
    diff::{DiffPresenter, PendingDiff},
    editor::{ActiveEditor, DocumentSnapshot, EditorHost, MessageKind, TerminalId, TerminalOptions},
    error::{BridgeError, Result},
    status::StatusItem,
    Bridge,
};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::{
    net::{TcpListener, TcpStream},
    time::timeout,
};
use tokio_tungstenite::{accept_async, tungstenite::Message, WebSocketStream};

pub const WAIT: Duration = Duration::from_secs(5);

/// In-process stand-in for the Coder CLI's WebSocket server.
pub struct FakeCli {
    pub port: u16,
    listener: TcpListener,
}

impl FakeCli {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake CLI");
        let port = listener.local_addr().expect("No local address").port();
        Self { port, listener }
    }

    pub async fn accept(&self) -> CliConnection {
        let (stream, _) = timeout(WAIT, self.listener.accept())
            .await
            .expect("No connection to fake CLI")
            .expect("Accept failed");
        let ws = accept_async(stream).await.expect("Handshake failed");
        CliConnection { ws }
    }
}

/// A port nothing listens on.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    listener.local_addr().expect("addr").port()
}

pub struct CliConnection {
    ws: WebSocketStream<TcpStream>,
}

impl CliConnection {
    pub async fn send_json(&mut self, value: Value) {
        self.ws
            .send(Message::Text(value.to_string().into()))
            .await
            .expect("Failed to send to bridge");
    }

    /// Next JSON message from the bridge, or `None` on close or timeout.
    pub async fn recv_json_within(&mut self, wait: Duration) -> Option<Value> {
        loop {
            let frame = timeout(wait, self.ws.next()).await.ok()??.ok()?;
            match frame {
                Message::Text(text) => return serde_json::from_str(text.as_str()).ok(),
                Message::Close(_) => return None,
                _ => {}
            }
        }
    }

    pub async fn recv_json(&mut self) -> Value {
        self.recv_json_within(WAIT)
            .await
            .expect("Expected a message from the bridge")
    }

    /// Next message of the given `type`, skipping others.
    pub async fn recv_type(&mut self, kind: &str) -> Value {
        loop {
            let msg = self.recv_json().await;
            if msg["type"] == kind {
                return msg;
            }
        }
    }

    pub async fn close(&mut self) {
        let _ = self.ws.close(None).await;
    }
}

#[derive(Debug, Default)]
pub struct RecordingPresenter {
    pub presented: Vec<String>,
    pub retracted: Vec<String>,
}

impl DiffPresenter for RecordingPresenter {
    fn present(&mut self, diff: &PendingDiff) -> Result<()> {
        self.presented.push(diff.id.clone());
        Ok(())
    }

    fn retract(&mut self, id: &str) {
        self.retracted.push(id.to_string());
    }
}

/// Editor host with scripted answers that records everything shown to the user.
#[derive(Default)]
pub struct FakeHost {
    pub workspace: Option<PathBuf>,
    pub editor: RefCell<Option<ActiveEditor>>,
    pub diagnostics: RefCell<HashMap<PathBuf, Vec<Diagnostic>>>,
    pub messages: RefCell<Vec<(MessageKind, String)>>,
    pub questions: RefCell<Vec<String>>,
    pub answers: RefCell<VecDeque<Option<String>>>,
    pub status: RefCell<Option<StatusItem>>,
    pub terminals: RefCell<Vec<(TerminalOptions, Vec<String>)>>,
    pub disposed_terminals: RefCell<Vec<TerminalId>>,
    pub clipboard: RefCell<String>,
    pub terminal_selection: RefCell<Option<String>>,
}

impl FakeHost {
    pub fn answer(&self, answer: Option<&str>) {
        self.answers
            .borrow_mut()
            .push_back(answer.map(str::to_string));
    }

    pub fn select(&self, path: &str, text: &str, selection: Range) {
        *self.editor.borrow_mut() = Some(ActiveEditor {
            document: DocumentSnapshot::new(path, text),
            selection,
        });
    }

    pub fn has_message(&self, kind: MessageKind, text: &str) -> bool {
        self.messages
            .borrow()
            .iter()
            .any(|(k, t)| *k == kind && t == text)
    }

    pub fn status_label(&self) -> String {
        self.status
            .borrow()
            .as_ref()
            .map(|s| s.label.clone())
            .unwrap_or_default()
    }
}

impl EditorHost for FakeHost {
    fn workspace_folder(&self) -> Option<PathBuf> {
        self.workspace.clone()
    }

    fn open_documents(&self) -> Vec<PathBuf> {
        self.editor
            .borrow()
            .iter()
            .map(|e| e.document.path.clone())
            .collect()
    }

    fn active_editor(&self) -> Option<ActiveEditor> {
        self.editor.borrow().clone()
    }

    fn diagnostics(&self, path: &Path) -> Vec<Diagnostic> {
        self.diagnostics
            .borrow()
            .get(path)
            .cloned()
            .unwrap_or_default()
    }

    fn all_diagnostics(&self) -> Vec<(PathBuf, Vec<Diagnostic>)> {
        let mut all: Vec<_> = self
            .diagnostics
            .borrow()
            .iter()
            .map(|(p, d)| (p.clone(), d.clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    fn show_message(&self, kind: MessageKind, text: &str) {
        self.messages.borrow_mut().push((kind, text.to_string()));
    }

    async fn ask(&self, kind: MessageKind, text: &str, _actions: &[&str]) -> Option<String> {
        self.show_message(kind, text);
        self.questions.borrow_mut().push(text.to_string());
        self.answers.borrow_mut().pop_front().flatten()
    }

    async fn prompt_input(&self, prompt: &str, _placeholder: &str) -> Option<String> {
        self.questions.borrow_mut().push(prompt.to_string());
        self.answers.borrow_mut().pop_front().flatten()
    }

    fn update_status(&self, item: &StatusItem) {
        *self.status.borrow_mut() = Some(item.clone());
    }

    fn open_terminal(&self, options: &TerminalOptions) -> Result<TerminalId> {
        let mut terminals = self.terminals.borrow_mut();
        terminals.push((options.clone(), Vec::new()));
        Ok(TerminalId(terminals.len() as u64))
    }

    fn send_terminal_text(&self, terminal: TerminalId, text: &str) -> Result<()> {
        let mut terminals = self.terminals.borrow_mut();
        let index = usize::try_from(terminal.0 - 1).expect("index");
        terminals[index].1.push(text.to_string());
        Ok(())
    }

    fn dispose_terminal(&self, terminal: TerminalId) {
        self.disposed_terminals.borrow_mut().push(terminal);
    }

    fn has_active_terminal(&self) -> bool {
        self.terminal_selection.borrow().is_some()
    }

    async fn copy_terminal_selection(&self) -> Result<()> {
        let selection = self
            .terminal_selection
            .borrow()
            .clone()
            .ok_or(BridgeError::Unsupported("Terminal selection"))?;
        *self.clipboard.borrow_mut() = selection;
        Ok(())
    }

    async fn read_clipboard(&self) -> Result<String> {
        Ok(self.clipboard.borrow().clone())
    }

    async fn write_clipboard(&self, text: &str) -> Result<()> {
        *self.clipboard.borrow_mut() = text.to_string();
        Ok(())
    }
}

pub fn settings(port: u16) -> Settings {
    Settings {
        server_port: port,
        auto_connect: false,
        show_diff_preview: true,
    }
}

pub fn range(sl: u32, sc: u32, el: u32, ec: u32) -> Range {
    Range::new(Position::new(sl, sc), Position::new(el, ec))
}

pub type TestBridge = Bridge<FakeHost, RecordingPresenter>;

pub fn bridge(port: u16) -> TestBridge {
    let mut bridge = Bridge::new(FakeHost::default(), RecordingPresenter::default(), settings(port));
    bridge.activate();
    bridge
}

/// Connect `bridge` to `cli` and consume the initial context message.
pub async fn connect(bridge: &mut TestBridge, cli: &FakeCli) -> CliConnection {
    let (connected, mut conn) = tokio::join!(bridge.connect(), cli.accept());
    assert!(connected, "bridge failed to connect");
    let context = conn.recv_json().await;
    assert_eq!(context["type"], "context");
    conn
}

/// Deliver the next inbound message to the bridge.
pub async fn pump(bridge: &mut TestBridge) {
    let msg = timeout(WAIT, bridge.recv_message())
        .await
        .expect("No inbound message")
        .expect("Inbound channel closed");
    bridge.handle_server_message(msg);
}
