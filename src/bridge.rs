//! Dispatcher between the editor host and the Coder CLI.
//!
//! `Bridge` owns the transport, the diff manager and the status item. All
//! state changes happen on the task that drives it: inbound CLI messages,
//! host commands and scheduled reconnects are handled one at a time, each to
//! completion, so handlers never race each other.

use std::{future, path::PathBuf, time::Duration};

use async_lsp::lsp_types::{Diagnostic, Range};
use tokio::{
    sync::{mpsc, watch},
    time::{sleep_until, Instant},
};

use crate::{
    bridge_ipc::{
        ClientMessage, CursorPosition, DiagnosticInfo, PromptContext, ServerMessage, Transport,
    },
    commands::{
        build_assistant_prompt, build_prompt, prompt_context, prompt_message, provide_code_actions,
        terminal_output_prompt, AssistantAction, CodeAction, CommandContext, Controller,
        HostCommand, SelectionAction, ASK_PLACEHOLDER, ASK_PROMPT,
    },
    config::Settings,
    diff::{DiffManager, DiffPresenter},
    editor::{
        convert_diagnostics, encloses, DocumentSnapshot, EditorHost, MessageKind, TerminalId,
    },
    error::{BridgeError, Error, Result},
    launcher::{launch_cli, BotAction, BotLauncher, CliLayout, BOT_MENU_PROMPT, RECONNECT_DELAY},
    status::{indicator, StatusAction, StatusItem},
};

/// Delay before the first connection attempt after activation.
pub const AUTO_CONNECT_DELAY: Duration = Duration::from_secs(1);

const CONNECT_PROMPT: &str = "Connect to CLI? Make sure your Coder is ready.";
const START_CLI: &str = "Start CLI";
const RECONNECT: &str = "Reconnect";
const CONNECT: &str = "Connect";

enum Event {
    Inbound(Option<ServerMessage>),
    Command(Option<HostCommand>),
    ConnectionChanged,
    Reconnect,
}

pub struct Bridge<H, P> {
    host: H,
    transport: Transport,
    diffs: DiffManager<P>,
    settings: Settings,
    status: StatusItem,
    controller: Option<Box<dyn Controller>>,
    bot: BotLauncher,
    inbound: Option<mpsc::Receiver<ServerMessage>>,
    connection: watch::Receiver<bool>,
    reconnect_at: Option<Instant>,
}

impl<H: EditorHost, P: DiffPresenter> Bridge<H, P> {
    pub fn new(host: H, presenter: P, settings: Settings) -> Self {
        let transport = Transport::new();
        Self {
            host,
            connection: transport.watch_connection(),
            transport,
            diffs: DiffManager::new(presenter),
            settings,
            status: StatusItem::default(),
            controller: None,
            bot: BotLauncher::default(),
            inbound: None,
            reconnect_at: None,
        }
    }

    #[must_use]
    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.connection = transport.watch_connection();
        self.transport = transport;
        self
    }

    /// Attach the chat controller that backs the chat-side commands.
    #[must_use]
    pub fn with_controller(mut self, controller: Box<dyn Controller>) -> Self {
        self.controller = Some(controller);
        self
    }

    pub const fn host(&self) -> &H {
        &self.host
    }

    pub const fn diffs(&self) -> &DiffManager<P> {
        &self.diffs
    }

    pub const fn status(&self) -> &StatusItem {
        &self.status
    }

    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// When the next connection attempt is due, if one is scheduled.
    pub const fn reconnect_scheduled(&self) -> Option<Instant> {
        self.reconnect_at
    }

    /// Subscribe to the transport, show the initial status and schedule the
    /// automatic connection.
    pub fn activate(&mut self) {
        self.inbound = Some(self.transport.subscribe());
        self.set_status(false, None);
        if self.settings.auto_connect {
            self.schedule_reconnect(AUTO_CONNECT_DELAY);
        }
        tracing::info!("Coder bridge activated");
    }

    pub fn schedule_reconnect(&mut self, delay: Duration) {
        self.reconnect_at = Some(Instant::now() + delay);
    }

    /// Drive the bridge until the host closes its command channel.
    pub async fn run(&mut self, mut commands: mpsc::Receiver<HostCommand>) -> Result<()> {
        if self.inbound.is_none() {
            self.activate();
        }
        loop {
            let event = tokio::select! {
                msg = recv_inbound(self.inbound.as_mut()) => Event::Inbound(msg),
                cmd = commands.recv() => Event::Command(cmd),
                Ok(()) = self.connection.changed() => Event::ConnectionChanged,
                () = wait_for(self.reconnect_at) => Event::Reconnect,
            };
            match event {
                Event::Inbound(Some(msg)) => self.handle_server_message(msg),
                Event::Inbound(None) => {
                    tracing::warn!("Inbound message channel closed");
                    self.inbound = None;
                }
                Event::Command(Some(cmd)) => self.execute(cmd).await,
                Event::Command(None) => break,
                Event::ConnectionChanged => {
                    let connected = *self.connection.borrow_and_update();
                    if !connected {
                        self.connection_lost();
                    }
                }
                Event::Reconnect => {
                    self.reconnect_at = None;
                    self.connect().await;
                }
            }
        }
        self.shutdown();
        Ok(())
    }

    /// Wait for the next inbound message. Pending forever before `activate`.
    pub async fn recv_message(&mut self) -> Option<ServerMessage> {
        recv_inbound(self.inbound.as_mut()).await
    }

    /// Run one command. Failures are logged and shown to the user, never returned.
    pub async fn execute(&mut self, command: HostCommand) {
        let id = command.id();
        tracing::info!("Executing {id}");
        let result = match command {
            HostCommand::Connect => {
                self.connect().await;
                Ok(())
            }
            HostCommand::Disconnect => {
                self.disconnect();
                Ok(())
            }
            HostCommand::StartCli => self.start_cli(),
            HostCommand::OpenSplitTerminal => self.open_split_terminal(),
            HostCommand::Selection(action) => {
                self.send_code(action).await;
                Ok(())
            }
            HostCommand::Assistant {
                action,
                range,
                diagnostics,
            } => self.run_assistant(action, range, &diagnostics).await,
            HostCommand::FocusChatInput {
                preserve_editor_focus,
            } => self.call_controller("Chat input", |c| {
                c.focus_chat_input(preserve_editor_focus)
            }),
            HostCommand::OpenWalkthrough => {
                self.call_controller("Walkthrough", |c| c.open_walkthrough())
            }
            HostCommand::GenerateCommitMessage { repository } => self
                .call_controller("Commit message generation", |c| {
                    c.generate_commit_message(repository.as_deref())
                }),
            HostCommand::AbortCommitMessage => {
                self.call_controller("Commit message generation", |c| c.abort_commit_message())
            }
            HostCommand::ReconstructTaskHistory => {
                self.call_controller("Task history", |c| c.reconstruct_task_history())
            }
            HostCommand::AddTerminalOutputToChat => self.add_terminal_output().await,
            HostCommand::ShowBotMenu => self.show_bot_menu().await,
            HostCommand::ShowDiff { id } => {
                if !self.show_diff(&id) {
                    self.host
                        .show_message(MessageKind::Warning, &format!("No pending diff {id}"));
                }
                Ok(())
            }
        };
        self.report(id, result);
    }

    fn report(&self, id: &str, result: Result<()>) {
        let Err(e) = result else { return };
        tracing::error!("{id} failed: {e}");
        let kind = match e {
            Error::Bridge(BridgeError::Unsupported(_) | BridgeError::NotConnected) => {
                MessageKind::Warning
            }
            _ => MessageKind::Error,
        };
        self.host.show_message(kind, &e.to_string());
    }

    /// Connect to the CLI on the configured port. On failure the user can
    /// start the CLI or retry.
    pub async fn connect(&mut self) -> bool {
        loop {
            self.set_status(false, Some("Connecting..."));
            if self.transport.connect(self.settings.server_port).await {
                self.set_status(true, None);
                self.send_workspace_context();
                self.host
                    .show_message(MessageKind::Info, "Connected to Coder CLI");
                return true;
            }

            self.set_status(false, None);
            let choice = self
                .host
                .ask(MessageKind::Info, CONNECT_PROMPT, &[START_CLI, RECONNECT])
                .await;
            match choice.as_deref() {
                Some(START_CLI) => {
                    let result = self.start_cli();
                    self.report("coder.startCli", result);
                    return false;
                }
                Some(RECONNECT) => {}
                _ => return false,
            }
        }
    }

    /// The CLI closed the socket: show the disconnected status again.
    pub fn connection_lost(&mut self) {
        if self.status.action == StatusAction::Disconnect {
            tracing::warn!("Coder CLI closed the connection");
            self.set_status(false, None);
        }
    }

    pub fn disconnect(&mut self) {
        self.transport.disconnect();
        self.set_status(false, None);
        self.host
            .show_message(MessageKind::Info, "Disconnected from Coder CLI");
    }

    /// Launch the CLI in a terminal and try to connect once it had time to start.
    pub fn start_cli(&mut self) -> Result<()> {
        launch_cli(&self.host, CliLayout::Panel)?;
        self.schedule_reconnect(RECONNECT_DELAY);
        Ok(())
    }

    pub fn open_split_terminal(&mut self) -> Result<()> {
        launch_cli(&self.host, CliLayout::Beside)?;
        self.schedule_reconnect(RECONNECT_DELAY);
        Ok(())
    }

    fn set_status(&mut self, connected: bool, transient: Option<&str>) {
        self.status.apply(indicator(connected, transient));
        self.host.update_status(&self.status);
    }

    pub fn handle_server_message(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::FileChange(change) => {
                let id = change.id.clone();
                tracing::info!("File change {id} for {}", change.file_path.display());
                self.diffs.add_pending_change(change);
                if self.settings.show_diff_preview {
                    self.diffs.show_diff(&id);
                }
            }
            ServerMessage::CloseDiff { id } => {
                if !self.diffs.close_diff(&id) {
                    tracing::debug!("close_diff for unknown id {id}");
                }
            }
            ServerMessage::Status { model } => {
                if let Some(model) = model {
                    self.status.show_model(&model);
                    self.host.update_status(&self.status);
                }
            }
            ServerMessage::ConnectionAck {
                cli_version,
                protocol_version,
            } => {
                tracing::info!("Connected to CLI v{cli_version} (protocol v{protocol_version})");
            }
            ServerMessage::DiagnosticsRequest { file_path } => {
                let diagnostics = self.collect_diagnostics(file_path);
                self.transport
                    .send(&ClientMessage::DiagnosticsResponse { diagnostics });
            }
        }
    }

    /// Present a recorded change, e.g. one held back while previews are off.
    pub fn show_diff(&mut self, id: &str) -> bool {
        self.diffs.show_diff(id)
    }

    /// Forget a terminal the host reports closed.
    pub fn terminal_closed(&mut self, terminal: TerminalId) {
        self.bot.terminal_closed(terminal);
    }

    /// Diagnostics of one file, or of every file the host knows about.
    fn collect_diagnostics(&self, file_path: Option<PathBuf>) -> Vec<DiagnosticInfo> {
        match file_path {
            Some(path) => convert_diagnostics(&path, &self.host.diagnostics(&path)),
            None => self
                .host
                .all_diagnostics()
                .iter()
                .flat_map(|(path, diagnostics)| convert_diagnostics(path, diagnostics))
                .collect(),
        }
    }

    pub fn send_workspace_context(&self) {
        let open_files = self.host.open_documents();
        let diagnostics = open_files
            .iter()
            .flat_map(|path| convert_diagnostics(path, &self.host.diagnostics(path)))
            .collect();
        self.transport.send(&ClientMessage::Context {
            workspace_folder: self.host.workspace_folder(),
            active_file: self.host.active_editor().map(|e| e.document.path),
            open_files,
            diagnostics,
        });
    }

    /// Offer to connect or start the CLI. Returns whether a connection exists afterwards.
    async fn ensure_connected(&mut self) -> bool {
        if self.transport.is_connected() {
            return true;
        }
        let choice = self
            .host
            .ask(
                MessageKind::Warning,
                &BridgeError::NotConnected.to_string(),
                &[CONNECT, START_CLI],
            )
            .await;
        match choice.as_deref() {
            Some(CONNECT) => self.connect().await,
            Some(START_CLI) => {
                let result = self.start_cli();
                self.report("coder.startCli", result);
                false
            }
            _ => false,
        }
    }

    /// Ask / explain / refactor the active selection.
    pub async fn send_code(&mut self, action: SelectionAction) {
        let Some(editor) = self.host.active_editor() else {
            self.host.show_message(MessageKind::Warning, "No active editor");
            return;
        };
        if !editor.has_selection() {
            self.host.show_message(MessageKind::Warning, "No code selected");
            return;
        }
        if !self.ensure_connected().await {
            return;
        }

        let question = if action.needs_question() {
            let answer = self.host.prompt_input(ASK_PROMPT, ASK_PLACEHOLDER).await;
            match answer.filter(|q| !q.is_empty()) {
                Some(q) => Some(q),
                None => return,
            }
        } else {
            None
        };
        let prompt = build_prompt(action, &editor, question.as_deref());
        self.send_prompt(prompt_message(prompt, &editor));
    }

    fn send_prompt(&self, msg: ClientMessage) {
        if let ClientMessage::SendPrompt { prompt, .. } = &msg {
            let head: String = prompt.chars().take(100).collect();
            tracing::info!("Sent prompt to CLI: {head}...");
        }
        self.transport.send(&msg);
        self.host.show_message(MessageKind::Info, "Sent to Coder CLI");
    }

    async fn run_assistant(
        &mut self,
        action: AssistantAction,
        range: Option<Range>,
        diagnostics: &[Diagnostic],
    ) -> Result<()> {
        let Some(editor) = self.host.active_editor() else {
            self.host.show_message(MessageKind::Warning, "No active editor");
            return Ok(());
        };
        let range = range.unwrap_or(editor.selection);
        if range.start == range.end {
            self.host.show_message(MessageKind::Warning, "No code selected");
            return Ok(());
        }

        let path = editor.document.path.clone();
        let diagnostics = if diagnostics.is_empty() && action == AssistantAction::Fix {
            let in_range: Vec<_> = self
                .host
                .diagnostics(&path)
                .into_iter()
                .filter(|d| encloses(range, d.range))
                .collect();
            convert_diagnostics(&path, &in_range)
        } else {
            convert_diagnostics(&path, diagnostics)
        };

        if !self.ensure_connected().await {
            return Ok(());
        }
        let ctx = CommandContext {
            editor,
            range,
            diagnostics,
        };
        let prompt = build_assistant_prompt(action, &ctx);
        self.send_prompt(ClientMessage::SendPrompt {
            prompt,
            context: PromptContext {
                file_path: path,
                selection: ctx.code().to_string(),
                cursor_position: CursorPosition {
                    line: range.start.line,
                    character: range.start.character,
                },
            },
        });
        Ok(())
    }

    /// Copy the terminal selection through the clipboard and send it to the
    /// assistant. The user's clipboard is restored on every path.
    async fn add_terminal_output(&mut self) -> Result<()> {
        if !self.host.has_active_terminal() {
            self.host.show_message(MessageKind::Warning, "No active terminal");
            return Ok(());
        }
        let saved = self.host.read_clipboard().await?;
        let captured = self.capture_terminal_selection().await;
        if let Err(e) = self.host.write_clipboard(&saved).await {
            tracing::warn!("Failed to restore clipboard: {e}");
        }

        let contents = captured?;
        if contents.trim().is_empty() {
            self.host
                .show_message(MessageKind::Warning, "No terminal content selected");
            return Ok(());
        }
        if !self.ensure_connected().await {
            return Ok(());
        }
        let context = self.host.active_editor().map_or_else(
            || PromptContext {
                file_path: PathBuf::new(),
                selection: String::new(),
                cursor_position: CursorPosition::default(),
            },
            |editor| prompt_context(&editor),
        );
        self.send_prompt(ClientMessage::SendPrompt {
            prompt: terminal_output_prompt(contents.trim_end()),
            context,
        });
        Ok(())
    }

    async fn capture_terminal_selection(&self) -> Result<String> {
        self.host.write_clipboard("").await?;
        self.host.copy_terminal_selection().await?;
        self.host.read_clipboard().await
    }

    async fn show_bot_menu(&mut self) -> Result<()> {
        let labels = BotAction::ALL.map(BotAction::label);
        let choice = self
            .host
            .ask(MessageKind::Info, BOT_MENU_PROMPT, &labels)
            .await;
        let Some(action) = choice.as_deref().and_then(BotAction::from_label) else {
            return Ok(());
        };
        self.bot.run(&self.host, action)
    }

    fn call_controller(
        &self,
        capability: &'static str,
        f: impl FnOnce(&dyn Controller) -> Result<()>,
    ) -> Result<()> {
        match &self.controller {
            Some(controller) => f(controller.as_ref()),
            None => Err(BridgeError::Unsupported(capability).into()),
        }
    }

    /// Code actions for `range` in `document`, using the host's selection when
    /// the document is the active one.
    pub fn code_actions(
        &self,
        document: &DocumentSnapshot,
        range: Range,
        diagnostics: &[Diagnostic],
    ) -> Vec<CodeAction> {
        let selection = self
            .host
            .active_editor()
            .filter(|e| e.document.path == document.path)
            .map(|e| e.selection);
        provide_code_actions(document, range, selection, diagnostics)
    }

    /// Release the connection, open previews and the bot terminal.
    pub fn shutdown(&mut self) {
        self.reconnect_at = None;
        self.transport.disconnect();
        self.diffs.dispose();
        self.bot.dispose(&self.host);
        tracing::info!("Coder bridge shut down");
    }
}

async fn recv_inbound(rx: Option<&mut mpsc::Receiver<ServerMessage>>) -> Option<ServerMessage> {
    match rx {
        Some(rx) => rx.recv().await,
        None => future::pending().await,
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => future::pending().await,
    }
}
