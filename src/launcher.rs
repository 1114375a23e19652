//! Launching the Coder CLI and the OpenClaw bot in integrated terminals.

use std::{path::PathBuf, time::Duration};

use crate::{
    editor::{EditorHost, TerminalId, TerminalOptions},
    error::{BridgeError, Result},
};

/// Delay before connecting to a CLI that was just launched.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);

pub const CLI_TERMINAL_NAME: &str = "Monster";
pub const BOT_TERMINAL_NAME: &str = "Bot";
pub const BOT_MENU_COMMAND: &str = "openclawbot.showMenu";
pub const BOT_MENU_PROMPT: &str = "Connect to Bot? Make sure your openclaw is ready.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliLayout {
    /// Regular terminal panel.
    Panel,
    /// Editor area, next to the active editor, in lite mode.
    Beside,
}

/// Terminal options and command line for launching the CLI in `cwd`.
pub fn cli_terminal(layout: CliLayout, cwd: Option<PathBuf>) -> (TerminalOptions, &'static str) {
    let options = TerminalOptions {
        name: CLI_TERMINAL_NAME.to_string(),
        cwd,
        beside: layout == CliLayout::Beside,
        icon: Some("assets/images/icon.svg".into()),
        ..TerminalOptions::default()
    };
    let command = match layout {
        CliLayout::Panel => "coder --vscode",
        CliLayout::Beside => "coder --vscode --lite",
    };
    (options, command)
}

/// Open a terminal running the CLI. The caller schedules the reconnect.
pub fn launch_cli<H: EditorHost>(host: &H, layout: CliLayout) -> Result<TerminalId> {
    let cwd = host
        .workspace_folder()
        .or_else(|| std::env::current_dir().ok());
    let (options, command) = cli_terminal(layout, cwd);
    let terminal = host.open_terminal(&options)?;
    host.send_terminal_text(terminal, command)?;
    tracing::info!("Launched `{command}` in terminal {}", options.name);
    Ok(terminal)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotAction {
    WakeUp,
    Console,
    Start,
    Stop,
    Restart,
}

impl BotAction {
    pub const ALL: [Self; 5] = [
        Self::WakeUp,
        Self::Console,
        Self::Start,
        Self::Stop,
        Self::Restart,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::WakeUp => "Wake up",
            Self::Console => "Console",
            Self::Start => "Start",
            Self::Stop => "Stop",
            Self::Restart => "Restart",
        }
    }

    pub const fn command(self) -> &'static str {
        match self {
            Self::WakeUp => "openclaw status",
            Self::Console => "openclaw tui",
            Self::Start => "openclaw gateway start",
            Self::Stop => "openclaw gateway stop",
            Self::Restart => "openclaw gateway restart",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|a| a.label().eq_ignore_ascii_case(label))
    }
}

/// Runs bot commands in one reusable terminal.
#[derive(Debug, Default)]
pub struct BotLauncher {
    terminal: Option<TerminalId>,
}

impl BotLauncher {
    pub const fn terminal(&self) -> Option<TerminalId> {
        self.terminal
    }

    pub fn run<H: EditorHost>(&mut self, host: &H, action: BotAction) -> Result<()> {
        let terminal = match self.terminal {
            Some(t) => t,
            None => {
                let t = host.open_terminal(&bot_terminal_options(cfg!(windows)))?;
                self.terminal = Some(t);
                t
            }
        };
        host.send_terminal_text(terminal, action.command())
            .map_err(|e| {
                tracing::error!("Failed to execute {}: {e}", action.command());
                e
            })
    }

    /// Forget the terminal when the host reports it closed.
    pub fn terminal_closed(&mut self, terminal: TerminalId) {
        if self.terminal == Some(terminal) {
            self.terminal = None;
        }
    }

    pub fn dispose<H: EditorHost>(&mut self, host: &H) {
        if let Some(t) = self.terminal.take() {
            host.dispose_terminal(t);
        }
    }
}

/// Bot terminal options. On Windows the bot runs inside WSL.
pub fn bot_terminal_options(windows: bool) -> TerminalOptions {
    TerminalOptions {
        name: BOT_TERMINAL_NAME.to_string(),
        preserve_focus: true,
        shell: windows.then(|| ("wsl.exe".to_string(), vec!["-d".into(), "Ubuntu".into()])),
        icon: Some("assets/images/claw.svg".into()),
        ..TerminalOptions::default()
    }
}

/// Parse a bot action label given on the command line.
pub fn parse_bot_action(label: &str) -> Result<BotAction> {
    let normalized = label.replace(&['-', '_'][..], " ");
    BotAction::from_label(&normalized)
        .ok_or_else(|| BridgeError::UnknownCommand(format!("bot {label}")).into())
}
