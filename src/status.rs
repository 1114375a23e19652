//! Connection status indicator.

/// What clicking the status item does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAction {
    Connect,
    Disconnect,
}

impl StatusAction {
    pub const fn command_id(self) -> &'static str {
        match self {
            Self::Connect => "coder.connect",
            Self::Disconnect => "coder.disconnect",
        }
    }
}

/// Changes to apply to the status item. `None` fields keep their value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub label: String,
    pub tooltip: Option<&'static str>,
    pub action: Option<StatusAction>,
}

/// Status for a connection state, with optional transient text such as
/// "Connecting...".
pub fn indicator(connected: bool, transient: Option<&str>) -> StatusUpdate {
    if let Some(text) = transient {
        return StatusUpdate {
            label: format!("$(sync~spin) {text}"),
            tooltip: None,
            action: None,
        };
    }
    if connected {
        StatusUpdate {
            label: "$(check) Coder".into(),
            tooltip: Some("Connected to Coder CLI"),
            action: Some(StatusAction::Disconnect),
        }
    } else {
        StatusUpdate {
            label: "$(plug) Coder".into(),
            tooltip: Some("Click to connect to Coder CLI"),
            action: Some(StatusAction::Connect),
        }
    }
}

/// Current state of the status bar item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusItem {
    pub label: String,
    pub tooltip: String,
    pub action: StatusAction,
}

impl StatusItem {
    pub fn apply(&mut self, update: StatusUpdate) {
        self.label = update.label;
        if let Some(tooltip) = update.tooltip {
            self.tooltip = tooltip.to_string();
        }
        if let Some(action) = update.action {
            self.action = action;
        }
    }

    /// Show the model reported by the CLI.
    pub fn show_model(&mut self, model: &str) {
        self.label = format!("$(check) {model}");
    }
}

impl Default for StatusItem {
    fn default() -> Self {
        let mut item = Self {
            label: String::new(),
            tooltip: String::new(),
            action: StatusAction::Connect,
        };
        item.apply(indicator(false, None));
        item
    }
}
