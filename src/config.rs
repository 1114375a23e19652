//! Bridge settings and the CLI's `coder.config.json`.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{bridge_ipc::DEFAULT_PORT, error::Result};

pub const CODER_CONFIG_FILE: &str = "coder.config.json";

/// Returns the path of the settings file.
pub fn settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("coder-bridge/settings.json")
}

/// Settings of the `coder` group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub server_port: u16,
    pub auto_connect: bool,
    pub show_diff_preview: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_port: DEFAULT_PORT,
            auto_connect: true,
            show_diff_preview: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    coder: Settings,
}

impl Settings {
    /// Load settings from `path`. A missing or unreadable file yields defaults.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(text) => Self::parse(&text).unwrap_or_else(|e| {
                tracing::warn!("Ignoring invalid settings in {}: {e}", path.display());
                Self::default()
            }),
            Err(e) => {
                tracing::debug!("No settings at {}: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        let file: SettingsFile = serde_json::from_str(text)?;
        Ok(file.coder)
    }
}

/// One model provider from `coder.config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub name: String,
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default)]
    pub models: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<std::collections::BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoderSection {
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub mcp_servers: Vec<McpServerConfig>,
}

/// Contents of `coder.config.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoderConfig {
    pub coder: CoderSection,
}

/// API provider families the first configured provider can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenRouter,
    Ollama,
    OpenAi,
    LmStudio,
    Zai,
}

impl ProviderKind {
    /// Detect the provider family from its name or base URL.
    pub fn detect(provider: &ProviderConfig) -> Option<Self> {
        let name = provider.name.to_lowercase();
        let url = provider.base_url.as_str();
        let either = |needle: &str| name.contains(needle) || url.contains(needle);

        if either("openrouter") {
            Some(Self::OpenRouter)
        } else if either("ollama") || url.contains("11434") {
            Some(Self::Ollama)
        } else if either("openai") {
            Some(Self::OpenAi)
        } else if name.contains("lmstudio") || url.contains("1234") {
            Some(Self::LmStudio)
        } else if either("z.ai") {
            Some(Self::Zai)
        } else {
            None
        }
    }
}

/// Provider settings derived from the first configured provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSelection {
    pub kind: ProviderKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
}

impl CoderConfig {
    /// Find `coder.config.json` in the workspace folders, then the home directory.
    pub fn discover(workspace_folders: &[PathBuf]) -> Option<(PathBuf, Self)> {
        let candidates = workspace_folders
            .iter()
            .cloned()
            .chain(dirs::home_dir())
            .map(|dir| dir.join(CODER_CONFIG_FILE));

        for path in candidates {
            if !path.is_file() {
                continue;
            }
            return Self::load(&path).map(|config| (path, config));
        }
        tracing::info!("No {CODER_CONFIG_FILE} found");
        None
    }

    /// Read and sanitize a config file. Failures are logged and yield `None`.
    pub fn load(path: &Path) -> Option<Self> {
        let parsed = fs::read_to_string(path)
            .map_err(Into::into)
            .and_then(|text| Self::parse(&text));
        match parsed {
            Ok(config) => {
                tracing::info!("Loaded config from {}", path.display());
                Some(config)
            }
            Err(e) => {
                tracing::error!("Failed to read config from {}: {e}", path.display());
                None
            }
        }
    }

    /// Parse config text, dropping a trailing `/v1` from provider base URLs.
    pub fn parse(text: &str) -> Result<Self> {
        let mut config: Self = serde_json::from_str(text)?;
        for provider in &mut config.coder.providers {
            if let Some(stripped) = provider.base_url.strip_suffix("/v1") {
                provider.base_url = stripped.to_string();
            }
        }
        Ok(config)
    }

    pub fn mcp_servers(&self) -> &[McpServerConfig] {
        &self.coder.mcp_servers
    }

    /// Map the first provider to a provider selection, if it is recognized.
    pub fn provider_selection(&self) -> Option<ProviderSelection> {
        let provider = self.coder.providers.first()?;
        let kind = ProviderKind::detect(provider)?;
        let base_url = matches!(
            kind,
            ProviderKind::Ollama | ProviderKind::OpenAi | ProviderKind::LmStudio
        )
        .then(|| provider.base_url.clone());
        let api_key = if kind == ProviderKind::LmStudio {
            None
        } else {
            provider.api_key.clone()
        };
        Some(ProviderSelection {
            kind,
            base_url,
            api_key,
            model_id: provider.models.first().cloned(),
        })
    }

    /// API key of the first provider, if any.
    pub fn api_key(&self) -> Option<&str> {
        self.coder.providers.first()?.api_key.as_deref()
    }
}
