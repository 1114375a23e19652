//! Application context: every service the bridge needs, built once at startup
//! and handed to the pieces that use it.
//!
//! Capabilities that only some deployments have (an account, transcription)
//! are optional fields. Callers ask for them and report `Unsupported` when
//! they are missing instead of talking to a stub.

use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use crate::{
    config::{CoderConfig, Settings},
    dictation::AudioRecorder,
    error::{BridgeError, Result},
};

/// Environment variable consulted for an API key when the config has none.
pub const API_KEY_ENV: &str = "CODER_API_KEY";

/// Signed-in account of the user.
pub trait AccountCapability: Send + Sync {
    /// Current access token, or `None` after logout.
    fn access_token(&self) -> Option<String>;
    fn logout(&self) -> Result<()>;
}

/// Speech-to-text for recorded audio.
pub trait TranscriptionCapability: Send + Sync {
    fn transcribe(&self, audio_base64: &str, language: Option<&str>) -> Result<String>;
}

/// Account backed by a fixed API key.
#[derive(Debug)]
pub struct StaticTokenAccount {
    token: String,
    signed_in: AtomicBool,
}

impl StaticTokenAccount {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            signed_in: AtomicBool::new(true),
        }
    }
}

impl AccountCapability for StaticTokenAccount {
    fn access_token(&self) -> Option<String> {
        self.signed_in
            .load(Ordering::Acquire)
            .then(|| self.token.clone())
    }

    fn logout(&self) -> Result<()> {
        self.signed_in.store(false, Ordering::Release);
        tracing::info!("Logged out");
        Ok(())
    }
}

pub struct AppContext {
    pub settings: Settings,
    pub coder_config: Option<CoderConfig>,
    pub recorder: AudioRecorder,
    pub account: Option<Arc<dyn AccountCapability>>,
    pub transcription: Option<Arc<dyn TranscriptionCapability>>,
}

impl AppContext {
    pub fn new(settings: Settings, coder_config: Option<CoderConfig>) -> Self {
        Self {
            settings,
            coder_config,
            recorder: AudioRecorder::new(),
            account: None,
            transcription: None,
        }
    }

    /// Build the context from the settings file and the `coder.config.json`
    /// found in `workspace_folders`. An account exists only when an API key
    /// is configured.
    pub fn load(settings: Settings, workspace_folders: &[PathBuf]) -> Self {
        let coder_config = CoderConfig::discover(workspace_folders).map(|(_, config)| config);
        let api_key = coder_config
            .as_ref()
            .and_then(CoderConfig::api_key)
            .map(str::to_string)
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.is_empty());

        let mut ctx = Self::new(settings, coder_config);
        if let Some(key) = api_key {
            ctx = ctx.with_account(Arc::new(StaticTokenAccount::new(key)));
        }
        ctx
    }

    #[must_use]
    pub fn with_account(mut self, account: Arc<dyn AccountCapability>) -> Self {
        self.account = Some(account);
        self
    }

    #[must_use]
    pub fn with_transcription(mut self, transcription: Arc<dyn TranscriptionCapability>) -> Self {
        self.transcription = Some(transcription);
        self
    }

    pub fn logout(&self) -> Result<()> {
        self.account
            .as_ref()
            .ok_or(BridgeError::Unsupported("Account"))?
            .logout()
    }

    pub fn transcribe(&self, audio_base64: &str, language: Option<&str>) -> Result<String> {
        self.transcription
            .as_ref()
            .ok_or(BridgeError::Unsupported("Transcription"))?
            .transcribe(audio_base64, language)
    }
}
