use std::{error::Error as StdError, fmt, io, result::Result as StdResult};

#[derive(Debug, Clone)]
pub enum BridgeError {
    NotConnected,
    UnknownCommand(String),
    Unsupported(&'static str),
    InvalidSelection(String),
    MissingArgument { command: &'static str, argument: &'static str },
    RecordingProgramNotFound { searched_paths: Vec<String> },
    NotRecording,
    RecordingFileMissing(String),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "Not connected to Coder CLI"),
            Self::UnknownCommand(cmd) => write!(f, "Unknown command: {cmd}"),
            Self::Unsupported(capability) => write!(f, "{capability} is not supported"),
            Self::InvalidSelection(msg) => write!(f, "Invalid selection: {msg}"),
            Self::MissingArgument { command, argument } => {
                write!(f, "{command} needs a {argument}")
            }
            Self::RecordingProgramNotFound { searched_paths } => {
                writeln!(f, "ffmpeg not found.")?;
                writeln!(f)?;
                writeln!(f, "Install ffmpeg to enable voice input.")?;
                writeln!(f)?;
                writeln!(f, "Searched locations:")?;
                for path in searched_paths {
                    writeln!(f, "  - {path}")?;
                }
                Ok(())
            }
            Self::NotRecording => write!(f, "Not currently recording"),
            Self::RecordingFileMissing(path) => write!(f, "Recording file not found: {path}"),
        }
    }
}

impl StdError for BridgeError {}

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    Json(serde_json::Error),
    Bridge(BridgeError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::Json(e) => write!(f, "JSON error: {e}"),
            Self::Bridge(e) => write!(f, "{e}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Bridge(e) => Some(e),
        }
    }
}

impl From<BridgeError> for Error {
    fn from(e: BridgeError) -> Self {
        Self::Bridge(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

pub type Result<T> = StdResult<T, Error>;
