use std::fmt;
use thiserror::Error;

/// Errors that can occur while decoding a log event message
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Failed to parse event JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to read event source: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors returned by a module's lifecycle and process hooks
///
/// `NotApplicable` is not a failure: it tells the caller that the module does
/// not claim the event and should be skipped silently.
#[derive(Error, Debug)]
pub enum ModuleError {
    #[error("not applicable")]
    NotApplicable,

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    Nested(Box<PipelineError>),

    #[error("{0}")]
    Failed(String),
}

impl ModuleError {
    /// Returns true when this is the `NotApplicable` routing signal
    pub fn is_not_applicable(&self) -> bool {
        matches!(self, ModuleError::NotApplicable)
    }
}

impl From<PipelineError> for ModuleError {
    fn from(err: PipelineError) -> Self {
        ModuleError::Nested(Box::new(err))
    }
}

/// Errors that can occur when handing a notification to a transport
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to send notification: {0}")]
    SendFailed(String),

    #[error("Invalid notification: {0}")]
    InvalidNotification(String),

    #[error("Invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Failed to build email: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("Sendmail error: {0}")]
    Sendmail(#[from] lettre::transport::sendmail::Error),
}

/// Lifecycle phase a module was in when it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Begin,
    End,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Begin => write!(f, "Begin"),
            Phase::End => write!(f, "End"),
        }
    }
}

/// Errors raised while driving registered modules, always naming the module
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{phase} failed for module '{module}': {source}")]
    Lifecycle {
        module: String,
        phase: Phase,
        #[source]
        source: ModuleError,
    },

    #[error("Process failed for module '{module}' on event {event_id}: {source}")]
    Process {
        module: String,
        event_id: String,
        #[source]
        source: ModuleError,
    },
}

impl PipelineError {
    /// Name of the module that produced this error
    pub fn module(&self) -> &str {
        match self {
            PipelineError::Lifecycle { module, .. } | PipelineError::Process { module, .. } => {
                module
            }
        }
    }
}

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Invalid configuration value: {0}")]
    ValidationError(String),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}
