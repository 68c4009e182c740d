use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BotErrorKind {
    Config,
    InvalidInput,
    NotFound,
    Transport,
    Timeout,
    Internal,
}

#[derive(Debug, Clone, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct BotError {
    pub kind: BotErrorKind,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl BotError {
    pub fn new(kind: BotErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(BotErrorKind::Config, "CONFIG", message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(BotErrorKind::InvalidInput, "INVALID_INPUT", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(BotErrorKind::NotFound, "NOT_FOUND", message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(BotErrorKind::Transport, "TRANSPORT", message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(BotErrorKind::Timeout, "TIMEOUT", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(BotErrorKind::Internal, "INTERNAL", message)
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self.kind, BotErrorKind::Config)
    }
}

impl From<std::io::Error> for BotError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => BotError::not_found(err.to_string()),
            std::io::ErrorKind::TimedOut => BotError::timeout(err.to_string()),
            _ => BotError::internal(err.to_string()),
        }
    }
}
