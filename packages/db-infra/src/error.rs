use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbInfraError {
    #[error("Configuration error: {message}")]
    Config { message: String },
    #[error("Connection error: {message}")]
    Connect { message: String },
    #[error("Migration lock error: {message}")]
    Lock { message: String },
    #[error("Migration error: {message}")]
    Migration { message: String },
}

impl DbInfraError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Config { message }
            | Self::Connect { message }
            | Self::Lock { message }
            | Self::Migration { message } => message,
        }
    }
}
