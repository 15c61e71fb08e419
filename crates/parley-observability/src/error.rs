//! Error type for logging setup

#[derive(Debug, thiserror::Error)]
pub enum ObservabilityError {
    /// Invalid filter directive or subscriber already installed
    #[error("Logging error: {message}")]
    Logging { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ObservabilityError {
    pub fn logging(message: impl Into<String>) -> Self {
        Self::Logging {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ObservabilityError>;
