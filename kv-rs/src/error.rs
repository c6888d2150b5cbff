use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(String),

    #[error("quota exceeded")]
    QuotaExceeded,

    #[error("value size exceeded, must be within {max} bytes (got {size})")]
    ValueTooLarge { size: i64, max: i64 },

    #[error("batch size limit exceeded, max limit is {max} bytes (got {size})")]
    BatchTooLarge { size: i64, max: i64 },

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Stable error classification exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    QuotaExceeded,
    ValueTooLarge,
    BatchTooLarge,
    Conflict,
    InvalidInput,
    Unauthorized,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::QuotaExceeded => "quota_exceeded",
            Self::ValueTooLarge => "value_too_large",
            Self::BatchTooLarge => "batch_too_large",
            Self::Conflict => "conflict",
            Self::InvalidInput => "invalid_input",
            Self::Unauthorized => "unauthorized",
            Self::Internal => "internal",
        }
    }
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::QuotaExceeded => ErrorKind::QuotaExceeded,
            Self::ValueTooLarge { .. } => ErrorKind::ValueTooLarge,
            Self::BatchTooLarge { .. } => ErrorKind::BatchTooLarge,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Internal(_) | Self::Database(_) | Self::Json(_) | Self::Config(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Only storage/transport failures are worth retrying unchanged.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Internal
    }

    /// Message safe to hand to API callers. Internal failures never expose
    /// driver details.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}
