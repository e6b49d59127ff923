use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{server} returned HTML instead of JSON (status {status}). The server may be unavailable or misconfigured")]
    ServerMisconfigured { server: String, status: u16 },

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Not logged in to marketplace")]
    NotLoggedIn,

    #[error("Invalid usage report (400): {0}")]
    Rejected(String),

    #[error("Server returned status {status}: {body}")]
    Server { status: u16, body: String },

    #[error("Insufficient credits: {required} required, balance is {balance}")]
    InsufficientCredits { required: i64, balance: f64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("[{service}.{operation}] {source}")]
    Service {
        service: String,
        operation: String,
        #[source]
        source: Box<AppError>,
    },
}

impl AppError {
    pub fn wrap(service: &str, operation: &str, source: AppError) -> Self {
        AppError::Service {
            service: service.to_string(),
            operation: operation.to_string(),
            source: Box::new(source),
        }
    }

    /// Whether a failed usage report should stay queued for a later flush.
    ///
    /// Authentication and connectivity failures are transient from the queue's point of view;
    /// a 400 rejection is permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Network(_) | AppError::NotLoggedIn | AppError::Auth(_) => true,
            AppError::ServerMisconfigured { .. } => true,
            AppError::Server { status, .. } => *status != 400,
            AppError::Io(_) => true,
            AppError::Service { source, .. } => source.is_retryable(),
            AppError::Rejected(_)
            | AppError::Json(_)
            | AppError::InsufficientCredits { .. }
            | AppError::Config(_)
            | AppError::Validation(_) => false,
        }
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}
pub type AppResult<T> = Result<T, AppError>;
