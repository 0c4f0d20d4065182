//! Error types for the bootstrapper

/// Main error type for bootstrap operations
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid plan: {0}")]
    Plan(String),

    /// The server could not be reached, selected or authenticated against
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl BootstrapError {
    /// Whether this error aborts the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Process exit status for an error that ends the run
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::Plan(_) | Self::Io(_) => 2,
            Self::Connection(_) | Self::AlreadyExists(_) | Self::Database(_) => 1,
        }
    }

    /// Short reason suitable for a report line
    pub fn reason(&self) -> String {
        match self {
            Self::AlreadyExists(_) => "already exists".to_string(),
            Self::Config(msg)
            | Self::Plan(msg)
            | Self::Connection(msg)
            | Self::Database(msg)
            | Self::Io(msg) => msg.clone(),
        }
    }
}

impl From<std::io::Error> for BootstrapError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BootstrapError {
    fn from(err: serde_json::Error) -> Self {
        Self::Plan(format!("JSON error: {}", err))
    }
}

impl From<mongodb::error::Error> for BootstrapError {
    fn from(err: mongodb::error::Error) -> Self {
        crate::db::mongo::classify(err)
    }
}

/// Result type alias for bootstrap operations
pub type Result<T> = std::result::Result<T, BootstrapError>;
