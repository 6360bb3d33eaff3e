use thiserror::Error;

/// Result type for report operations
pub type Result<T> = std::result::Result<T, ReportError>;

/// Errors surfaced by the report core.
///
/// Shape problems inside a document are never errors: the migrator and the
/// integrity pass repair them. These variants cover caller misuse, the editor's
/// collaborators and configuration.
#[derive(Error, Debug)]
pub enum ReportError {
    /// A report entity or mutation payload was not a JSON object
    #[error("Expected a JSON object, found {0}")]
    NotAnObject(&'static str),

    /// The report entity lacks its identity fields
    #[error("Invalid report entity: {0}")]
    InvalidEntity(String),

    /// Layer id not present in the report
    #[error("Unknown layer: {0}")]
    UnknownLayer(String),

    /// View id not present in the report
    #[error("Unknown view: {0}")]
    UnknownView(String),

    /// Operation requires a map view
    #[error("View {0} is not a map view")]
    NotAMapView(String),

    /// No credentials available for the executor
    #[error("Not authenticated")]
    Unauthenticated,

    /// Query or mutation executor failed
    #[error("Executor error: {0}")]
    Executor(#[from] anyhow::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ReportError {
    /// Create an invalid entity error
    pub fn invalid_entity(msg: impl Into<String>) -> Self {
        Self::InvalidEntity(msg.into())
    }

    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
