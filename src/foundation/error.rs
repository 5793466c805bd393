pub type InktexResult<T> = Result<T, InktexError>;

#[derive(thiserror::Error, Debug)]
pub enum InktexError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl InktexError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

/// Failures of the engine adapter and its worker thread.
///
/// Load-time variants (`Asset`, `Decompress`) are fatal for the session; run-time variants are
/// local to a single request.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("engine has not been loaded")]
    NotLoaded,

    #[error("engine is already loaded")]
    AlreadyLoaded,

    #[error("unable to load asset '{name}': {source}")]
    Asset {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decompress '{name}': {source}")]
    Decompress {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("engine execution failed: {0}")]
    Execution(String),

    #[error("engine produced no '{0}'")]
    MissingOutput(String),

    #[error("output conversion failed: {0}")]
    Conversion(String),

    #[error("engine worker is not running")]
    WorkerGone,
}

impl EngineError {
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    pub fn conversion(msg: impl Into<String>) -> Self {
        Self::Conversion(msg.into())
    }

    /// True for failures that happen while bringing the engine up, which poison every later run.
    pub fn is_load_failure(&self) -> bool {
        matches!(
            self,
            Self::NotLoaded | Self::AlreadyLoaded | Self::Asset { .. } | Self::Decompress { .. }
        )
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
