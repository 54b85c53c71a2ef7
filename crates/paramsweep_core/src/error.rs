use std::path::PathBuf;

/// Boxed error returned by external evaluators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the sweep engine
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    /// A mapping was used as a parameter value, or an element type could not be inferred
    #[error("invalid value type for parameter `{name}`: {reason}")]
    InvalidValueType { name: String, reason: String },

    /// Indexing a parameter that holds a single scalar
    #[error("parameter `{0}` is not sequenced")]
    NotSequenced(String),

    #[error("index {index} out of bounds for parameter `{name}` of length {len}")]
    IndexOutOfBounds {
        name: String,
        index: usize,
        len: usize,
    },

    /// Two configuration trees or metric results do not share the same shape
    #[error("incompatible shape: {0}")]
    IncompatibleShape(String),

    #[error("`{task}` is an invalid task, possible tasks are `{valid}`")]
    InvalidTask { task: String, valid: String },

    /// One invocation of a batch failed; the whole batch is discarded
    #[error("batch execution failed at input {index}: {source}")]
    BatchExecution {
        index: usize,
        #[source]
        source: BoxError,
    },

    #[error("persistence error at {}: {message}", path.display())]
    Persistence { path: PathBuf, message: String },

    #[error("unknown metric `{0}`")]
    UnknownMetric(String),

    #[error("invalid configuration path `{0}`")]
    InvalidPath(String),

    #[error("failed to build worker pool: {0}")]
    PoolBuild(String),
}

impl SweepError {
    pub(crate) fn persistence(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        SweepError::Persistence {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn invalid_value(name: &str, reason: impl Into<String>) -> Self {
        SweepError::InvalidValueType {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SweepError>;
