use thiserror::Error;

/// Boxed failure raised by user conversion logic.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Every way an evaluation can fail. All of them abort the whole evaluation.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("property `{0}` is not a readable member of the target")]
    PropertyNotFound(String),

    #[error("property `{property}` could not be read: {reason}")]
    Unreadable { property: String, reason: String },

    #[error("{converter}: required value `{property}` is absent")]
    MissingRequiredValue { converter: String, property: String },

    #[error("{converter}: every required value is unbound ({})", .properties.join(", "))]
    AllValuesUnbound {
        converter: String,
        properties: Vec<String>,
    },

    #[error("arity not respected: {expected} required over {supplied} passed ({converter})")]
    ArityMismatch {
        converter: String,
        expected: usize,
        supplied: usize,
    },

    #[error("converter `{converter}` cannot be instantiated: {reason}")]
    ConverterInstantiation { converter: String, reason: String },

    #[error("{message}")]
    Conversion {
        converter: String,
        message: String,
        #[source]
        source: BoxError,
    },

    #[error("no eligible member to evaluate")]
    NoEligibleMembers,

    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] serde_json::Error),
}

/// Fieldless mirror of [`EvalError`], for callers that only care about the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    PropertyNotFound,
    Unreadable,
    MissingRequiredValue,
    AllValuesUnbound,
    ArityMismatch,
    ConverterInstantiation,
    Conversion,
    NoEligibleMembers,
    InvalidConfig,
}

impl EvalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EvalError::PropertyNotFound(_) => ErrorKind::PropertyNotFound,
            EvalError::Unreadable { .. } => ErrorKind::Unreadable,
            EvalError::MissingRequiredValue { .. } => ErrorKind::MissingRequiredValue,
            EvalError::AllValuesUnbound { .. } => ErrorKind::AllValuesUnbound,
            EvalError::ArityMismatch { .. } => ErrorKind::ArityMismatch,
            EvalError::ConverterInstantiation { .. } => ErrorKind::ConverterInstantiation,
            EvalError::Conversion { .. } => ErrorKind::Conversion,
            EvalError::NoEligibleMembers => ErrorKind::NoEligibleMembers,
            EvalError::InvalidConfig(_) => ErrorKind::InvalidConfig,
        }
    }
}

// Type alias for results that use `EvalError` as the error type
pub type Result<T> = std::result::Result<T, EvalError>;
