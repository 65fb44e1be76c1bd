use thiserror::Error;

/// **CRATE RESULT ALIAS**
pub type CoreResult<T> = Result<T, CoreError>;

/// **SCOPEWIRE ERROR TAXONOMY**
///
/// **RECOVERABLE**: `NotFound`, `TypeMismatch`, `Handler`.
/// **PROGRAMMING ERRORS**: `ExhaustedChain`, `DisposeWithLiveChildren`, `Disposed`.
/// **SETUP-TIME**: `InvalidAction` aborts bootstrap, never a request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("NOT FOUND: no binding for {key}")]
    NotFound { key: String },

    #[error("TYPE MISMATCH: binding for {key} does not hold a {expected}")]
    TypeMismatch { key: String, expected: &'static str },

    #[error("EXHAUSTED CHAIN: no available handlers to advance in '{name}'")]
    ExhaustedChain { name: String },

    #[error("DISPOSE WITH LIVE CHILDREN: scope #{scope} still has {children} live child scope(s)")]
    DisposeWithLiveChildren { scope: u64, children: usize },

    #[error("DISPOSED: scope #{scope} was already disposed")]
    Disposed { scope: u64 },

    #[error("INVALID ACTION: {action} not found in controller {target}")]
    InvalidAction { target: String, action: String },

    #[error("HANDLER ERROR: {code} - {message}")]
    Handler { code: String, message: String },
}

impl CoreError {
    /// Application-level failure raised from inside a handler.
    pub fn handler(code: impl Into<String>, message: impl Into<String>) -> Self {
        CoreError::Handler {
            code: code.into(),
            message: message.into(),
        }
    }

    /// **STABLE ERROR CODE** - see [`error_codes`]
    pub fn code(&self) -> &str {
        match self {
            CoreError::NotFound { .. } => error_codes::NOT_FOUND,
            CoreError::TypeMismatch { .. } => error_codes::TYPE_MISMATCH,
            CoreError::ExhaustedChain { .. } => error_codes::EXHAUSTED_CHAIN,
            CoreError::DisposeWithLiveChildren { .. } => error_codes::DISPOSE_WITH_LIVE_CHILDREN,
            CoreError::Disposed { .. } => error_codes::DISPOSED,
            CoreError::InvalidAction { .. } => error_codes::INVALID_ACTION,
            CoreError::Handler { code, .. } => code,
        }
    }

    /// Lifecycle violations that indicate a leaked scope.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            CoreError::DisposeWithLiveChildren { .. } | CoreError::Disposed { .. }
        )
    }
}

/// **ERROR CODES**
///
/// **MANDATE**: Use these standardized codes when reporting failures to a host.
pub mod error_codes {
    pub const NOT_FOUND: &str = "SCOPEWIRE_REGISTRY_NOT_FOUND";
    pub const TYPE_MISMATCH: &str = "SCOPEWIRE_REGISTRY_TYPE_MISMATCH";
    pub const EXHAUSTED_CHAIN: &str = "SCOPEWIRE_DISPATCH_EXHAUSTED_CHAIN";
    pub const DISPOSE_WITH_LIVE_CHILDREN: &str = "SCOPEWIRE_REGISTRY_DISPOSE_WITH_LIVE_CHILDREN";
    pub const DISPOSED: &str = "SCOPEWIRE_REGISTRY_DISPOSED";
    pub const INVALID_ACTION: &str = "SCOPEWIRE_CONTROLLER_INVALID_ACTION";
}
