//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic business-rule failures. Exactly two
/// kinds: a bad input value, or an operation attempted out of order. Neither
/// is recoverable by the callee; no partial mutation happens on failure.
/// Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The caller supplied a value violating a stated precondition.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation was attempted in the wrong lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl DomainError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// The message carried by either kind.
    ///
    /// Lets callers surface a contract message without matching on the kind
    /// first.
    pub fn message(&self) -> &str {
        match self {
            Self::InvalidArgument(msg) | Self::InvalidState(msg) => msg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helpers_build_the_matching_kind() {
        let argument = DomainError::invalid_argument("bad amount");
        let state = DomainError::invalid_state("not open");

        assert_eq!(argument, DomainError::InvalidArgument("bad amount".to_string()));
        assert_eq!(state, DomainError::InvalidState("not open".to_string()));
    }

    #[test]
    fn message_is_the_payload_of_either_kind() {
        assert_eq!(DomainError::invalid_argument("bad amount").message(), "bad amount");
        assert_eq!(DomainError::invalid_state("not open").message(), "not open");
    }
}
