use thiserror::Error;

/// Failure taxonomy for the chat core. Every variant maps to a
/// machine-readable code for callers/logs and a user-safe message;
/// none of them is allowed to take the process down.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("model backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("store failure: {0}")]
    Store(String),
}

impl ChatError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::BackendUnavailable(_) => "backend_unavailable",
            Self::Store(_) => "store_error",
        }
    }

    /// Text safe to return to the end user. Store failures keep their
    /// detail server-side; validation and not-found messages are composed
    /// by this crate and are safe to surface verbatim.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::NotFound(message) => format!("I couldn't find that: {message}."),
            Self::BackendUnavailable(_) => {
                "The assistant is temporarily unavailable. Please try again in a moment."
                    .to_string()
            }
            Self::Store(_) => {
                "Something went wrong on our side. Please try again shortly.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ChatError;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ChatError::Validation("x".into()).code(), "validation_error");
        assert_eq!(ChatError::NotFound("x".into()).code(), "not_found");
        assert_eq!(ChatError::BackendUnavailable("x".into()).code(), "backend_unavailable");
        assert_eq!(ChatError::Store("x".into()).code(), "store_error");
    }

    #[test]
    fn store_detail_is_not_leaked_to_users() {
        let error = ChatError::Store("connection refused to sqlite://prod.db".to_string());
        assert!(!error.user_message().contains("sqlite"));
    }
}
