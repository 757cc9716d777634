use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("not found: {0}")]
    NotFound(&'static str),
    #[error("invalid input: {0}")]
    Validation(&'static str),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("{0}")]
    ExternalService(ServiceFailure),
    #[error("cannot import deck: {0}")]
    ImportFormat(&'static str),
}

/// How a failed generative call is reported to the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServiceFailure {
    Overloaded,
    Other(String),
}

impl fmt::Display for ServiceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceFailure::Overloaded => f.write_str(
                "the study assistant is busy right now; please try again in a few moments",
            ),
            ServiceFailure::Other(msg) => write!(f, "the study assistant failed: {msg}"),
        }
    }
}

pub fn classify_service_failure(message: &str) -> ServiceFailure {
    if message.contains("503") || message.to_lowercase().contains("overloaded") {
        ServiceFailure::Overloaded
    } else {
        ServiceFailure::Other(message.to_string())
    }
}
