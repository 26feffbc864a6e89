//! Errors raised synchronously by helper operations.

use std::fmt::Display;

use common::StateError;

#[derive(Debug, Clone, PartialEq)]
pub enum HelperError {
    /// `search()` was called on a helper built without a search client.
    MissingSearchClient,
    /// `search()` was called outside a tokio runtime.
    NoAsyncRuntime,
    Destroyed,
    InvalidState(StateError),
}

impl Display for HelperError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingSearchClient => write!(f, "No search client configured for this helper"),
            Self::NoAsyncRuntime => write!(f, "search() must be called from within a tokio runtime"),
            Self::Destroyed => write!(f, "Helper has been destroyed"),
            Self::InvalidState(err) => write!(f, "Invalid search state: {}", err),
        }
    }
}

impl std::error::Error for HelperError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidState(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StateError> for HelperError {
    fn from(err: StateError) -> Self {
        Self::InvalidState(err)
    }
}
