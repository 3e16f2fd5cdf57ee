//! Error taxonomy shared by the closet, the session and the stylist engine.
//!
//! Every failure that reaches a user is one of these variants. None of them
//! is retried internally; the caller decides how to show the message.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutfitError {
    /// The caller supplied an empty or invalid selection. Raised before any
    /// network call and without touching state.
    #[error("{0}")]
    Validation(String),

    /// The model answered, but its parts could not be turned into the
    /// expected looks or image.
    #[error("{0}")]
    UpstreamDecode(String),

    /// An endpoint or the model API answered with a non-2xx status.
    #[error("upstream request failed ({status}): {message}")]
    Upstream { status: u16, message: String },

    /// The request never produced a response.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Reading or writing durable storage failed.
    #[error("storage failure: {0}")]
    Persistence(String),
}

impl OutfitError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn upstream_decode(message: impl Into<String>) -> Self {
        Self::UpstreamDecode(message.into())
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    /// Short machine-readable tag, used in activity log entries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::UpstreamDecode(_) => "upstream_decode",
            Self::Upstream { .. } => "upstream",
            Self::Transport(_) => "transport",
            Self::Persistence(_) => "persistence",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::OutfitError;

    #[test]
    fn display_surfaces_messages_verbatim() {
        assert_eq!(
            OutfitError::validation("Select at least one piece.").to_string(),
            "Select at least one piece."
        );
        assert_eq!(
            OutfitError::upstream_decode("model returned text").to_string(),
            "model returned text"
        );
        assert_eq!(
            OutfitError::Upstream {
                status: 502,
                message: "bad gateway".to_string()
            }
            .to_string(),
            "upstream request failed (502): bad gateway"
        );
    }

    #[test]
    fn kind_tags_are_stable() {
        assert_eq!(OutfitError::validation("x").kind(), "validation");
        assert_eq!(OutfitError::persistence("x").kind(), "persistence");
        assert_eq!(OutfitError::Transport("x".to_string()).kind(), "transport");
    }
}
