//! Playback pipeline errors
//!
//! Every error is `Clone` because load results are shared between all
//! callers waiting on the same in-flight resolution.

use thiserror::Error;

/// Errors raised by resolution, playback and the content API client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// No attachment could be resolved for the content item.
    #[error("No video attachment found for content {content_id}")]
    NotFound { content_id: String },

    /// No delivery scenario yielded playable sources.
    #[error("Delivery unavailable (HTTP {status}): {body}")]
    DeliveryUnavailable { status: u16, body: String },

    /// Resolution finished but nothing playable was left to select.
    #[error("No playable source: {0}")]
    NoPlayableSource(String),

    /// The renderer never became ready within the stall window.
    #[error("Playback stalled on {url}")]
    PlaybackStalled { url: String },

    /// Every candidate source was tried and failed.
    #[error("All {tried} sources failed for content {content_id}")]
    PlaybackExhausted { content_id: String, tried: usize },

    /// The secure key channel could not deliver key material.
    #[error("Key retrieval failed for token {token}: {reason}")]
    KeyRetrievalFailed { token: String, reason: String },

    /// A source failed after the renderer's output already carried part of
    /// its stream, so no other source can be spliced in.
    #[error("Stream interrupted after output started: {0}")]
    StreamInterrupted(String),

    /// Session rejected by the platform (HTTP 401).
    #[error("Authentication failed")]
    AuthFailed,

    /// Non-success API reply.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Transport-level failure.
    #[error("Network error: {0}")]
    Network(String),

    /// Renderer failure outside the stall/retry path.
    #[error("Renderer error: {0}")]
    Renderer(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl PlaybackError {
    /// Errors that end playback and are shown to the user as a terminal
    /// message. Everything else is either retried internally or reported
    /// as transient status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlaybackError::NotFound { .. }
                | PlaybackError::DeliveryUnavailable { .. }
                | PlaybackError::NoPlayableSource(_)
                | PlaybackError::PlaybackExhausted { .. }
                | PlaybackError::KeyRetrievalFailed { .. }
                | PlaybackError::StreamInterrupted(_)
                | PlaybackError::AuthFailed
        )
    }
}

impl From<reqwest::Error> for PlaybackError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) if status.as_u16() == 401 => PlaybackError::AuthFailed,
            Some(status) => PlaybackError::Api {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => PlaybackError::Network(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for PlaybackError {
    fn from(err: serde_json::Error) -> Self {
        PlaybackError::Api {
            status: 0,
            message: format!("invalid JSON: {err}"),
        }
    }
}

impl From<std::io::Error> for PlaybackError {
    fn from(err: std::io::Error) -> Self {
        PlaybackError::Renderer(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PlaybackError>;
