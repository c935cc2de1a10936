//! Renderer seam.
//!
//! A [`Renderer`] plays one source at a time and reports what happens
//! through an [`EventSink`]. The sink stamps every event with the session
//! token that was current when the source was attached, so events from a
//! replaced source can be told apart and dropped.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::source::SourceDescriptor;
use crate::error::{PlaybackError, Result};

/// Something the renderer observed about the attached source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RendererEvent {
    /// Waiting for data.
    Buffering,
    /// First media data delivered; playback can start.
    Ready,
    /// More data delivered (cumulative bytes).
    Progress { bytes: u64 },
    /// Data stopped arriving after playback started.
    Stalled,
    /// Media or decode failure.
    Error(String),
    /// The source answered with an HTTP error or could not be reached.
    SourceUnavailable(String),
    /// Key material for an encrypted source could not be retrieved.
    KeyFailed(PlaybackError),
    /// End of stream.
    Ended,
}

impl RendererEvent {
    /// Activity that keeps the stall watchdog waiting.
    pub fn is_activity(&self) -> bool {
        matches!(self, RendererEvent::Buffering | RendererEvent::Progress { .. })
    }

    /// Events that fail the current source.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            RendererEvent::Stalled
                | RendererEvent::Error(_)
                | RendererEvent::SourceUnavailable(_)
                | RendererEvent::KeyFailed(_)
        )
    }

    /// Human-readable reason for a failure event.
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            RendererEvent::Stalled => Some("renderer stalled".to_string()),
            RendererEvent::Error(reason) => Some(reason.clone()),
            RendererEvent::SourceUnavailable(reason) => Some(format!("source unavailable: {reason}")),
            RendererEvent::KeyFailed(err) => Some(err.to_string()),
            _ => None,
        }
    }
}

/// Renderer event stamped with the token of the attach that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampedEvent {
    pub token: u64,
    pub event: RendererEvent,
}

/// Token-stamped sender handed to a renderer on attach.
#[derive(Debug, Clone)]
pub struct EventSink {
    token: u64,
    tx: mpsc::UnboundedSender<StampedEvent>,
}

impl EventSink {
    pub fn new(token: u64, tx: mpsc::UnboundedSender<StampedEvent>) -> Self {
        Self { token, tx }
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    /// Send an event. Returns `false` once the player is gone.
    pub fn emit(&self, event: RendererEvent) -> bool {
        self.tx
            .send(StampedEvent {
                token: self.token,
                event,
            })
            .is_ok()
    }
}

/// Media renderer driven by the player.
#[async_trait]
pub trait Renderer: Send {
    /// Start playing `source`, reporting through `sink`.
    async fn attach(&mut self, source: &SourceDescriptor, sink: EventSink) -> Result<()>;

    /// Stop the current source but stay usable for the next attach.
    async fn reset(&mut self);

    /// Tear down for good.
    async fn release(&mut self);
}
