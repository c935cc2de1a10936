//! Playback resolution and recovery pipeline
//!
//! Delivery info is resolved per content item, normalized into
//! [`SourceDescriptor`]s, ranked, and played through a [`Renderer`]
//! supervised by the [`Player`] actor.

pub mod backends;
pub mod coordinator;
pub mod extract;
pub mod keys;
pub mod player;
pub mod renderer;
pub mod resolver;
pub mod selector;
pub mod session;
pub mod source;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use coordinator::{LoadCoordinator, LoadFuture, LoadOutcome};
pub use extract::extract_sources;
pub use keys::{KeyBridge, KeyCache, KeyChannel, SegmentLoader, SegmentRequest};
pub use player::{Player, PlayerEvent, PlayerHandle};
pub use renderer::{EventSink, Renderer, RendererEvent};
pub use resolver::{DeliveryResolver, Resolution};
pub use session::{PlaybackPhase, PlaybackSession};
pub use source::{ContainerType, SourceDescriptor};

/// Delivery scenario requested from the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Scenario {
    Download,
    OnDemand,
    Live,
}

impl Scenario {
    /// Wire name used in the `scenario` query parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            Scenario::Download => "download",
            Scenario::OnDemand => "onDemand",
            Scenario::Live => "live",
        }
    }

    /// Parse a wire or CLI name (case-insensitive, `on-demand` accepted).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "download" => Some(Scenario::Download),
            "ondemand" => Some(Scenario::OnDemand),
            "live" => Some(Scenario::Live),
            _ => None,
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
