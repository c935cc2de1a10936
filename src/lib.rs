//! `floatcast` - creator-subscription video client core
//!
//! # Features
//!
//! - **Delivery resolution**: scenario fallback (download, on-demand, live)
//!   over every delivery payload shape the platform returns
//! - **Load deduplication**: one in-flight resolution per content item
//! - **Self-healing playback**: stall watchdog and automatic retry down the
//!   ranked source list
//! - **Encrypted HLS**: key requests bridged to a secure key channel
//! - **Content API**: login with two-factor, subscriptions, creator live
//!   status, creator content with search and filters
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use floatcast::api::HttpContentApi;
//! use floatcast::config::Config;
//! use floatcast::stream::DeliveryResolver;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let api = Arc::new(HttpContentApi::new(&config.api)?);
//!     let resolution = DeliveryResolver::new(api)
//!         .resolve("post-id", None, false, None)
//!         .await?;
//!     println!("{} sources via {}", resolution.sources.len(), resolution.scenario_used);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod stream;

pub use api::{ContentApi, ContentItem, HttpContentApi, Session, SessionStore};
pub use config::Config;
pub use error::{PlaybackError, Result};
pub use stream::{
    extract_sources, ContainerType, DeliveryResolver, LoadCoordinator, PlaybackPhase, Player,
    PlayerEvent, PlayerHandle, Renderer, RendererEvent, Scenario, SourceDescriptor,
};

/// Version of floatcast
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
