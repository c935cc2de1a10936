//! Content API access.
//!
//! The playback pipeline only talks to [`ContentApi`]; [`HttpContentApi`]
//! is the reqwest-backed implementation used by the CLI.

pub mod client;
pub mod session;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
use crate::stream::Scenario;

pub use client::HttpContentApi;
pub use session::{Session, SessionStore};
pub use types::{
    ContentFilter, ContentItem, Creator, CreatorInfo, CreatorPage, Cursor, DeliveryResponse,
    LiveStream, LoginOutcome, User,
};

/// Capability-bearing client for the platform's content endpoints.
#[async_trait]
pub trait ContentApi: Send + Sync {
    /// Look up a single content item (used to resolve its attachment).
    async fn content_item(&self, content_id: &str) -> Result<ContentItem>;

    /// Fetch delivery info for an attachment under one scenario.
    async fn delivery_info(&self, entity_id: &str, scenario: Scenario) -> Result<DeliveryResponse>;

    /// List a creator's content with cursor pagination, narrowed by `filter`.
    async fn creator_content(
        &self,
        creator_id: &str,
        filter: &ContentFilter,
        limit: u32,
        fetch_after: Option<&Cursor>,
    ) -> Result<CreatorPage>;

    /// Creator profile including its live stream state.
    async fn creator_info(&self, creator_id: &str) -> Result<CreatorInfo>;

    /// Creators the current user is subscribed to.
    async fn subscriptions(&self) -> Result<Vec<Creator>>;
}
