//! In-flight load deduplication.
//!
//! One [`LoadContext`] exists per content id while its resolution runs.
//! Repeated requests for the same id share the context's future; a
//! request for a different id makes it the current target, and any load
//! that finishes while not current settles as [`LoadOutcome::Cancelled`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::resolver::DeliveryResolver;
use super::selector;
use super::source::SourceDescriptor;
use super::Scenario;
use crate::api::{ContentApi, ContentItem};
use crate::error::{PlaybackError, Result};

/// Settled value of a load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded {
        source: SourceDescriptor,
        sources: Vec<SourceDescriptor>,
        scenario: Scenario,
        default_index: usize,
    },
    /// Superseded by a load for another id, or invalidated.
    Cancelled,
}

/// Shared handle to one in-flight resolution.
pub type LoadFuture = Shared<BoxFuture<'static, Result<LoadOutcome>>>;

struct LoadContext {
    token: u64,
    started_at: Instant,
    future: LoadFuture,
}

#[derive(Default)]
struct CoordinatorState {
    active: HashMap<String, LoadContext>,
    current: Option<String>,
    next_token: u64,
}

/// Deduplicates resolver calls per content id.
pub struct LoadCoordinator<A: ContentApi + ?Sized> {
    resolver: DeliveryResolver<A>,
    preferred: Option<Scenario>,
    state: Arc<Mutex<CoordinatorState>>,
}

impl<A: ContentApi + ?Sized + 'static> LoadCoordinator<A> {
    pub fn new(resolver: DeliveryResolver<A>) -> Self {
        Self {
            resolver,
            preferred: None,
            state: Arc::new(Mutex::new(CoordinatorState::default())),
        }
    }

    /// Scenario tried first for non-live items.
    #[must_use]
    pub fn with_preferred_scenario(mut self, scenario: Option<Scenario>) -> Self {
        self.preferred = scenario;
        self
    }

    /// Start (or join) the load for `item` and make it the current target.
    pub async fn ensure_loaded(&self, item: &ContentItem) -> LoadFuture {
        let mut state = self.state.lock().await;
        state.current = Some(item.id.clone());

        if let Some(ctx) = state.active.get(&item.id) {
            debug!(
                content_id = %item.id,
                elapsed_ms = u64::try_from(ctx.started_at.elapsed().as_millis()).unwrap_or(u64::MAX),
                "Joining in-flight load"
            );
            return ctx.future.clone();
        }

        state.next_token += 1;
        let token = state.next_token;
        let future = self.load_future(item, token).boxed().shared();
        state.active.insert(
            item.id.clone(),
            LoadContext {
                token,
                started_at: Instant::now(),
                future: future.clone(),
            },
        );
        drop(state);

        // Drive the load even if every caller drops its handle, so the
        // context always settles and is removed.
        tokio::spawn(future.clone());
        info!(content_id = %item.id, token, "Load started");
        future
    }

    /// Whether a load for `content_id` is in flight.
    pub async fn is_loading(&self, content_id: &str) -> bool {
        self.state.lock().await.active.contains_key(content_id)
    }

    /// Cancel the current target: in-flight loads settle as `Cancelled`.
    pub async fn invalidate(&self) {
        self.state.lock().await.current = None;
    }

    fn load_future(
        &self,
        item: &ContentItem,
        token: u64,
    ) -> impl std::future::Future<Output = Result<LoadOutcome>> + Send + 'static {
        let resolver = self.resolver.clone();
        let state = Arc::clone(&self.state);
        let content_id = item.id.clone();
        let attachment = item.resolved_attachment_id().map(ToString::to_string);
        let is_live = item.is_live;
        let preferred = self.preferred;

        async move {
            let result = resolver
                .resolve(&content_id, attachment.as_deref(), is_live, preferred)
                .await;

            let still_current = {
                let mut state = state.lock().await;
                if state.active.get(&content_id).is_some_and(|c| c.token == token) {
                    state.active.remove(&content_id);
                }
                state.current.as_deref() == Some(content_id.as_str())
            };

            if !still_current {
                debug!(content_id = %content_id, token, "Load superseded");
                return Ok(LoadOutcome::Cancelled);
            }

            let resolution = result?;
            let default_index = selector::pick(&resolution.sources).ok_or_else(|| {
                PlaybackError::NoPlayableSource(format!("no sources for {content_id}"))
            })?;
            Ok(LoadOutcome::Loaded {
                source: resolution.sources[default_index].clone(),
                sources: resolution.sources,
                scenario: resolution.scenario_used,
                default_index,
            })
        }
    }
}
