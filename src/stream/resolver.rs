//! Delivery resolution with scenario fallback.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use super::extract::extract_sources;
use super::source::SourceDescriptor;
use super::Scenario;
use crate::api::ContentApi;
use crate::error::{PlaybackError, Result};

/// Sources extracted from the first scenario that produced any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub sources: Vec<SourceDescriptor>,
    pub scenario_used: Scenario,
    pub status: u16,
}

/// Scenarios to try, in order, for one resolution.
pub fn scenario_order(is_live: bool, requested: Option<Scenario>) -> Vec<Scenario> {
    let candidates = if is_live {
        vec![Scenario::Live, Scenario::OnDemand, Scenario::Download]
    } else {
        vec![
            requested.unwrap_or(Scenario::Download),
            Scenario::Download,
            Scenario::OnDemand,
            Scenario::Live,
        ]
    };

    let mut order = Vec::with_capacity(candidates.len());
    for scenario in candidates {
        if !order.contains(&scenario) {
            order.push(scenario);
        }
    }
    order
}

/// Resolves a content item to playable sources through a [`ContentApi`].
pub struct DeliveryResolver<A: ContentApi + ?Sized> {
    api: Arc<A>,
}

impl<A: ContentApi + ?Sized> Clone for DeliveryResolver<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
        }
    }
}

impl<A: ContentApi + ?Sized> DeliveryResolver<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    /// Resolve sources for `content_id`.
    ///
    /// The attachment is looked up when not given. Scenarios are tried one
    /// at a time; a failed or empty reply moves on to the next. When none
    /// yields sources the last recorded reply is reported.
    #[instrument(skip(self))]
    pub async fn resolve(
        &self,
        content_id: &str,
        attachment_id: Option<&str>,
        is_live: bool,
        requested: Option<Scenario>,
    ) -> Result<Resolution> {
        let attachment = match attachment_id.filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => self.lookup_attachment(content_id).await?,
        };

        let mut last: Option<(u16, String)> = None;
        for scenario in scenario_order(is_live, requested) {
            match self.api.delivery_info(&attachment, scenario).await {
                Ok(reply) => {
                    let sources = extract_sources(&reply.body);
                    if !sources.is_empty() {
                        info!(
                            scenario = %scenario,
                            count = sources.len(),
                            "Delivery resolved"
                        );
                        return Ok(Resolution {
                            sources,
                            scenario_used: scenario,
                            status: reply.status,
                        });
                    }
                    debug!(scenario = %scenario, status = reply.status, "No sources in reply");
                    last = Some((reply.status, reply.body.to_string()));
                }
                Err(err) => {
                    warn!(scenario = %scenario, error = %err, "Delivery request failed");
                    last = Some(match err {
                        PlaybackError::Api { status, message } => (status, message),
                        other => (0, other.to_string()),
                    });
                }
            }
        }

        let (status, body) = last.unwrap_or((0, String::new()));
        Err(PlaybackError::DeliveryUnavailable { status, body })
    }

    async fn lookup_attachment(&self, content_id: &str) -> Result<String> {
        let item = self.api.content_item(content_id).await?;
        item.resolved_attachment_id()
            .map(ToString::to_string)
            .ok_or_else(|| PlaybackError::NotFound {
                content_id: content_id.to_string(),
            })
    }
}
