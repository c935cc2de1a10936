mod auth;
mod browse;
mod play;
mod resolve;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use floatcast::{Config, HttpContentApi, SessionStore};

pub use auth::{cmd_login, cmd_logout};
pub use browse::{cmd_content, cmd_creator, cmd_subscriptions};
pub(crate) use browse::date_bound;
pub use play::cmd_play;
pub use resolve::cmd_resolve;

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

/// API client resuming the stored session.
fn api_client(config: &Config) -> Result<Arc<HttpContentApi>> {
    let session = SessionStore::default_location().load()?;
    if !session.is_authenticated() {
        tracing::warn!("Not logged in; run `floatcast login` first");
    }
    let api = HttpContentApi::with_session(&config.api, session)
        .context("failed to build HTTP client")?;
    Ok(Arc::new(api))
}
