//! Authenticated session state and its on-disk store.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::User;

const SESSION_COOKIE: &str = "sails.sid";

/// Session cookie, CSRF token and the signed-in user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: Option<String>,
    pub csrf_token: Option<String>,
    pub user: Option<User>,
    /// Set between a login that requires two-factor and its verification.
    #[serde(default)]
    pub pending_two_factor: bool,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.user.is_some() && !self.pending_two_factor
    }

    /// `Cookie` header value for authenticated requests.
    pub fn cookie_header(&self) -> Option<String> {
        self.token
            .as_deref()
            .map(|token| format!("{SESSION_COOKIE}={token}"))
    }

    /// Apply one `Set-Cookie` header. Returns `true` if anything changed.
    pub fn apply_set_cookie(&mut self, header: &str) -> bool {
        let mut changed = false;
        if let Some(sid) = cookie_value(header, SESSION_COOKIE) {
            self.token = Some(sid);
            changed = true;
        }
        if let Some(csrf) = cookie_value(header, "csrfToken") {
            self.csrf_token = Some(csrf);
            changed = true;
        }
        changed
    }
}

fn cookie_value(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|part| {
        let (key, value) = part.trim().split_once('=')?;
        (key.trim().eq_ignore_ascii_case(name) && !value.is_empty()).then(|| value.trim().to_string())
    })
}

/// Persists the session as JSON (`session.json` in the config directory).
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store under the default config directory.
    pub fn default_location() -> Self {
        Self::new(crate::config::config_dir().join("session.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored session; a missing file is an empty session.
    pub fn load(&self) -> Result<Session> {
        if !self.path.exists() {
            return Ok(Session::default());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("invalid session file {}", self.path.display()))
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(session)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        debug!("Session saved to {}", self.path.display());
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("failed to remove {}", self.path.display()))?;
        }
        Ok(())
    }
}
