//! Playback session state machine.
//!
//! Pure and synchronous: the [`Player`](super::Player) actor feeds it
//! events and performs the side effects it asks for. Every transition
//! that invalidates outstanding callbacks bumps the session token.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use super::selector;
use super::source::SourceDescriptor;

/// Lifecycle phase of a playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackPhase {
    Idle,
    Loading,
    Ready,
    Playing,
    Stalled,
    Retrying,
    Exhausted,
    Stopped,
}

impl fmt::Display for PlaybackPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaybackPhase::Idle => "idle",
            PlaybackPhase::Loading => "loading",
            PlaybackPhase::Ready => "ready",
            PlaybackPhase::Playing => "playing",
            PlaybackPhase::Stalled => "stalled",
            PlaybackPhase::Retrying => "retrying",
            PlaybackPhase::Exhausted => "exhausted",
            PlaybackPhase::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Playback of one content item, from `play` until `stop` or the next `play`.
#[derive(Debug, Clone)]
pub struct PlaybackSession {
    content_id: String,
    token: u64,
    sources: Vec<SourceDescriptor>,
    active: Option<usize>,
    tried: HashSet<usize>,
    phase: PlaybackPhase,
}

impl PlaybackSession {
    /// New idle session. Its token continues from `last_token` so that
    /// callbacks from a previous session never match.
    pub fn new(content_id: impl Into<String>, last_token: u64) -> Self {
        Self {
            content_id: content_id.into(),
            token: last_token + 1,
            sources: Vec::new(),
            active: None,
            tried: HashSet::new(),
            phase: PlaybackPhase::Idle,
        }
    }

    pub fn content_id(&self) -> &str {
        &self.content_id
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    pub fn sources(&self) -> &[SourceDescriptor] {
        &self.sources
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active_source(&self) -> Option<&SourceDescriptor> {
        self.active.and_then(|i| self.sources.get(i))
    }

    pub fn tried(&self) -> &HashSet<usize> {
        &self.tried
    }

    /// Whether a callback stamped with `token` belongs to this session state.
    pub fn is_current(&self, token: u64) -> bool {
        self.token == token && self.phase != PlaybackPhase::Stopped
    }

    /// Idle → Loading. Returns the token load completions must carry.
    pub fn begin_loading(&mut self) -> u64 {
        self.phase = PlaybackPhase::Loading;
        self.bump()
    }

    /// Loading → Ready with the coordinator's sources. Returns the token
    /// for renderer and watchdog callbacks, or `None` when the session is
    /// not loading or the index is out of range.
    pub fn activate(&mut self, sources: Vec<SourceDescriptor>, index: usize) -> Option<u64> {
        if self.phase != PlaybackPhase::Loading || index >= sources.len() {
            return None;
        }
        self.sources = sources;
        self.active = Some(index);
        self.tried = HashSet::from([index]);
        self.phase = PlaybackPhase::Ready;
        Some(self.bump())
    }

    /// Ready → Playing on renderer readiness.
    pub fn mark_playing(&mut self, token: u64) -> bool {
        if !self.is_current(token) || self.phase != PlaybackPhase::Ready {
            return false;
        }
        self.phase = PlaybackPhase::Playing;
        true
    }

    /// Ready/Playing → Stalled on watchdog expiry or renderer failure.
    pub fn stall(&mut self, token: u64) -> bool {
        if !self.is_current(token)
            || !matches!(self.phase, PlaybackPhase::Ready | PlaybackPhase::Playing)
        {
            return false;
        }
        self.phase = PlaybackPhase::Stalled;
        true
    }

    /// Stalled → Retrying with the best untried source, or → Exhausted.
    pub fn retry(&mut self) -> Option<usize> {
        if self.phase != PlaybackPhase::Stalled {
            return None;
        }
        match selector::next_candidate(&self.sources, &self.tried) {
            Some(next) => {
                self.tried.insert(next);
                self.active = Some(next);
                self.phase = PlaybackPhase::Retrying;
                Some(next)
            }
            None => {
                self.phase = PlaybackPhase::Exhausted;
                None
            }
        }
    }

    /// Retrying → Loading after the renderer was reset.
    pub fn reload(&mut self) -> u64 {
        if self.phase == PlaybackPhase::Retrying {
            self.phase = PlaybackPhase::Loading;
        }
        self.bump()
    }

    /// Loading → Ready once the retried source is attached. Returns the
    /// token for its callbacks.
    pub fn attached(&mut self) -> Option<u64> {
        if self.phase != PlaybackPhase::Loading || self.active.is_none() {
            return None;
        }
        self.phase = PlaybackPhase::Ready;
        Some(self.bump())
    }

    /// Manual switch to `index`, ignoring earlier failures.
    pub fn switch_to(&mut self, index: usize) -> Option<u64> {
        if index >= self.sources.len()
            || matches!(self.phase, PlaybackPhase::Stopped | PlaybackPhase::Idle)
        {
            return None;
        }
        self.active = Some(index);
        self.tried = HashSet::from([index]);
        self.phase = PlaybackPhase::Ready;
        Some(self.bump())
    }

    /// Any → Stopped. Outstanding callbacks become stale.
    pub fn stop(&mut self) {
        self.phase = PlaybackPhase::Stopped;
        self.bump();
    }

    fn bump(&mut self) -> u64 {
        self.token += 1;
        self.token
    }
}
