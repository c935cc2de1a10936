//! Segment key bridge.
//!
//! Encrypted HLS streams reference their key by url. Those urls carry an
//! opaque token that only the secure key channel can turn into key bytes,
//! so [`KeyBridge`] sits in front of the segment loader, answers key
//! requests from the channel and passes everything else through.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::error::{PlaybackError, Result};

/// Default key-request pattern: a `key`/`keys` path segment or a `.key` file.
pub const DEFAULT_KEY_PATTERN: &str = r"(?i)(?:/keys?(?:/|\?|$)|\.key(?:\?|$))";

static DEFAULT_KEY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(DEFAULT_KEY_PATTERN).expect("valid key regex"));

/// One request made by the HLS engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentRequest {
    pub url: String,
}

impl SegmentRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Loads playlist segments and keys.
#[async_trait]
pub trait SegmentLoader: Send + Sync {
    async fn load(&self, request: &SegmentRequest) -> Result<Bytes>;
}

#[async_trait]
impl<L: SegmentLoader + ?Sized> SegmentLoader for Arc<L> {
    async fn load(&self, request: &SegmentRequest) -> Result<Bytes> {
        (**self).load(request).await
    }
}

/// Secure channel that exchanges a key token for key bytes.
#[async_trait]
pub trait KeyChannel: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<Bytes>;
}

/// Keys by token, shared between the bridge and the player (which clears
/// it on stop).
#[derive(Debug, Clone, Default)]
pub struct KeyCache {
    inner: Arc<RwLock<HashMap<String, Bytes>>>,
}

impl KeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, token: &str) -> Option<Bytes> {
        self.inner.read().await.get(token).cloned()
    }

    pub async fn insert(&self, token: impl Into<String>, key: Bytes) {
        self.inner.write().await.insert(token.into(), key);
    }

    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

/// [`SegmentLoader`] decorator that answers key requests from a
/// [`KeyChannel`].
pub struct KeyBridge<L> {
    inner: L,
    channel: Arc<dyn KeyChannel>,
    pattern: Regex,
    cache: KeyCache,
}

impl<L: SegmentLoader> KeyBridge<L> {
    /// Bridge using [`DEFAULT_KEY_PATTERN`].
    pub fn new(inner: L, channel: Arc<dyn KeyChannel>, cache: KeyCache) -> Self {
        Self {
            inner,
            channel,
            pattern: default_pattern(),
            cache,
        }
    }

    /// Replace the key-request pattern.
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self> {
        self.pattern = Regex::new(pattern)
            .map_err(|e| PlaybackError::Config(format!("invalid key pattern: {e}")))?;
        Ok(self)
    }

    pub fn is_key_request(&self, url: &str) -> bool {
        self.pattern.is_match(url)
    }

    pub fn cache(&self) -> &KeyCache {
        &self.cache
    }

    /// Drop every cached key.
    pub async fn clear(&self) {
        self.cache.clear().await;
    }

    #[instrument(skip(self))]
    async fn load_key(&self, url: &str) -> Result<Bytes> {
        let token = key_token(url).ok_or_else(|| PlaybackError::KeyRetrievalFailed {
            token: String::new(),
            reason: format!("no key token in {url}"),
        })?;

        if let Some(key) = self.cache.get(&token).await {
            debug!("Key cache hit");
            return Ok(key);
        }

        let key = self
            .channel
            .resolve(&token)
            .await
            .map_err(|e| match e {
                err @ PlaybackError::KeyRetrievalFailed { .. } => err,
                other => PlaybackError::KeyRetrievalFailed {
                    token: token.clone(),
                    reason: other.to_string(),
                },
            })?;
        debug!(bytes = key.len(), "Key resolved");
        self.cache.insert(token, key.clone()).await;
        Ok(key)
    }
}

#[async_trait]
impl<L: SegmentLoader> SegmentLoader for KeyBridge<L> {
    async fn load(&self, request: &SegmentRequest) -> Result<Bytes> {
        if self.is_key_request(&request.url) {
            self.load_key(&request.url).await
        } else {
            self.inner.load(request).await
        }
    }
}

fn default_pattern() -> Regex {
    DEFAULT_KEY_REGEX.clone()
}

/// Opaque token of a key url: the `token` query parameter, else the last
/// path segment.
pub fn key_token(url: &str) -> Option<String> {
    if let Ok(parsed) = url::Url::parse(url) {
        if let Some((_, token)) = parsed.query_pairs().find(|(k, _)| k == "token") {
            return Some(token.into_owned()).filter(|t| !t.is_empty());
        }
        return parsed
            .path_segments()
            .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
            .map(ToString::to_string);
    }

    let (path, query) = url.split_once('?').unwrap_or((url, ""));
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("token="))
        .filter(|t| !t.is_empty())
        .or_else(|| path.rsplit('/').find(|s| !s.is_empty()))
        .map(ToString::to_string)
}

#[derive(Deserialize)]
struct KeyReply {
    key: String,
}

/// [`KeyChannel`] that posts the token to an HTTP endpoint and decodes the
/// base64 `key` field of the reply.
pub struct HttpKeyChannel {
    client: Client,
    endpoint: String,
}

impl HttpKeyChannel {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl KeyChannel for HttpKeyChannel {
    async fn resolve(&self, token: &str) -> Result<Bytes> {
        let failed = |reason: String| PlaybackError::KeyRetrievalFailed {
            token: token.to_string(),
            reason,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "token": token }))
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("HTTP {status}")));
        }

        let reply: KeyReply = response.json().await.map_err(|e| failed(e.to_string()))?;
        let key = base64::engine::general_purpose::STANDARD
            .decode(reply.key.trim())
            .map_err(|e| failed(format!("invalid key encoding: {e}")))?;
        if key.is_empty() {
            return Err(failed("empty key".to_string()));
        }
        Ok(Bytes::from(key))
    }
}

/// Channel used when no endpoint is configured: every key request fails.
pub struct NoKeyChannel;

#[async_trait]
impl KeyChannel for NoKeyChannel {
    async fn resolve(&self, token: &str) -> Result<Bytes> {
        Err(PlaybackError::KeyRetrievalFailed {
            token: token.to_string(),
            reason: "no key channel configured".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct EchoLoader;

    #[async_trait]
    impl SegmentLoader for EchoLoader {
        async fn load(&self, request: &SegmentRequest) -> Result<Bytes> {
            Ok(Bytes::from(format!("segment:{}", request.url)))
        }
    }

    #[derive(Default)]
    struct CountingChannel {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl KeyChannel for CountingChannel {
        async fn resolve(&self, token: &str) -> Result<Bytes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Bytes::from(format!("key-{token}")))
        }
    }

    #[test]
    fn default_pattern_matches_key_urls() {
        let bridge = KeyBridge::new(EchoLoader, Arc::new(NoKeyChannel), KeyCache::new());
        assert!(bridge.is_key_request("https://cdn/hls/key/abc"));
        assert!(bridge.is_key_request("https://cdn/keys?token=abc"));
        assert!(bridge.is_key_request("https://cdn/v/enc.key"));
        assert!(bridge.is_key_request("https://cdn/v/enc.KEY?token=1"));
        assert!(!bridge.is_key_request("https://cdn/keyframes/seg1.ts"));
        assert!(!bridge.is_key_request("https://cdn/monkey/seg.ts"));
    }

    #[test]
    fn token_from_query_or_path() {
        assert_eq!(key_token("https://cdn/keys?token=t1&x=2").as_deref(), Some("t1"));
        assert_eq!(key_token("https://cdn/key/abc123").as_deref(), Some("abc123"));
        assert_eq!(key_token("https://cdn/key/abc123/").as_deref(), Some("abc123"));
        assert_eq!(key_token("/key/rel?token=r").as_deref(), Some("r"));
        assert_eq!(key_token("key/rel2").as_deref(), Some("rel2"));
    }

    #[tokio::test]
    async fn key_requests_go_to_channel_and_are_cached() {
        let channel = Arc::new(CountingChannel::default());
        let cache = KeyCache::new();
        let bridge = KeyBridge::new(EchoLoader, channel.clone(), cache.clone());

        let first = bridge.load(&SegmentRequest::new("https://cdn/key/t9")).await.unwrap();
        let again = bridge
            .load(&SegmentRequest::new("https://cdn/other/keys?token=t9"))
            .await
            .unwrap();
        assert_eq!(first, Bytes::from("key-t9"));
        assert_eq!(again, first);
        assert_eq!(channel.calls.load(Ordering::SeqCst), 1);

        bridge.clear().await;
        assert!(cache.is_empty().await);
        bridge.load(&SegmentRequest::new("https://cdn/key/t9")).await.unwrap();
        assert_eq!(channel.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn other_requests_pass_through() {
        let channel = Arc::new(CountingChannel::default());
        let bridge = KeyBridge::new(EchoLoader, channel.clone(), KeyCache::new());
        let data = bridge
            .load(&SegmentRequest::new("https://cdn/seg/001.ts"))
            .await
            .unwrap();
        assert_eq!(data, Bytes::from("segment:https://cdn/seg/001.ts"));
        assert_eq!(channel.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn custom_pattern_and_channel_failure() {
        let bridge = KeyBridge::new(EchoLoader, Arc::new(NoKeyChannel), KeyCache::new())
            .with_pattern(r"/drm/")
            .unwrap();
        assert!(!bridge.is_key_request("https://cdn/key/abc"));
        let err = bridge
            .load(&SegmentRequest::new("https://cdn/drm/tok"))
            .await
            .unwrap_err();
        assert!(matches!(err, PlaybackError::KeyRetrievalFailed { ref token, .. } if token == "tok"));

        let bad = KeyBridge::new(EchoLoader, Arc::new(NoKeyChannel), KeyCache::new()).with_pattern("(");
        assert!(matches!(bad, Err(PlaybackError::Config(_))));
    }

    #[tokio::test]
    async fn http_channel_decodes_base64_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/keys"))
            .and(body_json(serde_json::json!({"token": "abc"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "key": "AAECAwQFBgcICQoLDA0ODw=="
            })))
            .mount(&server)
            .await;

        let channel = HttpKeyChannel::new(format!("{}/keys", server.uri())).unwrap();
        let key = channel.resolve("abc").await.unwrap();
        assert_eq!(key.as_ref(), &(0u8..16).collect::<Vec<_>>()[..]);
    }

    #[tokio::test]
    async fn http_channel_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let channel = HttpKeyChannel::new(server.uri()).unwrap();
        let err = channel.resolve("abc").await.unwrap_err();
        assert!(matches!(err, PlaybackError::KeyRetrievalFailed { .. }));
    }
}
