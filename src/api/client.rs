//! HTTP content API client
//!
//! Features:
//! - `sails.sid` session cookie and `X-CSRF-Token` header on every request
//! - `Set-Cookie` tracking for session and CSRF rotation
//! - Exponential backoff with jitter on transport errors and 5xx
//! - Login with two-factor verification
//! - Creator content pagination with opaque cursors

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::header::{ACCEPT, COOKIE, SET_COOKIE};
use reqwest::{Client, Method};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use super::session::Session;
use super::types::{
    ContentFilter, ContentItem, Creator, CreatorInfo, CreatorPage, Cursor, DeliveryResponse,
    LoginOutcome, User,
};
use super::ContentApi;
use crate::config::{ApiConfig, RetryConfig};
use crate::error::{PlaybackError, Result};
use crate::stream::Scenario;

/// Largest page the content endpoint serves.
const MAX_PAGE_SIZE: u32 = 20;

/// reqwest-backed [`ContentApi`] with session handling.
pub struct HttpContentApi {
    client: Client,
    base_url: String,
    retry: RetryConfig,
    session: Arc<RwLock<Session>>,
}

impl HttpContentApi {
    /// Create a client without a session.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        Self::with_session(config, Session::default())
    }

    /// Create a client resuming a stored session.
    pub fn with_session(config: &ApiConfig, session: Session) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .pool_max_idle_per_host(8)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: config.retry.clone(),
            session: Arc::new(RwLock::new(session)),
        })
    }

    /// Snapshot of the current session (for persisting).
    pub async fn session(&self) -> Session {
        self.session.read().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.session.read().await.is_authenticated()
    }

    /// Drop the session locally.
    pub async fn logout(&self) {
        *self.session.write().await = Session::default();
    }

    /// Sign in. Accounts with two-factor enabled return
    /// [`LoginOutcome::TwoFactorRequired`].
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome> {
        if username.is_empty() || password.is_empty() {
            return Err(PlaybackError::Api {
                status: 400,
                message: "Missing credentials".to_string(),
            });
        }

        let payload = json!({ "username": username, "password": password });
        let data = self
            .request(Method::POST, "/v2/auth/login", &[], Some(&payload))
            .await?;

        if data
            .get("needs2FA")
            .or_else(|| data.get("requiresTwoFactor"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            let mut session = self.session.write().await;
            session.pending_two_factor = true;
            if let Some(token) = data.get("token").and_then(Value::as_str) {
                session.token = Some(token.to_string());
            }
            info!("Two-factor authentication required");
            return Ok(LoginOutcome::TwoFactorRequired {
                message: data
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("Two-factor authentication required.")
                    .to_string(),
            });
        }

        let user = self.complete_login(&data, username).await;
        info!(user = user.name(), "Logged in");
        Ok(LoginOutcome::Authenticated(user))
    }

    /// Finish a login that required a second factor.
    #[instrument(skip(self, code))]
    pub async fn verify_two_factor(&self, code: &str) -> Result<User> {
        let token = {
            let session = self.session.read().await;
            if !session.pending_two_factor || code.is_empty() {
                return Err(PlaybackError::Api {
                    status: 400,
                    message: "No two-factor session".to_string(),
                });
            }
            session.token.clone()
        };

        let payload = json!({ "token": token, "code": code });
        let data = self
            .request(Method::POST, "/v2/auth/factor", &[], Some(&payload))
            .await?;
        let fallback = self
            .session
            .read()
            .await
            .user
            .as_ref()
            .map(|u| u.name().to_string())
            .unwrap_or_default();
        Ok(self.complete_login(&data, &fallback).await)
    }

    /// Refresh the signed-in user; `None` when there is no session.
    pub async fn auth_status(&self) -> Result<Option<User>> {
        if self.session.read().await.token.is_none() {
            return Ok(None);
        }
        let data = self.request(Method::GET, "/v2/auth/status", &[], None).await?;
        let user = data
            .get("user")
            .and_then(|u| serde_json::from_value::<User>(u.clone()).ok());
        if let Some(ref user) = user {
            self.session.write().await.user = Some(user.clone());
        }
        Ok(user)
    }

    async fn complete_login(&self, data: &Value, username: &str) -> User {
        let user = data
            .get("user")
            .and_then(|u| serde_json::from_value::<User>(u.clone()).ok())
            .unwrap_or_else(|| User {
                username: Some(username.to_string()),
                ..User::default()
            });

        let mut session = self.session.write().await;
        if let Some(token) = data.get("sessionToken").and_then(Value::as_str) {
            session.token = Some(token.to_string());
        }
        session.user = Some(user.clone());
        session.pending_two_factor = false;
        user
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    /// Send a request with retries; returns the parsed JSON body.
    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        self.request_with_status(method, path, query, body)
            .await
            .map(|(_, value)| value)
    }

    async fn request_with_status(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<(u16, Value)> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.send_once(method.clone(), path, query, body).await {
                Ok(reply) => return Ok(reply),
                Err(err) if attempt < max_attempts && is_retryable(&err) => {
                    let delay = self.jittered_delay(attempt);
                    warn!(
                        attempt,
                        error = %err,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Retrying request"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn jittered_delay(&self, attempt: u32) -> Duration {
        let base = self.retry.base_delay(attempt);
        let jitter = if self.retry.fuzz_factor > 0.0 {
            1.0 + rand::thread_rng().gen_range(0.0..self.retry.fuzz_factor)
        } else {
            1.0
        };
        base.mul_f64(jitter)
    }

    #[instrument(skip(self, query, body), fields(url = %self.url(path)))]
    async fn send_once(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<(u16, Value)> {
        let mut req = self
            .client
            .request(method, self.url(path))
            .header(ACCEPT, "application/json");
        if !query.is_empty() {
            req = req.query(query);
        }
        {
            let session = self.session.read().await;
            if let Some(cookie) = session.cookie_header() {
                req = req.header(COOKIE, cookie);
            }
            if let Some(ref csrf) = session.csrf_token {
                req = req.header("X-CSRF-Token", csrf.as_str());
            }
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let response = req.send().await?;
        let status = response.status().as_u16();

        {
            let mut session = self.session.write().await;
            for header in response.headers().get_all(SET_COOKIE) {
                if let Ok(value) = header.to_str() {
                    session.apply_set_cookie(value);
                }
            }
        }

        let text = response.text().await?;
        let value = parse_body(&text);
        debug!(status, "Response received");

        if status == 401 {
            warn!("Received 401 response, clearing session");
            *self.session.write().await = Session::default();
            return Err(PlaybackError::AuthFailed);
        }
        if status >= 400 {
            return Err(PlaybackError::Api {
                status,
                message: error_message(status, &value),
            });
        }

        Ok((status, value))
    }
}

#[async_trait]
impl ContentApi for HttpContentApi {
    async fn content_item(&self, content_id: &str) -> Result<ContentItem> {
        let mut data = self
            .request(
                Method::GET,
                "/v3/content/video",
                &[("id", content_id.to_string())],
                None,
            )
            .await?;

        if let Value::Object(ref mut obj) = data {
            obj.entry("id")
                .or_insert_with(|| Value::String(content_id.to_string()));
        }
        Ok(serde_json::from_value(data)?)
    }

    async fn delivery_info(&self, entity_id: &str, scenario: Scenario) -> Result<DeliveryResponse> {
        let (status, body) = self
            .request_with_status(
                Method::GET,
                "/v3/delivery/info",
                &[
                    ("entityId", entity_id.to_string()),
                    ("scenario", scenario.as_str().to_string()),
                ],
                None,
            )
            .await?;
        Ok(DeliveryResponse { status, body })
    }

    async fn creator_content(
        &self,
        creator_id: &str,
        filter: &ContentFilter,
        limit: u32,
        fetch_after: Option<&Cursor>,
    ) -> Result<CreatorPage> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let filter_pairs = filter.query_pairs();
        let mut query = vec![
            ("id", creator_id.to_string()),
            ("limit", limit.to_string()),
            ("hasVideo", "true".to_string()),
        ];
        query.extend(filter_pairs.iter().map(|(k, v)| (k.as_str(), v.clone())));
        if let Some(cursor) = fetch_after.filter(|c| cursor_is_truthy(c)) {
            query.push(("fetchAfter", cursor.to_string()));
        }
        let data = self
            .request(Method::GET, "/v3/content/creator", &query, None)
            .await?;
        Ok(parse_creator_page(&data, limit, fetch_after))
    }

    async fn creator_info(&self, creator_id: &str) -> Result<CreatorInfo> {
        let data = self
            .request(
                Method::GET,
                "/v3/creator/info",
                &[("id", creator_id.to_string())],
                None,
            )
            .await?;

        // Older deployments answer with a one-element list.
        let mut data = match data {
            Value::Array(list) => list.into_iter().next().ok_or_else(|| PlaybackError::Api {
                status: 404,
                message: format!("creator {creator_id} not found"),
            })?,
            other => other,
        };
        if let Value::Object(ref mut obj) = data {
            let id = obj.entry("id").or_insert(Value::Null);
            if !id.is_string() {
                *id = Value::String(creator_id.to_string());
            }
        }
        Ok(serde_json::from_value(data)?)
    }

    async fn subscriptions(&self) -> Result<Vec<Creator>> {
        let data = self
            .request(
                Method::GET,
                "/v3/user/subscriptions",
                &[
                    ("includeLivestream", "true".to_string()),
                    ("includeDvrStatus", "true".to_string()),
                ],
                None,
            )
            .await?;

        let entries = data
            .get("subscriptions")
            .or_else(|| data.get("items"))
            .unwrap_or(&data);
        let creators: Vec<Creator> = entries
            .as_array()
            .map(|list| list.iter().filter_map(Creator::from_subscription).collect())
            .unwrap_or_default();

        let mut seen = std::collections::HashSet::new();
        Ok(creators
            .into_iter()
            .filter(|c| seen.insert(c.id.clone()))
            .collect())
    }
}

fn is_retryable(err: &PlaybackError) -> bool {
    match err {
        PlaybackError::Network(_) => true,
        PlaybackError::Api { status, .. } => *status >= 500,
        _ => false,
    }
}

fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str(text).unwrap_or_else(|_| json!({ "message": text }))
}

fn error_message(status: u16, body: &Value) -> String {
    body.get("message")
        .and_then(Value::as_str)
        .or_else(|| {
            body.get("errors")
                .and_then(|e| e.get(0))
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
        })
        .map_or_else(|| format!("HTTP {status}"), ToString::to_string)
}

fn parse_cursor(value: &Value) -> Option<Cursor> {
    match value {
        Value::Number(n) => n.as_u64().map(Cursor::Offset),
        Value::String(s) if !s.is_empty() => Some(
            s.parse::<u64>()
                .map_or_else(|_| Cursor::Token(s.clone()), Cursor::Offset),
        ),
        _ => None,
    }
}

fn cursor_is_truthy(cursor: &Cursor) -> bool {
    match cursor {
        Cursor::Offset(n) => *n > 0,
        Cursor::Token(t) => !t.is_empty(),
    }
}

/// Normalize a creator content reply into a page.
///
/// Items come from `items`, `posts`, `videos` or a bare array. The cursor
/// comes from `nextCursor`, `next` or the pagination block; without one
/// the next cursor is the running item offset.
fn parse_creator_page(body: &Value, limit: u32, fetch_after: Option<&Cursor>) -> CreatorPage {
    let list = if body.is_array() {
        Some(body)
    } else {
        ["items", "posts", "videos"]
            .iter()
            .find_map(|k| body.get(*k).filter(|v| v.is_array()))
    };

    let items: Vec<ContentItem> = list
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| serde_json::from_value::<ContentItem>(v.clone()).ok())
                .filter(|item| !item.id.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let pagination = ["pageInfo", "page", "paging"]
        .iter()
        .find_map(|k| body.get(*k).filter(|v| v.is_object()));

    let raw_cursor = body
        .get("nextCursor")
        .or_else(|| body.get("next"))
        .or_else(|| {
            pagination.and_then(|p| p.get("next").or_else(|| p.get("cursor")).or_else(|| p.get("after")))
        });
    let explicit_cursor = raw_cursor.and_then(parse_cursor);

    let explicit_more = body
        .get("hasMore")
        .or_else(|| {
            pagination.and_then(|p| p.get("hasMore").or_else(|| p.get("more")).or_else(|| p.get("hasNext")))
        })
        .and_then(Value::as_bool);

    let has_more = match (explicit_more, &explicit_cursor) {
        (Some(flag), _) => flag,
        (None, Some(cursor)) => cursor_is_truthy(cursor),
        (None, None) => items.len() >= limit as usize,
    };

    let next_cursor = explicit_cursor.or_else(|| {
        let base = match fetch_after {
            Some(Cursor::Offset(n)) => *n,
            _ => 0,
        };
        Some(Cursor::Offset(base + items.len() as u64))
    });

    CreatorPage {
        items,
        next_cursor,
        has_more,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> ApiConfig {
        ApiConfig {
            base_url: server.uri(),
            retry: RetryConfig {
                max_attempts: 3,
                base_delay_ms: 1,
                backoff_factor: 1.0,
                fuzz_factor: 0.0,
            },
            ..ApiConfig::default()
        }
    }

    #[test]
    fn page_with_explicit_cursor() {
        let body = json!({
            "items": [{"id": "a"}, {"id": "b"}],
            "nextCursor": "cursor-2",
            "hasMore": true
        });
        let page = parse_creator_page(&body, 20, None);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.next_cursor, Some(Cursor::Token("cursor-2".into())));
        assert!(page.has_more);
    }

    #[test]
    fn page_without_cursor_uses_running_offset() {
        let body = json!([{"id": "a"}, {"id": "b"}]);
        let page = parse_creator_page(&body, 2, Some(&Cursor::Offset(4)));
        assert_eq!(page.next_cursor, Some(Cursor::Offset(6)));
        assert!(page.has_more);

        let short = parse_creator_page(&json!({"posts": [{"id": "a"}]}), 20, None);
        assert!(!short.has_more);
    }

    #[test]
    fn page_cursor_from_pagination_block() {
        let body = json!({
            "videos": [{"id": "a"}],
            "pageInfo": {"cursor": "15", "hasNext": false}
        });
        let page = parse_creator_page(&body, 20, None);
        assert_eq!(page.next_cursor, Some(Cursor::Offset(15)));
        assert!(!page.has_more);
    }

    #[test]
    fn error_message_prefers_body() {
        assert_eq!(error_message(400, &json!({"message": "Bad"})), "Bad");
        assert_eq!(
            error_message(400, &json!({"errors": [{"message": "Nope"}]})),
            "Nope"
        );
        assert_eq!(error_message(418, &json!({})), "HTTP 418");
    }

    #[tokio::test]
    async fn delivery_info_sends_session_and_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/delivery/info"))
            .and(query_param("entityId", "att-1"))
            .and(query_param("scenario", "onDemand"))
            .and(header("cookie", "sails.sid=tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"url": "a.mp4"})))
            .expect(1)
            .mount(&server)
            .await;

        let session = Session {
            token: Some("tok".into()),
            ..Session::default()
        };
        let api = HttpContentApi::with_session(&config_for(&server), session).unwrap();
        let reply = api.delivery_info("att-1", Scenario::OnDemand).await.unwrap();
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body["url"], "a.mp4");
    }

    #[tokio::test]
    async fn server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/content/video"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v3/content/video"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"attachments": ["att-9"]})),
            )
            .mount(&server)
            .await;

        let api = HttpContentApi::new(&config_for(&server)).unwrap();
        let item = api.content_item("post-1").await.unwrap();
        assert_eq!(item.id, "post-1");
        assert_eq!(item.resolved_attachment_id(), Some("att-9"));
    }

    #[tokio::test]
    async fn unauthorized_clears_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/user/subscriptions"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let session = Session {
            token: Some("stale".into()),
            user: Some(User::default()),
            ..Session::default()
        };
        let api = HttpContentApi::with_session(&config_for(&server), session).unwrap();
        let err = api.subscriptions().await.unwrap_err();
        assert_eq!(err, PlaybackError::AuthFailed);
        assert!(api.session().await.token.is_none());
    }

    #[tokio::test]
    async fn login_with_two_factor() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/auth/login"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"needs2FA": true}))
                    .insert_header("set-cookie", "sails.sid=provisional; Path=/"),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/auth/factor"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "user": {"id": "u1", "username": "viewer"}
            })))
            .mount(&server)
            .await;

        let api = HttpContentApi::new(&config_for(&server)).unwrap();
        let outcome = api.login("viewer", "secret").await.unwrap();
        assert!(matches!(outcome, LoginOutcome::TwoFactorRequired { .. }));
        assert!(!api.is_authenticated().await);

        let user = api.verify_two_factor("123456").await.unwrap();
        assert_eq!(user.name(), "viewer");
        assert!(api.is_authenticated().await);
        assert_eq!(api.session().await.token.as_deref(), Some("provisional"));
    }

    #[tokio::test]
    async fn bad_request_message_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/auth/login"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"message": "Invalid password"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let api = HttpContentApi::new(&config_for(&server)).unwrap();
        let err = api.login("viewer", "wrong").await.unwrap_err();
        assert_eq!(
            err,
            PlaybackError::Api {
                status: 400,
                message: "Invalid password".into()
            }
        );
    }

    #[tokio::test]
    async fn creator_content_sends_filters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/content/creator"))
            .and(query_param("id", "c1"))
            .and(query_param("limit", "20"))
            .and(query_param("search", "teardown"))
            .and(query_param("sort", "ASC"))
            .and(query_param("tags[0]", "gpu"))
            .and(query_param("tags[1]", "review"))
            .and(query_param("fromDate", "2024-01-01T00:00:00Z"))
            .and(query_param("toDate", "2024-02-01T23:59:59Z"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "post-1"}])))
            .expect(1)
            .mount(&server)
            .await;

        let filter = ContentFilter {
            search: Some("teardown".into()),
            sort: Some("ASC".into()),
            tags: vec!["gpu".into(), "review".into()],
            from_date: Some("2024-01-01T00:00:00Z".into()),
            to_date: Some("2024-02-01T23:59:59Z".into()),
            channel: None,
        };
        let api = HttpContentApi::new(&config_for(&server)).unwrap();
        let page = api.creator_content("c1", &filter, 50, None).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, "post-1");
    }

    #[tokio::test]
    async fn creator_content_skips_empty_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/content/creator"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let api = HttpContentApi::new(&config_for(&server)).unwrap();
        api.creator_content("c1", &ContentFilter::default(), 0, Some(&Cursor::Offset(0)))
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let query = requests[0].url.query().unwrap_or_default().to_string();
        assert!(query.contains("limit=1"));
        assert!(!query.contains("fetchAfter"));
        assert!(!query.contains("search"));
    }

    #[tokio::test]
    async fn creator_info_reports_live_stream() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/creator/info"))
            .and(query_param("id", "c1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "title": "Tech Talk",
                "liveStream": {
                    "id": "ls-1",
                    "title": "Late Show",
                    "state": "live",
                    "videoAttachments": ["live-att"]
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = HttpContentApi::new(&config_for(&server)).unwrap();
        let info = api.creator_info("c1").await.unwrap();
        assert_eq!(info.id, "c1");
        assert_eq!(info.title, "Tech Talk");
        let live = info.on_air().unwrap();
        assert_eq!(
            live.to_content_item().unwrap().resolved_attachment_id(),
            Some("live-att")
        );
    }

    #[tokio::test]
    async fn creator_info_accepts_list_reply() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/creator/info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "c2", "title": "Quiet", "liveStream": {"state": "off"}}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v3/creator/info"))
            .and(query_param("id", "ghost"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .with_priority(1)
            .mount(&server)
            .await;

        let api = HttpContentApi::new(&config_for(&server)).unwrap();
        let info = api.creator_info("c2").await.unwrap();
        assert_eq!(info.id, "c2");
        assert!(info.on_air().is_none());

        let err = api.creator_info("ghost").await.unwrap_err();
        assert!(matches!(err, PlaybackError::Api { status: 404, .. }));
    }

    #[tokio::test]
    async fn subscriptions_are_deduplicated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/user/subscriptions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"creator": "c1", "planTitle": "One"},
                {"creator": "c1", "planTitle": "One again"},
                {"creator": {"id": "c2", "title": "Two"}}
            ])))
            .mount(&server)
            .await;

        let api = HttpContentApi::new(&config_for(&server)).unwrap();
        let creators = api.subscriptions().await.unwrap();
        assert_eq!(creators.len(), 2);
        assert_eq!(creators[1].title, "Two");
    }
}
