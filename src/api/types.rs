//! Content API payload types.
//!
//! The platform's JSON is loosely shaped; these structs accept the
//! variants seen in practice and ignore everything else.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Reference to a video attachment: either a bare id or an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttachmentRef {
    Id(String),
    Object {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        guid: Option<String>,
        #[serde(default, rename = "attachmentId")]
        attachment_id: Option<String>,
    },
}

impl AttachmentRef {
    pub fn id(&self) -> Option<&str> {
        match self {
            AttachmentRef::Id(id) => Some(id.as_str()),
            AttachmentRef::Object {
                id,
                guid,
                attachment_id,
            } => id
                .as_deref()
                .or(guid.as_deref())
                .or(attachment_id.as_deref()),
        }
        .filter(|id| !id.is_empty())
    }
}

/// A single post/video unit from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub attachment_id: Option<String>,
    #[serde(default, alias = "attachments")]
    pub video_attachments: Vec<AttachmentRef>,
    #[serde(default)]
    pub is_live: bool,
    #[serde(default)]
    pub release_date: Option<DateTime<Utc>>,
}

impl ContentItem {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            attachment_id: None,
            video_attachments: Vec::new(),
            is_live: false,
            release_date: None,
        }
    }

    #[must_use]
    pub fn with_attachment(mut self, attachment_id: impl Into<String>) -> Self {
        self.attachment_id = Some(attachment_id.into());
        self
    }

    #[must_use]
    pub fn live(mut self) -> Self {
        self.is_live = true;
        self
    }

    /// Explicit attachment id, else the first video attachment.
    pub fn resolved_attachment_id(&self) -> Option<&str> {
        self.attachment_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .or_else(|| self.video_attachments.first().and_then(AttachmentRef::id))
    }

    pub fn has_video(&self) -> bool {
        self.resolved_attachment_id().is_some()
    }
}

/// Raw delivery-info reply: status plus the untyped body handed to the
/// source extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryResponse {
    pub status: u16,
    pub body: Value,
}

/// Subscribed creator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Creator {
    pub id: String,
    pub title: String,
}

impl Creator {
    /// Extract a creator from a subscription entry. The `creator` field is
    /// either an id string or an object with `id`/`slug`/`guid`.
    pub fn from_subscription(entry: &Value) -> Option<Self> {
        let field = entry.get("creator")?;
        let id = match field {
            Value::String(id) => Some(id.clone()),
            Value::Object(obj) => ["id", "slug", "handle", "guid"]
                .iter()
                .find_map(|k| obj.get(*k).and_then(Value::as_str))
                .map(ToString::to_string),
            _ => None,
        }
        .filter(|id| !id.is_empty())?;

        let title = field
            .get("title")
            .or_else(|| entry.get("title"))
            .or_else(|| entry.get("planTitle"))
            .and_then(Value::as_str)
            .unwrap_or(&id)
            .to_string();

        Some(Self { id, title })
    }
}

/// Opaque pagination cursor (the platform returns numbers or strings).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cursor {
    Offset(u64),
    Token(String),
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cursor::Offset(n) => write!(f, "{n}"),
            Cursor::Token(t) => write!(f, "{t}"),
        }
    }
}

/// One page of creator content.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatorPage {
    pub items: Vec<ContentItem>,
    pub next_cursor: Option<Cursor>,
    pub has_more: bool,
}

/// Search and filter options for a creator's content list. Unset fields
/// are left out of the query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentFilter {
    pub search: Option<String>,
    /// `ASC` or `DESC` by release date.
    pub sort: Option<String>,
    pub tags: Vec<String>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub channel: Option<String>,
}

impl ContentFilter {
    /// Query pairs under the platform's parameter names. Tags become
    /// indexed `tags[i]` keys.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        let scalars = [
            ("fromDate", &self.from_date),
            ("toDate", &self.to_date),
            ("channel", &self.channel),
            ("sort", &self.sort),
            ("search", &self.search),
        ];
        for (key, value) in scalars {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                pairs.push((key.to_string(), value.to_string()));
            }
        }
        for (i, tag) in self.tags.iter().enumerate() {
            pairs.push((format!("tags[{i}]"), tag.clone()));
        }
        pairs
    }
}

/// Creator profile as returned by the creator info endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub live_stream: Option<LiveStream>,
}

impl CreatorInfo {
    /// The live stream, when one is currently on air.
    pub fn on_air(&self) -> Option<&LiveStream> {
        self.live_stream.as_ref().filter(|live| live.is_on_air())
    }
}

/// A creator's live stream slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStream {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub video_attachments: Vec<AttachmentRef>,
}

impl LiveStream {
    /// Any state other than `off` counts as on air.
    pub fn is_on_air(&self) -> bool {
        self.state
            .as_deref()
            .is_some_and(|state| !state.is_empty() && state != "off")
    }

    /// Playable live item, or `None` without a video attachment.
    pub fn to_content_item(&self) -> Option<ContentItem> {
        let attachment = self.video_attachments.iter().find_map(AttachmentRef::id)?;
        let id = self.id.as_deref().filter(|id| !id.is_empty()).unwrap_or("live");
        let mut item = ContentItem::new(id).with_attachment(attachment).live();
        item.title = if self.title.is_empty() {
            "Live Stream".to_string()
        } else {
            self.title.clone()
        };
        Some(item)
    }
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<AttachmentRef>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<AttachmentRef>),
        One(AttachmentRef),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::Many(list)) => list,
        Some(OneOrMany::One(single)) => vec![single],
        None => Vec::new(),
    })
}

/// Authenticated user.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl User {
    pub fn name(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.username.as_deref())
            .or(self.email.as_deref())
            .or(self.id.as_deref())
            .unwrap_or("unknown")
    }
}

/// Result of a login attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    Authenticated(User),
    /// The account has two-factor enabled; call `verify_two_factor`.
    TwoFactorRequired { message: String },
}
