//! Domain records produced by the messaging-protocol client.
//!
//! These types describe what a [`ChatClient`](crate::client::ChatClient)
//! yields: dialogs, groups, messages, users, full chat info and megagroup
//! statistics. They derive `Serialize`/`Deserialize` so an account snapshot
//! can be stored as JSON and replayed (see [`crate::snapshot`]).
//!
//! # Example
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use tgexport::models::{Group, GroupKind, Peer, SourceMessage};
//!
//! let group = Group::new(42, "Rustaceans", GroupKind::Megagroup);
//! let msg = SourceMessage::text(7, Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(), "hi")
//!     .with_from(Peer::User(5));
//!
//! assert!(group.is_megagroup());
//! assert_eq!(msg.body_text(), "hi");
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Service action name that marks the creation of a forum topic.
pub const TOPIC_CREATE_ACTION: &str = "MessageActionTopicCreate";

// ============================================================================
// Groups and dialogs
// ============================================================================

/// Kind of a group chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
    /// Legacy small group
    Basic,
    /// Supergroup (may have forum topics and statistics)
    Megagroup,
    /// Broadcast channel
    Broadcast,
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKind::Basic => write!(f, "basic"),
            GroupKind::Megagroup => write!(f, "megagroup"),
            GroupKind::Broadcast => write!(f, "broadcast"),
        }
    }
}

/// A group chat or channel. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub title: String,
    pub kind: GroupKind,
}

impl Group {
    pub fn new(id: i64, title: impl Into<String>, kind: GroupKind) -> Self {
        Self {
            id,
            title: title.into(),
            kind,
        }
    }

    pub fn is_megagroup(&self) -> bool {
        self.kind == GroupKind::Megagroup
    }

    pub fn is_broadcast(&self) -> bool {
        self.kind == GroupKind::Broadcast
    }
}

/// An entry of the account's dialog list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Dialog {
    /// Group or channel dialog
    Group(Group),
    /// Private conversation with a user or bot
    User(User),
}

impl Dialog {
    /// Returns the group if this dialog is a group or channel.
    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Dialog::Group(group) => Some(group),
            Dialog::User(_) => None,
        }
    }

    /// Human-readable title of the dialog.
    pub fn title(&self) -> String {
        match self {
            Dialog::Group(group) => group.title.clone(),
            Dialog::User(user) => user.display_name(),
        }
    }
}

// ============================================================================
// Users and peers
// ============================================================================

/// A user account as seen in participant lists and author lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub bot: bool,
    #[serde(default)]
    pub premium: bool,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub deleted: bool,
}

impl User {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    #[must_use]
    pub fn with_name(mut self, first: impl Into<String>, last: impl Into<String>) -> Self {
        self.first_name = Some(first.into());
        self.last_name = Some(last.into());
        self
    }

    #[must_use]
    pub fn bot(mut self) -> Self {
        self.bot = true;
        self
    }

    #[must_use]
    pub fn premium(mut self) -> Self {
        self.premium = true;
        self
    }

    #[must_use]
    pub fn verified(mut self) -> Self {
        self.verified = true;
        self
    }

    #[must_use]
    pub fn deleted(mut self) -> Self {
        self.deleted = true;
        self
    }

    /// First and last name joined by a space, trimmed.
    pub fn display_name(&self) -> String {
        format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default()
        )
        .trim()
        .to_string()
    }
}

/// Reference to the sender of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum Peer {
    User(i64),
    Channel(i64),
    Chat(i64),
}

impl Peer {
    pub fn id(&self) -> i64 {
        match self {
            Peer::User(id) | Peer::Channel(id) | Peer::Chat(id) => *id,
        }
    }
}

/// A resolved peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Entity {
    User(User),
    Channel { id: i64, title: String },
    Chat { id: i64, title: String },
}

impl Entity {
    pub fn id(&self) -> i64 {
        match self {
            Entity::User(user) => user.id,
            Entity::Channel { id, .. } | Entity::Chat { id, .. } => *id,
        }
    }

    /// Returns `true` if this entity can be looked up by `peer`.
    pub fn matches(&self, peer: Peer) -> bool {
        match (self, peer) {
            (Entity::User(user), Peer::User(id)) => user.id == id,
            (Entity::Channel { id, .. }, Peer::Channel(peer_id))
            | (Entity::Chat { id, .. }, Peer::Chat(peer_id)) => *id == peer_id,
            _ => false,
        }
    }
}

// ============================================================================
// Messages
// ============================================================================

/// Reply metadata attached to a message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyHeader {
    pub reply_to_msg_id: i64,
    #[serde(default)]
    pub reply_to_top_id: Option<i64>,
    #[serde(default)]
    pub forum_topic: bool,
}

impl ReplyHeader {
    /// Splits the header into `(reply_to, topic_id)`, zero meaning none.
    ///
    /// Inside a forum topic the top id names the topic and the message id is
    /// a real reply. Without a top id the reply target is the topic itself.
    pub fn split(&self) -> (i64, i64) {
        match (self.forum_topic, self.reply_to_top_id) {
            (true, Some(top)) => (self.reply_to_msg_id, top),
            (true, None) => (0, self.reply_to_msg_id),
            (false, _) => (self.reply_to_msg_id, 0),
        }
    }
}

/// A reaction kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Reaction {
    Emoji(String),
    CustomEmoji(i64),
}

/// How many times a reaction was used on a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionCount {
    pub reaction: Reaction,
    pub count: u32,
}

/// A formatting entity inside message text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEntity {
    pub kind: String,
    pub offset: u32,
    pub length: u32,
}

impl TextEntity {
    pub fn new(kind: impl Into<String>, offset: u32, length: u32) -> Self {
        Self {
            kind: kind.into(),
            offset,
            length,
        }
    }
}

impl fmt::Display for TextEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}(offset={}, length={})",
            self.kind, self.offset, self.length
        )
    }
}

/// The action carried by a service message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAction {
    /// Action type name, e.g. `MessageActionPinMessage`
    pub name: String,
    /// Title, for actions that carry one (topic creation, title edits)
    #[serde(default)]
    pub title: Option<String>,
}

impl ServiceAction {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
        }
    }

    pub fn topic_created(title: impl Into<String>) -> Self {
        Self {
            name: TOPIC_CREATE_ACTION.to_string(),
            title: Some(title.into()),
        }
    }

    /// Title of the topic this action defines, if it defines one.
    pub fn topic_title(&self) -> Option<&str> {
        if self.name == TOPIC_CREATE_ACTION {
            self.title.as_deref()
        } else {
            None
        }
    }
}

/// Payload of a message, by subtype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageBody {
    /// Ordinary message
    Regular {
        #[serde(default)]
        text: String,
        #[serde(default)]
        forwarded: bool,
        /// Media type name, e.g. `MessageMediaPhoto`
        #[serde(default)]
        media: Option<String>,
        #[serde(default)]
        entities: Vec<TextEntity>,
    },
    /// Service message (joins, pins, topic creation, ...)
    Service { action: ServiceAction },
    /// A subtype the exporters do not understand
    Unsupported { type_name: String },
}

/// A message as yielded by the protocol client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMessage {
    pub id: i64,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub from: Option<Peer>,
    #[serde(default)]
    pub reply_to: Option<ReplyHeader>,
    /// Number of replies in the thread, if the message has one
    #[serde(default)]
    pub replies: Option<u32>,
    #[serde(default)]
    pub forwards: Option<u32>,
    #[serde(default)]
    pub reactions: Vec<ReactionCount>,
    #[serde(flatten)]
    pub body: MessageBody,
}

impl SourceMessage {
    /// Creates a regular text message without an author.
    pub fn text(id: i64, date: DateTime<Utc>, text: impl Into<String>) -> Self {
        Self::with_body(
            id,
            date,
            MessageBody::Regular {
                text: text.into(),
                forwarded: false,
                media: None,
                entities: Vec::new(),
            },
        )
    }

    /// Creates a service message.
    pub fn service(id: i64, date: DateTime<Utc>, action: ServiceAction) -> Self {
        Self::with_body(id, date, MessageBody::Service { action })
    }

    /// Creates a message of an unsupported subtype.
    pub fn unsupported(id: i64, date: DateTime<Utc>, type_name: impl Into<String>) -> Self {
        Self::with_body(
            id,
            date,
            MessageBody::Unsupported {
                type_name: type_name.into(),
            },
        )
    }

    fn with_body(id: i64, date: DateTime<Utc>, body: MessageBody) -> Self {
        Self {
            id,
            date,
            from: None,
            reply_to: None,
            replies: None,
            forwards: None,
            reactions: Vec::new(),
            body,
        }
    }

    #[must_use]
    pub fn with_from(mut self, peer: Peer) -> Self {
        self.from = Some(peer);
        self
    }

    #[must_use]
    pub fn with_reply_to(mut self, reply_to: ReplyHeader) -> Self {
        self.reply_to = Some(reply_to);
        self
    }

    #[must_use]
    pub fn with_reaction(mut self, reaction: Reaction, count: u32) -> Self {
        self.reactions.push(ReactionCount { reaction, count });
        self
    }

    #[must_use]
    pub fn with_counters(mut self, replies: u32, forwards: u32) -> Self {
        self.replies = Some(replies);
        self.forwards = Some(forwards);
        self
    }

    /// Marks a regular message as forwarded. No effect on other subtypes.
    #[must_use]
    pub fn forwarded(mut self) -> Self {
        if let MessageBody::Regular { forwarded, .. } = &mut self.body {
            *forwarded = true;
        }
        self
    }

    /// Sets the media type of a regular message.
    #[must_use]
    pub fn with_media(mut self, media_type: impl Into<String>) -> Self {
        if let MessageBody::Regular { media, .. } = &mut self.body {
            *media = Some(media_type.into());
        }
        self
    }

    #[must_use]
    pub fn with_entity(mut self, entity: TextEntity) -> Self {
        if let MessageBody::Regular { entities, .. } = &mut self.body {
            entities.push(entity);
        }
        self
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self.body, MessageBody::Unsupported { .. })
    }

    pub fn is_service(&self) -> bool {
        matches!(self.body, MessageBody::Service { .. })
    }

    /// Text content; empty for service and unsupported messages.
    pub fn body_text(&self) -> &str {
        match &self.body {
            MessageBody::Regular { text, .. } => text,
            _ => "",
        }
    }

    pub fn is_forwarded(&self) -> bool {
        matches!(
            self.body,
            MessageBody::Regular {
                forwarded: true,
                ..
            }
        )
    }

    pub fn action(&self) -> Option<&ServiceAction> {
        match &self.body {
            MessageBody::Service { action } => Some(action),
            _ => None,
        }
    }

    /// Name of the subtype, for logging.
    pub fn type_name(&self) -> &str {
        match &self.body {
            MessageBody::Regular { .. } => "Message",
            MessageBody::Service { .. } => "MessageService",
            MessageBody::Unsupported { type_name } => type_name,
        }
    }
}

// ============================================================================
// Full chat info
// ============================================================================

/// A chat linked to a group (e.g. a discussion group or migrated chat).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRef {
    pub id: i64,
    pub title: String,
}

/// Static metadata of a group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullChat {
    #[serde(default)]
    pub about: String,
    /// Related chats in server order; `None` marks an empty slot
    #[serde(default)]
    pub chats: Vec<Option<ChatRef>>,
}

// ============================================================================
// Statistics
// ============================================================================

/// Period covered by a statistics overview.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatsPeriod {
    pub min_date: DateTime<Utc>,
    pub max_date: DateTime<Utc>,
}

/// A counter with its value for the previous period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AbsValueAndPrev {
    pub current: f64,
    pub previous: f64,
}

/// Moderation counters for one admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopAdmin {
    pub user_id: i64,
    pub deleted: u32,
    pub kicked: u32,
    pub banned: u32,
}

/// A statistics graph in one of its delivery states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatsGraph {
    /// Graph data is available; `data` is the JSON payload
    Ready { data: String },
    /// Data must be fetched with the token
    Async { token: String },
    /// The server could not produce the graph
    Error { error: String },
}

/// Megagroup statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MegagroupStats {
    pub period: StatsPeriod,
    pub members: AbsValueAndPrev,
    pub messages: AbsValueAndPrev,
    pub viewers: AbsValueAndPrev,
    pub posters: AbsValueAndPrev,
    pub growth_graph: StatsGraph,
    pub members_graph: StatsGraph,
    pub new_members_by_source_graph: StatsGraph,
    pub languages_graph: StatsGraph,
    pub messages_graph: StatsGraph,
    pub actions_graph: StatsGraph,
    #[serde(default)]
    pub top_admins: Vec<TopAdmin>,
}

impl MegagroupStats {
    /// Looks a graph up by its field name.
    pub fn graph(&self, name: &str) -> Option<&StatsGraph> {
        match name {
            "growth_graph" => Some(&self.growth_graph),
            "members_graph" => Some(&self.members_graph),
            "new_members_by_source_graph" => Some(&self.new_members_by_source_graph),
            "languages_graph" => Some(&self.languages_graph),
            "messages_graph" => Some(&self.messages_graph),
            "actions_graph" => Some(&self.actions_graph),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_reply_header_split() {
        let plain = ReplyHeader {
            reply_to_msg_id: 10,
            reply_to_top_id: None,
            forum_topic: false,
        };
        assert_eq!(plain.split(), (10, 0));

        let topic_root = ReplyHeader {
            reply_to_msg_id: 3,
            reply_to_top_id: None,
            forum_topic: true,
        };
        assert_eq!(topic_root.split(), (0, 3));

        let in_topic = ReplyHeader {
            reply_to_msg_id: 12,
            reply_to_top_id: Some(3),
            forum_topic: true,
        };
        assert_eq!(in_topic.split(), (12, 3));
    }

    #[test]
    fn test_display_name_trims() {
        assert_eq!(User::new(1).with_name("Ann", "").display_name(), "Ann");
        assert_eq!(User::new(1).with_name("", "Lee").display_name(), "Lee");
        assert_eq!(User::new(1).display_name(), "");
    }

    #[test]
    fn test_topic_title_only_for_topic_creation() {
        assert_eq!(
            ServiceAction::topic_created("General").topic_title(),
            Some("General")
        );
        let rename = ServiceAction {
            name: "MessageActionChatEditTitle".into(),
            title: Some("New".into()),
        };
        assert_eq!(rename.topic_title(), None);
    }

    #[test]
    fn test_message_serde_flattened_body() {
        let msg = SourceMessage::text(1, ts(), "hello")
            .with_from(Peer::User(9))
            .forwarded();
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""kind":"regular""#));
        assert!(json.contains(r#""from":{"type":"user","id":9}"#));

        let parsed: SourceMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, msg);
        assert!(parsed.is_forwarded());
    }

    #[test]
    fn test_text_constructor_and_body_text() {
        let msg = SourceMessage::text(3, ts(), "hello there");
        assert_eq!(msg.body_text(), "hello there");
        assert_eq!(SourceMessage::unsupported(4, ts(), "MessageEmpty").body_text(), "");
    }

    #[test]
    fn test_service_message_accessors() {
        let msg = SourceMessage::service(2, ts(), ServiceAction::new("MessageActionPinMessage"));
        assert!(msg.is_service());
        assert_eq!(msg.body_text(), "");
        assert!(!msg.is_forwarded());
        assert_eq!(msg.type_name(), "MessageService");
    }

    #[test]
    fn test_entity_matches_peer_kind() {
        let channel = Entity::Channel {
            id: 5,
            title: "News".into(),
        };
        assert!(channel.matches(Peer::Channel(5)));
        assert!(!channel.matches(Peer::User(5)));
    }

    #[test]
    fn test_text_entity_display() {
        assert_eq!(
            TextEntity::new("MessageEntityBold", 0, 5).to_string(),
            "MessageEntityBold(offset=0, length=5)"
        );
    }

    #[test]
    fn test_dialog_as_group() {
        let group = Dialog::Group(Group::new(1, "G", GroupKind::Basic));
        let user = Dialog::User(User::new(2).with_name("Bo", "B"));
        assert!(group.as_group().is_some());
        assert!(user.as_group().is_none());
        assert_eq!(user.title(), "Bo B");
    }
}
