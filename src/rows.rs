//! Flat rows for the four database tables.
//!
//! | Table | Row |
//! |-------|-----|
//! | `groups` | [`GroupRow`] |
//! | `messages` | [`MessageRow`] |
//! | `participants` | [`ParticipantRow`] |
//! | `topics` | [`TopicRow`] |
//!
//! Rows serialize to the column names of their table, so a sink can send
//! them as `JSONEachRow` without further mapping. Zero stands for "none" in
//! id columns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Group, Peer, SourceMessage, User};

/// Table names.
pub const GROUPS_TABLE: &str = "groups";
pub const MESSAGES_TABLE: &str = "messages";
pub const PARTICIPANTS_TABLE: &str = "participants";
pub const TOPICS_TABLE: &str = "topics";

/// Column lists, in insert order.
pub const GROUP_COLUMNS: &[&str] = &["group_id", "name"];
pub const MESSAGE_COLUMNS: &[&str] = &[
    "group_id",
    "message_id",
    "dt",
    "user_id",
    "message_text",
    "is_forwarded",
    "reply_to",
    "topic_id",
];
pub const PARTICIPANT_COLUMNS: &[&str] = &[
    "group_id",
    "user_id",
    "username",
    "first_name",
    "last_name",
    "is_bot",
    "is_premium",
    "is_verified",
];
pub const TOPIC_COLUMNS: &[&str] = &["group_id", "topic_id", "title"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRow {
    pub group_id: i64,
    pub name: String,
}

impl From<&Group> for GroupRow {
    fn from(group: &Group) -> Self {
        Self {
            group_id: group.id,
            name: group.title.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRow {
    pub group_id: i64,
    pub message_id: i64,
    #[serde(with = "db_datetime")]
    pub dt: DateTime<Utc>,
    pub user_id: i64,
    pub message_text: String,
    pub is_forwarded: bool,
    pub reply_to: i64,
    pub topic_id: i64,
}

impl MessageRow {
    /// Shapes a message into a row. Returns `None` for unsupported subtypes.
    pub fn from_message(group_id: i64, message: &SourceMessage) -> Option<Self> {
        if !message.is_supported() {
            return None;
        }

        let (reply_to, topic_id) = message
            .reply_to
            .map(|header| header.split())
            .unwrap_or((0, 0));

        let user_id = match message.from {
            Some(Peer::User(id)) => id,
            _ => 0,
        };

        Some(Self {
            group_id,
            message_id: message.id,
            dt: message.date,
            user_id,
            message_text: message.body_text().to_string(),
            is_forwarded: message.is_forwarded(),
            reply_to,
            topic_id,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantRow {
    pub group_id: i64,
    pub user_id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_bot: bool,
    pub is_premium: bool,
    pub is_verified: bool,
}

impl ParticipantRow {
    pub fn from_user(group_id: i64, user: &User) -> Self {
        Self {
            group_id,
            user_id: user.id,
            username: user.username.clone().unwrap_or_default(),
            first_name: user.first_name.clone().unwrap_or_default(),
            last_name: user.last_name.clone().unwrap_or_default(),
            is_bot: user.bot,
            is_premium: user.premium,
            is_verified: user.verified,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicRow {
    pub group_id: i64,
    pub topic_id: i64,
    pub title: String,
}

/// `DateTime` columns travel as `YYYY-MM-DD hh:mm:ss` in UTC.
mod db_datetime {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&dt.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}
