//! `messages.csv`: full history, newest first, down to the lower bound.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tracing::{error, info, warn};

use crate::client::{ChatClient, MessageQuery};
use crate::error::Result;
use crate::models::{Entity, Group, MessageBody, Peer, Reaction, SourceMessage};

use super::{bool_field, csv_timestamp, csv_writer};

pub const MESSAGES_FILE: &str = "messages.csv";

const HEADER: [&str; 13] = [
    "message_id",
    "dt",
    "user_id",
    "username_or_channel_title",
    "message_text",
    "is_forwarded",
    "reply_to_message",
    "media",
    "entities",
    "reactions",
    "replies",
    "forwards",
    "service_action",
];

/// Display identity of a message author: `(user_id, username_or_title)`.
type Author = (String, String);

/// Resolves author peers, caching each peer for the rest of the scan.
struct AuthorCache<'a, C: ?Sized> {
    client: &'a C,
    group: &'a Group,
    resolved: HashMap<Peer, Author>,
}

impl<'a, C: ChatClient + ?Sized> AuthorCache<'a, C> {
    fn new(client: &'a C, group: &'a Group) -> Self {
        Self {
            client,
            group,
            resolved: HashMap::new(),
        }
    }

    async fn author(&mut self, message: &SourceMessage) -> Result<Author> {
        let Some(peer) = message.from else {
            // Channel posts carry no author; they speak as the channel.
            if self.group.is_broadcast() {
                return Ok((String::new(), self.group.title.clone()));
            }
            return Ok((String::new(), String::new()));
        };
        if let Some(author) = self.resolved.get(&peer) {
            return Ok(author.clone());
        }

        let author = match self.client.entity(peer).await {
            Ok(Entity::User(user)) => (user.id.to_string(), user.username.unwrap_or_default()),
            Ok(Entity::Channel { id, title }) => (id.to_string(), title),
            Ok(Entity::Chat { id, .. }) => {
                error!(author_id = id, "Unsupported message author type: chat");
                (id.to_string(), String::new())
            }
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                warn!(author_id = peer.id(), error = %e, "Cannot resolve message author");
                (peer.id().to_string(), String::new())
            }
        };
        self.resolved.insert(peer, author.clone());
        Ok(author)
    }
}

/// Writes every message sent at or after `after`, newest first.
///
/// The scan stops at the first supported message older than `after`; records
/// further down the history are never written, even when a later one is
/// newer than the bound. Returns the number of rows written.
pub async fn write_messages<C: ChatClient + ?Sized>(
    client: &C,
    group: &Group,
    dir: &Path,
    after: Option<DateTime<Utc>>,
) -> Result<usize> {
    let mut writer = csv_writer(&dir.join(MESSAGES_FILE))?;
    writer.write_record(HEADER)?;

    let mut authors = AuthorCache::new(client, group);
    let mut stream = client.messages(group, MessageQuery::newest_first());
    let mut written = 0;

    while let Some(item) = stream.next().await {
        let message = item?;
        if !message.is_supported() {
            error!(
                message_id = message.id,
                "Message of type \"{}\" is not supported yet, it will not be saved",
                message.type_name()
            );
            continue;
        }
        if after.is_some_and(|bound| message.date < bound) {
            break;
        }

        let (user_id, author_name) = authors.author(&message).await?;
        writer.write_record(message_record(&message, user_id, author_name))?;
        written += 1;
    }

    writer.flush()?;
    match after {
        Some(bound) => info!(count = written, "Successfully loaded messages starting from {}", bound),
        None => info!(count = written, "Successfully loaded all messages"),
    }
    Ok(written)
}

fn message_record(message: &SourceMessage, user_id: String, author_name: String) -> [String; 13] {
    let (media, entities, service_action) = match &message.body {
        MessageBody::Regular {
            media, entities, ..
        } => (
            media.clone().unwrap_or_default(),
            format_entities(entities),
            String::new(),
        ),
        MessageBody::Service { action } => (String::new(), String::new(), action.name.clone()),
        MessageBody::Unsupported { .. } => (String::new(), String::new(), String::new()),
    };

    [
        message.id.to_string(),
        csv_timestamp(message.date),
        user_id,
        author_name,
        message.body_text().to_string(),
        bool_field(message.is_forwarded()).to_string(),
        message
            .reply_to
            .map(|reply| reply.reply_to_msg_id.to_string())
            .unwrap_or_default(),
        media,
        entities,
        format_reactions(message),
        message.replies.unwrap_or(0).to_string(),
        message.forwards.unwrap_or(0).to_string(),
        service_action,
    ]
}

fn format_entities<T: std::fmt::Display>(entities: &[T]) -> String {
    if entities.is_empty() {
        return String::new();
    }
    let items: Vec<String> = entities.iter().map(ToString::to_string).collect();
    format!("[{}]", items.join(", "))
}

/// Each emoji repeated by its count; custom emoji are dropped.
fn format_reactions(message: &SourceMessage) -> String {
    let mut emoji: Vec<&str> = Vec::new();
    for counted in &message.reactions {
        if let Reaction::Emoji(e) = &counted.reaction {
            emoji.extend(std::iter::repeat_n(e.as_str(), counted.count as usize));
        }
    }
    emoji.join(",")
}
