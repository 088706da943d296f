//! ClickHouse sink over the HTTP interface.
//!
//! Queries are sent as the request body with typed parameters
//! (`{g:UInt64}`) bound through `param_*` URL arguments. Inserts use
//! `INSERT ... FORMAT JSONEachRow` with one serialized row per line.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::{Certificate, Client};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::SinkError;
use crate::rows::{
    GROUP_COLUMNS, GROUPS_TABLE, GroupRow, MESSAGE_COLUMNS, MESSAGES_TABLE, MessageRow,
    PARTICIPANT_COLUMNS, PARTICIPANTS_TABLE, ParticipantRow, TOPIC_COLUMNS, TOPICS_TABLE, TopicRow,
};

use super::{Sink, SinkResult};

const LAST_MESSAGE_SQL: &str = "SELECT message_id FROM messages WHERE group_id = {g:UInt64} \
     ORDER BY dt DESC, message_id DESC LIMIT 1 FORMAT JSONEachRow";
const KNOWN_PARTICIPANTS_SQL: &str = "SELECT user_id FROM participants \
     WHERE group_id = {g:UInt64} AND user_id IN {ids:Array(UInt64)} FORMAT JSONEachRow";
const KNOWN_TOPICS_SQL: &str = "SELECT topic_id FROM topics \
     WHERE group_id = {g:UInt64} AND topic_id IN {ids:Array(UInt64)} FORMAT JSONEachRow";
const GROUPS_SQL: &str = "SELECT group_id, name FROM groups FORMAT JSONEachRow";

/// Connection settings for [`ClickHouseSink`].
#[derive(Debug, Clone)]
pub struct ClickHouseConfig {
    /// Base URL, e.g. `https://host:8443`
    pub url: String,
    pub user: String,
    pub password: String,
    pub database: String,
    /// PEM file with an extra root certificate
    pub ca_cert: Option<PathBuf>,
}

impl ClickHouseConfig {
    /// Builds the base URL from host and port; HTTPS unless the port is 8123.
    pub fn from_host(host: &str, port: u16) -> String {
        let scheme = if port == 8123 { "http" } else { "https" };
        format!("{scheme}://{host}:{port}")
    }
}

/// A [`Sink`] writing to ClickHouse.
pub struct ClickHouseSink {
    http: Client,
    config: ClickHouseConfig,
}

impl ClickHouseSink {
    pub fn new(config: ClickHouseConfig) -> SinkResult<Self> {
        let mut builder = Client::builder();
        if let Some(path) = &config.ca_cert {
            let pem = std::fs::read(path)
                .map_err(|e| SinkError::Config(format!("cannot read {}: {e}", path.display())))?;
            builder = builder.add_root_certificate(Certificate::from_pem(&pem)?);
        }
        Ok(Self {
            http: builder.build()?,
            config,
        })
    }

    fn base_params(&self) -> Vec<(String, String)> {
        vec![
            ("database".to_string(), self.config.database.clone()),
            (
                "output_format_json_quote_64bit_integers".to_string(),
                "0".to_string(),
            ),
        ]
    }

    async fn execute(&self, params: Vec<(String, String)>, body: String) -> SinkResult<String> {
        let response = self
            .http
            .post(&self.config.url)
            .header("X-ClickHouse-User", &self.config.user)
            .header("X-ClickHouse-Key", &self.config.password)
            .query(&params)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(SinkError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }

    async fn select<T: DeserializeOwned>(&self, sql: &str, bindings: &[(&str, String)]) -> SinkResult<Vec<T>> {
        let mut params = self.base_params();
        params.extend(
            bindings
                .iter()
                .map(|(name, value)| (format!("param_{name}"), value.clone())),
        );
        debug!(sql, "clickhouse select");
        let body = self.execute(params, sql.to_string()).await?;
        parse_json_each_row(&body)
    }

    async fn insert<T: Serialize>(&self, table: &str, columns: &[&str], rows: &[T]) -> SinkResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut params = self.base_params();
        params.push(("query".to_string(), insert_statement(table, columns)));
        debug!(table, rows = rows.len(), "clickhouse insert");
        self.execute(params, encode_json_each_row(rows)?).await?;
        Ok(())
    }

    async fn known_ids(&self, sql: &str, column: &str, group_id: i64, ids: &[i64]) -> SinkResult<HashSet<i64>> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let rows: Vec<HashMap<String, Value>> = self
            .select(sql, &[("g", group_id.to_string()), ("ids", array_param(ids))])
            .await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get(column).and_then(Value::as_i64))
            .collect())
    }
}

#[async_trait]
impl Sink for ClickHouseSink {
    async fn last_message_id(&self, group_id: i64) -> SinkResult<Option<i64>> {
        let rows: Vec<HashMap<String, Value>> = self
            .select(LAST_MESSAGE_SQL, &[("g", group_id.to_string())])
            .await?;
        Ok(rows
            .first()
            .and_then(|row| row.get("message_id"))
            .and_then(Value::as_i64))
    }

    async fn known_participants(&self, group_id: i64, user_ids: &[i64]) -> SinkResult<HashSet<i64>> {
        self.known_ids(KNOWN_PARTICIPANTS_SQL, "user_id", group_id, user_ids)
            .await
    }

    async fn known_topics(&self, group_id: i64, topic_ids: &[i64]) -> SinkResult<HashSet<i64>> {
        self.known_ids(KNOWN_TOPICS_SQL, "topic_id", group_id, topic_ids)
            .await
    }

    async fn stored_groups(&self) -> SinkResult<HashMap<i64, String>> {
        let rows: Vec<GroupRow> = self.select(GROUPS_SQL, &[]).await?;
        Ok(rows.into_iter().map(|row| (row.group_id, row.name)).collect())
    }

    async fn insert_groups(&self, rows: &[GroupRow]) -> SinkResult<()> {
        self.insert(GROUPS_TABLE, GROUP_COLUMNS, rows).await
    }

    async fn insert_messages(&self, rows: &[MessageRow]) -> SinkResult<()> {
        self.insert(MESSAGES_TABLE, MESSAGE_COLUMNS, rows).await
    }

    async fn insert_participants(&self, rows: &[ParticipantRow]) -> SinkResult<()> {
        self.insert(PARTICIPANTS_TABLE, PARTICIPANT_COLUMNS, rows)
            .await
    }

    async fn insert_topics(&self, rows: &[TopicRow]) -> SinkResult<()> {
        self.insert(TOPICS_TABLE, TOPIC_COLUMNS, rows).await
    }
}

fn insert_statement(table: &str, columns: &[&str]) -> String {
    format!(
        "INSERT INTO {table} ({}) FORMAT JSONEachRow",
        columns.join(", ")
    )
}

/// Formats ids as a ClickHouse array literal for a typed parameter.
fn array_param(ids: &[i64]) -> String {
    let items: Vec<String> = ids.iter().map(i64::to_string).collect();
    format!("[{}]", items.join(","))
}

fn encode_json_each_row<T: Serialize>(rows: &[T]) -> SinkResult<String> {
    let mut body = String::new();
    for row in rows {
        body.push_str(&serde_json::to_string(row)?);
        body.push('\n');
    }
    Ok(body)
}

fn parse_json_each_row<T: DeserializeOwned>(body: &str) -> SinkResult<Vec<T>> {
    body.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(SinkError::from))
        .collect()
}
