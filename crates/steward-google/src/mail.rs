use std::sync::Arc;
use std::time::Instant;

use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;
use steward_audit::ActionLog;
use tracing::debug;

use crate::{
    client::GoogleClient,
    error::{GoogleError, Result},
};

const SEARCH_TOOL: &str = "gmail_search";
const MESSAGES_PATH: &str = "gmail/v1/users/me/messages";
const MAX_RESULTS: usize = 20;

pub const DEFAULT_MAIL_QUERY: &str = "is:unread label:important";

/// Header summary of one Gmail message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmailMessage {
    pub id: String,
    #[serde(rename = "threadId")]
    pub thread_id: String,
    pub from: String,
    pub subject: String,
    pub snippet: String,
    pub date: String,
}

/// Read-only Gmail search for the configured account.
pub struct MailService {
    client: Arc<GoogleClient>,
    audit: Arc<ActionLog>,
}

impl MailService {
    pub fn new(client: Arc<GoogleClient>, audit: Arc<ActionLog>) -> Self {
        Self { client, audit }
    }

    /// Run a Gmail search query and fetch the headers of up to 20 matches.
    pub async fn search(&self, query: &str) -> Result<Vec<EmailMessage>> {
        let started = Instant::now();
        let input = json!({ "query": query });

        let outcome: Result<Vec<EmailMessage>> = async {
            if !self.client.is_configured() {
                return Err(GoogleError::NotConfigured(
                    "Gmail is not configured. Set google.client_id, google.client_secret and google.refresh_token."
                        .into(),
                ));
            }
            let list: MessageList = self
                .client
                .get_json(
                    MESSAGES_PATH,
                    &[("q", query.to_string()), ("maxResults", MAX_RESULTS.to_string())],
                )
                .await?;
            debug!(count = list.messages.len(), "gmail search matched");
            try_join_all(list.messages.iter().map(|m| self.fetch(&m.id))).await
        }
        .await;

        let summary = match &outcome {
            Ok(found) if found.is_empty() => "No messages found".to_string(),
            Ok(found) => format!("Found {} emails", found.len()),
            Err(e) => format!("Error: {e}"),
        };
        self.audit.record(
            SEARCH_TOOL,
            Some(&input),
            Some(&summary),
            Some(started.elapsed().as_millis() as i64),
        );
        outcome
    }

    async fn fetch(&self, id: &str) -> Result<EmailMessage> {
        let detail: MessageDetail = self
            .client
            .get_json(
                &format!("{MESSAGES_PATH}/{id}"),
                &[
                    ("format", "metadata".to_string()),
                    ("metadataHeaders", "From".to_string()),
                    ("metadataHeaders", "Subject".to_string()),
                    ("metadataHeaders", "Date".to_string()),
                ],
            )
            .await?;

        let header = |name: &str| {
            detail
                .payload
                .as_ref()
                .and_then(|p| p.headers.iter().find(|h| h.name.eq_ignore_ascii_case(name)))
                .map(|h| h.value.clone())
                .unwrap_or_default()
        };
        Ok(EmailMessage {
            from: header("From"),
            subject: header("Subject"),
            date: header("Date"),
            id: detail.id.clone().unwrap_or_default(),
            thread_id: detail.thread_id.clone().unwrap_or_default(),
            snippet: detail.snippet.clone().unwrap_or_default(),
        })
    }
}

#[derive(Deserialize)]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageDetail {
    id: Option<String>,
    thread_id: Option<String>,
    snippet: Option<String>,
    payload: Option<MessagePayload>,
}

#[derive(Deserialize)]
struct MessagePayload {
    #[serde(default)]
    headers: Vec<Header>,
}

#[derive(Deserialize)]
struct Header {
    name: String,
    #[serde(default)]
    value: String,
}
