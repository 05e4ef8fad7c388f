//! Authenticated access to the Slack Web API.
//!
//! Web API calls go through a slack-morphism session driven by a private current-thread
//! runtime, so the rest of the crate stays synchronous. API-level failures surface as
//! [`AppError::SlackApi`] carrying Slack's error code.

use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use slack_morphism::prelude::*;
use slack_morphism::errors::SlackClientError;
#[cfg(test)]
use slack_morphism::errors::{SlackClientApiError, SlackClientSystemError};
use tokio::runtime::Runtime;
use url::Url;

use crate::error::{AppError, Result};
use crate::pagination::{PAGE_SIZE, Page};

pub const DEFAULT_API_BASE_URL: &str = "https://slack.com/api/";

const CONVERSATIONS_LIST: &str = "conversations.list";
const CONVERSATIONS_JOIN: &str = "conversations.join";
const CONVERSATIONS_HISTORY: &str = "conversations.history";
const CONVERSATIONS_REPLIES: &str = "conversations.replies";
const USERS_INFO: &str = "users.info";
const USERS_LIST: &str = "users.list";

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MemberProfile {
    #[serde(default, deserialize_with = "null_as_default")]
    pub display_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub real_name: String,
}

/// A workspace member as returned by `users.list`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Member {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_bot: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub deleted: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub profile: MemberProfile,
}

impl Member {
    /// The name users are looked up by: the profile display name, else the handle.
    pub fn lookup_name(&self) -> &str {
        if self.profile.display_name.is_empty() {
            &self.name
        } else {
            &self.profile.display_name
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UserInfo {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub real_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub profile: MemberProfile,
}

impl UserInfo {
    /// The real name, falling back to the profile's real name and then the handle.
    pub fn display_name(&self) -> &str {
        [&self.real_name, &self.profile.real_name]
            .into_iter()
            .find(|name| !name.is_empty())
            .unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawFile {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mimetype: String,
    #[serde(default)]
    pub url_private_download: Option<String>,
}

/// The fields of a history or replies message the exporter reads.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawMessage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub ts: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subtype: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bot_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub username: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub files: Vec<RawFile>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub reply_count: u32,
    #[serde(default)]
    pub thread_ts: Option<String>,
}

/// Optional `oldest`/`latest` bounds for a history request, as Slack timestamps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryRange {
    pub oldest: Option<String>,
    pub latest: Option<String>,
}

/// The operations the export engine needs from the platform.
pub trait SlackApi {
    fn list_channels(&self, cursor: Option<&str>) -> Result<Page<ChannelSummary>>;

    fn join_channel(&self, channel_id: &str) -> Result<()>;

    fn get_history(
        &self,
        channel_id: &str,
        range: &HistoryRange,
        cursor: Option<&str>,
    ) -> Result<Page<RawMessage>>;

    fn get_replies(
        &self,
        channel_id: &str,
        thread_ts: &str,
        cursor: Option<&str>,
    ) -> Result<Page<RawMessage>>;

    fn get_user_info(&self, user_id: &str) -> Result<UserInfo>;

    fn list_users(&self, cursor: Option<&str>) -> Result<Page<Member>>;

    fn download_file(&self, url: &str) -> Result<Vec<u8>>;
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Reads an SDK model through its wire shape into one of the exporter's own types.
fn from_sdk<S: Serialize, T: DeserializeOwned>(method: &str, value: &S) -> Result<T> {
    serde_json::to_value(value)
        .and_then(serde_json::from_value)
        .map_err(|e| AppError::JsonParse(format!("{} response: {}", method, e)))
}

fn from_sdk_all<S: Serialize, T: DeserializeOwned>(method: &str, values: &[S]) -> Result<Vec<T>> {
    values.iter().map(|value| from_sdk(method, value)).collect()
}

fn next_cursor(metadata: Option<SlackResponseMetadata>) -> Option<String> {
    metadata.and_then(|m| m.next_cursor).map(|cursor| cursor.0)
}

fn slack_cursor(cursor: Option<&str>) -> Option<SlackCursorId> {
    cursor.map(|c| SlackCursorId(c.to_string()))
}

fn slack_error(method: &str, error: SlackClientError) -> AppError {
    match error {
        SlackClientError::ApiError(api) => AppError::SlackApi {
            method: method.to_string(),
            code: api.code,
        },
        other => AppError::SlackClient {
            method: method.to_string(),
            message: other.to_string(),
        },
    }
}

/// Installs the rustls crypto provider used by both HTTP stacks. Repeated calls are no-ops.
fn install_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

/// The live [`SlackApi`], backed by a bot or user token.
pub struct HttpGateway {
    runtime: Runtime,
    client: SlackHyperClient,
    token: SlackApiToken,
    downloads: Client,
}

impl HttpGateway {
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self> {
        Url::parse(base_url).map_err(|_| AppError::InvalidUrl(base_url.to_string()))?;
        install_crypto_provider();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let client = {
            let _guard = runtime.enter();
            let connector = SlackClientHyperConnector::new()
                .map_err(|e| AppError::SlackClient {
                    method: "client setup".to_string(),
                    message: e.to_string(),
                })?
                .with_slack_api_url(base_url.trim_end_matches('/'));
            SlackClient::new(connector)
        };

        let downloads = Client::builder().build().map_err(|e| AppError::Http {
            method: "client setup".to_string(),
            source: e,
        })?;

        Ok(Self {
            runtime,
            client,
            token: SlackApiToken::new(SlackApiTokenValue(token.into())),
            downloads,
        })
    }

    /// Drives one Web API future to completion on the gateway's runtime.
    fn call<T, F>(&self, method: &str, request: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, SlackClientError>>,
    {
        tracing::debug!(method = %method, "sending request");
        let response = self
            .runtime
            .block_on(request)
            .map_err(|e| slack_error(method, e))?;
        tracing::debug!(method = %method, "received response");
        Ok(response)
    }
}

impl SlackApi for HttpGateway {
    fn list_channels(&self, cursor: Option<&str>) -> Result<Page<ChannelSummary>> {
        let session = self.client.open_session(&self.token);
        let request = SlackApiConversationsListRequest::new()
            .with_limit(PAGE_SIZE)
            .with_types(vec![
                SlackConversationType::Public,
                SlackConversationType::Private,
            ])
            .opt_cursor(slack_cursor(cursor));

        let response = self.call(CONVERSATIONS_LIST, session.conversations_list(&request))?;
        let channels = response
            .channels
            .into_iter()
            .map(|channel| ChannelSummary {
                id: channel.id.0,
                name: channel.name.unwrap_or_default(),
            })
            .collect();
        Ok(Page::new(channels, next_cursor(response.response_metadata)))
    }

    fn join_channel(&self, channel_id: &str) -> Result<()> {
        let session = self.client.open_session(&self.token);
        let request = SlackApiConversationsJoinRequest::new(SlackChannelId(channel_id.to_string()));
        self.call(CONVERSATIONS_JOIN, session.conversations_join(&request))?;
        Ok(())
    }

    fn get_history(
        &self,
        channel_id: &str,
        range: &HistoryRange,
        cursor: Option<&str>,
    ) -> Result<Page<RawMessage>> {
        let session = self.client.open_session(&self.token);
        let request = SlackApiConversationsHistoryRequest::new()
            .with_channel(SlackChannelId(channel_id.to_string()))
            .with_limit(PAGE_SIZE)
            .opt_oldest(range.oldest.clone().map(SlackTs))
            .opt_latest(range.latest.clone().map(SlackTs))
            .opt_cursor(slack_cursor(cursor));

        let response = self.call(
            CONVERSATIONS_HISTORY,
            session.conversations_history(&request),
        )?;
        let messages = from_sdk_all(CONVERSATIONS_HISTORY, &response.messages)?;
        Ok(Page::new(messages, next_cursor(response.response_metadata)))
    }

    fn get_replies(
        &self,
        channel_id: &str,
        thread_ts: &str,
        cursor: Option<&str>,
    ) -> Result<Page<RawMessage>> {
        let session = self.client.open_session(&self.token);
        let request = SlackApiConversationsRepliesRequest::new(
            SlackChannelId(channel_id.to_string()),
            SlackTs(thread_ts.to_string()),
        )
        .with_limit(PAGE_SIZE)
        .opt_cursor(slack_cursor(cursor));

        let response = self.call(
            CONVERSATIONS_REPLIES,
            session.conversations_replies(&request),
        )?;
        let messages = from_sdk_all(CONVERSATIONS_REPLIES, &response.messages)?;
        Ok(Page::new(messages, next_cursor(response.response_metadata)))
    }

    fn get_user_info(&self, user_id: &str) -> Result<UserInfo> {
        let session = self.client.open_session(&self.token);
        let request = SlackApiUsersInfoRequest::new(SlackUserId(user_id.to_string()));

        let response = self.call(USERS_INFO, session.users_info(&request))?;
        from_sdk(USERS_INFO, &response.user)
    }

    fn list_users(&self, cursor: Option<&str>) -> Result<Page<Member>> {
        let session = self.client.open_session(&self.token);
        let request = SlackApiUsersListRequest::new()
            .with_limit(PAGE_SIZE)
            .opt_cursor(slack_cursor(cursor));

        let response = self.call(USERS_LIST, session.users_list(&request))?;
        let members = from_sdk_all(USERS_LIST, &response.members)?;
        Ok(Page::new(members, next_cursor(response.response_metadata)))
    }

    fn download_file(&self, url: &str) -> Result<Vec<u8>> {
        let method = "file download";
        let response = self
            .downloads
            .get(url)
            .bearer_auth(&self.token.token_value.0)
            .send()
            .map_err(|e| AppError::Http {
                method: method.to_string(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpStatus {
                method: method.to_string(),
                status: status.as_u16(),
                body: url.to_string(),
            });
        }

        let bytes = response.bytes().map_err(|e| AppError::Http {
            method: method.to_string(),
            source: e,
        })?;
        Ok(bytes.to_vec())
    }
}
