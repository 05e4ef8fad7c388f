use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    User,
    Bot,
}

/// A file attached to an exported message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedFile {
    pub id: String,
    pub name: String,
    pub mimetype: String,
    /// Where the file was saved, if it was downloaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,
}

/// One message of the exported log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedMessage {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_name: String,
    pub post_type: PostType,
    /// ISO 8601 UTC, whole seconds
    pub timestamp: String,
    /// Original Slack timestamp (e.g. "1767636991.559059"), used for ordering
    pub timestamp_unix: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<ExportedFile>,
    pub is_reply: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_timestamp_unix: Option<String>,
}

/// The document produced by one export run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedLog {
    pub export_timestamp: String,
    pub channel_name: String,
    pub messages: Vec<ExportedMessage>,
}

/// Parameters of an export run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportOptions {
    pub channel_name: String,
    /// Lower bound as a Slack timestamp
    pub start_time: Option<String>,
    /// Upper bound as a Slack timestamp
    pub end_time: Option<String>,
    pub include_files: bool,
    pub output_dir: PathBuf,
}
