//! Turning raw platform messages into export entries: author names, mentions,
//! timestamps and attachments.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex};

use regex::{Captures, Regex};

use crate::error::{AppError, Result};
use crate::gateway::{RawFile, RawMessage, SlackApi};
use crate::timestamp::slack_ts_to_iso8601;
use crate::types::{ExportedFile, ExportedMessage, PostType};

const BOT_MESSAGE_SUBTYPE: &str = "bot_message";

#[allow(clippy::expect_used)] // literal pattern
static MENTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<@([UW][A-Z0-9]+)(?:\|[^>]*)?>").expect("mention pattern is valid")
});

/// Who wrote a message, decided once from its subtype.
#[derive(Debug, Clone, PartialEq)]
pub enum Author {
    UserAuthored { user_id: String },
    BotAuthored { bot_id: String, username: String },
}

impl Author {
    pub fn of(raw: &RawMessage) -> Self {
        if raw.subtype == BOT_MESSAGE_SUBTYPE {
            Author::BotAuthored {
                bot_id: raw.bot_id.clone(),
                username: raw.username.clone(),
            }
        } else {
            Author::UserAuthored {
                user_id: raw.user.clone(),
            }
        }
    }
}

/// User ID to display name, filled on first lookup and shared by every message of a run.
#[derive(Debug, Default)]
pub struct DisplayNameCache {
    names: Mutex<HashMap<String, String>>,
}

impl DisplayNameCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: &str) -> Option<String> {
        self.names
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(user_id)
            .cloned()
    }

    pub fn insert(&self, user_id: &str, name: &str) {
        self.names
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(user_id.to_string(), name.to_string());
    }

    /// Number of users resolved so far.
    pub fn resolved(&self) -> usize {
        self.names
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

/// Local file name for an attachment: `<id>_<base name>`, never containing a separator.
pub fn attachment_file_name(file_id: &str, name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let base = match base {
        "" | "." | ".." => "attachment",
        other => other,
    };
    format!("{file_id}_{base}")
}

/// Write `bytes` to `path`, readable only by the owner where the platform supports it.
pub fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(bytes)
}

pub struct MessageEnricher<A> {
    api: Arc<A>,
    names: DisplayNameCache,
    download_dir: Option<PathBuf>,
}

impl<A: SlackApi> MessageEnricher<A> {
    /// `download_dir` enables attachment downloads into that directory.
    pub fn new(api: Arc<A>, download_dir: Option<PathBuf>) -> Self {
        Self {
            api,
            names: DisplayNameCache::new(),
            download_dir,
        }
    }

    pub fn names(&self) -> &DisplayNameCache {
        &self.names
    }

    /// Build the export entry for one message. Never fails: lookup, mention, timestamp and
    /// download problems are logged and leave the affected field at its default.
    pub fn build_exported_message(&self, raw: &RawMessage) -> ExportedMessage {
        let (user_id, user_name, post_type) = match Author::of(raw) {
            Author::BotAuthored { bot_id, username } => {
                let name = if username.is_empty() && !bot_id.is_empty() {
                    format!("bot:{bot_id}")
                } else {
                    username
                };
                (bot_id, name, PostType::Bot)
            }
            Author::UserAuthored { user_id } => {
                let name = self.resolve_display_name(&user_id).unwrap_or_else(|e| {
                    tracing::warn!(user_id = %user_id, error = %e, "could not resolve user");
                    String::new()
                });
                (user_id, name, PostType::User)
            }
        };

        let files = self.handle_attached_files(&raw.files);

        let (text, mention_err) = self.resolve_mentions(&raw.text);
        if let Some(e) = mention_err {
            tracing::warn!(ts = %raw.ts, error = %e, "could not resolve mentions");
        }

        let timestamp = slack_ts_to_iso8601(&raw.ts).unwrap_or_else(|e| {
            tracing::warn!(ts = %raw.ts, error = %e, "could not parse timestamp");
            String::new()
        });

        let thread_timestamp_unix = raw.thread_ts.clone().filter(|ts| !ts.is_empty());
        let is_reply = thread_timestamp_unix
            .as_deref()
            .is_some_and(|thread_ts| thread_ts != raw.ts);

        ExportedMessage {
            user_id,
            user_name,
            post_type,
            timestamp,
            timestamp_unix: raw.ts.clone(),
            text,
            files,
            is_reply,
            thread_timestamp_unix,
        }
    }

    /// Display name for a user ID: real name, else handle. Empty IDs resolve to "".
    pub fn resolve_display_name(&self, user_id: &str) -> Result<String> {
        if user_id.is_empty() {
            return Ok(String::new());
        }
        if let Some(name) = self.names.get(user_id) {
            return Ok(name);
        }

        let info = self
            .api
            .get_user_info(user_id)
            .map_err(|e| e.context(format!("failed to get user info for {user_id}")))?;
        let name = info.display_name().to_string();

        self.names.insert(user_id, &name);
        Ok(name)
    }

    /// Replace every `<@U...>` mention with `@<display name>`.
    ///
    /// Unresolvable mentions stay exactly as written. The text is always returned, together
    /// with the first resolution error if there was one.
    pub fn resolve_mentions(&self, text: &str) -> (String, Option<AppError>) {
        let mut first_err = None;
        let resolved = MENTION_RE.replace_all(text, |caps: &Captures| {
            let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
            let Some(user_id) = caps.get(1).map(|m| m.as_str()) else {
                return whole.to_string();
            };
            match self.resolve_display_name(user_id) {
                Ok(name) => format!("@{name}"),
                Err(e) => {
                    if first_err.is_none() {
                        first_err =
                            Some(e.context(format!("failed to resolve mention for {user_id}")));
                    }
                    whole.to_string()
                }
            }
        });
        (resolved.into_owned(), first_err)
    }

    fn handle_attached_files(&self, files: &[RawFile]) -> Vec<ExportedFile> {
        files
            .iter()
            .map(|file| ExportedFile {
                id: file.id.clone(),
                name: file.name.clone(),
                mimetype: file.mimetype.clone(),
                local_path: self.download(file),
            })
            .collect()
    }

    /// Download one attachment, returning its local path on success.
    fn download(&self, file: &RawFile) -> Option<String> {
        let dir = self.download_dir.as_ref()?;
        let Some(url) = file.url_private_download.as_deref().filter(|u| !u.is_empty()) else {
            tracing::warn!(file = %file.name, id = %file.id, "file has no download URL, skipping");
            return None;
        };

        let local_path = dir.join(attachment_file_name(&file.id, &file.name));

        let bytes = match self.api.download_file(url) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(file = %file.name, url = %url, error = %e, "could not download file");
                return None;
            }
        };

        if let Err(e) = write_private(&local_path, &bytes) {
            tracing::warn!(
                file = %file.name,
                path = %local_path.display(),
                error = %e,
                "could not save file"
            );
            return None;
        }

        Some(local_path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeApi, attachment, message, reply, thread_parent, user};

    fn api_with_users() -> FakeApi {
        let mut api = FakeApi::new();
        api.users
            .insert("U001".to_string(), user("U001", "alice", "Alice Liddell"));
        api.users.insert("U002".to_string(), user("U002", "bob", ""));
        api
    }

    #[test]
    fn test_author_of_bot_message() {
        let raw = RawMessage {
            subtype: "bot_message".to_string(),
            bot_id: "B1".to_string(),
            username: "deploybot".to_string(),
            ..RawMessage::default()
        };
        assert_eq!(
            Author::of(&raw),
            Author::BotAuthored {
                bot_id: "B1".to_string(),
                username: "deploybot".to_string()
            }
        );
        assert_eq!(
            Author::of(&message("1.0", "U1", "")),
            Author::UserAuthored {
                user_id: "U1".to_string()
            }
        );
    }

    #[test]
    fn test_user_message_resolves_and_caches_name() {
        let api = Arc::new(api_with_users());
        let enricher = MessageEnricher::new(api.clone(), None);

        let first = enricher.build_exported_message(&message("1678886400.000000", "U001", "hi"));
        let second = enricher.build_exported_message(&message("1678886401.000000", "U001", "again"));

        assert_eq!(first.user_name, "Alice Liddell");
        assert_eq!(first.user_id, "U001");
        assert_eq!(first.post_type, PostType::User);
        assert_eq!(first.timestamp, "2023-03-15T13:20:00Z");
        assert_eq!(first.timestamp_unix, "1678886400.000000");
        assert_eq!(second.user_name, "Alice Liddell");
        assert_eq!(api.count_calls("users.info:"), 1);
        assert_eq!(enricher.names().resolved(), 1);
    }

    #[test]
    fn test_display_name_falls_back_to_handle() {
        let enricher = MessageEnricher::new(Arc::new(api_with_users()), None);
        assert_eq!(enricher.resolve_display_name("U002").unwrap(), "bob");
    }

    #[test]
    fn test_unknown_user_leaves_name_empty() {
        let enricher = MessageEnricher::new(Arc::new(api_with_users()), None);
        let exported = enricher.build_exported_message(&message("1.0", "U404", "who am i"));

        assert_eq!(exported.user_name, "");
        assert_eq!(exported.user_id, "U404");
        assert_eq!(exported.text, "who am i");
    }

    #[test]
    fn test_empty_user_id_makes_no_lookup() {
        let api = Arc::new(FakeApi::new());
        let enricher = MessageEnricher::new(api.clone(), None);

        let exported = enricher.build_exported_message(&message("1.0", "", "system notice"));
        assert_eq!(exported.user_name, "");
        assert!(api.calls().is_empty());
    }

    #[test]
    fn test_bot_message_uses_username_or_bot_id() {
        let api = Arc::new(FakeApi::new());
        let enricher = MessageEnricher::new(api.clone(), None);

        let named = RawMessage {
            subtype: "bot_message".to_string(),
            bot_id: "B1".to_string(),
            username: "deploybot".to_string(),
            ..message("1.0", "", "deployed")
        };
        let anonymous = RawMessage {
            subtype: "bot_message".to_string(),
            bot_id: "B2".to_string(),
            ..message("2.0", "", "beep")
        };

        let named = enricher.build_exported_message(&named);
        let anonymous = enricher.build_exported_message(&anonymous);

        assert_eq!(named.user_name, "deploybot");
        assert_eq!(named.user_id, "B1");
        assert_eq!(named.post_type, PostType::Bot);
        assert_eq!(anonymous.user_name, "bot:B2");
        assert_eq!(api.count_calls("users.info:"), 0);
    }

    #[test]
    fn test_mentions_resolved_and_unresolved_kept() {
        let enricher = MessageEnricher::new(Arc::new(api_with_users()), None);

        let text = "hey <@U001>, ask <@U999> and <@U002|bob>";
        let (resolved, err) = enricher.resolve_mentions(text);

        assert_eq!(resolved, "hey @Alice Liddell, ask <@U999> and @bob");
        let err = err.unwrap();
        assert!(err.to_string().contains("U999"));
        assert_eq!(err.api_code(), Some("user_not_found"));
    }

    #[test]
    fn test_unresolvable_mention_preserved_byte_for_byte() {
        let enricher = MessageEnricher::new(Arc::new(FakeApi::new()), None);

        let text = "ping <@U0BADBAD> ✨ <#C001|general>";
        let exported = enricher.build_exported_message(&message("1.0", "", text));
        assert_eq!(exported.text, text);
        assert!(enricher.resolve_mentions(text).1.is_some());
    }

    #[test]
    fn test_text_without_mentions_untouched() {
        let api = Arc::new(FakeApi::new());
        let enricher = MessageEnricher::new(api.clone(), None);

        let (resolved, err) = enricher.resolve_mentions("plain <https://example.com> text");
        assert_eq!(resolved, "plain <https://example.com> text");
        assert!(err.is_none());
        assert!(api.calls().is_empty());
    }

    #[test]
    fn test_malformed_timestamp_keeps_raw() {
        let enricher = MessageEnricher::new(Arc::new(FakeApi::new()), None);
        let exported = enricher.build_exported_message(&message("not-a-ts", "", "x"));

        assert_eq!(exported.timestamp, "");
        assert_eq!(exported.timestamp_unix, "not-a-ts");
    }

    #[test]
    fn test_reply_flags() {
        let enricher = MessageEnricher::new(Arc::new(FakeApi::new()), None);

        let parent = enricher.build_exported_message(&thread_parent("10.0", "", "p", 1));
        let child = enricher.build_exported_message(&reply("11.0", "10.0", "", "r"));
        let plain = enricher.build_exported_message(&message("12.0", "", "m"));

        assert!(!parent.is_reply);
        assert_eq!(parent.thread_timestamp_unix.as_deref(), Some("10.0"));
        assert!(child.is_reply);
        assert_eq!(child.thread_timestamp_unix.as_deref(), Some("10.0"));
        assert!(!plain.is_reply);
        assert_eq!(plain.thread_timestamp_unix, None);
    }

    #[test]
    fn test_attachment_file_name_strips_directories() {
        assert_eq!(attachment_file_name("F1", "../../etc/passwd"), "F1_passwd");
        assert_eq!(attachment_file_name("F2", "..\\..\\boot.ini"), "F2_boot.ini");
        assert_eq!(attachment_file_name("F3", "report.pdf"), "F3_report.pdf");
        assert_eq!(attachment_file_name("F4", ".."), "F4_attachment");
        assert_eq!(attachment_file_name("F5", "dir/"), "F5_attachment");
    }

    #[test]
    fn test_files_recorded_without_download() {
        let api = Arc::new(FakeApi::new());
        let enricher = MessageEnricher::new(api.clone(), None);

        let raw = RawMessage {
            files: vec![attachment("F1", "notes.txt", Some("https://files/F1"))],
            ..message("1.0", "", "see file")
        };
        let exported = enricher.build_exported_message(&raw);

        assert_eq!(exported.files.len(), 1);
        assert_eq!(exported.files[0].id, "F1");
        assert_eq!(exported.files[0].mimetype, "text/plain");
        assert_eq!(exported.files[0].local_path, None);
        assert_eq!(api.count_calls("download:"), 0);
    }

    #[test]
    fn test_download_stays_inside_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut api = FakeApi::new();
        api.files
            .insert("https://files/F9".to_string(), b"root:x:0:0".to_vec());
        let enricher = MessageEnricher::new(Arc::new(api), Some(dir.path().to_path_buf()));

        let raw = RawMessage {
            files: vec![attachment("F9", "../../etc/passwd", Some("https://files/F9"))],
            ..message("1.0", "", "")
        };
        let exported = enricher.build_exported_message(&raw);

        let expected = dir.path().join("F9_passwd");
        assert_eq!(
            exported.files[0].local_path.as_deref(),
            Some(expected.display().to_string().as_str())
        );
        assert_eq!(std::fs::read(&expected).unwrap(), b"root:x:0:0");
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_downloaded_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret.bin");
        write_private(&path, b"data").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_failed_download_keeps_file_record() {
        let dir = tempfile::tempdir().unwrap();
        let enricher =
            MessageEnricher::new(Arc::new(FakeApi::new()), Some(dir.path().to_path_buf()));

        let raw = RawMessage {
            files: vec![
                attachment("F1", "missing.txt", Some("https://files/gone")),
                attachment("F2", "no-url.txt", None),
            ],
            ..message("1.0", "", "")
        };
        let exported = enricher.build_exported_message(&raw);

        assert_eq!(exported.files.len(), 2);
        assert!(exported.files.iter().all(|f| f.local_path.is_none()));
    }

    #[test]
    fn test_file_without_url_skipped_when_downloading() {
        let dir = tempfile::tempdir().unwrap();
        let mut api = FakeApi::new();
        api.files.insert("https://files/F3".to_string(), b"ok".to_vec());
        let api = Arc::new(api);
        let enricher = MessageEnricher::new(api.clone(), Some(dir.path().to_path_buf()));

        let raw = RawMessage {
            files: vec![
                attachment("F1", "no-url.txt", None),
                attachment("F2", "empty-url.txt", Some("")),
                attachment("F3", "present.txt", Some("https://files/F3")),
            ],
            ..message("1.0", "", "")
        };
        let exported = enricher.build_exported_message(&raw);

        assert_eq!(exported.files[0].local_path, None);
        assert_eq!(exported.files[1].local_path, None);
        assert!(exported.files[2].local_path.is_some());
        assert_eq!(api.count_calls("download:"), 1);
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_failed_write_keeps_file_record() {
        let dir = tempfile::tempdir().unwrap();
        let missing_dir = dir.path().join("does-not-exist");
        let mut api = FakeApi::new();
        api.files.insert("https://files/F1".to_string(), b"x".to_vec());
        let enricher = MessageEnricher::new(Arc::new(api), Some(missing_dir));

        let raw = RawMessage {
            files: vec![attachment("F1", "a.txt", Some("https://files/F1"))],
            ..message("1.0", "", "")
        };
        let exported = enricher.build_exported_message(&raw);

        assert_eq!(exported.files.len(), 1);
        assert_eq!(exported.files[0].name, "a.txt");
        assert_eq!(exported.files[0].local_path, None);
    }
}
