//! Scripted in-memory [`SlackApi`] for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::error::{AppError, NOT_IN_CHANNEL, Result};
use crate::gateway::{
    ChannelSummary, HistoryRange, Member, MemberProfile, RawFile, RawMessage, SlackApi, UserInfo,
};
use crate::pagination::Page;

/// Split `pages` into a cursor-keyed map, chaining them with cursors `page-1`, `page-2`, ...
pub fn paged<T>(pages: Vec<Vec<T>>) -> HashMap<Option<String>, Page<T>> {
    let count = pages.len();
    pages
        .into_iter()
        .enumerate()
        .map(|(idx, items)| {
            let key = (idx > 0).then(|| format!("page-{idx}"));
            let next = (idx + 1 < count).then(|| format!("page-{}", idx + 1));
            (key, Page::new(items, next))
        })
        .collect()
}

pub fn message(ts: &str, user: &str, text: &str) -> RawMessage {
    RawMessage {
        ts: ts.to_string(),
        user: user.to_string(),
        text: text.to_string(),
        ..RawMessage::default()
    }
}

pub fn thread_parent(ts: &str, user: &str, text: &str, reply_count: u32) -> RawMessage {
    RawMessage {
        reply_count,
        thread_ts: Some(ts.to_string()),
        ..message(ts, user, text)
    }
}

pub fn reply(ts: &str, parent_ts: &str, user: &str, text: &str) -> RawMessage {
    RawMessage {
        thread_ts: Some(parent_ts.to_string()),
        ..message(ts, user, text)
    }
}

pub fn attachment(id: &str, name: &str, url: Option<&str>) -> RawFile {
    RawFile {
        id: id.to_string(),
        name: name.to_string(),
        mimetype: "text/plain".to_string(),
        url_private_download: url.map(str::to_string),
    }
}

pub fn channel(id: &str, name: &str) -> ChannelSummary {
    ChannelSummary {
        id: id.to_string(),
        name: name.to_string(),
    }
}

pub fn member(id: &str, name: &str, display_name: &str) -> Member {
    Member {
        id: id.to_string(),
        name: name.to_string(),
        profile: MemberProfile {
            display_name: display_name.to_string(),
            ..MemberProfile::default()
        },
        ..Member::default()
    }
}

pub fn user(id: &str, name: &str, real_name: &str) -> UserInfo {
    UserInfo {
        id: id.to_string(),
        name: name.to_string(),
        real_name: real_name.to_string(),
        profile: MemberProfile::default(),
    }
}

fn api_error(method: &str, code: &str) -> AppError {
    AppError::SlackApi {
        method: method.to_string(),
        code: code.to_string(),
    }
}

#[derive(Default)]
pub struct FakeApi {
    pub channels: HashMap<Option<String>, Page<ChannelSummary>>,
    pub members: HashMap<Option<String>, Page<Member>>,
    pub users: HashMap<String, UserInfo>,
    pub history: HashMap<Option<String>, Page<RawMessage>>,
    /// Keyed by (thread ts, cursor).
    pub replies: HashMap<(String, Option<String>), Page<RawMessage>>,
    pub files: HashMap<String, Vec<u8>>,
    /// Error codes returned by the next history calls, one per call.
    pub history_failures: Mutex<VecDeque<String>>,
    pub join_error: Option<String>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies(mut self, thread_ts: &str, pages: Vec<Vec<RawMessage>>) -> Self {
        for (cursor, page) in paged(pages) {
            self.replies.insert((thread_ts.to_string(), cursor), page);
        }
        self
    }

    pub fn fail_history(self, codes: &[&str]) -> Self {
        if let Ok(mut failures) = self.history_failures.lock() {
            failures.extend(codes.iter().map(|c| c.to_string()));
        }
        self
    }

    pub fn not_in_channel_once(self) -> Self {
        self.fail_history(&[NOT_IN_CHANNEL])
    }

    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }
}

fn lookup<T: Clone>(
    pages: &HashMap<Option<String>, Page<T>>,
    cursor: Option<&str>,
    method: &str,
) -> Result<Page<T>> {
    pages
        .get(&cursor.map(str::to_string))
        .cloned()
        .or_else(|| cursor.is_none().then(|| Page::last(Vec::new())))
        .ok_or_else(|| api_error(method, "invalid_cursor"))
}

impl SlackApi for FakeApi {
    fn list_channels(&self, cursor: Option<&str>) -> Result<Page<ChannelSummary>> {
        self.record(format!("conversations.list:{}", cursor.unwrap_or("")));
        lookup(&self.channels, cursor, "conversations.list")
    }

    fn join_channel(&self, channel_id: &str) -> Result<()> {
        self.record(format!("conversations.join:{channel_id}"));
        match &self.join_error {
            Some(code) => Err(api_error("conversations.join", code)),
            None => Ok(()),
        }
    }

    fn get_history(
        &self,
        channel_id: &str,
        range: &HistoryRange,
        cursor: Option<&str>,
    ) -> Result<Page<RawMessage>> {
        self.record(format!(
            "conversations.history:{}:{}:{}:{}",
            channel_id,
            range.oldest.as_deref().unwrap_or(""),
            range.latest.as_deref().unwrap_or(""),
            cursor.unwrap_or("")
        ));

        let failure = self
            .history_failures
            .lock()
            .ok()
            .and_then(|mut failures| failures.pop_front());
        if let Some(code) = failure {
            return Err(api_error("conversations.history", &code));
        }

        lookup(&self.history, cursor, "conversations.history")
    }

    fn get_replies(
        &self,
        channel_id: &str,
        thread_ts: &str,
        cursor: Option<&str>,
    ) -> Result<Page<RawMessage>> {
        self.record(format!(
            "conversations.replies:{}:{}:{}",
            channel_id,
            thread_ts,
            cursor.unwrap_or("")
        ));
        self.replies
            .get(&(thread_ts.to_string(), cursor.map(str::to_string)))
            .cloned()
            .ok_or_else(|| api_error("conversations.replies", "thread_not_found"))
    }

    fn get_user_info(&self, user_id: &str) -> Result<UserInfo> {
        self.record(format!("users.info:{user_id}"));
        self.users
            .get(user_id)
            .cloned()
            .ok_or_else(|| api_error("users.info", "user_not_found"))
    }

    fn list_users(&self, cursor: Option<&str>) -> Result<Page<Member>> {
        self.record(format!("users.list:{}", cursor.unwrap_or("")));
        lookup(&self.members, cursor, "users.list")
    }

    fn download_file(&self, url: &str) -> Result<Vec<u8>> {
        self.record(format!("download:{url}"));
        self.files.get(url).cloned().ok_or_else(|| AppError::HttpStatus {
            method: "file download".to_string(),
            status: 404,
            body: url.to_string(),
        })
    }
}
