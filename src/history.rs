//! Paging through channel history and thread replies.

use std::sync::Arc;

use crate::error::Result;
use crate::gateway::{HistoryRange, RawMessage, SlackApi};
use crate::pagination::{Page, collect_all, for_each_page};

/// Walks one channel's history for an export run.
pub struct HistoryWalker<A> {
    api: Arc<A>,
}

impl<A: SlackApi> HistoryWalker<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    /// Page through the channel's history, handing each page of top-level messages to
    /// `on_page` in the order the platform returns them.
    pub fn walk<F>(&self, channel_id: &str, range: &HistoryRange, on_page: F) -> Result<()>
    where
        F: FnMut(Vec<RawMessage>) -> Result<()>,
    {
        for_each_page(
            |cursor| self.fetch_history_page(channel_id, range, cursor),
            on_page,
        )
    }

    /// Fetch a whole thread. The platform includes the parent as the first message.
    pub fn fetch_replies(&self, channel_id: &str, thread_ts: &str) -> Result<Vec<RawMessage>> {
        collect_all(|cursor| self.api.get_replies(channel_id, thread_ts, cursor))
    }

    /// Fetch one history page, joining the channel and retrying once if the token is not a
    /// member yet.
    fn fetch_history_page(
        &self,
        channel_id: &str,
        range: &HistoryRange,
        cursor: Option<&str>,
    ) -> Result<Page<RawMessage>> {
        match self.api.get_history(channel_id, range, cursor) {
            Err(err) if err.is_not_in_channel() => {
                tracing::info!(channel_id = %channel_id, "not in channel, attempting to join");
                self.api
                    .join_channel(channel_id)
                    .map_err(|e| e.context(format!("failed to auto-join channel {channel_id}")))?;
                tracing::info!(channel_id = %channel_id, "joined channel, retrying");

                self.api.get_history(channel_id, range, cursor)
            }
            other => other,
        }
    }
}
