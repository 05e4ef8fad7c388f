//! Assembling a channel's history and threads into one ordered log.

use std::sync::Arc;

use chrono::Utc;

use crate::enrich::MessageEnricher;
use crate::error::Result;
use crate::gateway::{HistoryRange, RawMessage, SlackApi};
use crate::history::HistoryWalker;
use crate::resolver::NameResolver;
use crate::timestamp::{compare_slack_ts, format_iso8601};
use crate::types::{ExportOptions, ExportedLog, ExportedMessage};

/// Whether a top-level history entry is a thread reply also broadcast to the channel.
/// Those are exported with their thread instead.
fn is_broadcast_reply(raw: &RawMessage) -> bool {
    raw.thread_ts
        .as_deref()
        .is_some_and(|thread_ts| !thread_ts.is_empty() && thread_ts != raw.ts)
}

/// Sort by numeric Slack timestamp. Stable, so equal timestamps keep arrival order.
pub fn sort_chronologically(messages: &mut [ExportedMessage]) {
    messages.sort_by(|a, b| compare_slack_ts(&a.timestamp_unix, &b.timestamp_unix));
}

/// Exports channel logs through one provider connection.
///
/// The channel and user ID caches live as long as the exporter; display names are cached
/// per export run.
pub struct Exporter<A> {
    api: Arc<A>,
    resolver: NameResolver<A>,
}

impl<A: SlackApi> Exporter<A> {
    pub fn new(api: Arc<A>) -> Self {
        let resolver = NameResolver::new(api.clone());
        Self { api, resolver }
    }

    /// Export the whole history of `options.channel_name`, threads included.
    ///
    /// Fails if the channel cannot be resolved or any history or thread page cannot be
    /// fetched; problems with individual messages only produce warnings.
    pub fn export_log(&self, options: &ExportOptions) -> Result<ExportedLog> {
        let channel_id = self
            .resolver
            .resolve_channel_id(&options.channel_name)
            .map_err(|e| {
                e.context(format!(
                    "failed to resolve channel ID for \"{}\"",
                    options.channel_name
                ))
            })?;

        let walker = HistoryWalker::new(self.api.clone());
        let download_dir = options
            .include_files
            .then(|| options.output_dir.clone());
        let enricher = MessageEnricher::new(self.api.clone(), download_dir);
        let range = HistoryRange {
            oldest: options.start_time.clone(),
            latest: options.end_time.clone(),
        };

        tracing::info!(
            channel = %options.channel_name,
            channel_id = %channel_id,
            "exporting channel history"
        );

        let mut messages = Vec::new();
        let mut threads = 0usize;

        walker.walk(&channel_id, &range, |page| {
            for raw in page {
                if raw.reply_count > 0 {
                    threads += 1;
                    messages.push(enricher.build_exported_message(&raw));

                    let thread = walker.fetch_replies(&channel_id, &raw.ts).map_err(|e| {
                        e.context(format!("failed to fetch replies for thread {}", raw.ts))
                    })?;
                    messages.extend(
                        thread
                            .iter()
                            .filter(|reply| reply.ts != raw.ts)
                            .map(|reply| enricher.build_exported_message(reply)),
                    );
                } else if !is_broadcast_reply(&raw) {
                    messages.push(enricher.build_exported_message(&raw));
                }
            }
            Ok(())
        })?;

        sort_chronologically(&mut messages);

        tracing::info!(
            channel = %options.channel_name,
            messages = messages.len(),
            threads,
            users = enricher.names().resolved(),
            "export finished"
        );

        Ok(ExportedLog {
            export_timestamp: format_iso8601(Utc::now()),
            channel_name: options.channel_name.clone(),
            messages,
        })
    }
}
