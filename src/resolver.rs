//! Channel-name and user-name to ID resolution with lazily refreshed caches.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{AppError, Result};
use crate::gateway::SlackApi;
use crate::pagination::for_each_page;

/// Prefixes of platform channel IDs: public, private (legacy group) and direct message.
const CHANNEL_ID_PREFIXES: [char; 3] = ['C', 'G', 'D'];

/// Whether `name` already has the shape of a Slack channel ID, e.g. `C024BE91L`.
pub fn looks_like_channel_id(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if CHANNEL_ID_PREFIXES.contains(&first) => {}
        _ => return false,
    }
    let rest = chars.as_str();
    !rest.is_empty()
        && rest
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // the caches hold plain maps, so a poisoned lock still has usable data
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Resolves names to IDs for one provider instance.
///
/// Both caches are name-keyed and only ever replaced wholesale: a miss triggers one full
/// listing that overwrites the whole map, so channels removed remotely drop out too.
pub struct NameResolver<A> {
    api: Arc<A>,
    channel_ids: Mutex<Option<HashMap<String, String>>>,
    user_ids: Mutex<Option<HashMap<String, String>>>,
}

impl<A: SlackApi> NameResolver<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            channel_ids: Mutex::new(None),
            user_ids: Mutex::new(None),
        }
    }

    /// Resolve `#name`, `name` or a raw channel ID to a channel ID.
    pub fn resolve_channel_id(&self, name: &str) -> Result<String> {
        let name = name.strip_prefix('#').unwrap_or(name);

        if let Some(id) = self.cached_channel_id(name) {
            return Ok(id);
        }

        if looks_like_channel_id(name) {
            tracing::debug!(channel = %name, "using name as channel ID");
            return Ok(name.to_string());
        }

        tracing::debug!(channel = %name, "channel not in cache, refreshing");
        self.refresh_channels()
            .map_err(|e| e.context("failed to refresh channel list"))?;

        if let Some(id) = self.cached_channel_id(name) {
            return Ok(id);
        }

        Err(AppError::ChannelNotFound(name.to_string()))
    }

    /// Resolve `@name` or `name` to a user ID among active human members.
    pub fn resolve_user_id(&self, name: &str) -> Result<String> {
        let clean = name.strip_prefix('@').unwrap_or(name);

        if let Some(id) = self.cached_user_id(clean) {
            return Ok(id);
        }

        tracing::debug!(user = %clean, "user not in cache, refreshing");
        self.refresh_users()
            .map_err(|e| e.context("failed to refresh user list"))?;

        self.cached_user_id(clean)
            .ok_or_else(|| AppError::UserNotFound(name.to_string()))
    }

    /// All known channel names, `#`-prefixed and sorted.
    pub fn list_channels(&self) -> Result<Vec<String>> {
        if lock(&self.channel_ids).is_none() {
            self.refresh_channels()?;
        }

        let mut names: Vec<String> = lock(&self.channel_ids)
            .iter()
            .flat_map(|cache| cache.keys())
            .map(|name| format!("#{name}"))
            .collect();
        names.sort();
        Ok(names)
    }

    fn cached_channel_id(&self, name: &str) -> Option<String> {
        lock(&self.channel_ids)
            .as_ref()
            .and_then(|cache| cache.get(name).cloned())
    }

    fn cached_user_id(&self, name: &str) -> Option<String> {
        lock(&self.user_ids)
            .as_ref()
            .and_then(|cache| cache.get(name).cloned())
    }

    fn refresh_channels(&self) -> Result<()> {
        let mut fresh = HashMap::new();
        for_each_page(
            |cursor| self.api.list_channels(cursor),
            |channels| {
                fresh.extend(channels.into_iter().map(|c| (c.name, c.id)));
                Ok(())
            },
        )?;

        tracing::debug!(count = fresh.len(), "channel cache populated");
        *lock(&self.channel_ids) = Some(fresh);
        Ok(())
    }

    fn refresh_users(&self) -> Result<()> {
        let mut fresh = HashMap::new();
        for_each_page(
            |cursor| self.api.list_users(cursor),
            |members| {
                for member in members.into_iter().filter(|m| !m.is_bot && !m.deleted) {
                    fresh.insert(member.lookup_name().to_string(), member.id);
                }
                Ok(())
            },
        )?;

        tracing::debug!(count = fresh.len(), "user cache populated");
        *lock(&self.user_ids) = Some(fresh);
        Ok(())
    }
}
