//! Identity cache with lazy remote lookups

use crate::error::Result;
use crate::metadata::types::{CacheStats, Conversation, EntityKind};
use crate::slack::{ChannelId, UserId};
use std::collections::HashMap;
use std::sync::Arc;

/// Remote source of display names.
///
/// `SlackClient` is the production implementation; tests plug in fakes.
#[allow(async_fn_in_trait)]
pub trait Directory {
    /// Preferred display name of a user
    async fn user_name(&self, user: &UserId) -> Result<String>;

    /// Name or DM counterpart of a conversation
    async fn conversation(&self, channel: &ChannelId) -> Result<Conversation>;

    /// Every user group as `(id, handle)`
    async fn user_groups(&self) -> Result<Vec<(String, String)>>;
}

/// Mapping from opaque entity id to display name.
///
/// Entries never expire; a value is replaced only by an explicit `insert`
/// from a live update event or a later preload. Failed lookups store
/// nothing, so the next reference asks the directory again.
pub struct IdentityCache<D> {
    directory: Arc<D>,
    names: HashMap<String, String>,
    stats: CacheStats,
}

impl<D: Directory> IdentityCache<D> {
    pub fn new(directory: Arc<D>) -> Self {
        Self {
            directory,
            names: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    pub fn insert(&mut self, id: impl Into<String>, name: impl Into<String>) {
        let id = id.into();
        let name = name.into();
        if id.is_empty() {
            return;
        }
        tracing::trace!(id = %id, name = %name, "Identity updated");
        self.names.insert(id, name);
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Display name for `id`, fetching it on a miss when `kind` allows.
    ///
    /// Falls back to the raw id when the name cannot be determined.
    pub async fn resolve(&mut self, kind: EntityKind, id: &str) -> String {
        let name = match kind {
            EntityKind::User => self.lookup_user(id).await,
            EntityKind::Channel => self.lookup_channel(id).await,
            EntityKind::UserGroup | EntityKind::Bot => self.get(id).map(str::to_string),
        };
        name.unwrap_or_else(|| id.to_string())
    }

    pub async fn resolve_user(&mut self, id: &str) -> String {
        self.resolve(EntityKind::User, id).await
    }

    pub async fn resolve_channel(&mut self, id: &str) -> String {
        self.resolve(EntityKind::Channel, id).await
    }

    /// Cached or fetched user name; `None` when the lookup failed
    pub async fn lookup_user(&mut self, id: &str) -> Option<String> {
        if id.is_empty() {
            return None;
        }

        if let Some(name) = self.names.get(id) {
            self.stats.user_hits += 1;
            tracing::trace!(user_id = %id, user = %name, "User cache hit");
            return Some(name.clone());
        }

        self.stats.user_misses += 1;
        self.stats.api_calls += 1;
        tracing::debug!(user_id = %id, "User cache miss, fetching from Slack API");

        let fetched = self.directory.user_name(&UserId::new(id)).await;
        match fetched {
            Ok(name) => {
                tracing::info!(user_id = %id, user = %name, "Fetched and cached user info");
                self.names.insert(id.to_string(), name.clone());
                Some(name)
            }
            Err(e) => {
                self.stats.api_errors += 1;
                tracing::warn!(
                    user_id = %id,
                    error = %e,
                    "Failed to fetch user info, will use ID as fallback"
                );
                None
            }
        }
    }

    /// Cached or fetched channel name; DMs resolve through their counterpart user
    pub async fn lookup_channel(&mut self, id: &str) -> Option<String> {
        if id.is_empty() {
            return None;
        }

        if let Some(name) = self.names.get(id) {
            self.stats.channel_hits += 1;
            tracing::trace!(channel_id = %id, channel = %name, "Channel cache hit");
            return Some(name.clone());
        }

        self.stats.channel_misses += 1;
        self.stats.api_calls += 1;
        tracing::debug!(channel_id = %id, "Channel cache miss, fetching from Slack API");

        let fetched = self.directory.conversation(&ChannelId::new(id)).await;
        let name = match fetched {
            Ok(Conversation::Named(name)) => name,
            Ok(Conversation::Direct { user_id }) => self.lookup_user(&user_id).await?,
            Ok(Conversation::Unnamed) => {
                tracing::debug!(channel_id = %id, "Conversation has no name or counterpart");
                return None;
            }
            Err(e) => {
                self.stats.api_errors += 1;
                tracing::warn!(
                    channel_id = %id,
                    error = %e,
                    "Failed to fetch channel info, will use ID as fallback"
                );
                return None;
            }
        };

        tracing::info!(channel_id = %id, channel = %name, "Fetched and cached channel info");
        self.names.insert(id.to_string(), name.clone());
        Some(name)
    }

    /// Bulk-load user groups so `<!subteam^…>` mentions can be expanded
    pub async fn preload(&mut self) -> Result<usize> {
        self.stats.api_calls += 1;
        let groups = match self.directory.user_groups().await {
            Ok(groups) => groups,
            Err(e) => {
                self.stats.api_errors += 1;
                return Err(e);
            }
        };

        let count = groups.len();
        for (id, handle) in groups {
            self.insert(id, handle);
        }

        tracing::info!(user_groups = count, "Preloaded user groups");
        Ok(count)
    }

    /// Log cache statistics
    pub fn log_stats(&self) {
        tracing::debug!(
            entries = self.names.len(),
            channel_hit_rate = self.stats.channel_hit_rate(),
            user_hit_rate = self.stats.user_hit_rate(),
            api_calls = self.stats.api_calls,
            api_errors = self.stats.api_errors,
            "Identity cache statistics"
        );
    }
}
