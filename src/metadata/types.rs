//! Identity types shared by the cache and the directory backends

/// Kind of entity an opaque id refers to.
///
/// Only users and channels can be looked up remotely; group and bot names
/// come exclusively from preload and live update events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    User,
    Channel,
    UserGroup,
    Bot,
}

impl EntityKind {
    pub fn is_remote(&self) -> bool {
        matches!(self, EntityKind::User | EntityKind::Channel)
    }
}

/// Result of a conversation lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversation {
    /// Public/private channel or multi-party DM with a name
    Named(String),
    /// Direct message; displayed as the counterpart user
    Direct { user_id: String },
    /// Neither a name nor a counterpart was returned
    Unnamed,
}

/// Cache statistics for monitoring
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub channel_hits: u64,
    pub channel_misses: u64,
    pub user_hits: u64,
    pub user_misses: u64,
    pub api_calls: u64,
    pub api_errors: u64,
}

impl CacheStats {
    pub fn channel_hit_rate(&self) -> u32 {
        percent(self.channel_hits, self.channel_misses)
    }

    pub fn user_hit_rate(&self) -> u32 {
        percent(self.user_hits, self.user_misses)
    }
}

fn percent(hits: u64, misses: u64) -> u32 {
    if hits + misses > 0 {
        (hits as f32 / (hits + misses) as f32 * 100.0) as u32
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_kinds() {
        assert!(EntityKind::User.is_remote());
        assert!(EntityKind::Channel.is_remote());
        assert!(!EntityKind::UserGroup.is_remote());
        assert!(!EntityKind::Bot.is_remote());
    }

    #[test]
    fn test_hit_rates() {
        let stats = CacheStats {
            channel_hits: 3,
            channel_misses: 1,
            ..Default::default()
        };
        assert_eq!(stats.channel_hit_rate(), 75);
        assert_eq!(stats.user_hit_rate(), 0);
    }
}
