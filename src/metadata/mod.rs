//! Identity resolution for Slack entities
//!
//! Maps opaque ids (users, channels, groups, bots, user groups) to display
//! names. Users and channels are fetched lazily on first reference; user
//! groups are bulk-loaded after each connection; bots and everything else
//! arrive through live update events.

mod cache;
mod types;

pub use cache::{Directory, IdentityCache};
pub use types::{CacheStats, Conversation, EntityKind};

#[cfg(test)]
pub(crate) use cache::tests::FakeDirectory;
