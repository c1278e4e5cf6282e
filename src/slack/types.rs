use chrono::{DateTime, Local};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Slack timestamp truncated to whole seconds.
///
/// Slack sends `"1355517523.000005"`; zero means the field was absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SlackTs(i64);

impl SlackTs {
    pub const UNSET: SlackTs = SlackTs(0);

    pub fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    /// Parse an optional raw timestamp; absent or garbage yields `UNSET`
    pub fn parse(raw: Option<&str>) -> Self {
        raw.and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|f| f.is_finite())
            .map(|f| Self(f as i64))
            .unwrap_or_default()
    }

    pub fn is_set(&self) -> bool {
        self.0 != 0
    }

    pub fn as_secs(&self) -> i64 {
        self.0
    }

    /// Local wall-clock rendering, e.g. `2024/01/31 09:15:00`
    pub fn format_local(&self) -> String {
        DateTime::from_timestamp(self.0, 0)
            .map(|dt| {
                dt.with_timezone(&Local)
                    .format("%Y/%m/%d %H:%M:%S")
                    .to_string()
            })
            .unwrap_or_default()
    }
}

impl fmt::Display for SlackTs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Field decoder that falls back to the default when the value has an
/// unexpected shape, such as `null` or a number where a string belongs.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

// Web API payloads. Only the fields this client reads are modelled.

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RtmConnectResponse {
    pub url: String,
    #[serde(rename = "self")]
    pub self_info: Option<Identity>,
    pub team: Option<TeamInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Identity {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TeamInfo {
    pub id: String,
    pub name: String,
    pub domain: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UsersInfoResponse {
    pub user: ApiUser,
}

/// User object as returned by `users.info` and pushed by `user_change`/`team_join`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiUser {
    #[serde(deserialize_with = "lenient")]
    pub id: String,
    #[serde(deserialize_with = "lenient")]
    pub name: String,
    #[serde(deserialize_with = "lenient")]
    pub profile: Option<ApiProfile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiProfile {
    #[serde(deserialize_with = "lenient")]
    pub display_name: Option<String>,
}

impl ApiUser {
    /// Preferred display name, falling back to the account name
    pub fn best_name(&self) -> &str {
        self.profile
            .as_ref()
            .and_then(|p| p.display_name.as_deref())
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConversationsInfoResponse {
    pub channel: ApiChannel,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiChannel {
    pub id: String,
    pub name: Option<String>,
    /// Counterpart of a direct message conversation
    pub user: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserGroupsListResponse {
    pub usergroups: Vec<ApiUserGroup>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiUserGroup {
    #[serde(deserialize_with = "lenient")]
    pub id: String,
    /// Mention handle, e.g. `backend-team`
    #[serde(deserialize_with = "lenient")]
    pub handle: String,
    /// Long descriptive name
    #[serde(deserialize_with = "lenient")]
    pub name: String,
}
