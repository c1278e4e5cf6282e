use crate::error::{Result, SlackvError};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const DEFAULT_API_BASE_URL: &str = "https://slack.com/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone)]
pub struct Settings {
    pub slack: SlackConfig,
    pub notification: NotificationConfig,
}

#[derive(Debug, Clone)]
pub struct SlackConfig {
    pub token: String,
    pub api_base_url: String,
    pub request_timeout_secs: u64,
}

/// Highlight and mute lists as written in `[notification]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct NotificationConfig {
    pub patterns: Vec<String>,
    pub mute_channels: Vec<String>,
    pub mute_users: Vec<String>,
}

/// Compiled notification rules, read-only for the whole run
#[derive(Debug, Clone, Default)]
pub struct Notifications {
    pub patterns: Vec<Regex>,
    pub mute_channels: HashSet<String>,
    pub mute_users: HashSet<String>,
}

impl NotificationConfig {
    /// Compile highlight patterns. Invalid expressions are skipped with a warning.
    pub fn compile(&self) -> Notifications {
        let patterns = self
            .patterns
            .iter()
            .filter_map(|pattern| match Regex::new(pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!(
                        pattern = %pattern,
                        error = %e,
                        "Ignoring invalid highlight pattern"
                    );
                    None
                }
            })
            .collect();

        Notifications {
            patterns,
            mute_channels: self.mute_channels.iter().cloned().collect(),
            mute_users: self.mute_users.iter().cloned().collect(),
        }
    }
}

impl Notifications {
    pub fn is_channel_muted(&self, channel: &str) -> bool {
        self.mute_channels.contains(channel)
    }

    pub fn is_user_muted(&self, user: &str) -> bool {
        self.mute_users.contains(user)
    }

    pub fn is_highlighted(&self, text: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(text))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    general: GeneralSection,
    notification: NotificationConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct GeneralSection {
    token: Option<String>,
    api_base_url: Option<String>,
    timeout_secs: Option<u64>,
}

/// Load settings from `SLACKV_CONFIG` (default `./config.toml`).
///
/// `SLACK_TOKEN` from the environment or `.env` overrides `general.token`.
pub fn load_settings() -> Result<Settings> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let path: PathBuf = std::env::var("SLACKV_CONFIG")
        .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
        .into();
    let token_override = std::env::var("SLACK_TOKEN").ok().filter(|t| !t.is_empty());

    load_settings_from(&path, token_override)
}

pub fn load_settings_from(path: &Path, token_override: Option<String>) -> Result<Settings> {
    let file = match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str::<ConfigFile>(&content).map_err(|e| {
            SlackvError::Config(format!("Invalid config file {}: {}", path.display(), e))
        })?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && token_override.is_some() => {
            tracing::debug!(path = %path.display(), "No config file, using environment only");
            ConfigFile::default()
        }
        Err(e) => {
            return Err(SlackvError::Config(format!(
                "Cannot read config file {}: {}",
                path.display(),
                e
            )));
        }
    };

    let token = token_override
        .or(file.general.token)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            SlackvError::Config("general.token or SLACK_TOKEN must be set".to_string())
        })?;

    let request_timeout_secs = file.general.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
    if request_timeout_secs == 0 {
        return Err(SlackvError::Config(
            "general.timeout-secs must be greater than zero".to_string(),
        ));
    }

    let slack = SlackConfig {
        token,
        api_base_url: file
            .general
            .api_base_url
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string(),
        request_timeout_secs,
    };

    Ok(Settings {
        slack,
        notification: file.notification,
    })
}
