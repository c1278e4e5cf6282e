use crate::config::SlackConfig;
use crate::error::{Result, SlackvError};
use crate::logging::Timer;
use crate::metadata::{Conversation, Directory};
use crate::slack::types::{
    ConversationsInfoResponse, RtmConnectResponse, UserGroupsListResponse, UsersInfoResponse,
};
use crate::slack::{ChannelId, UserId};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Thin Slack Web API client.
///
/// Every call is a form-encoded POST with a bearer token, bounded by the
/// configured request timeout. Responses with `"ok": false` become
/// `SlackvError::SlackApi` carrying the service's error code.
pub struct SlackClient {
    http: reqwest::Client,
    token: String,
    base_url: String,
    timeout: Duration,
}

impl SlackClient {
    pub fn new(config: SlackConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            token: config.token,
            base_url: config.api_base_url,
            timeout,
        })
    }

    /// Bound applied to each HTTP call and reused for the WebSocket handshake
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Authenticate and obtain the RTM WebSocket URL
    pub async fn rtm_connect(&self) -> Result<RtmConnectResponse> {
        let session: RtmConnectResponse = self.call("rtm.connect", &[]).await?;
        if session.url.is_empty() {
            return Err(SlackvError::SlackApi(
                "rtm.connect: response has no url".to_string(),
            ));
        }
        Ok(session)
    }

    /// List every user group of the workspace
    pub async fn list_user_groups(&self) -> Result<UserGroupsListResponse> {
        self.call("usergroups.list", &[]).await
    }

    /// Get user information from Slack API
    pub async fn get_user_info(&self, user_id: &UserId) -> Result<UsersInfoResponse> {
        self.call("users.info", &[("user", user_id.as_str())]).await
    }

    /// Get channel information from Slack API
    pub async fn get_channel_info(&self, channel_id: &ChannelId) -> Result<ConversationsInfoResponse> {
        self.call("conversations.info", &[("channel", channel_id.as_str())])
            .await
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: &[(&str, &str)]) -> Result<T> {
        let _timer = Timer::new(method).slow_after(self.timeout / 2);
        let url = format!("{}/{}", self.base_url, method);

        tracing::debug!(method = %method, "Calling Slack Web API");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .form(params)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| classify(method, e))?;

        let body: serde_json::Value = response.json().await.map_err(|e| classify(method, e))?;

        if !body.get("ok").and_then(|v| v.as_bool()).unwrap_or(false) {
            let error = body
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown_error");
            return Err(SlackvError::SlackApi(format!("{}: {}", method, error)));
        }

        Ok(serde_json::from_value(body)?)
    }
}

fn classify(method: &str, error: reqwest::Error) -> SlackvError {
    if error.is_timeout() {
        SlackvError::Timeout(method.to_string())
    } else {
        SlackvError::Http(error)
    }
}

impl Directory for SlackClient {
    async fn user_name(&self, user: &UserId) -> Result<String> {
        let response = self.get_user_info(user).await?;
        Ok(response.user.best_name().to_string())
    }

    async fn conversation(&self, channel: &ChannelId) -> Result<Conversation> {
        let channel = self.get_channel_info(channel).await?.channel;

        let conversation = match (channel.name, channel.user) {
            (Some(name), _) if !name.is_empty() => Conversation::Named(name),
            (_, Some(user_id)) if !user_id.is_empty() => Conversation::Direct { user_id },
            _ => Conversation::Unnamed,
        };
        Ok(conversation)
    }

    async fn user_groups(&self) -> Result<Vec<(String, String)>> {
        let response = self.list_user_groups().await?;
        Ok(response
            .usergroups
            .into_iter()
            .filter(|g| !g.id.is_empty())
            .map(|g| (g.id, g.handle))
            .collect())
    }
}
