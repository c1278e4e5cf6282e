use crate::slack::SlackTs;
use std::fmt;

/// Sender annotations shown before the user name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SenderFlags {
    pub bot: bool,
    pub app: bool,
}

impl fmt::Display for SenderFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bot {
            f.write_str("[bot]")?;
        }
        if self.app {
            f.write_str("[app]")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BodyStyle {
    #[default]
    Plain,
    /// `/me` style action
    Action,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Annotation {
    #[default]
    None,
    Edited,
}

/// One transcript entry produced by the dispatcher
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderRequest {
    pub timestamp: SlackTs,
    /// `UNSET` when the message is not part of a thread
    pub thread_ts: SlackTs,
    pub channel: String,
    pub flags: SenderFlags,
    pub user: String,
    /// Attachment or file header, printed boxed above the body
    pub title: Option<String>,
    pub body: String,
    pub style: BodyStyle,
    pub annotation: Annotation,
    /// Force the header on the next entry regardless of sender continuity
    pub reset_sender: bool,
}

impl RenderRequest {
    pub fn is_empty(&self) -> bool {
        self.body.is_empty() && self.title.as_deref().is_none_or(str::is_empty)
    }
}
