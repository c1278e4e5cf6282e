use crate::error::{Result, SlackvError};
use crate::metadata::{Directory, IdentityCache};
use crate::render::{RenderRequest, Renderer};
use crate::slack::dispatch::{Dispatcher, truncate_body};
use crate::slack::markup::normalize;
use crate::slack::types::{ApiUser, ApiUserGroup, lenient};
use serde::Deserialize;
use std::io::Write;

/// One RTM frame, discriminated by its `type` field.
///
/// Anything not listed decodes to `Other` and is ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RtmEvent {
    Hello,
    Goodbye,
    Error {
        #[serde(default, deserialize_with = "lenient")]
        error: Option<RtmErrorBody>,
    },
    Message(MessageFrame),
    BotAdded {
        #[serde(default, deserialize_with = "lenient")]
        bot: Option<NamedEntity>,
    },
    BotChanged {
        #[serde(default, deserialize_with = "lenient")]
        bot: Option<NamedEntity>,
    },
    ChannelCreated {
        #[serde(default, deserialize_with = "lenient")]
        channel: Option<NamedEntity>,
    },
    ChannelJoined {
        #[serde(default, deserialize_with = "lenient")]
        channel: Option<NamedEntity>,
    },
    ChannelRename {
        #[serde(default, deserialize_with = "lenient")]
        channel: Option<NamedEntity>,
    },
    GroupJoined {
        #[serde(default, deserialize_with = "lenient")]
        channel: Option<NamedEntity>,
    },
    GroupRename {
        #[serde(default, deserialize_with = "lenient")]
        channel: Option<NamedEntity>,
    },
    TeamJoin {
        #[serde(default, deserialize_with = "lenient")]
        user: Option<ApiUser>,
    },
    UserChange {
        #[serde(default, deserialize_with = "lenient")]
        user: Option<ApiUser>,
    },
    SubteamCreated {
        #[serde(default, deserialize_with = "lenient")]
        subteam: Option<ApiUserGroup>,
    },
    SubteamUpdated {
        #[serde(default, deserialize_with = "lenient")]
        subteam: Option<ApiUserGroup>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RtmErrorBody {
    #[serde(deserialize_with = "lenient")]
    pub code: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub msg: Option<String>,
}

/// `{id, name}` object carried by bot and channel events
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NamedEntity {
    #[serde(deserialize_with = "lenient")]
    pub id: String,
    #[serde(deserialize_with = "lenient")]
    pub name: String,
}

/// Raw `message` frame. Every field is optional; which ones matter depends
/// on the subtype, see [`MessageEvent`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MessageFrame {
    #[serde(deserialize_with = "lenient")]
    pub subtype: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub channel: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub user: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub bot_id: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub app_id: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub username: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub text: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub ts: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub thread_ts: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub attachments: Option<Vec<Attachment>>,
    #[serde(deserialize_with = "lenient")]
    pub file: Option<FileObject>,
    #[serde(deserialize_with = "lenient")]
    pub files: Option<Vec<FileObject>>,
    #[serde(deserialize_with = "lenient")]
    pub comment: Option<Comment>,
    #[serde(deserialize_with = "lenient")]
    pub message: Option<Box<MessageFrame>>,
    #[serde(deserialize_with = "lenient")]
    pub previous_message: Option<Box<MessageFrame>>,
}

impl MessageFrame {
    pub fn first_attachment(&self) -> Option<&Attachment> {
        self.attachments.as_ref().and_then(|a| a.first())
    }

    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Attachment {
    #[serde(deserialize_with = "lenient")]
    pub service_name: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub author_name: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub footer: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub text: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub fallback: Option<String>,
}

impl Attachment {
    /// `service: author title (footer)`, each part only when supplied
    pub fn header(&self) -> String {
        let mut header = String::new();
        if let Some(service) = &self.service_name {
            header.push_str(service);
            header.push_str(": ");
        }
        if let Some(author) = &self.author_name {
            header.push_str(author);
            header.push(' ');
        }
        if let Some(title) = &self.title {
            header.push_str(title);
            header.push(' ');
        }
        if let Some(footer) = &self.footer {
            header.push_str(" (");
            header.push_str(footer);
            header.push_str(") ");
        }
        header.trim().to_string()
    }

    /// Attachment text, falling back to its plain-text summary
    pub fn content(&self) -> &str {
        self.text
            .as_deref()
            .or(self.fallback.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileObject {
    #[serde(deserialize_with = "lenient")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub preview: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub preview_is_truncated: Option<bool>,
}

impl FileObject {
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Comment {
    #[serde(deserialize_with = "lenient")]
    pub user: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub comment: Option<String>,
}

/// A `message` frame classified by subtype, carrying the parts each kind needs
#[derive(Debug, Clone)]
pub enum MessageEvent {
    Plain(MessageFrame),
    Bot(MessageFrame),
    FileShare {
        frame: MessageFrame,
        file: FileObject,
    },
    FileComment {
        frame: MessageFrame,
        file: FileObject,
        comment: Comment,
    },
    Me(MessageFrame),
    Changed {
        frame: MessageFrame,
        message: MessageFrame,
        previous: MessageFrame,
    },
}

impl MessageEvent {
    /// `None` for dropped subtypes or frames missing what their subtype needs
    pub fn classify(mut frame: MessageFrame) -> Option<Self> {
        let event = match frame.subtype.as_deref() {
            Some("bot_message") => MessageEvent::Bot(frame),
            Some("me_message") => MessageEvent::Me(frame),
            Some("file_share") => {
                let file = frame
                    .file
                    .take()
                    .or_else(|| frame.files.as_mut().and_then(|f| f.drain(..).next()))?;
                MessageEvent::FileShare { frame, file }
            }
            Some("file_comment") => {
                let file = frame.file.take()?;
                let comment = frame.comment.take()?;
                MessageEvent::FileComment {
                    frame,
                    file,
                    comment,
                }
            }
            Some("message_changed") => {
                let message = *frame.message.take()?;
                let previous = *frame.previous_message.take()?;
                MessageEvent::Changed {
                    frame,
                    message,
                    previous,
                }
            }
            Some("file_mention" | "message_replied" | "thread_broadcast") => return None,
            _ if frame.text.is_some() => MessageEvent::Plain(frame),
            _ => return None,
        };
        Some(event)
    }
}

/// Decodes raw frames and drives them through dispatch, normalization and rendering
pub struct EventHandler<D, W> {
    dispatcher: Dispatcher<D>,
    renderer: Renderer<W>,
}

impl<D: Directory, W: Write> EventHandler<D, W> {
    pub fn new(cache: IdentityCache<D>, renderer: Renderer<W>) -> Self {
        Self {
            dispatcher: Dispatcher::new(cache),
            renderer,
        }
    }

    pub fn cache(&self) -> &IdentityCache<D> {
        self.dispatcher.cache()
    }

    pub fn renderer(&self) -> &Renderer<W> {
        &self.renderer
    }

    /// Bulk-load entities that are never looked up individually
    pub async fn preload(&mut self) -> Result<usize> {
        self.dispatcher.cache_mut().preload().await
    }

    pub fn notice(&mut self, text: &str) -> Result<()> {
        Ok(self.renderer.notice(text)?)
    }

    /// Process one raw text frame.
    ///
    /// Non-JSON input is an error that ends the stream; JSON that does not
    /// fit any known shape is skipped.
    pub async fn handle_frame(&mut self, raw: &str) -> Result<()> {
        let value: serde_json::Value = serde_json::from_str(raw)?;

        let event = match serde_json::from_value::<RtmEvent>(value) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(error = %e, "Skipping undecodable frame");
                return Ok(());
            }
        };

        self.handle_event(event).await
    }

    pub async fn handle_event(&mut self, event: RtmEvent) -> Result<()> {
        match event {
            RtmEvent::Hello => {
                tracing::info!("RTM stream ready");
                self.notice("Connected!")?;
            }
            RtmEvent::Goodbye => {
                return Err(SlackvError::ConnectionClosed(
                    "server sent goodbye".to_string(),
                ));
            }
            RtmEvent::Error { error } => {
                let error = error.unwrap_or_default();
                tracing::warn!(
                    code = ?error.code,
                    message = %error.msg.unwrap_or_default(),
                    "RTM error event"
                );
            }
            event => {
                let requests = self.dispatcher.handle(event).await;
                for request in requests {
                    self.render(request).await?;
                }
            }
        }
        Ok(())
    }

    async fn render(&mut self, mut request: RenderRequest) -> Result<()> {
        let cache = self.dispatcher.cache_mut();
        request.body = truncate_body(normalize(&request.body, cache).await);
        if let Some(title) = request.title.take() {
            request.title = Some(normalize(&title, cache).await);
        }

        self.renderer.render(&request)?;
        Ok(())
    }
}
