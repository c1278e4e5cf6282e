//! Terminal transcript rendering
//!
//! Applies mute filters, decides when a header block is needed, highlights
//! matching bodies and writes each entry in a single write so a line is
//! either printed completely or not at all.

mod entry;
pub mod style;

pub use entry::{Annotation, BodyStyle, RenderRequest, SenderFlags};

use crate::config::Notifications;
use crate::slack::SlackTs;
use std::io::{self, Write};
use style::{ACTION, HEADER, HIGHLIGHT, boxed_title, paint};

/// What was rendered last; decides whether the next entry needs a header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderState {
    pub last_channel: String,
    pub last_user: String,
    pub last_thread_ts: SlackTs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Header {
    None,
    Sender,
    /// New channel: blank separator line, then the header
    Channel,
}

pub struct Renderer<W> {
    out: W,
    rules: Notifications,
    state: RenderState,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W, rules: Notifications) -> Self {
        Self {
            out,
            rules,
            state: RenderState::default(),
        }
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn writer(&self) -> &W {
        &self.out
    }

    /// Plain status line such as `Connected!`
    pub fn notice(&mut self, text: &str) -> io::Result<()> {
        self.out.write_all(format!("{}\n", text).as_bytes())?;
        self.out.flush()
    }

    /// Render one entry. Returns `false` when it was suppressed.
    pub fn render(&mut self, req: &RenderRequest) -> io::Result<bool> {
        let rendered = match self.suppression(req) {
            Some(reason) => {
                tracing::trace!(
                    reason = reason,
                    channel = %req.channel,
                    user = %req.user,
                    "Entry suppressed"
                );
                false
            }
            None => {
                let output = self.format(req);
                self.out.write_all(output.as_bytes())?;
                self.out.flush()?;

                self.state.last_channel = req.channel.clone();
                self.state.last_user = req.user.clone();
                self.state.last_thread_ts = req.thread_ts;
                true
            }
        };

        if req.reset_sender {
            self.state.last_user.clear();
        }

        Ok(rendered)
    }

    fn suppression(&self, req: &RenderRequest) -> Option<&'static str> {
        if self.rules.is_channel_muted(&req.channel) {
            Some("muted channel")
        } else if self.rules.is_user_muted(&req.user) {
            Some("muted user")
        } else if req.is_empty() {
            Some("empty body")
        } else {
            None
        }
    }

    fn header_kind(&self, req: &RenderRequest) -> Header {
        if req.channel != self.state.last_channel {
            Header::Channel
        } else if req.user != self.state.last_user || req.thread_ts != self.state.last_thread_ts {
            Header::Sender
        } else {
            Header::None
        }
    }

    fn format(&self, req: &RenderRequest) -> String {
        let mut output = String::new();

        let header = self.header_kind(req);
        if header == Header::Channel {
            output.push('\n');
        }
        if header != Header::None {
            output.push_str(&header_line(req));
            output.push('\n');
        }

        let title = req.title.as_deref().filter(|t| !t.is_empty());
        let body = match req.style {
            BodyStyle::Action if !req.body.is_empty() => paint(ACTION, &req.body),
            _ => req.body.clone(),
        };

        let mut text = String::new();
        if let Some(title) = title {
            text.push_str(&boxed_title(title));
            if !body.is_empty() {
                text.push('\n');
            }
        }
        text.push_str(&body);

        let plain = match title {
            Some(title) => format!("{}\n{}", title, req.body),
            None => req.body.clone(),
        };
        if self.rules.is_highlighted(&plain) {
            text = paint(HIGHLIGHT, &text);
        }

        output.push_str(&text);
        if req.annotation == Annotation::Edited {
            output.push(' ');
            output.push_str(&paint(HEADER, "(edited)"));
        }
        output.push('\n');
        output
    }
}

fn header_line(req: &RenderRequest) -> String {
    let mut when = req.timestamp.format_local();
    if req.thread_ts.is_set() {
        when.push_str(&format!(" [at {}]", req.thread_ts.format_local()));
    }

    paint(
        HEADER,
        &format!(
            "@{:<18} #{:<20} {}",
            format!("{}{}", req.flags, req.user),
            req.channel,
            when
        ),
    )
}
