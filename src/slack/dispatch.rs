use crate::metadata::{Directory, IdentityCache};
use crate::render::{Annotation, BodyStyle, RenderRequest, SenderFlags};
use crate::slack::events::{Attachment, Comment, FileObject, MessageEvent, MessageFrame, RtmEvent};
use crate::slack::types::SlackTs;

/// Longest body printed before it is cut and marked with `...`
pub const MAX_BODY_CHARS: usize = 1000;

/// Turns decoded events into cache updates and transcript entries.
///
/// Owns the identity cache: maintenance events write to it, message events
/// read from it while resolving channel and sender names.
pub struct Dispatcher<D> {
    cache: IdentityCache<D>,
}

impl<D: Directory> Dispatcher<D> {
    pub fn new(cache: IdentityCache<D>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &IdentityCache<D> {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut IdentityCache<D> {
        &mut self.cache
    }

    /// Handle one event, returning the entries to render in order
    pub async fn handle(&mut self, event: RtmEvent) -> Vec<RenderRequest> {
        match event {
            RtmEvent::BotAdded { bot } | RtmEvent::BotChanged { bot } => {
                if let Some(bot) = bot {
                    self.remember(bot.id, bot.name);
                }
                Vec::new()
            }
            RtmEvent::ChannelCreated { channel }
            | RtmEvent::ChannelJoined { channel }
            | RtmEvent::ChannelRename { channel }
            | RtmEvent::GroupJoined { channel }
            | RtmEvent::GroupRename { channel } => {
                if let Some(channel) = channel {
                    self.remember(channel.id, channel.name);
                }
                Vec::new()
            }
            RtmEvent::TeamJoin { user } | RtmEvent::UserChange { user } => {
                if let Some(user) = user {
                    let name = user.best_name().to_string();
                    self.remember(user.id, name);
                }
                Vec::new()
            }
            RtmEvent::SubteamCreated { subteam } | RtmEvent::SubteamUpdated { subteam } => {
                if let Some(group) = subteam {
                    self.remember(group.id, group.handle);
                }
                Vec::new()
            }
            RtmEvent::Message(frame) => match MessageEvent::classify(frame) {
                Some(message) => self.on_message(message).await,
                None => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    fn remember(&mut self, id: String, name: String) {
        if name.is_empty() {
            tracing::debug!(id = %id, "Ignoring update without a name");
            return;
        }
        self.cache.insert(id, name);
    }

    async fn on_message(&mut self, message: MessageEvent) -> Vec<RenderRequest> {
        match message {
            MessageEvent::Plain(frame) => {
                let mut req = self.base_request(&frame).await;
                req.body = frame.text().to_string();
                vec![req]
            }
            MessageEvent::Me(frame) => {
                let mut req = self.base_request(&frame).await;
                req.body = frame.text().to_string();
                req.style = BodyStyle::Action;
                vec![req]
            }
            MessageEvent::Bot(frame) => vec![self.on_bot_message(frame).await],
            MessageEvent::FileShare { frame, file } => {
                vec![self.on_file_share(frame, file).await]
            }
            MessageEvent::FileComment {
                frame,
                file,
                comment,
            } => vec![self.on_file_comment(frame, file, comment).await],
            MessageEvent::Changed {
                frame,
                message,
                previous,
            } => self.on_message_changed(frame, message, previous).await,
        }
    }

    /// Fields shared by every entry: times, channel, flags and sender
    async fn base_request(&mut self, frame: &MessageFrame) -> RenderRequest {
        let channel = match frame.channel.as_deref() {
            Some(id) => self.cache.resolve_channel(id).await,
            None => String::new(),
        };
        let user = match frame.user.as_deref() {
            Some(id) => self.cache.resolve_user(id).await,
            None => String::new(),
        };

        RenderRequest {
            timestamp: SlackTs::parse(frame.ts.as_deref()),
            thread_ts: SlackTs::parse(frame.thread_ts.as_deref()),
            channel,
            flags: flags_of(frame),
            user,
            ..Default::default()
        }
    }

    async fn on_bot_message(&mut self, frame: MessageFrame) -> RenderRequest {
        let mut req = self.base_request(&frame).await;

        let bot_name = frame
            .bot_id
            .as_deref()
            .and_then(|id| self.cache.get(id))
            .map(str::to_string);
        if let Some(name) = bot_name.or_else(|| frame.username.clone()) {
            req.user = name;
        }

        match frame.first_attachment() {
            Some(attachment) => {
                apply_attachment(&mut req, attachment, frame.text());
                req.reset_sender = true;
            }
            None => req.body = frame.text().to_string(),
        }
        req
    }

    async fn on_file_share(&mut self, frame: MessageFrame, file: FileObject) -> RenderRequest {
        let mut req = self.base_request(&frame).await;

        match &file.preview {
            Some(preview) => {
                req.title = Some(format!("file: {}", file.display_title()));
                req.body = preview.clone();
                if file.preview_is_truncated.unwrap_or(false) {
                    req.body.push_str("...");
                }
            }
            None => req.body = frame.text().to_string(),
        }
        req.reset_sender = true;
        req
    }

    async fn on_file_comment(
        &mut self,
        frame: MessageFrame,
        file: FileObject,
        comment: Comment,
    ) -> RenderRequest {
        let mut req = self.base_request(&frame).await;
        req.user = match comment.user.as_deref() {
            Some(id) => self.cache.resolve_user(id).await,
            None => String::new(),
        };
        req.title = Some(format!("comment to: {}", file.display_title()));
        req.body = comment.comment.unwrap_or_default();
        req.reset_sender = true;
        req
    }

    /// Emit an entry per changed part: text edits are annotated, attachment
    /// changes are shown as a fresh attachment
    async fn on_message_changed(
        &mut self,
        frame: MessageFrame,
        message: MessageFrame,
        previous: MessageFrame,
    ) -> Vec<RenderRequest> {
        let mut base = self.base_request(&frame).await;
        base.timestamp = SlackTs::parse(message.ts.as_deref().or(frame.ts.as_deref()));
        if message.thread_ts.is_some() {
            base.thread_ts = SlackTs::parse(message.thread_ts.as_deref());
        }
        base.flags = SenderFlags {
            bot: base.flags.bot || message.bot_id.is_some(),
            app: base.flags.app || message.app_id.is_some(),
        };
        base.user = match message.user.as_deref() {
            Some(id) => self.cache.resolve_user(id).await,
            None => String::new(),
        };

        let mut requests = Vec::new();

        if message.text() != previous.text() {
            let mut req = base.clone();
            req.body = message.text().to_string();
            req.annotation = Annotation::Edited;
            requests.push(req);
        }

        let current = attachment_digest(message.first_attachment());
        if current != attachment_digest(previous.first_attachment()) {
            let mut req = base;
            if let Some(attachment) = message.first_attachment() {
                apply_attachment(&mut req, attachment, "");
            }
            req.reset_sender = true;
            requests.push(req);
        }

        if requests.is_empty() {
            tracing::trace!("Edit changed neither text nor attachment");
        }
        requests
    }
}

fn flags_of(frame: &MessageFrame) -> SenderFlags {
    SenderFlags {
        bot: frame.bot_id.is_some(),
        app: frame.app_id.is_some(),
    }
}

fn apply_attachment(req: &mut RenderRequest, attachment: &Attachment, fallback: &str) {
    let header = attachment.header();
    req.title = (!header.is_empty()).then_some(header);

    let content = attachment.content();
    req.body = if content.is_empty() {
        fallback.to_string()
    } else {
        content.to_string()
    };
}

fn attachment_digest(attachment: Option<&Attachment>) -> (String, String) {
    attachment
        .map(|a| (a.header(), a.content().to_string()))
        .unwrap_or_default()
}

/// Cut `body` to [`MAX_BODY_CHARS`] characters, appending `...` when cut.
///
/// Applied to normalized text so markup is never split mid-token.
pub fn truncate_body(mut body: String) -> String {
    if let Some((idx, _)) = body.char_indices().nth(MAX_BODY_CHARS) {
        body.truncate(idx);
        body.push_str("...");
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{Conversation, FakeDirectory};
    use std::sync::Arc;

    fn dispatcher() -> (Arc<FakeDirectory>, Dispatcher<FakeDirectory>) {
        let mut dir = FakeDirectory::default();
        dir.users.insert("U1".to_string(), "alice".to_string());
        dir.users.insert("U2".to_string(), "bob".to_string());
        dir.conversations
            .insert("C1".to_string(), Conversation::Named("general".to_string()));
        let dir = Arc::new(dir);
        (dir.clone(), Dispatcher::new(IdentityCache::new(dir)))
    }

    async fn dispatch(d: &mut Dispatcher<FakeDirectory>, raw: &str) -> Vec<RenderRequest> {
        let event: RtmEvent = serde_json::from_str(raw).unwrap();
        d.handle(event).await
    }

    #[tokio::test]
    async fn test_plain_message() {
        let (_, mut d) = dispatcher();
        let reqs = dispatch(
            &mut d,
            r#"{"type":"message","channel":"C1","user":"U1","text":"hello","ts":"1700000000.000200","thread_ts":"1699999999.000100"}"#,
        )
        .await;

        assert_eq!(reqs.len(), 1);
        let req = &reqs[0];
        assert_eq!(req.channel, "general");
        assert_eq!(req.user, "alice");
        assert_eq!(req.body, "hello");
        assert_eq!(req.timestamp.as_secs(), 1_700_000_000);
        assert_eq!(req.thread_ts.as_secs(), 1_699_999_999);
        assert_eq!(req.flags, SenderFlags::default());
        assert!(!req.reset_sender);
    }

    #[tokio::test]
    async fn test_maintenance_events_update_cache() {
        let (dir, mut d) = dispatcher();
        let events = [
            r#"{"type":"bot_added","bot":{"id":"B1","name":"ci-bot"}}"#,
            r#"{"type":"channel_created","channel":{"id":"C2","name":"new-room"}}"#,
            r#"{"type":"channel_rename","channel":{"id":"C1","name":"renamed"}}"#,
            r#"{"type":"group_joined","channel":{"id":"G1","name":"secret"}}"#,
            r#"{"type":"team_join","user":{"id":"U3","name":"carol","profile":{"display_name":""}}}"#,
            r#"{"type":"user_change","user":{"id":"U1","name":"alice","profile":{"display_name":"Ally"}}}"#,
            r#"{"type":"subteam_created","subteam":{"id":"S1","handle":"backend","name":"Backend Team"}}"#,
            r#"{"type":"bot_changed","bot":{"id":"B2"}}"#,
            r#"{"type":"channel_joined","channel":{"id":"C3","name":"ops"}}"#,
            r#"{"type":"group_rename","channel":{"id":"G1","name":"secret-2"}}"#,
            r#"{"type":"subteam_updated","subteam":{"id":"S1","handle":"platform","name":"Platform"}}"#,
        ];
        for raw in events {
            assert!(dispatch(&mut d, raw).await.is_empty());
        }

        let cache = d.cache();
        assert_eq!(cache.get("B1"), Some("ci-bot"));
        assert_eq!(cache.get("C2"), Some("new-room"));
        assert_eq!(cache.get("C1"), Some("renamed"));
        assert_eq!(cache.get("G1"), Some("secret-2"));
        assert_eq!(cache.get("C3"), Some("ops"));
        assert_eq!(cache.get("U3"), Some("carol"));
        assert_eq!(cache.get("U1"), Some("Ally"));
        assert_eq!(cache.get("S1"), Some("platform"));
        assert_eq!(cache.get("B2"), None);
        assert!(dir.calls().is_empty());
    }

    #[tokio::test]
    async fn test_bot_message_with_attachment() {
        let (_, mut d) = dispatcher();
        dispatch(&mut d, r#"{"type":"bot_added","bot":{"id":"B1","name":"jenkins"}}"#).await;

        let reqs = dispatch(
            &mut d,
            r#"{"type":"message","subtype":"bot_message","channel":"C1","bot_id":"B1","app_id":"A1","username":"ignored","text":"","attachments":[{"title":"Build #12","footer":"ci","fallback":"Build passed"}]}"#,
        )
        .await;

        let req = &reqs[0];
        assert_eq!(req.user, "jenkins");
        assert_eq!(req.flags, SenderFlags { bot: true, app: true });
        assert_eq!(req.title.as_deref(), Some("Build #12  (ci)"));
        assert_eq!(req.body, "Build passed");
        assert!(req.reset_sender);
    }

    #[tokio::test]
    async fn test_bot_message_falls_back_to_username_and_text() {
        let (_, mut d) = dispatcher();
        let reqs = dispatch(
            &mut d,
            r#"{"type":"message","subtype":"bot_message","channel":"C1","bot_id":"B9","username":"webhook","text":"plain bot text"}"#,
        )
        .await;

        let req = &reqs[0];
        assert_eq!(req.user, "webhook");
        assert_eq!(req.title, None);
        assert_eq!(req.body, "plain bot text");
        assert!(!req.reset_sender);

        let reqs = dispatch(
            &mut d,
            r#"{"type":"message","subtype":"bot_message","channel":"C1","bot_id":"B9","text":"see attachment","attachments":[{}]}"#,
        )
        .await;
        assert_eq!(reqs[0].body, "see attachment");
        assert_eq!(reqs[0].title, None);
    }

    #[tokio::test]
    async fn test_file_share_with_preview() {
        let (_, mut d) = dispatcher();
        let reqs = dispatch(
            &mut d,
            r#"{"type":"message","subtype":"file_share","channel":"C1","user":"U2","text":"uploaded","file":{"title":"notes.txt","preview":"line one","preview_is_truncated":true}}"#,
        )
        .await;

        let req = &reqs[0];
        assert_eq!(req.user, "bob");
        assert_eq!(req.title.as_deref(), Some("file: notes.txt"));
        assert_eq!(req.body, "line one...");
        assert!(req.reset_sender);
    }

    #[tokio::test]
    async fn test_file_share_without_preview_uses_text() {
        let (_, mut d) = dispatcher();
        let reqs = dispatch(
            &mut d,
            r#"{"type":"message","subtype":"file_share","channel":"C1","user":"U2","text":"uploaded image.png","files":[{"name":"image.png"}]}"#,
        )
        .await;

        assert_eq!(reqs[0].title, None);
        assert_eq!(reqs[0].body, "uploaded image.png");
        assert!(reqs[0].reset_sender);
    }

    #[tokio::test]
    async fn test_file_comment() {
        let (_, mut d) = dispatcher();
        let reqs = dispatch(
            &mut d,
            r#"{"type":"message","subtype":"file_comment","channel":"C1","file":{"title":"design.pdf"},"comment":{"user":"U1","comment":"looks good"}}"#,
        )
        .await;

        let req = &reqs[0];
        assert_eq!(req.user, "alice");
        assert_eq!(req.title.as_deref(), Some("comment to: design.pdf"));
        assert_eq!(req.body, "looks good");
        assert!(req.reset_sender);

        let missing = dispatch(
            &mut d,
            r#"{"type":"message","subtype":"file_comment","channel":"C1","file":{"title":"x"}}"#,
        )
        .await;
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn test_me_message_is_action() {
        let (_, mut d) = dispatcher();
        let reqs = dispatch(
            &mut d,
            r#"{"type":"message","subtype":"me_message","channel":"C1","user":"U1","text":"waves"}"#,
        )
        .await;
        assert_eq!(reqs[0].style, BodyStyle::Action);
        assert_eq!(reqs[0].body, "waves");
    }

    #[tokio::test]
    async fn test_message_changed_identical_emits_nothing() {
        let (_, mut d) = dispatcher();
        let reqs = dispatch(
            &mut d,
            r#"{"type":"message","subtype":"message_changed","channel":"C1",
                "message":{"user":"U1","text":"same","ts":"1700000000.0","attachments":[{"title":"t","text":"a"}]},
                "previous_message":{"user":"U1","text":"same","attachments":[{"title":"t","text":"a"}]}}"#,
        )
        .await;
        assert!(reqs.is_empty());
    }

    #[tokio::test]
    async fn test_message_changed_text_only() {
        let (_, mut d) = dispatcher();
        let reqs = dispatch(
            &mut d,
            r#"{"type":"message","subtype":"message_changed","channel":"C1","ts":"1700000500.0",
                "message":{"user":"U1","text":"fixed","ts":"1700000000.0"},
                "previous_message":{"user":"U1","text":"fixd"}}"#,
        )
        .await;

        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].annotation, Annotation::Edited);
        assert_eq!(reqs[0].body, "fixed");
        assert_eq!(reqs[0].user, "alice");
        assert_eq!(reqs[0].timestamp.as_secs(), 1_700_000_000);
        assert!(!reqs[0].reset_sender);
    }

    #[tokio::test]
    async fn test_message_changed_attachment_only() {
        let (_, mut d) = dispatcher();
        let reqs = dispatch(
            &mut d,
            r#"{"type":"message","subtype":"message_changed","channel":"C1",
                "message":{"user":"U1","text":"link","attachments":[{"service_name":"GitHub","title":"PR","text":"unfurled"}]},
                "previous_message":{"user":"U1","text":"link"}}"#,
        )
        .await;

        assert_eq!(reqs.len(), 1);
        let req = &reqs[0];
        assert_eq!(req.annotation, Annotation::None);
        assert_eq!(req.title.as_deref(), Some("GitHub: PR"));
        assert_eq!(req.body, "unfurled");
        assert!(req.reset_sender);
    }

    #[tokio::test]
    async fn test_message_changed_both() {
        let (_, mut d) = dispatcher();
        let reqs = dispatch(
            &mut d,
            r#"{"type":"message","subtype":"message_changed","channel":"C1",
                "message":{"user":"U1","text":"new","attachments":[{"text":"b"}]},
                "previous_message":{"user":"U1","text":"old","attachments":[{"text":"a"}]}}"#,
        )
        .await;

        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[0].annotation, Annotation::Edited);
        assert_eq!(reqs[1].body, "b");
    }

    #[tokio::test]
    async fn test_dropped_and_unknown_events() {
        let (dir, mut d) = dispatcher();
        for raw in [
            r#"{"type":"message","subtype":"message_replied","channel":"C1","text":"x"}"#,
            r#"{"type":"message","subtype":"file_mention","channel":"C1","text":"x"}"#,
            r#"{"type":"message","channel":"C1"}"#,
            r#"{"type":"presence_change","user":"U1","presence":"away"}"#,
            r#"{"type":"reaction_added"}"#,
        ] {
            assert!(dispatch(&mut d, raw).await.is_empty(), "{raw}");
        }
        assert!(dir.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unresolvable_names_fall_back_to_ids() {
        let (dir, mut d) = dispatcher();
        let reqs = dispatch(
            &mut d,
            r#"{"type":"message","channel":"C404","user":"U404","text":"hi"}"#,
        )
        .await;
        assert_eq!(reqs[0].channel, "C404");
        assert_eq!(reqs[0].user, "U404");

        dispatch(
            &mut d,
            r#"{"type":"message","channel":"C404","user":"U404","text":"again"}"#,
        )
        .await;
        // Failures are not cached
        assert_eq!(
            dir.calls(),
            vec![
                "conversations.info:C404",
                "users.info:U404",
                "conversations.info:C404",
                "users.info:U404"
            ]
        );
    }

    #[tokio::test]
    async fn test_long_body_left_for_normalization() {
        let (_, mut d) = dispatcher();
        let text = format!("{}<@U1>", "x".repeat(1500));
        let raw = serde_json::json!({
            "type": "message",
            "channel": "C1",
            "user": "U1",
            "text": text,
        })
        .to_string();

        let reqs = dispatch(&mut d, &raw).await;
        assert_eq!(reqs[0].body, text);
    }

    #[test]
    fn test_truncate_body_boundaries() {
        let exact = "a".repeat(MAX_BODY_CHARS);
        assert_eq!(truncate_body(exact.clone()), exact);

        let over = "é".repeat(MAX_BODY_CHARS + 1);
        let cut = truncate_body(over);
        assert_eq!(cut.chars().count(), MAX_BODY_CHARS + 3);
        assert!(cut.ends_with("é..."));

        assert_eq!(truncate_body(String::new()), "");
    }
}
