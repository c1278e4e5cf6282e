use crate::metadata::{Directory, EntityKind, IdentityCache};
use regex::{Captures, Regex};
use std::sync::LazyLock;

// <#C01234|general> or <#C01234>
static CHANNEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<#([^>|]+)(?:\|[^>]*)?>").expect("channel pattern"));

// <@U01234|alice> or <@U01234>
static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@([^>|]+)(?:\|[^>]*)?>").expect("mention pattern"));

// <!subteam^S01234|@backend> or <!subteam^S01234>
static SUBTEAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<!subteam\^([^>|]+)(?:\|[^>]*)?>").expect("subteam pattern"));

// <!here|here> or <!channel>; `^` is excluded so unresolved subteams stay verbatim
static KEYWORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<!([^>|^]+)(?:\|[^>]*)?>").expect("keyword pattern"));

static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]+);").expect("entity pattern")
});

/// Convert Slack message markup into display text.
///
/// Expansion order is channels, user mentions, user groups, keywords; then
/// HTML entities are decoded. The inline fallback labels are ignored in
/// favour of the cache, since Slack may send stale labels.
pub async fn normalize<D: Directory>(text: &str, cache: &mut IdentityCache<D>) -> String {
    if !text.contains('<') && !text.contains('&') {
        return text.to_string();
    }

    let text = expand(text, &CHANNEL_RE, '#', EntityKind::Channel, cache).await;
    let text = expand(&text, &MENTION_RE, '@', EntityKind::User, cache).await;
    let text = expand(&text, &SUBTEAM_RE, '@', EntityKind::UserGroup, cache).await;
    let text = KEYWORD_RE.replace_all(&text, |caps: &Captures| format!("@{}", &caps[1]));

    unescape_html(&text)
}

/// Replace every well-formed match of `re` with `prefix` + resolved name.
///
/// Replacement text is never re-scanned. User groups are only expanded when
/// already cached; otherwise the markup is kept as is.
async fn expand<D: Directory>(
    text: &str,
    re: &Regex,
    prefix: char,
    kind: EntityKind,
    cache: &mut IdentityCache<D>,
) -> String {
    let mut result = String::with_capacity(text.len());
    let mut last = 0;

    for caps in re.captures_iter(text) {
        let (Some(whole), Some(id)) = (caps.get(0), caps.get(1)) else {
            continue;
        };

        let name = if kind.is_remote() {
            cache.resolve(kind, id.as_str()).await
        } else {
            match cache.get(id.as_str()) {
                Some(name) => name.to_string(),
                None => continue,
            }
        };

        result.push_str(&text[last..whole.start()]);
        result.push(prefix);
        result.push_str(&name);
        last = whole.end();
    }

    result.push_str(&text[last..]);
    result
}

/// Decode HTML character references; unknown entities are left untouched
pub fn unescape_html(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |caps: &Captures| {
            let entity = &caps[1];
            let decoded = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                named_entity(entity)
            };

            decoded
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Named references Slack emits (`&amp;`, `&lt;`, `&gt;`) plus a few common
/// typographic ones. Anything else is left as written.
fn named_entity(name: &str) -> Option<char> {
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "copy" => '©',
        "reg" => '®',
        "hellip" => '…',
        "mdash" => '—',
        "ndash" => '–',
        _ => return None,
    };
    Some(c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{Conversation, FakeDirectory};
    use std::sync::Arc;

    fn cache_with(entries: &[(&str, &str)]) -> (Arc<FakeDirectory>, IdentityCache<FakeDirectory>) {
        let dir = Arc::new(FakeDirectory::default());
        let mut cache = IdentityCache::new(dir.clone());
        for (id, name) in entries {
            cache.insert(*id, *name);
        }
        (dir, cache)
    }

    #[tokio::test]
    async fn test_channel_reference() {
        let (_, mut cache) = cache_with(&[("G01234", "test_group")]);
        assert_eq!(
            normalize("<#G01234|test_group> foo", &mut cache).await,
            "#test_group foo"
        );
        assert_eq!(normalize("<#G01234> foo", &mut cache).await, "#test_group foo");
    }

    #[tokio::test]
    async fn test_user_mention() {
        let (_, mut cache) = cache_with(&[("U01234", "test_user")]);
        assert_eq!(
            normalize("<@U01234|test_user> foo", &mut cache).await,
            "@test_user foo"
        );
        assert_eq!(normalize("<@U01234> foo", &mut cache).await, "@test_user foo");
    }

    #[tokio::test]
    async fn test_keyword() {
        let (dir, mut cache) = cache_with(&[]);
        assert_eq!(normalize("<!here|here> foo", &mut cache).await, "@here foo");
        assert_eq!(normalize("<!here> foo", &mut cache).await, "@here foo");
        assert!(dir.calls().is_empty());
    }

    #[tokio::test]
    async fn test_subteam() {
        let (dir, mut cache) = cache_with(&[("S1A2B3C4D", "hoge-piyo")]);
        assert_eq!(
            normalize("<!subteam^S1A2B3C4D|@hoge-piyo> foo", &mut cache).await,
            "@hoge-piyo foo"
        );
        assert_eq!(normalize("@hoge-piyo foo", &mut cache).await, "@hoge-piyo foo");
        assert!(dir.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_subteam_left_verbatim() {
        let (dir, mut cache) = cache_with(&[("S2", "ops")]);
        assert_eq!(
            normalize("<!subteam^S9|@stale> and <!subteam^S2>", &mut cache).await,
            "<!subteam^S9|@stale> and @ops"
        );
        assert!(dir.calls().is_empty());
    }

    #[tokio::test]
    async fn test_stale_label_ignored() {
        let (_, mut cache) = cache_with(&[("U1", "new-name")]);
        assert_eq!(normalize("<@U1|old-name>", &mut cache).await, "@new-name");
    }

    #[tokio::test]
    async fn test_multiple_matches_and_lookup() {
        let mut dir = FakeDirectory::default();
        dir.users.insert("U2".to_string(), "bob".to_string());
        dir.conversations
            .insert("C9".to_string(), Conversation::Named("dev".to_string()));
        let dir = Arc::new(dir);
        let mut cache = IdentityCache::new(dir.clone());
        cache.insert("U1", "alice");

        let text = "<@U1> <@U2> see <#C9> and <#C9|dev>, <!channel>";
        assert_eq!(
            normalize(text, &mut cache).await,
            "@alice @bob see #dev and #dev, @channel"
        );
        assert_eq!(
            dir.calls(),
            vec!["conversations.info:C9", "users.info:U2"]
        );
    }

    #[tokio::test]
    async fn test_unresolvable_falls_back_to_id() {
        let (_, mut cache) = cache_with(&[]);
        assert_eq!(normalize("hi <@U404>", &mut cache).await, "hi @U404");
    }

    #[tokio::test]
    async fn test_malformed_markup_terminates() {
        let (dir, mut cache) = cache_with(&[("U1", "alice")]);
        assert_eq!(normalize("<@U1", &mut cache).await, "<@U1");
        assert_eq!(normalize("<#", &mut cache).await, "<#");
        assert_eq!(normalize("<@> <!>", &mut cache).await, "<@> <!>");
        assert_eq!(normalize("a < b > c", &mut cache).await, "a < b > c");
        assert!(dir.calls().is_empty());
    }

    #[tokio::test]
    async fn test_html_entities_decoded_after_expansion() {
        let (_, mut cache) = cache_with(&[("U1", "alice")]);
        assert_eq!(
            normalize("&lt;@U1&gt; &amp; <@U1> &#39;hi&#x21;", &mut cache).await,
            "<@U1> & @alice 'hi!"
        );
    }

    #[tokio::test]
    async fn test_idempotent_without_remaining_markup() {
        let (_, mut cache) = cache_with(&[("U1", "alice"), ("C1", "general")]);
        for text in ["<@U1> in <#C1>", "<!here> ping", "plain text", "a &amp; b"] {
            let once = normalize(text, &mut cache).await;
            let twice = normalize(&once, &mut cache).await;
            assert_eq!(once, twice, "input: {text}");
        }
    }

    #[test]
    fn test_unescape_unknown_entity() {
        assert_eq!(unescape_html("&bogus; &amp;"), "&bogus; &");
        assert_eq!(unescape_html("&lt;&gt;&amp;&copy;"), "<>&©");
        assert_eq!(unescape_html("&hearts; &Eacute;"), "&hearts; &Eacute;");
        assert_eq!(unescape_html("&#1114112;"), "&#1114112;");
    }
}
