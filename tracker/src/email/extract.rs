use regex::Regex;

use super::raw_message::RawMessage;

lazy_static::lazy_static!(
    static ref RE_HTML_TAG: Regex = Regex::new(r"<[^>]*>").unwrap();
    static ref RE_MEDIA_TOKEN: Regex = Regex::new(r"^[!#$%&'*+\-.^_`|~0-9a-z]+$").unwrap();
);

/// Pick the text the parser will read.
///
/// Parts are visited in their original order and the first `text/plain` part wins
/// outright. Otherwise the last `text/html` part seen is stripped of markup.
/// Parts without a usable `Content-Type` are skipped.
pub fn extract_body(raw: &RawMessage) -> String {
    let mut html_body: Option<String> = None;

    for part in &raw.body_parts {
        let Some(content_type) = part.content_type.as_deref() else {
            tracing::debug!("Missing Content-Type header in email part");
            continue;
        };

        let Some(media_type) = parse_media_type(content_type) else {
            tracing::debug!("Failed to parse media type: {:?}", content_type);
            continue;
        };

        if media_type.starts_with("text/plain") {
            let body = String::from_utf8_lossy(&part.data).into_owned();
            tracing::debug!("Extracted plain text body (length: {})", body.len());
            return body;
        }

        if media_type.starts_with("text/html") {
            html_body = Some(String::from_utf8_lossy(&part.data).into_owned());
        }
    }

    match html_body {
        Some(html) if !html.is_empty() => {
            tracing::debug!("No text/plain found, using HTML fallback");
            strip_html_tags(&html)
        }
        _ => {
            tracing::debug!("No text/plain or usable html body found");
            String::new()
        }
    }
}

/// First `From` address as `mailbox@host`, or empty when there is none
pub fn extract_sender(raw: &RawMessage) -> String {
    let Some(from) = raw.envelope.as_ref().and_then(|e| e.from.first()) else {
        tracing::debug!("No sender info in email {}", raw.id);
        return String::new();
    };

    if from.host.is_empty() {
        from.mailbox.clone()
    } else {
        format!("{}@{}", from.mailbox, from.host)
    }
}

pub fn strip_html_tags(html: &str) -> String {
    let text = RE_HTML_TAG.replace_all(html, "");
    text.replace("&nbsp;", " ").trim().to_string()
}

/// Lower-cased `type/subtype` of a Content-Type value, parameters dropped.
/// Returns None when either token is missing or malformed.
fn parse_media_type(value: &str) -> Option<String> {
    let essence = value.split(';').next()?.trim().to_ascii_lowercase();
    let (ctype, subtype) = essence.split_once('/')?;

    if RE_MEDIA_TOKEN.is_match(ctype) && RE_MEDIA_TOKEN.is_match(subtype) {
        Some(essence)
    } else {
        None
    }
}
