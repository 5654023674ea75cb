use chrono::{DateTime, Utc};
use mail_parser::{Address, MessageParser, MimeHeaders, PartType};

pub type MessageId = String;

/// A mailbox address split the way IMAP envelopes carry it
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EmailAddress {
    pub mailbox: String,
    pub host: String,
}

impl EmailAddress {
    pub fn parse(address: &str) -> Self {
        match address.rsplit_once('@') {
            Some((mailbox, host)) => Self {
                mailbox: mailbox.to_string(),
                host: host.to_string(),
            },
            None => Self {
                mailbox: address.to_string(),
                host: String::new(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub subject: String,
    pub from: Vec<EmailAddress>,
    pub date: DateTime<Utc>,
}

/// One leaf MIME part. `content_type` is the raw header value, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyPart {
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

#[cfg(test)]
impl BodyPart {
    pub fn new(content_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type: Some(content_type.into()),
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub id: MessageId,
    pub envelope: Option<Envelope>,
    pub body_parts: Vec<BodyPart>,
}

impl RawMessage {
    /// Build from a Gmail `format=RAW` message.
    /// Missing or unparsable payloads yield a message without an envelope.
    pub fn from_gmail_message(msg: google_gmail1::api::Message) -> Self {
        let id = msg.id.unwrap_or_default();
        let internal_date = msg
            .internal_date
            .and_then(DateTime::<Utc>::from_timestamp_millis);

        let Some(raw) = msg.raw.as_ref() else {
            tracing::warn!("No raw payload in message {}", id);
            return Self {
                id,
                envelope: None,
                body_parts: Vec::new(),
            };
        };

        Self::from_rfc822(id, raw, internal_date)
    }

    pub fn from_rfc822(
        id: MessageId,
        raw: &[u8],
        fallback_date: Option<DateTime<Utc>>,
    ) -> Self {
        let Some(parsed) = MessageParser::default().parse(raw) else {
            tracing::warn!("Could not parse MIME message {}", id);
            return Self {
                id,
                envelope: None,
                body_parts: Vec::new(),
            };
        };

        let date = parsed
            .date()
            .and_then(|d| DateTime::<Utc>::from_timestamp(d.to_timestamp(), 0))
            .or(fallback_date)
            .unwrap_or_default();

        let envelope = Envelope {
            subject: parsed.subject().unwrap_or_default().to_string(),
            from: parsed.from().map(address_list).unwrap_or_default(),
            date,
        };

        let body_parts = parsed
            .parts
            .iter()
            .filter(|part| !matches!(part.body, PartType::Multipart(_)))
            .map(|part| BodyPart {
                content_type: part.content_type().map(|ct| match ct.subtype() {
                    Some(subtype) => format!("{}/{}", ct.ctype(), subtype),
                    None => ct.ctype().to_string(),
                }),
                data: part.contents().to_vec(),
            })
            .collect();

        Self {
            id,
            envelope: Some(envelope),
            body_parts,
        }
    }
}

fn address_list(address: &Address) -> Vec<EmailAddress> {
    let addrs: Vec<_> = match address {
        Address::List(list) => list.iter().collect(),
        Address::Group(groups) => groups.iter().flat_map(|g| g.addresses.iter()).collect(),
    };
    addrs
        .into_iter()
        .filter_map(|a| a.address())
        .map(EmailAddress::parse)
        .collect()
}
