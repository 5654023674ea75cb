//! Gmail API quota units.
//!
//! See https://developers.google.com/gmail/api/reference/quota

/// Per-user quota units available each second
pub const GMAIL_QUOTA_PER_SECOND: usize = 250;

#[derive(Debug, Clone, Copy)]
pub struct GmailApiQuota {
    pub get_profile: usize,
    pub messages_list: usize,
    pub messages_get: usize,
}

pub const GMAIL_API_QUOTA: GmailApiQuota = GmailApiQuota {
    get_profile: 1,
    messages_list: 5,
    messages_get: 5,
};
