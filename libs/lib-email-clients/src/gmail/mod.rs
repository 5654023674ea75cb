pub mod api_quota;

pub const GMAIL_ENDPOINT: &str = "https://www.googleapis.com/gmail/v1/users/me";

/// Largest page the messages.list method will return
pub const MAX_MESSAGES_PER_PAGE: u32 = 500;
