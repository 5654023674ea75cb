pub mod client;
pub mod extract;
pub mod raw_message;
pub mod rules;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::error::AppResult;
use raw_message::{MessageId, RawMessage};

/// Read access to the mailbox for one pipeline run
#[async_trait]
pub trait MailboxReader: Send + Sync {
    /// Ids of every message received after `since`, in the mailbox's result order
    async fn search(&self, since: DateTime<Utc>) -> AppResult<Vec<MessageId>>;

    /// Fetch `ids` in order, sending each message to `sink`.
    /// Returns early without error once the receiving side is gone.
    async fn fetch(&self, ids: Vec<MessageId>, sink: mpsc::Sender<RawMessage>) -> AppResult<()>;
}
