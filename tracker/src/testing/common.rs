use std::{collections::HashMap, sync::Mutex};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::{
    email::{
        raw_message::{BodyPart, EmailAddress, Envelope, MessageId, RawMessage},
        MailboxReader,
    },
    error::{AppError, AppResult},
    model::{ApplicationStatus, StructuredRecord},
    pipeline::types::{CandidateRecord, ParseOutcome},
    prompt::SemanticParser,
    store::{StoreReconciler, UpsertAction},
};

/// Config, secrets and a client for tests that talk to the real services
#[cfg(feature = "integration")]
pub fn setup() -> (
    crate::app_config::AppConfig,
    crate::app_config::Secrets,
    crate::HttpClient,
) {
    use crate::app_config::{AppConfig, Secrets};

    dotenvy::dotenv().ok();
    let config = AppConfig::load().expect("Could not load config");
    let secrets = Secrets::from_env().expect("Missing credentials in .env file");
    let http_client = reqwest::ClientBuilder::new()
        .use_rustls_tls()
        .build()
        .unwrap();
    (config, secrets, http_client)
}

/// A message with a plain text body of `Body of {subject}`.
/// An empty `sender` leaves the envelope without a From address.
pub fn job_message(id: &str, subject: &str, sender: &str) -> RawMessage {
    let from = if sender.is_empty() {
        Vec::new()
    } else {
        vec![EmailAddress::parse(sender)]
    };

    RawMessage {
        id: id.to_string(),
        envelope: Some(Envelope {
            subject: subject.to_string(),
            from,
            date: Utc::now(),
        }),
        body_parts: vec![BodyPart::new(
            "text/plain; charset=utf-8",
            format!("Body of {}", subject),
        )],
    }
}

pub fn message_without_envelope(id: &str) -> RawMessage {
    RawMessage {
        id: id.to_string(),
        envelope: None,
        body_parts: vec![BodyPart::new("text/plain", "orphan body")],
    }
}

pub struct MockMailbox {
    messages: Vec<RawMessage>,
    fail_after: Option<(usize, String)>,
}

impl MockMailbox {
    pub fn new(messages: Vec<RawMessage>) -> Self {
        Self {
            messages,
            fail_after: None,
        }
    }

    /// Fetch sends `count` messages and then fails
    pub fn failing_after(mut self, count: usize, message: &str) -> Self {
        self.fail_after = Some((count, message.to_string()));
        self
    }
}

#[async_trait]
impl MailboxReader for MockMailbox {
    async fn search(&self, _since: DateTime<Utc>) -> AppResult<Vec<MessageId>> {
        Ok(self.messages.iter().map(|m| m.id.clone()).collect())
    }

    async fn fetch(&self, ids: Vec<MessageId>, sink: mpsc::Sender<RawMessage>) -> AppResult<()> {
        for (sent, id) in ids.iter().enumerate() {
            if let Some((count, message)) = &self.fail_after {
                if sent >= *count {
                    return Err(AppError::Mailbox(anyhow!(message.clone())));
                }
            }

            let Some(message) = self.messages.iter().find(|m| &m.id == id) else {
                return Err(AppError::Mailbox(anyhow!("No message {}", id)));
            };
            if sink.send(message.clone()).await.is_err() {
                return Ok(());
            }
        }
        Ok(())
    }
}

/// Answers by the first rule whose key appears in the candidate subject.
/// Subjects with no rule parse as `Empty`.
#[derive(Default)]
pub struct MockParser {
    rules: Vec<(String, Result<(String, String), String>)>,
    calls: Mutex<Vec<String>>,
}

impl MockParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(mut self, key: &str, company: &str, position: &str) -> Self {
        self.rules.push((
            key.to_string(),
            Ok((company.to_string(), position.to_string())),
        ));
        self
    }

    pub fn with_error(mut self, key: &str, message: &str) -> Self {
        self.rules.push((key.to_string(), Err(message.to_string())));
        self
    }

    /// Subjects seen, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SemanticParser for MockParser {
    async fn parse(&self, candidate: &CandidateRecord) -> AppResult<ParseOutcome> {
        self.calls.lock().unwrap().push(candidate.subject.clone());

        let rule = self
            .rules
            .iter()
            .find(|(key, _)| candidate.subject.contains(key.as_str()));

        match rule {
            None => Ok(ParseOutcome::Empty),
            Some((_, Err(message))) => Err(AppError::Parser(anyhow!(message.clone()))),
            Some((_, Ok((company, position)))) => Ok(ParseOutcome::Parsed(StructuredRecord {
                company: company.clone(),
                position: position.clone(),
                status: ApplicationStatus::Applied,
                source_date: candidate.received_at,
                source_email: candidate.sender.clone(),
            })),
        }
    }
}

/// In-memory store with true upserts keyed on the exact (company, position)
/// pair, the same match the Notion query filter makes
#[derive(Default)]
pub struct MockStore {
    entries: Mutex<HashMap<(String, String), StructuredRecord>>,
    calls: Mutex<Vec<StructuredRecord>>,
    failures: HashMap<String, String>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts for `company` fail with `message`
    pub fn failing_for(mut self, company: &str, message: &str) -> Self {
        self.failures
            .insert(company.to_string(), message.to_string());
        self
    }

    pub fn calls(&self) -> Vec<StructuredRecord> {
        self.calls.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

#[async_trait]
impl StoreReconciler for MockStore {
    async fn upsert(&self, record: &StructuredRecord) -> AppResult<UpsertAction> {
        self.calls.lock().unwrap().push(record.clone());

        if let Some(message) = self.failures.get(&record.company) {
            return Err(AppError::Store(anyhow!(message.clone())));
        }

        let previous = self
            .entries
            .lock()
            .unwrap()
            .insert(
                (record.company.clone(), record.position.clone()),
                record.clone(),
            );
        Ok(match previous {
            Some(_) => UpsertAction::Updated,
            None => UpsertAction::Created,
        })
    }
}
