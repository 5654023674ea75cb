//! Job Pipeline Types
//!
//! Records handed between pipeline stages. Each one is owned by exactly one
//! stage at a time and moves on through a channel.

use chrono::{DateTime, Utc};

use crate::model::StructuredRecord;

/// Reason recorded when the parser finds no company or position
pub const EMPTY_PARSE_REASON: &str = "Empty LLM output";

/// A job-related email with its body and sender normalized, awaiting parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRecord {
    pub subject: String,
    pub normalized_body: String,
    pub sender: String,
    pub received_at: DateTime<Utc>,
}

/// What the semantic parser made of a candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Parsed(StructuredRecord),
    /// Nothing usable could be extracted
    Empty,
}

/// A parsed record still paired with its source, so a failed upsert can be reported
#[derive(Debug, Clone)]
pub struct ParsedItem {
    pub candidate: CandidateRecord,
    pub record: StructuredRecord,
}

/// A message that needs manual review
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureEntry {
    pub received_at: DateTime<Utc>,
    pub sender: String,
    pub subject: String,
    pub normalized_body: String,
    pub stage: PipelineStage,
    pub reason: String,
}

impl FailureEntry {
    pub fn new(candidate: CandidateRecord, stage: PipelineStage, reason: impl Into<String>) -> Self {
        Self {
            received_at: candidate.received_at,
            sender: candidate.sender,
            subject: candidate.subject,
            normalized_body: candidate.normalized_body,
            stage,
            reason: reason.into(),
        }
    }
}

/// Stage in the pipeline where a failure occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Parse,
    Reconcile,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStage::Parse => write!(f, "Parse"),
            PipelineStage::Reconcile => write!(f, "Reconcile"),
        }
    }
}

/// Counts for one run, logged when it finishes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub messages_found: usize,
    pub candidates: usize,
    pub parsed: usize,
    pub created: usize,
    pub updated: usize,
    pub failures: usize,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "found={} candidates={} parsed={} created={} updated={} failures={}",
            self.messages_found,
            self.candidates,
            self.parsed,
            self.created,
            self.updated,
            self.failures
        )
    }
}
