//! Filter and parse stages
//!
//! Each stage drains its inbound channel in order and closes its outbound
//! channel by dropping the sender when it returns.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::{
    email::{
        extract::{extract_body, extract_sender},
        raw_message::RawMessage,
        rules::SubjectFilter,
    },
    prompt::SemanticParser,
};

use super::types::{
    CandidateRecord, FailureEntry, ParseOutcome, ParsedItem, PipelineStage, EMPTY_PARSE_REASON,
};

/// Drops messages without an envelope or without a job-related subject and
/// forwards the rest as candidates. Returns the number forwarded.
pub async fn run_filter_stage(
    filter: SubjectFilter,
    mut raw_rx: mpsc::Receiver<RawMessage>,
    candidate_tx: mpsc::Sender<CandidateRecord>,
) -> usize {
    let mut forwarded = 0;

    while let Some(message) = raw_rx.recv().await {
        let Some(envelope) = message.envelope.as_ref() else {
            tracing::debug!("Skipping message {} with no envelope", message.id);
            continue;
        };

        let subject = envelope.subject.to_lowercase();
        if !filter.is_job_related(&subject) {
            tracing::debug!("Discarding message {}: {}", message.id, subject);
            continue;
        }

        let sender = extract_sender(&message);
        if sender.is_empty() {
            tracing::warn!("No sender info in message {}", message.id);
        }

        let candidate = CandidateRecord {
            subject,
            normalized_body: extract_body(&message),
            sender,
            received_at: envelope.date,
        };

        if candidate_tx.send(candidate).await.is_err() {
            tracing::warn!("Parse stage closed early, stopping filter stage");
            break;
        }
        forwarded += 1;
    }

    tracing::info!("Filter stage done: {} candidates", forwarded);
    forwarded
}

#[derive(Debug, Default)]
pub struct ParseStageOutput {
    pub parsed: usize,
    pub failures: Vec<FailureEntry>,
}

/// Runs the parser on each candidate. Every candidate ends up either forwarded
/// or recorded as a failure.
pub async fn run_parse_stage(
    parser: Arc<dyn SemanticParser>,
    mut candidate_rx: mpsc::Receiver<CandidateRecord>,
    parsed_tx: mpsc::Sender<ParsedItem>,
) -> ParseStageOutput {
    let mut output = ParseStageOutput::default();

    while let Some(candidate) = candidate_rx.recv().await {
        let record = match parser.parse(&candidate).await {
            Ok(ParseOutcome::Parsed(record)) => record,
            Ok(ParseOutcome::Empty) => {
                tracing::warn!("Empty parse for \"{}\"", candidate.subject);
                output.failures.push(FailureEntry::new(
                    candidate,
                    PipelineStage::Parse,
                    EMPTY_PARSE_REASON,
                ));
                continue;
            }
            Err(e) => {
                tracing::warn!("Parser failed for \"{}\": {}", candidate.subject, e);
                output
                    .failures
                    .push(FailureEntry::new(candidate, PipelineStage::Parse, e.to_string()));
                continue;
            }
        };

        tracing::debug!("Parsed job: {:?}", record);
        output.parsed += 1;

        if let Err(mpsc::error::SendError(item)) =
            parsed_tx.send(ParsedItem { candidate, record }).await
        {
            tracing::warn!("Reconcile stage closed early for \"{}\"", item.candidate.subject);
            output.failures.push(FailureEntry::new(
                item.candidate,
                PipelineStage::Reconcile,
                "Reconcile stage closed before record was written",
            ));
        }
    }

    tracing::info!(
        "Parse stage done: {} parsed, {} failed",
        output.parsed,
        output.failures.len()
    );
    output
}
