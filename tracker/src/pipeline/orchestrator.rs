//! Job Pipeline Orchestrator
//!
//! Spawns the fetch, filter and parse stages, reconciles parsed records on the
//! calling task, then flushes failures once every stage has finished.

use std::sync::Arc;

use anyhow::Context;
use chrono::{Months, Utc};
use tokio::sync::mpsc;

use crate::{
    app_config::PipelineConfig,
    email::{rules::SubjectFilter, MailboxReader},
    error::AppResult,
    prompt::SemanticParser,
    store::{StoreReconciler, UpsertAction},
};

use super::{
    failure_report::FailureReporter,
    stages::{run_filter_stage, run_parse_stage},
    types::{FailureEntry, PipelineStage, RunSummary},
};

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub lookback_months: u32,
    /// Records buffered between neighbouring stages
    pub channel_capacity: usize,
    pub filter: SubjectFilter,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            lookback_months: 4,
            channel_capacity: 1,
            filter: SubjectFilter::default(),
        }
    }
}

impl From<&PipelineConfig> for PipelineOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            lookback_months: config.lookback_months,
            channel_capacity: config.channel_capacity,
            filter: SubjectFilter::new(&config.keywords),
        }
    }
}

pub struct JobPipeline {
    mailbox: Arc<dyn MailboxReader>,
    parser: Arc<dyn SemanticParser>,
    store: Arc<dyn StoreReconciler>,
    reporter: FailureReporter,
    options: PipelineOptions,
}

impl JobPipeline {
    pub fn new(
        mailbox: Arc<dyn MailboxReader>,
        parser: Arc<dyn SemanticParser>,
        store: Arc<dyn StoreReconciler>,
        reporter: FailureReporter,
        options: PipelineOptions,
    ) -> Self {
        Self {
            mailbox,
            parser,
            store,
            reporter,
            options,
        }
    }

    /// Run the pipeline once over the lookback window
    pub async fn run(&self) -> AppResult<RunSummary> {
        let since = Utc::now()
            .checked_sub_months(Months::new(self.options.lookback_months))
            .context("Lookback window is out of range")?;

        let ids = self.mailbox.search(since).await?;
        tracing::info!("Found {} messages.", ids.len());

        let mut summary = RunSummary {
            messages_found: ids.len(),
            ..Default::default()
        };
        if ids.is_empty() {
            return Ok(summary);
        }

        let capacity = self.options.channel_capacity.max(1);
        let (raw_tx, raw_rx) = mpsc::channel(capacity);
        let (candidate_tx, candidate_rx) = mpsc::channel(capacity);
        let (parsed_tx, mut parsed_rx) = mpsc::channel(capacity);

        let mailbox = self.mailbox.clone();
        let fetch_handle = tokio::spawn(async move { mailbox.fetch(ids, raw_tx).await });
        let filter_handle = tokio::spawn(run_filter_stage(
            self.options.filter.clone(),
            raw_rx,
            candidate_tx,
        ));
        let parse_handle = tokio::spawn(run_parse_stage(
            self.parser.clone(),
            candidate_rx,
            parsed_tx,
        ));

        // Reconcile runs here, one record at a time, in parse order
        let mut reconcile_failures = Vec::new();
        while let Some(item) = parsed_rx.recv().await {
            match self.store.upsert(&item.record).await {
                Ok(UpsertAction::Created) => summary.created += 1,
                Ok(UpsertAction::Updated) => summary.updated += 1,
                Err(e) => {
                    tracing::warn!(
                        "Could not write {} / {}: {}",
                        item.record.company,
                        item.record.position,
                        e
                    );
                    reconcile_failures.push(FailureEntry::new(
                        item.candidate,
                        PipelineStage::Reconcile,
                        e.to_string(),
                    ));
                }
            }
        }

        let fetch_result = fetch_handle.await.context("Fetch stage panicked")?;
        summary.candidates = filter_handle.await.context("Filter stage panicked")?;
        let parse_output = parse_handle.await.context("Parse stage panicked")?;
        summary.parsed = parse_output.parsed;

        let mut failures = parse_output.failures;
        failures.extend(reconcile_failures);
        summary.failures = failures.len();

        if let Err(e) = self.reporter.report(&failures) {
            tracing::error!("Could not write failure report: {}", e);
        }

        if let Err(e) = fetch_result {
            tracing::error!("Fetch stage failed: {}", e);
            return Err(e);
        }

        tracing::info!("Run finished: {}", summary);
        Ok(summary)
    }
}
