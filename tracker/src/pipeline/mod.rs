//! Job Pipeline
//!
//! Turns recent mailbox messages into entries in the tracking store.
//!
//! ## Architecture
//!
//! - **Fetch**: the mailbox reader sends raw messages for the lookback window
//! - **Filter**: keeps job-related subjects and extracts body and sender
//! - **Parse**: asks the semantic parser for company, position and status
//! - **Reconcile**: upserts each record into the store, on the calling task
//! - **Failure Report**: writes parse and reconcile misses to a CSV once the run ends
//!
//! Stages are connected by bounded channels, so records keep mailbox order
//! end to end and the slowest stage paces the run.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let pipeline = JobPipeline::new(mailbox, parser, store, reporter, options);
//! let summary = pipeline.run().await?;
//! ```

pub mod failure_report;
mod orchestrator;
mod stages;
pub mod types;

pub use failure_report::FailureReporter;
pub use orchestrator::{JobPipeline, PipelineOptions};
