pub(crate) mod job_extraction;
pub(crate) mod mistral;

use async_trait::async_trait;

use crate::{
    error::AppResult,
    pipeline::types::{CandidateRecord, ParseOutcome},
};

pub use job_extraction::LlmParser;

/// Turns a candidate email into company/position/status
#[async_trait]
pub trait SemanticParser: Send + Sync {
    async fn parse(&self, candidate: &CandidateRecord) -> AppResult<ParseOutcome>;
}
