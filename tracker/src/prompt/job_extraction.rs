use async_trait::async_trait;
use indoc::formatdoc;
use serde::{Deserialize, Serialize};

use crate::{
    app_config::ModelConfig,
    error::{AppError, AppResult},
    model::{ApplicationStatus, StructuredRecord},
    pipeline::types::{CandidateRecord, ParseOutcome},
    HttpClient,
};

use super::{mistral::send_json_prompt, SemanticParser};

pub fn system_prompt() -> String {
    formatdoc! {r#"
        You are a helpful assistant that reads job application emails and extracts what they are about.
        From the email, extract:
        - company: the name of the company the application is with
        - position: the job title that was applied for
        - status: one of "Applied", "Interviewing", "Offer", "Rejected", or a short phrase if none fit

        If the email is not about a specific job application, use empty strings for company and position.
        Respond only with a JSON object with the keys company, position and status. Do not provide explanations."#}
}

/// Build the user prompt for one candidate email
pub fn job_extraction_user_prompt(candidate: &CandidateRecord) -> String {
    format!(
        r#"Extract the job application details from the following email.
                <from>{}</from>
                <date>{}</date>
                <subject>{}</subject>
                <body>{}</body>"#,
        candidate.sender,
        candidate.received_at.format("%Y-%m-%d"),
        candidate.subject,
        candidate.normalized_body
    )
}

#[derive(Clone)]
pub struct LlmParser {
    http_client: HttpClient,
    model: ModelConfig,
    api_key: String,
}

impl LlmParser {
    pub fn new(http_client: HttpClient, model: ModelConfig, api_key: String) -> Self {
        Self {
            http_client,
            model,
            api_key,
        }
    }
}

#[async_trait]
impl SemanticParser for LlmParser {
    async fn parse(&self, candidate: &CandidateRecord) -> AppResult<ParseOutcome> {
        let answer = send_json_prompt(
            &self.http_client,
            &self.model,
            &self.api_key,
            &system_prompt(),
            &job_extraction_user_prompt(candidate),
        )
        .await
        .map_err(AppError::Parser)?;

        tracing::debug!(
            "Job extraction used {} tokens: {}",
            answer.token_usage,
            answer.content
        );

        Ok(outcome_from_answer(&answer.content, candidate))
    }
}

/// Unreadable answers and answers with neither company nor position are `Empty`
fn outcome_from_answer(content: &str, candidate: &CandidateRecord) -> ParseOutcome {
    let job = match serde_json::from_str::<JobJson>(content) {
        Ok(job) => job,
        Err(e) => {
            tracing::warn!("Could not parse job extraction JSON response: {:?}", e);
            return ParseOutcome::Empty;
        }
    };

    let company = job.company.trim();
    let position = job.position.trim();
    if company.is_empty() && position.is_empty() {
        return ParseOutcome::Empty;
    }

    ParseOutcome::Parsed(StructuredRecord {
        company: company.to_string(),
        position: position.to_string(),
        status: ApplicationStatus::from_text(&job.status),
        source_date: candidate.received_at,
        source_email: candidate.sender.clone(),
    })
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct JobJson {
    #[serde(default, deserialize_with = "null_as_empty")]
    company: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    position: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    status: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
