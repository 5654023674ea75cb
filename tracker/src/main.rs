mod app_config;
mod email;
mod error;
mod model;
mod pipeline;
mod prompt;
mod store;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::Context;
use app_config::{AppConfig, Secrets};
use email::client::GmailReader;
use error::{AppError, AppResult};
use pipeline::{types::RunSummary, FailureReporter, JobPipeline, PipelineOptions};
use prompt::LlmParser;
use store::NotionStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub type HttpClient = reqwest::Client;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::Layer::default().with_ansi(false))
        .init();

    if let Err(e) = dotenvy::dotenv() {
        tracing::warn!("No .env file loaded: {}", e);
    }

    let config = AppConfig::load()?;

    match run(config).await {
        Ok(_) => Ok(()),
        Err(e) if e.is_fatal() => {
            tracing::error!("No messages were processed: {}", e);
            Err(e.into())
        }
        Err(e) => {
            tracing::error!("Run failed: {}", e);
            Err(e.into())
        }
    }
}

async fn run(config: AppConfig) -> AppResult<RunSummary> {
    let secrets = Secrets::from_env().map_err(AppError::Setup)?;
    tracing::debug!("Loaded config {:?} with {:?}", config, secrets);

    let http_client = reqwest::ClientBuilder::new()
        .use_rustls_tls()
        .build()
        .context("Could not build HTTP client")
        .map_err(AppError::Setup)?;

    let mailbox =
        GmailReader::connect(http_client.clone(), &config.gmail, secrets.gmail_access_token)
            .await?;
    let parser = LlmParser::new(
        http_client.clone(),
        config.model.clone(),
        secrets.llm_api_key,
    );
    let store = NotionStore::new(
        http_client,
        &config.notion,
        secrets.notion_token,
        secrets.notion_db_id,
    );
    store.verify().await?;

    let options = PipelineOptions::from(&config.pipeline);
    tracing::info!(
        "Looking back {} months, matching {} subject keywords",
        options.lookback_months,
        options.filter.keywords().len()
    );

    let pipeline = JobPipeline::new(
        Arc::new(mailbox),
        Arc::new(parser),
        Arc::new(store),
        FailureReporter::new(&config.pipeline.failure_path),
        options,
    );

    pipeline.run().await
}
