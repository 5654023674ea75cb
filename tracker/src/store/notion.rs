use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    app_config::NotionConfig,
    error::{AppError, AppResult},
    model::StructuredRecord,
    HttpClient,
};

use super::{StoreReconciler, UpsertAction};

const PROP_COMPANY: &str = "Company";
const PROP_POSITION: &str = "Position";
const PROP_STATUS: &str = "Status";
const PROP_DATE: &str = "Date";
const PROP_EMAIL: &str = "Email";

#[derive(Debug, Deserialize)]
struct QueryResponse {
    results: Vec<PageRef>,
}

#[derive(Debug, Deserialize)]
struct PageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct NotionApiError {
    #[serde(default)]
    code: String,
    message: String,
}

#[derive(Debug, Clone)]
pub struct NotionStore {
    http_client: HttpClient,
    base_url: String,
    version: String,
    token: String,
    database_id: String,
}

impl NotionStore {
    pub fn new(
        http_client: HttpClient,
        config: &NotionConfig,
        token: String,
        database_id: String,
    ) -> Self {
        Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            version: config.version.clone(),
            token,
            database_id,
        }
    }

    /// Check the token can see the database before any stage starts
    pub async fn verify(&self) -> AppResult<()> {
        let resp = self
            .request(Method::GET, &format!("databases/{}", self.database_id))
            .send()
            .await
            .context("Could not reach Notion")
            .map_err(AppError::Setup)?;
        check_response(resp).await.map_err(AppError::Setup)?;
        tracing::info!("Connected to Notion database {}", self.database_id);
        Ok(())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http_client
            .request(method, format!("{}/{}", self.base_url, path))
            .bearer_auth(&self.token)
            .header("Notion-Version", &self.version)
    }

    async fn find_page(&self, record: &StructuredRecord) -> anyhow::Result<Option<String>> {
        let filter = json!({
            "filter": {
                "and": [
                    { "property": PROP_COMPANY, "title": { "equals": record.company } },
                    { "property": PROP_POSITION, "rich_text": { "equals": record.position } }
                ]
            },
            "page_size": 1
        });

        let resp = self
            .request(
                Method::POST,
                &format!("databases/{}/query", self.database_id),
            )
            .json(&filter)
            .send()
            .await
            .context("Could not reach Notion")?;
        let query = check_response(resp)
            .await?
            .json::<QueryResponse>()
            .await
            .context("Error reading database query")?;

        Ok(query.results.into_iter().next().map(|page| page.id))
    }

    async fn update_page(&self, page_id: &str, record: &StructuredRecord) -> anyhow::Result<()> {
        let resp = self
            .request(Method::PATCH, &format!("pages/{}", page_id))
            .json(&json!({ "properties": tracking_properties(record) }))
            .send()
            .await
            .context("Could not reach Notion")?;
        check_response(resp).await?;
        Ok(())
    }

    async fn create_page(&self, record: &StructuredRecord) -> anyhow::Result<()> {
        let mut properties = tracking_properties(record);
        properties[PROP_COMPANY] = json!({ "title": [{ "text": { "content": record.company } }] });
        properties[PROP_POSITION] =
            json!({ "rich_text": [{ "text": { "content": record.position } }] });

        let resp = self
            .request(Method::POST, "pages")
            .json(&json!({
                "parent": { "database_id": self.database_id },
                "properties": properties
            }))
            .send()
            .await
            .context("Could not reach Notion")?;
        check_response(resp).await?;
        Ok(())
    }
}

/// Properties written on both create and update
fn tracking_properties(record: &StructuredRecord) -> Value {
    let email = if record.source_email.is_empty() {
        Value::Null
    } else {
        json!(record.source_email)
    };

    json!({
        PROP_STATUS: { "select": { "name": record.status.to_string() } },
        PROP_DATE: { "date": { "start": record.source_date.format("%Y-%m-%d").to_string() } },
        PROP_EMAIL: { "email": email }
    })
}

async fn check_response(resp: Response) -> anyhow::Result<Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }

    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    match serde_json::from_str::<NotionApiError>(&body) {
        Ok(err) => Err(anyhow!("Notion {} ({}): {}", status, err.code, err.message)),
        Err(_) => Err(anyhow!("Notion {}: {}", status, body)),
    }
}

#[async_trait]
impl StoreReconciler for NotionStore {
    async fn upsert(&self, record: &StructuredRecord) -> AppResult<UpsertAction> {
        let existing = self.find_page(record).await.map_err(AppError::Store)?;

        match existing {
            Some(page_id) => {
                self.update_page(&page_id, record)
                    .await
                    .map_err(AppError::Store)?;
                tracing::info!(
                    "Updated {} / {} -> {}",
                    record.company,
                    record.position,
                    record.status
                );
                Ok(UpsertAction::Updated)
            }
            None => {
                self.create_page(record).await.map_err(AppError::Store)?;
                tracing::info!(
                    "Created {} / {} -> {}",
                    record.company,
                    record.position,
                    record.status
                );
                Ok(UpsertAction::Created)
            }
        }
    }
}
