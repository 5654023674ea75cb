use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use google_gmail1::api::{ListMessagesResponse, Message, Profile};
use leaky_bucket::RateLimiter;
use lib_email_clients::gmail::{api_quota::GMAIL_API_QUOTA, MAX_MESSAGES_PER_PAGE};
use tokio::sync::mpsc;

use crate::{
    app_config::GmailConfig,
    error::{AppError, AppResult},
    HttpClient,
};

use super::{
    raw_message::{MessageId, RawMessage},
    MailboxReader,
};

macro_rules! gmail_url {
    ($base:expr, $($params:expr),*) => {
        {
            let list_params: Vec<&str> = vec![$($params),*];
            let path = list_params.join("/");
            format!("{}/{}", $base.trim_end_matches('/'), path)
        }
    };
}

#[derive(Debug, Clone)]
pub struct GmailReader {
    http_client: HttpClient,
    base_url: String,
    access_token: String,
    rate_limiter: Arc<RateLimiter>,
    pub email_address: String,
}

impl GmailReader {
    /// Verify the token against the profile endpoint before any stage starts
    pub async fn connect(
        http_client: HttpClient,
        config: &GmailConfig,
        access_token: String,
    ) -> AppResult<Self> {
        let quota = config.quota_per_sec.max(GMAIL_API_QUOTA.messages_get);
        let rate_limiter = Arc::new(
            RateLimiter::builder()
                .initial(quota)
                .interval(Duration::from_secs(1))
                .refill(quota)
                .max(quota)
                .build(),
        );

        let mut reader = GmailReader {
            http_client,
            base_url: config.base_url.clone(),
            access_token,
            rate_limiter,
            email_address: String::new(),
        };

        let profile = reader.get_profile().await.map_err(AppError::Setup)?;
        reader.email_address = profile.email_address.unwrap_or_default();
        tracing::info!("Connected to mailbox {}", reader.email_address);

        Ok(reader)
    }

    async fn get_profile(&self) -> anyhow::Result<Profile> {
        self.rate_limiter.acquire(GMAIL_API_QUOTA.get_profile).await;
        let resp = self
            .http_client
            .get(gmail_url!(self.base_url, "profile"))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .context("Could not reach Gmail")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let json = resp.json::<serde_json::Value>().await.unwrap_or_default();
            return Err(anyhow!("Gmail rejected credentials ({}): {}", status, json));
        }

        resp.json::<Profile>().await.context("Error reading profile")
    }

    async fn get_message_list_page(
        &self,
        since: DateTime<Utc>,
        page_token: Option<String>,
    ) -> anyhow::Result<ListMessagesResponse> {
        self.rate_limiter
            .acquire(GMAIL_API_QUOTA.messages_list)
            .await;

        let mut query = vec![
            ("q".to_string(), format!("after:{}", since.timestamp())),
            ("maxResults".to_string(), MAX_MESSAGES_PER_PAGE.to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken".to_string(), token));
        }

        let resp = self
            .http_client
            .get(gmail_url!(self.base_url, "messages"))
            .query(&query)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let json = resp.json::<serde_json::Value>().await.unwrap_or_default();
            return Err(anyhow!("Error listing messages ({}): {}", status, json));
        }

        resp.json::<ListMessagesResponse>()
            .await
            .context("Error reading message list")
    }

    pub async fn get_message_by_id(&self, message_id: &str) -> anyhow::Result<Message> {
        self.rate_limiter
            .acquire(GMAIL_API_QUOTA.messages_get)
            .await;

        let resp = self
            .http_client
            .get(gmail_url!(self.base_url, "messages", message_id))
            .bearer_auth(&self.access_token)
            .query(&[("format", "RAW")])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let json = resp.json::<serde_json::Value>().await.unwrap_or_default();
            return Err(anyhow!(
                "Error getting message {} ({}): {}",
                message_id,
                status,
                json
            ));
        }

        resp.json::<Message>().await.context("Error getting message")
    }
}

#[async_trait]
impl MailboxReader for GmailReader {
    async fn search(&self, since: DateTime<Utc>) -> AppResult<Vec<MessageId>> {
        let mut ids = Vec::new();
        let mut page_token = None;

        loop {
            let page = self
                .get_message_list_page(since, page_token)
                .await
                .map_err(AppError::Mailbox)?;

            ids.extend(
                page.messages
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|m| m.id),
            );

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(ids)
    }

    async fn fetch(&self, ids: Vec<MessageId>, sink: mpsc::Sender<RawMessage>) -> AppResult<()> {
        let total = ids.len();
        for (i, id) in ids.into_iter().enumerate() {
            let msg = self
                .get_message_by_id(&id)
                .await
                .map_err(AppError::Mailbox)?;

            if sink.send(RawMessage::from_gmail_message(msg)).await.is_err() {
                tracing::warn!("Filter stage closed after {} / {} messages", i, total);
                return Ok(());
            }
        }

        tracing::debug!("Fetched {} messages", total);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use base64::{engine::general_purpose::URL_SAFE, Engine};
    use serde_json::json;
    use wiremock::{
        matchers::{bearer_token, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    // Padded to a multiple of 3 bytes so the base64 form has no '=' and reads
    // the same under the standard and url-safe alphabets.
    const RAW_EMAIL: &str = concat!(
        "From: jobs@acme.example\r\n",
        "Subject: Thanks for applying\r\n",
        "Content-Type: text/plain\r\n",
        "\r\n",
        "We got it.\r\n",
    );

    fn raw_payload() -> String {
        let mut raw = RAW_EMAIL.to_string();
        while raw.len() % 3 != 0 {
            raw.push(' ');
        }
        URL_SAFE.encode(raw)
    }

    fn config(server: &MockServer) -> GmailConfig {
        GmailConfig {
            base_url: format!("{}/gmail/v1/users/me", server.uri()),
            quota_per_sec: 10_000,
        }
    }

    async fn mount_profile(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/profile"))
            .and(bearer_token("token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "emailAddress": "me@example.com",
                "messagesTotal": 2,
                "threadsTotal": 2,
                "historyId": "1234"
            })))
            .mount(server)
            .await;
    }

    #[test]
    fn test_gmail_url() {
        let base = "https://www.googleapis.com/gmail/v1/users/me/";
        assert_eq!(
            gmail_url!(base, "messages"),
            "https://www.googleapis.com/gmail/v1/users/me/messages"
        );
        assert_eq!(
            gmail_url!(base, "messages", "123"),
            "https://www.googleapis.com/gmail/v1/users/me/messages/123"
        );
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/profile"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": { "code": 401, "message": "Invalid Credentials" }
            })))
            .mount(&server)
            .await;

        let result = GmailReader::connect(HttpClient::new(), &config(&server), "bad".into()).await;
        assert!(matches!(result, Err(AppError::Setup(_))));
    }

    #[tokio::test]
    async fn test_search_follows_pages() {
        let server = MockServer::start().await;
        mount_profile(&server).await;

        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages"))
            .and(query_param("pageToken", "p2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messages": [{ "id": "c", "threadId": "c" }],
                "resultSizeEstimate": 1
            })))
            .with_priority(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages"))
            .and(query_param("q", "after:1700000000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messages": [{ "id": "a", "threadId": "a" }, { "id": "b", "threadId": "b" }],
                "nextPageToken": "p2",
                "resultSizeEstimate": 3
            })))
            .with_priority(2)
            .mount(&server)
            .await;

        let reader = GmailReader::connect(HttpClient::new(), &config(&server), "token".into())
            .await
            .unwrap();
        assert_eq!(reader.email_address, "me@example.com");

        let since = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        let ids = reader.search(since).await.unwrap();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_search_with_no_results() {
        let server = MockServer::start().await;
        mount_profile(&server).await;
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "resultSizeEstimate": 0
            })))
            .mount(&server)
            .await;

        let reader = GmailReader::connect(HttpClient::new(), &config(&server), "token".into())
            .await
            .unwrap();
        let ids = reader.search(Utc::now()).await.unwrap();
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_sends_parsed_messages_in_order() {
        let server = MockServer::start().await;
        mount_profile(&server).await;
        for id in ["m1", "m2"] {
            Mock::given(method("GET"))
                .and(path(format!("/gmail/v1/users/me/messages/{id}")))
                .and(query_param("format", "RAW"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "id": id,
                    "threadId": id,
                    "internalDate": "1700000000000",
                    "raw": raw_payload()
                })))
                .mount(&server)
                .await;
        }

        let reader = GmailReader::connect(HttpClient::new(), &config(&server), "token".into())
            .await
            .unwrap();
        let (tx, mut rx) = mpsc::channel(4);
        reader
            .fetch(vec!["m1".to_string(), "m2".to_string()], tx)
            .await
            .unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(rx.recv().await.is_none());

        assert_eq!(first.id, "m1");
        assert_eq!(second.id, "m2");
        let envelope = first.envelope.unwrap();
        assert_eq!(envelope.subject, "Thanks for applying");
        assert_eq!(envelope.from[0].host, "acme.example");
    }

    #[tokio::test]
    async fn test_fetch_error_is_reported() {
        let server = MockServer::start().await;
        mount_profile(&server).await;
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages/gone"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": { "code": 404, "message": "Requested entity was not found." }
            })))
            .mount(&server)
            .await;

        let reader = GmailReader::connect(HttpClient::new(), &config(&server), "token".into())
            .await
            .unwrap();
        let (tx, _rx) = mpsc::channel(1);
        let result = reader.fetch(vec!["gone".to_string()], tx).await;
        assert!(matches!(result, Err(AppError::Mailbox(_))));
    }

    #[tokio::test]
    async fn test_fetch_stops_when_receiver_dropped() {
        let server = MockServer::start().await;
        mount_profile(&server).await;
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages/m1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "m1",
                "raw": raw_payload()
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reader = GmailReader::connect(HttpClient::new(), &config(&server), "token".into())
            .await
            .unwrap();
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let result = reader
            .fetch(vec!["m1".to_string(), "m2".to_string()], tx)
            .await;
        assert!(result.is_ok());
    }

    #[cfg(feature = "integration")]
    #[tokio::test]
    async fn test_search_live_mailbox() {
        let (config, secrets, http_client) = crate::testing::common::setup();
        let reader = GmailReader::connect(http_client, &config.gmail, secrets.gmail_access_token)
            .await
            .unwrap();
        let since = Utc::now() - chrono::Duration::days(7);
        let ids = reader.search(since).await.unwrap();
        println!("{} messages in the last week for {}", ids.len(), reader.email_address);
    }
}
