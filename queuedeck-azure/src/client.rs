//! REST client for the Azure Queue service

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use queuedeck_auth::{
    format_date, ConnectionString, ConnectionStringError, Credential, SharedKeySigner,
    SigningError, StorageRequest,
};
use queuedeck_core::{QueueBackend, QueueError, QueueMessage, ReceivedMessage, MAX_PEEK_MESSAGES};
use reqwest::{Method, Response, StatusCode};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::xml;

/// Storage service version sent with every request
pub const API_VERSION: &str = "2021-12-02";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Characters left untouched when a message id is used as a path segment
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Debug, Error)]
pub enum AzureError {
    #[error("Invalid connection string: {0}")]
    ConnectionString(#[from] ConnectionStringError),

    #[error("Invalid credentials: {0}")]
    Signing(#[from] SigningError),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

enum Authorization {
    SharedKey(SharedKeySigner),
    Sas(String),
}

/// Queue backend that calls the Azure Queue service over HTTPS
pub struct AzureQueueService {
    client: reqwest::Client,
    endpoint: Url,
    authorization: Authorization,
}

impl std::fmt::Debug for AzureQueueService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureQueueService")
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

impl AzureQueueService {
    pub fn new(connection: ConnectionString) -> Result<Self, AzureError> {
        let authorization = match connection.credential {
            Credential::SharedKey(key) => {
                Authorization::SharedKey(SharedKeySigner::new(connection.account_name, &key)?)
            }
            Credential::Sas(token) => Authorization::Sas(token),
        };

        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        info!(endpoint = %connection.queue_endpoint, "Using Azure Queue service");
        Ok(Self {
            client,
            endpoint: connection.queue_endpoint,
            authorization,
        })
    }

    pub fn from_connection_string(connection_string: &str) -> Result<Self, AzureError> {
        Self::new(ConnectionString::parse(connection_string)?)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Build a URL below the account endpoint
    fn url(&self, path: &str, query: &[(&str, &str)]) -> Url {
        let mut url = self.endpoint.clone();
        let base = self.endpoint.path().trim_end_matches('/');
        url.set_path(&format!("{base}/{path}"));

        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in query {
                pairs.append_pair(name, value);
            }
        }

        if let Authorization::Sas(token) = &self.authorization {
            let query = match url.query() {
                Some(existing) if !existing.is_empty() => format!("{existing}&{token}"),
                _ => token.clone(),
            };
            url.set_query(Some(&query));
        }

        url
    }

    fn messages_url(&self, queue: &str, query: &[(&str, &str)]) -> Url {
        self.url(&format!("{queue}/messages"), query)
    }

    fn message_url(&self, queue: &str, message_id: &str, query: &[(&str, &str)]) -> Url {
        let id = utf8_percent_encode(message_id, PATH_SEGMENT);
        self.url(&format!("{queue}/messages/{id}"), query)
    }

    /// Sign and send a request, turning non-success statuses into errors
    async fn execute(
        &self,
        method: Method,
        url: Url,
        body: Option<String>,
    ) -> Result<Response, QueueError> {
        let mut headers = vec![
            ("x-ms-date".to_string(), format_date(Utc::now())),
            ("x-ms-version".to_string(), API_VERSION.to_string()),
        ];
        if body.is_some() {
            headers.push((
                "Content-Type".to_string(),
                "application/xml; charset=utf-8".to_string(),
            ));
        }

        if let Authorization::SharedKey(signer) = &self.authorization {
            let content_length = body.as_ref().map_or(0, String::len).to_string();
            let mut signed = headers.clone();
            signed.push(("Content-Length".to_string(), content_length));
            let authorization = signer.authorization(&StorageRequest {
                method: method.as_str(),
                url: &url,
                headers: &signed,
            });
            headers.push(("Authorization".to_string(), authorization));
        }

        debug!(method = %method, path = %url.path(), "Queue service request");

        let mut request = self.client.request(method.clone(), url.clone());
        for (name, value) in &headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            request = request.body(body);
        } else if method == Method::PUT || method == Method::POST {
            request = request.body(String::new());
        }

        let response = request
            .send()
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let header_code = response
            .headers()
            .get("x-ms-error-code")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let text = response.text().await.unwrap_or_default();
        let (body_code, body_message) = xml::parse_error(&text);

        let code = header_code
            .or(body_code)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown").to_string());
        let message = body_message.unwrap_or_else(|| status.to_string());

        warn!(method = %method, path = %url.path(), status = %status, code = %code, "Queue service error");
        Err(QueueError::from_service(status.as_u16(), &code, message))
    }

    async fn execute_text(
        &self,
        method: Method,
        url: Url,
        body: Option<String>,
    ) -> Result<String, QueueError> {
        self.execute(method, url, body)
            .await?
            .text()
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))
    }
}

#[async_trait]
impl QueueBackend for AzureQueueService {
    fn kind(&self) -> &'static str {
        "azure"
    }

    async fn list_queues(&self) -> Result<Vec<String>, QueueError> {
        let mut names = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let url = match marker.as_deref() {
                Some(marker) => self.url("", &[("comp", "list"), ("marker", marker)]),
                None => self.url("", &[("comp", "list")]),
            };
            let body = self.execute_text(Method::GET, url, None).await?;
            let page = xml::parse_queue_page(&body)?;
            names.extend(page.names);

            match page.next_marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        debug!(count = names.len(), "Listed queues");
        Ok(names)
    }

    async fn queue_exists(&self, queue: &str) -> Result<bool, QueueError> {
        match self
            .execute(Method::GET, self.url(queue, &[("comp", "metadata")]), None)
            .await
        {
            Ok(_) => Ok(true),
            Err(QueueError::QueueNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_queue(&self, queue: &str) -> Result<(), QueueError> {
        match self.execute(Method::PUT, self.url(queue, &[]), None).await {
            Ok(response) => {
                info!(queue = %queue, created = response.status() == StatusCode::CREATED, "Create queue");
                Ok(())
            }
            // Exists with different metadata; still usable
            Err(QueueError::Service { code, .. }) if code == "QueueAlreadyExists" => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn peek_messages(&self, queue: &str, max: u32) -> Result<Vec<QueueMessage>, QueueError> {
        let count = max.clamp(1, MAX_PEEK_MESSAGES).to_string();
        let url = self.messages_url(queue, &[("peekonly", "true"), ("numofmessages", &count)]);
        let body = self.execute_text(Method::GET, url, None).await?;
        xml::parse_peeked(&body)
    }

    async fn receive_messages(
        &self,
        queue: &str,
        max: u32,
        visibility_timeout: Duration,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        let count = max.clamp(1, MAX_PEEK_MESSAGES).to_string();
        // The service rejects a receive visibility timeout below one second
        let timeout = visibility_timeout.as_secs().max(1).to_string();
        let url = self.messages_url(
            queue,
            &[("numofmessages", &count), ("visibilitytimeout", &timeout)],
        );
        let body = self.execute_text(Method::GET, url, None).await?;
        xml::parse_received(&body)
    }

    async fn delete_message(&self, queue: &str, message: &ReceivedMessage) -> Result<(), QueueError> {
        let url = self.message_url(
            queue,
            message.id(),
            &[("popreceipt", message.pop_receipt().as_str())],
        );
        self.execute(Method::DELETE, url, None).await?;
        Ok(())
    }

    async fn release_message(&self, queue: &str, message: &ReceivedMessage) -> Result<(), QueueError> {
        let url = self.message_url(
            queue,
            message.id(),
            &[
                ("popreceipt", message.pop_receipt().as_str()),
                ("visibilitytimeout", "0"),
            ],
        );
        self.execute(Method::PUT, url, None).await?;
        Ok(())
    }

    async fn send_message(&self, queue: &str, text: &str) -> Result<QueueMessage, QueueError> {
        let body = xml::format_put_message(text);
        let response = self
            .execute_text(Method::POST, self.messages_url(queue, &[]), Some(body))
            .await?;
        let message = xml::parse_sent(&response, text)?;
        info!(queue = %queue, message_id = %message.id, "Sent message");
        Ok(message)
    }
}
