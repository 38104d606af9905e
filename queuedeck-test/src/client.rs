//! Client that drives the console the way a browser does

use reqwest::{redirect::Policy, Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

/// A message as the JSON endpoints report it
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConsoleMessage {
    pub id: String,
    pub content: String,
}

/// Outcome of `GET /read/next`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopResult {
    Message(ConsoleMessage),
    Empty(String),
}

#[derive(Deserialize)]
struct RefreshResponse {
    messages: Vec<ConsoleMessage>,
}

/// Console client with its own cookie jar. Redirects are not followed, so
/// form actions can be checked for their `303 See Other`.
pub struct ConsoleClient {
    base_url: String,
    client: Client,
}

impl ConsoleClient {
    pub fn new(base_url: String) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .cookie_store(true)
            .redirect(Policy::none())
            .build()?;

        Ok(Self { base_url, client })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn expect_redirect(response: reqwest::Response) -> Result<(), ClientError> {
        let status = response.status();
        if status == StatusCode::SEE_OTHER {
            return Ok(());
        }
        Err(ClientError::UnexpectedStatus {
            status,
            body: response.text().await.unwrap_or_default(),
        })
    }

    // === Pages ===

    /// Render the list view
    pub async fn home(&self) -> Result<String, ClientError> {
        let response = self.client.get(self.url("/")).send().await?;
        Ok(response.error_for_status()?.text().await?)
    }

    /// Render the read view
    pub async fn read_page(&self) -> Result<String, ClientError> {
        let response = self.client.get(self.url("/read")).send().await?;
        Ok(response.error_for_status()?.text().await?)
    }

    // === JSON endpoints ===

    /// Messages currently visible in this session's queue
    pub async fn refresh(&self) -> Result<Vec<ConsoleMessage>, ClientError> {
        let response = self.client.get(self.url("/refresh")).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::UnexpectedStatus {
                status,
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json::<RefreshResponse>().await?.messages)
    }

    /// Pop the next message
    pub async fn read_next(&self) -> Result<PopResult, ClientError> {
        let response = self.client.get(self.url("/read/next")).send().await?;
        let status = response.status();
        let body: Value = response.json().await?;

        if !status.is_success() {
            return Err(ClientError::UnexpectedStatus {
                status,
                body: body.to_string(),
            });
        }

        match (&body["success"], &body["message"]) {
            (Value::Bool(true), message @ Value::Object(_)) => {
                let message = serde_json::from_value(message.clone())
                    .map_err(|e| ClientError::Parse(e.to_string()))?;
                Ok(PopResult::Message(message))
            }
            (Value::Bool(false), Value::String(notice)) => Ok(PopResult::Empty(notice.clone())),
            _ => Err(ClientError::Parse(format!("Unexpected body: {}", body))),
        }
    }

    pub async fn health(&self) -> Result<Value, ClientError> {
        let response = self.client.get(self.url("/health")).send().await?;
        Ok(response.error_for_status()?.json().await?)
    }

    // === Form actions ===

    /// Submit the add form
    pub async fn add(&self, message: &str) -> Result<(), ClientError> {
        let response = self
            .client
            .post(self.url("/add"))
            .form(&[("message", message)])
            .send()
            .await?;
        Self::expect_redirect(response).await
    }

    /// Follow a message's delete link
    pub async fn delete(&self, message_id: &str) -> Result<(), ClientError> {
        let path = queuedeck_web::pages::delete_href(message_id);
        let response = self.client.get(self.url(&path)).send().await?;
        Self::expect_redirect(response).await
    }

    /// Submit the switch-queue form
    pub async fn change_queue(&self, queue_name: &str) -> Result<(), ClientError> {
        let response = self
            .client
            .post(self.url("/change_queue"))
            .form(&[("queue_name", queue_name)])
            .send()
            .await?;
        Self::expect_redirect(response).await
    }
}
