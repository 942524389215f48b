//! HTTP client for the tracker API, used by the timer to commit finished entries.

use crate::models::{
    ExtensionStatus, NewTimeEntry, Project, StatsResponse, TimeEntry, TimerResponse,
};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server answered {status}: {message}")]
    Api { status: u16, message: String },
}

/// Destination for completed timer entries.
#[async_trait]
pub trait EntrySink: Send + Sync {
    async fn commit(&self, entry: &NewTimeEntry) -> Result<TimeEntry, ClientError>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn list_projects(&self) -> Result<Vec<Project>, ClientError> {
        decode(self.http.get(self.url("/api/projects")).send().await?).await
    }

    pub async fn create_project(
        &self,
        name: &str,
        color: Option<&str>,
    ) -> Result<Project, ClientError> {
        let body = json!({ "name": name, "color": color });
        decode(
            self.http
                .post(self.url("/api/projects"))
                .json(&body)
                .send()
                .await?,
        )
        .await
    }

    pub async fn list_entries(&self) -> Result<Vec<TimeEntry>, ClientError> {
        decode(self.http.get(self.url("/api/time-entries")).send().await?).await
    }

    pub async fn stats(&self) -> Result<StatsResponse, ClientError> {
        decode(self.http.get(self.url("/api/stats")).send().await?).await
    }

    pub async fn extension_status(&self) -> Result<ExtensionStatus, ClientError> {
        decode(self.http.get(self.url("/api/extension/status")).send().await?).await
    }

    pub async fn start_timer(
        &self,
        project_id: Uuid,
        description: Option<&str>,
    ) -> Result<TimerResponse, ClientError> {
        let body = json!({ "projectId": project_id, "description": description });
        decode(
            self.http
                .post(self.url("/api/extension/start-timer"))
                .json(&body)
                .send()
                .await?,
        )
        .await
    }

    pub async fn stop_timer(&self, description: Option<&str>) -> Result<TimerResponse, ClientError> {
        let body = json!({ "description": description });
        decode(
            self.http
                .post(self.url("/api/extension/stop-timer"))
                .json(&body)
                .send()
                .await?,
        )
        .await
    }
}

#[async_trait]
impl EntrySink for ApiClient {
    async fn commit(&self, entry: &NewTimeEntry) -> Result<TimeEntry, ClientError> {
        decode(
            self.http
                .post(self.url("/api/time-entries"))
                .json(entry)
                .send()
                .await?,
        )
        .await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}
