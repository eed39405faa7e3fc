pub mod dashboard;

pub use dashboard::Dashboard;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::error::ErrorResponse;
use crate::models::{
    Category, NewCategoryRequest, NewTaskRequest, Status, Task, TaskFilter, UpdateCategoryRequest,
    UpdateStatusRequest, UpdateTaskRequest,
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
}

/// Every operation the task API exposes.
#[async_trait]
pub trait TaskApi: Send + Sync {
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, ClientError>;
    async fn get_task(&self, id: &str) -> Result<Task, ClientError>;
    async fn create_task(&self, req: &NewTaskRequest) -> Result<Task, ClientError>;
    async fn update_task(&self, id: &str, req: &UpdateTaskRequest) -> Result<Task, ClientError>;
    async fn update_task_status(&self, id: &str, status: Status) -> Result<Task, ClientError>;
    async fn delete_task(&self, id: &str) -> Result<(), ClientError>;
    async fn list_categories(&self) -> Result<Vec<Category>, ClientError>;
    async fn get_category(&self, id: &str) -> Result<Category, ClientError>;
    async fn create_category(&self, req: &NewCategoryRequest) -> Result<Category, ClientError>;
    async fn update_category(
        &self,
        id: &str,
        req: &UpdateCategoryRequest,
    ) -> Result<Category, ClientError>;
    async fn delete_category(&self, id: &str) -> Result<(), ClientError>;
}

/// HTTP client for the task API.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let raw = base_url.into();
        let base_url = Url::parse(raw.trim_end_matches('/'))
            .map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(raw));
        }
        let client = Client::builder().build()?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Appends `segments` to the base path, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        self.client.request(method, self.url(segments))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = check(builder.send().await?).await?;
        Ok(response.json::<T>().await?)
    }

    async fn send_empty(&self, builder: RequestBuilder) -> Result<(), ClientError> {
        check(builder.send().await?).await?;
        Ok(())
    }

    async fn send_body<B, T>(
        &self,
        method: Method,
        segments: &[&str],
        body: &B,
    ) -> Result<T, ClientError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        self.send_json(self.request(method, segments).json(body))
            .await
    }
}

async fn check(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.message)
        .unwrap_or(body);
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Query parameters for the supplied filters only.
fn filter_pairs(filter: &TaskFilter) -> Vec<(&'static str, &str)> {
    let mut pairs = Vec::new();
    if let Some(status) = filter.status {
        pairs.push(("status", status.as_str()));
    }
    if let Some(priority) = filter.priority {
        pairs.push(("priority", priority.as_str()));
    }
    if let Some(category_id) = filter.category_id.as_deref() {
        pairs.push(("categoryId", category_id));
    }
    pairs
}

#[async_trait]
impl TaskApi for ApiClient {
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, ClientError> {
        let mut url = self.url(&["tasks"]);
        let pairs = filter_pairs(filter);
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        self.send_json(self.client.get(url)).await
    }

    async fn get_task(&self, id: &str) -> Result<Task, ClientError> {
        self.send_json(self.request(Method::GET, &["tasks", id]))
            .await
    }

    async fn create_task(&self, req: &NewTaskRequest) -> Result<Task, ClientError> {
        self.send_body(Method::POST, &["tasks"], req).await
    }

    async fn update_task(&self, id: &str, req: &UpdateTaskRequest) -> Result<Task, ClientError> {
        self.send_body(Method::PATCH, &["tasks", id], req).await
    }

    async fn update_task_status(&self, id: &str, status: Status) -> Result<Task, ClientError> {
        let req = UpdateStatusRequest { status };
        self.send_body(Method::PATCH, &["tasks", id, "status"], &req)
            .await
    }

    async fn delete_task(&self, id: &str) -> Result<(), ClientError> {
        self.send_empty(self.request(Method::DELETE, &["tasks", id]))
            .await
    }

    async fn list_categories(&self) -> Result<Vec<Category>, ClientError> {
        self.send_json(self.request(Method::GET, &["categories"]))
            .await
    }

    async fn get_category(&self, id: &str) -> Result<Category, ClientError> {
        self.send_json(self.request(Method::GET, &["categories", id]))
            .await
    }

    async fn create_category(&self, req: &NewCategoryRequest) -> Result<Category, ClientError> {
        self.send_body(Method::POST, &["categories"], req).await
    }

    async fn update_category(
        &self,
        id: &str,
        req: &UpdateCategoryRequest,
    ) -> Result<Category, ClientError> {
        self.send_body(Method::PATCH, &["categories", id], req)
            .await
    }

    async fn delete_category(&self, id: &str) -> Result<(), ClientError> {
        self.send_empty(self.request(Method::DELETE, &["categories", id]))
            .await
    }
}
