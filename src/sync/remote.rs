use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Rate limit exceeded")]
    RateLimited,
    #[error("Authentication failed")]
    AuthenticationFailed,
    #[error("Status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Status and parsed JSON body of a response the server accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub data: Value,
}

impl ApiResponse {
    pub fn new(status: u16, data: Value) -> Self {
        Self { status, data }
    }

    pub fn ok(data: Value) -> Self {
        Self::new(200, data)
    }
}

/// The store's only way to reach the server.
///
/// Implementations reject transport failures and non-2xx statuses; any 2xx
/// response is handed back with its status so callers can be stricter.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteAccessor: Send + Sync {
    async fn get(&self, path: &str) -> Result<ApiResponse, ApiError>;

    async fn post(&self, path: &str, body: Option<Value>) -> Result<ApiResponse, ApiError>;

    async fn delete(&self, path: &str, body: Option<Value>) -> Result<ApiResponse, ApiError>;
}

pub struct HttpAccessor {
    base_url: String,
    client: reqwest::Client,
}

impl HttpAccessor {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        &self,
        method: &str,
        path: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<ApiResponse, ApiError> {
        let response = request.send().await?;

        let status = response.status();
        tracing::info!("{} {} response status: {}", method, path, status);

        if status == 401 {
            tracing::error!("Authentication failed for {} {}", method, path);
            return Err(ApiError::AuthenticationFailed);
        }

        if status == 404 {
            tracing::error!("Resource not found: {}", path);
            return Err(ApiError::NotFound(path.to_string()));
        }

        if status == 429 {
            tracing::warn!("Rate limit exceeded");
            return Err(ApiError::RateLimited);
        }

        if !status.is_success() {
            let body = response.text().await?;
            tracing::error!("{} {} failed. Status: {}, Body: {}", method, path, status, body);
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let data = if body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&body)
                .map_err(|e| ApiError::ParseError(format!("{} {}: {}", method, path, e)))?
        };

        Ok(ApiResponse::new(status.as_u16(), data))
    }
}

#[async_trait]
impl RemoteAccessor for HttpAccessor {
    async fn get(&self, path: &str) -> Result<ApiResponse, ApiError> {
        tracing::debug!("GET {}", path);
        let request = self.client.get(self.url(path));
        self.send("GET", path, request).await
    }

    async fn post(&self, path: &str, body: Option<Value>) -> Result<ApiResponse, ApiError> {
        tracing::debug!("POST {} with payload: {:?}", path, body);
        let mut request = self.client.post(self.url(path));
        if let Some(body) = &body {
            request = request.json(body);
        }
        self.send("POST", path, request).await
    }

    async fn delete(&self, path: &str, body: Option<Value>) -> Result<ApiResponse, ApiError> {
        tracing::debug!("DELETE {} with payload: {:?}", path, body);
        let mut request = self.client.delete(self.url(path));
        if let Some(body) = &body {
            request = request.json(body);
        }
        self.send("DELETE", path, request).await
    }
}
