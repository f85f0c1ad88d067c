//! HTTP gateway to the conversion backend.
//!
//! [`Gateway`] is the seam every view goes through; [`HttpGateway`] is the
//! reqwest implementation. Any non-2xx answer becomes
//! [`CsvdashError::Api`] carrying the status and the backend's `detail`
//! message. The gateway never retries.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{CsvdashError, Result};
use crate::responses::{
    ActivityData, DashboardOverview, DataQuality, DeleteResponse, DownloadLink, FileDataResponse,
    FileMetadata, FilePreview, FileStatistics, LoginResponse, SystemStats,
};

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// A CSV file ready to be sent to `/upload`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub filename: String,
    pub contents: Vec<u8>,
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            contents: contents.into(),
        }
    }

    pub async fn from_path(path: &Path) -> Result<Self> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| CsvdashError::Other(format!("Invalid file path: {}", path.display())))?
            .to_string();
        let contents = tokio::fs::read(path).await?;
        Ok(Self { filename, contents })
    }

    /// Only `.csv` files (any case) are accepted by the backend.
    pub fn is_csv(&self) -> bool {
        Path::new(&self.filename)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
    }
}

/// Which representation of a file to read or download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataFormat {
    Csv,
    #[default]
    Parquet,
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataFormat::Csv => write!(f, "csv"),
            DataFormat::Parquet => write!(f, "parquet"),
        }
    }
}

impl FromStr for DataFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(DataFormat::Csv),
            "parquet" => Ok(DataFormat::Parquet),
            other => Err(format!("unknown format '{}', expected csv or parquet", other)),
        }
    }
}

/// Pagination for `/files/{id}/data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataQuery {
    pub limit: u32,
    pub offset: u64,
    pub format: DataFormat,
}

impl Default for DataQuery {
    fn default() -> Self {
        Self {
            limit: 100,
            offset: 0,
            format: DataFormat::Parquet,
        }
    }
}

/// Parameters for `/files/{id}/download`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadQuery {
    pub format: DataFormat,
    pub expiration_hours: u32,
}

impl Default for DownloadQuery {
    fn default() -> Self {
        Self {
            format: DataFormat::Parquet,
            expiration_hours: 24,
        }
    }
}

#[async_trait]
pub trait Gateway: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse>;
    async fn upload_file(&self, file: &UploadFile, token: &str) -> Result<FileMetadata>;
    async fn get_files(&self, token: &str) -> Result<Vec<FileMetadata>>;
    async fn get_file_by_id(&self, id: u64, token: &str) -> Result<FileMetadata>;
    async fn delete_file(&self, id: u64, token: &str) -> Result<DeleteResponse>;
    async fn get_file_data(&self, id: u64, token: &str, query: DataQuery)
        -> Result<FileDataResponse>;
    async fn get_file_statistics(&self, id: u64, token: &str) -> Result<FileStatistics>;
    async fn get_file_preview(&self, id: u64, token: &str, rows: u32) -> Result<FilePreview>;
    async fn get_download_link(
        &self,
        id: u64,
        token: &str,
        query: DownloadQuery,
    ) -> Result<DownloadLink>;
    async fn dashboard_overview(&self, token: &str) -> Result<DashboardOverview>;
    async fn dashboard_activity(&self, token: &str, days: u32) -> Result<ActivityData>;
    async fn dashboard_data_quality(&self, token: &str) -> Result<DataQuality>;
    async fn dashboard_system_stats(&self, token: &str) -> Result<SystemStats>;
}

// ─── reqwest implementation ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Backend root, e.g. `http://localhost:8000`.
    pub base_url: String,
    /// Whole-request timeout. `None` leaves it to the transport.
    pub timeout: Option<Duration>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout: None,
        }
    }
}

impl GatewayConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("csvdash/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    fn get(&self, endpoint: &str, token: &str) -> RequestBuilder {
        self.client.get(self.url(endpoint)).bearer_auth(token)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: &str,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<T> {
        debug!(method, endpoint, "Backend request");
        let response = request.send().await.map_err(|e| {
            warn!(method, endpoint, error = %e, "Backend unreachable");
            CsvdashError::Http(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            let err = api_error(status, &body);
            warn!(method, endpoint, status = status.as_u16(), error = %err, "Backend request failed");
            return Err(err);
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| CsvdashError::Decode {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        let request = self
            .client
            .post(self.url("/login"))
            .json(&serde_json::json!({ "username": username, "password": password }));
        self.send("POST", "/login", request).await
    }

    async fn upload_file(&self, file: &UploadFile, token: &str) -> Result<FileMetadata> {
        let part = Part::bytes(file.contents.clone())
            .file_name(file.filename.clone())
            .mime_str("text/csv")?;
        let request = self
            .client
            .post(self.url("/upload"))
            .bearer_auth(token)
            .multipart(Form::new().part("file", part));
        self.send("POST", "/upload", request).await
    }

    async fn get_files(&self, token: &str) -> Result<Vec<FileMetadata>> {
        self.send("GET", "/files", self.get("/files", token)).await
    }

    async fn get_file_by_id(&self, id: u64, token: &str) -> Result<FileMetadata> {
        let endpoint = format!("/files/{}", id);
        self.send("GET", &endpoint, self.get(&endpoint, token)).await
    }

    async fn delete_file(&self, id: u64, token: &str) -> Result<DeleteResponse> {
        let endpoint = format!("/files/{}", id);
        let request = self.client.delete(self.url(&endpoint)).bearer_auth(token);
        self.send("DELETE", &endpoint, request).await
    }

    async fn get_file_data(
        &self,
        id: u64,
        token: &str,
        query: DataQuery,
    ) -> Result<FileDataResponse> {
        let endpoint = format!("/files/{}/data", id);
        let request = self.get(&endpoint, token).query(&[
            ("limit", query.limit.to_string()),
            ("offset", query.offset.to_string()),
            ("format", query.format.to_string()),
        ]);
        self.send("GET", &endpoint, request).await
    }

    async fn get_file_statistics(&self, id: u64, token: &str) -> Result<FileStatistics> {
        let endpoint = format!("/files/{}/statistics", id);
        self.send("GET", &endpoint, self.get(&endpoint, token)).await
    }

    async fn get_file_preview(&self, id: u64, token: &str, rows: u32) -> Result<FilePreview> {
        let endpoint = format!("/files/{}/preview", id);
        let request = self.get(&endpoint, token).query(&[("rows", rows)]);
        self.send("GET", &endpoint, request).await
    }

    async fn get_download_link(
        &self,
        id: u64,
        token: &str,
        query: DownloadQuery,
    ) -> Result<DownloadLink> {
        let endpoint = format!("/files/{}/download", id);
        let request = self.get(&endpoint, token).query(&[
            ("format", query.format.to_string()),
            ("expiration_hours", query.expiration_hours.to_string()),
        ]);
        self.send("GET", &endpoint, request).await
    }

    async fn dashboard_overview(&self, token: &str) -> Result<DashboardOverview> {
        let endpoint = "/dashboard/overview";
        self.send("GET", endpoint, self.get(endpoint, token)).await
    }

    async fn dashboard_activity(&self, token: &str, days: u32) -> Result<ActivityData> {
        let endpoint = "/dashboard/activity";
        let request = self.get(endpoint, token).query(&[("days", days)]);
        self.send("GET", endpoint, request).await
    }

    async fn dashboard_data_quality(&self, token: &str) -> Result<DataQuality> {
        let endpoint = "/dashboard/data-quality";
        self.send("GET", endpoint, self.get(endpoint, token)).await
    }

    async fn dashboard_system_stats(&self, token: &str) -> Result<SystemStats> {
        let endpoint = "/dashboard/system-stats";
        self.send("GET", endpoint, self.get(endpoint, token)).await
    }
}

// ─── Error normalization ─────────────────────────────────────────────────────

/// Build the typed error for a non-success response.
///
/// The message is the body's `detail` field when present (a string, or the
/// `msg` entries of a validation error list), else the HTTP status text.
pub fn api_error(status: StatusCode, body: &[u8]) -> CsvdashError {
    let message = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| detail_message(&value))
        .unwrap_or_else(|| status_text(status));
    CsvdashError::api(status.as_u16(), message)
}

fn detail_message(body: &Value) -> Option<String> {
    match body.get("detail")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Array(items) => {
            let messages: Vec<String> = items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    other => other.get("msg").and_then(Value::as_str).map(str::to_string),
                })
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        _ => None,
    }
}

fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.as_u16().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_detail_string_is_the_message() {
        let err = api_error(StatusCode::NOT_FOUND, br#"{"detail":"File not found"}"#);
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.message(), "File not found");
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_unparseable_body_falls_back_to_status_text() {
        let err = api_error(StatusCode::INTERNAL_SERVER_ERROR, b"<html>oops</html>");
        assert_eq!(err.message(), "Internal Server Error");
        assert_eq!(err.kind(), ErrorKind::Server);

        let err = api_error(StatusCode::BAD_GATEWAY, b"");
        assert_eq!(err.message(), "Bad Gateway");
    }

    #[test]
    fn test_validation_detail_list_is_flattened() {
        let body = br#"{"detail":[{"loc":["query","limit"],"msg":"value is not a valid integer"},{"msg":"field required"}]}"#;
        let err = api_error(StatusCode::UNPROCESSABLE_ENTITY, body);
        assert_eq!(err.message(), "value is not a valid integer; field required");
    }

    #[test]
    fn test_auth_statuses() {
        assert!(api_error(StatusCode::UNAUTHORIZED, b"{}").is_auth());
        assert!(api_error(StatusCode::FORBIDDEN, b"{}").is_auth());
        assert!(!api_error(StatusCode::BAD_REQUEST, b"{}").is_auth());
    }

    #[test]
    fn test_csv_extension_check() {
        assert!(UploadFile::new("data.csv", "a,b").is_csv());
        assert!(UploadFile::new("DATA.CSV", "a,b").is_csv());
        assert!(!UploadFile::new("data.txt", "a,b").is_csv());
        assert!(!UploadFile::new("csv", "a,b").is_csv());
    }
}
