//! Dashboard client: the store and the gateway joined behind one handle.
//!
//! Views call this instead of the gateway directly so the bearer token comes
//! from the store and results flow back into it.

use std::sync::Arc;

use tracing::info;

use crate::config::DashboardConfig;
use crate::error::{CsvdashError, Result};
use crate::gateway::{DataQuery, DownloadQuery, Gateway, GatewayConfig, HttpGateway};
use crate::models::{FileId, FileRecord};
use crate::responses::{
    ActivityData, DashboardOverview, DataQuality, DownloadLink, FileDataResponse, FilePreview,
    FileStatistics, LoginResponse, SystemStats,
};
use crate::storage::YamlSessionStorage;
use crate::store::Store;
use crate::upload::{ResolutionPolicy, UploadController};

#[derive(Clone)]
pub struct DashboardClient {
    gateway: Arc<dyn Gateway>,
    store: Arc<Store>,
    policy: ResolutionPolicy,
}

impl DashboardClient {
    pub fn new(gateway: Arc<dyn Gateway>, store: Arc<Store>) -> Self {
        Self {
            gateway,
            store,
            policy: ResolutionPolicy::default(),
        }
    }

    /// HTTP gateway plus a YAML-persisted store, as described by `config`.
    pub fn from_config(config: &DashboardConfig) -> Result<Self> {
        let mut gateway_config = GatewayConfig::new(config.api_url.clone());
        gateway_config.timeout = config.request_timeout;
        let gateway = HttpGateway::new(gateway_config)?;
        let storage = YamlSessionStorage::new(config.session_path.clone());
        let store = Store::new(Arc::new(storage))?;
        Ok(Self::new(Arc::new(gateway), Arc::new(store)).with_policy(config.resolution))
    }

    pub fn with_policy(mut self, policy: ResolutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    pub fn uploader(&self) -> UploadController {
        UploadController::new(Arc::clone(&self.gateway), Arc::clone(&self.store))
            .with_policy(self.policy)
    }

    fn token(&self) -> Result<String> {
        self.store.token().ok_or(CsvdashError::NotAuthenticated)
    }

    // ─── Session ─────────────────────────────────────────────────────────────

    /// Exchange credentials for a token and start the session.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        let response = self.gateway.login(username, password).await?;
        self.store.login(response.access_token.clone())?;
        info!(username, "Logged in");
        Ok(response)
    }

    pub fn logout(&self) -> Result<()> {
        self.store.logout()
    }

    // ─── File management ─────────────────────────────────────────────────────

    /// Replace the store's file list with the backend's. Returns the new count.
    pub async fn refresh_files(&self) -> Result<usize> {
        let token = self.token()?;
        let files: Vec<FileRecord> = self
            .gateway
            .get_files(&token)
            .await?
            .into_iter()
            .map(FileRecord::from)
            .collect();
        let count = files.len();
        self.store.set_files(files);
        Ok(count)
    }

    /// Fetch fresh metadata for one file and merge it into the store.
    pub async fn file_details(&self, id: &FileId) -> Result<FileRecord> {
        let token = self.token()?;
        let remote = remote_id(id)?;
        let record = FileRecord::from(self.gateway.get_file_by_id(remote, &token).await?);
        self.store.insert_file(record.clone());
        Ok(record)
    }

    /// Delete on the backend, then locally. Local-only records skip the backend.
    pub async fn delete_file(&self, id: &FileId) -> Result<()> {
        if let Some(remote) = id.as_remote() {
            let token = self.token()?;
            let response = self.gateway.delete_file(remote, &token).await?;
            info!(id = remote, message = %response.message, "File deleted");
        }
        self.store.remove_file(id);
        Ok(())
    }

    pub async fn file_data(&self, id: &FileId, query: DataQuery) -> Result<FileDataResponse> {
        let token = self.token()?;
        self.gateway.get_file_data(remote_id(id)?, &token, query).await
    }

    pub async fn file_statistics(&self, id: &FileId) -> Result<FileStatistics> {
        let token = self.token()?;
        self.gateway.get_file_statistics(remote_id(id)?, &token).await
    }

    pub async fn file_preview(&self, id: &FileId, rows: u32) -> Result<FilePreview> {
        let token = self.token()?;
        self.gateway.get_file_preview(remote_id(id)?, &token, rows).await
    }

    pub async fn download_link(&self, id: &FileId, query: DownloadQuery) -> Result<DownloadLink> {
        let token = self.token()?;
        self.gateway.get_download_link(remote_id(id)?, &token, query).await
    }

    // ─── Analytics ───────────────────────────────────────────────────────────

    pub async fn overview(&self) -> Result<DashboardOverview> {
        self.gateway.dashboard_overview(&self.token()?).await
    }

    pub async fn activity(&self, days: u32) -> Result<ActivityData> {
        self.gateway.dashboard_activity(&self.token()?, days).await
    }

    pub async fn data_quality(&self) -> Result<DataQuality> {
        self.gateway.dashboard_data_quality(&self.token()?).await
    }

    pub async fn system_stats(&self) -> Result<SystemStats> {
        self.gateway.dashboard_system_stats(&self.token()?).await
    }
}

fn remote_id(id: &FileId) -> Result<u64> {
    id.as_remote().ok_or_else(|| {
        CsvdashError::Other(format!("File {} has not been registered with the backend", id))
    })
}
