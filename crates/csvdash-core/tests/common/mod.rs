//! Scripted in-process gateway for controller and client tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use csvdash_core::gateway::{DataQuery, DownloadQuery, Gateway, UploadFile};
use csvdash_core::responses::{
    ActivityData, DashboardOverview, DataQuality, DeleteResponse, DownloadLink, FileDataResponse,
    FileMetadata, FilePreview, FileStatistics, LoginResponse, SystemStats,
};
use csvdash_core::{CsvdashError, FileStatus, Result};

/// What `/upload` answers for a given filename.
#[derive(Debug, Clone)]
pub enum UploadReply {
    Accept {
        status: FileStatus,
        rows: Option<u64>,
    },
    Reject {
        status: u16,
        message: String,
    },
}

/// What one poll of `/files/{id}` answers.
#[derive(Debug, Clone)]
pub enum PollReply {
    Status(FileStatus, Option<u64>),
    Fail(u16),
}

pub struct FakeGateway {
    pub uploads: AtomicUsize,
    pub polls: AtomicUsize,
    pub deletes: AtomicUsize,
    next_id: AtomicU64,
    upload_replies: Mutex<HashMap<String, UploadReply>>,
    /// Poll script per filename; the last entry repeats forever.
    poll_replies: Mutex<HashMap<String, VecDeque<PollReply>>>,
    ids: Mutex<HashMap<u64, String>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            uploads: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
            upload_replies: Mutex::new(HashMap::new()),
            poll_replies: Mutex::new(HashMap::new()),
            ids: Mutex::new(HashMap::new()),
        }
    }

    pub fn on_upload(self, filename: &str, reply: UploadReply) -> Self {
        self.upload_replies
            .lock()
            .unwrap()
            .insert(filename.to_string(), reply);
        self
    }

    pub fn on_poll(self, filename: &str, replies: Vec<PollReply>) -> Self {
        self.poll_replies
            .lock()
            .unwrap()
            .insert(filename.to_string(), replies.into());
        self
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    fn metadata(id: u64, filename: &str, status: FileStatus, rows: Option<u64>) -> FileMetadata {
        FileMetadata {
            id,
            filename: filename.to_string(),
            upload_timestamp: Utc::now(),
            row_count: rows,
            parquet_path: (status == FileStatus::Done).then(|| format!("/parquet/{}.parquet", id)),
            status,
        }
    }
}

fn unused<T>() -> Result<T> {
    Err(CsvdashError::Other("not scripted".to_string()))
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn login(&self, username: &str, _password: &str) -> Result<LoginResponse> {
        Ok(LoginResponse {
            access_token: format!("token-{}", username),
            token_type: "bearer".to_string(),
            message: None,
        })
    }

    async fn upload_file(&self, file: &UploadFile, _token: &str) -> Result<FileMetadata> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .upload_replies
            .lock()
            .unwrap()
            .get(&file.filename)
            .cloned()
            .unwrap_or(UploadReply::Accept {
                status: FileStatus::Processing,
                rows: None,
            });
        match reply {
            UploadReply::Accept { status, rows } => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                self.ids.lock().unwrap().insert(id, file.filename.clone());
                Ok(Self::metadata(id, &file.filename, status, rows))
            }
            UploadReply::Reject { status, message } => Err(CsvdashError::api(status, message)),
        }
    }

    async fn get_files(&self, _token: &str) -> Result<Vec<FileMetadata>> {
        unused()
    }

    async fn get_file_by_id(&self, id: u64, _token: &str) -> Result<FileMetadata> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let filename = self
            .ids
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| CsvdashError::api(404, "File not found"))?;
        let reply = {
            let mut scripts = self.poll_replies.lock().unwrap();
            match scripts.get_mut(&filename) {
                Some(script) if script.len() > 1 => script.pop_front(),
                Some(script) => script.front().cloned(),
                None => None,
            }
        }
        .unwrap_or(PollReply::Status(FileStatus::Done, Some(10)));
        match reply {
            PollReply::Status(status, rows) => Ok(Self::metadata(id, &filename, status, rows)),
            PollReply::Fail(status) => Err(CsvdashError::api(status, "poll failed")),
        }
    }

    async fn delete_file(&self, id: u64, _token: &str) -> Result<DeleteResponse> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.ids.lock().unwrap().remove(&id);
        Ok(DeleteResponse {
            message: "File deleted successfully".to_string(),
        })
    }

    async fn get_file_data(
        &self,
        _id: u64,
        _token: &str,
        _query: DataQuery,
    ) -> Result<FileDataResponse> {
        unused()
    }

    async fn get_file_statistics(&self, _id: u64, _token: &str) -> Result<FileStatistics> {
        unused()
    }

    async fn get_file_preview(&self, _id: u64, _token: &str, _rows: u32) -> Result<FilePreview> {
        unused()
    }

    async fn get_download_link(
        &self,
        _id: u64,
        _token: &str,
        _query: DownloadQuery,
    ) -> Result<DownloadLink> {
        unused()
    }

    async fn dashboard_overview(&self, _token: &str) -> Result<DashboardOverview> {
        unused()
    }

    async fn dashboard_activity(&self, _token: &str, _days: u32) -> Result<ActivityData> {
        unused()
    }

    async fn dashboard_data_quality(&self, _token: &str) -> Result<DataQuality> {
        unused()
    }

    async fn dashboard_system_stats(&self, _token: &str) -> Result<SystemStats> {
        unused()
    }
}
