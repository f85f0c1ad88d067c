//! Response shapes returned by the conversion backend.
//!
//! Everything the backend may omit while a file is still converting is an
//! `Option` or defaulted, so views can show "not yet available" instead of failing.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{timestamp, FileId, FileRecord, FileStatus};

pub type Row = HashMap<String, serde_json::Value>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub message: Option<String>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// File metadata as stored by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileMetadata {
    pub id: u64,
    #[serde(alias = "fileName")]
    pub filename: String,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub upload_timestamp: DateTime<Utc>,
    #[serde(default)]
    pub row_count: Option<u64>,
    #[serde(default, alias = "storage_path")]
    pub parquet_path: Option<String>,
    pub status: FileStatus,
}

impl From<FileMetadata> for FileRecord {
    fn from(meta: FileMetadata) -> Self {
        let mut record = FileRecord {
            id: FileId::Remote(meta.id),
            filename: meta.filename,
            upload_timestamp: meta.upload_timestamp,
            status: meta.status,
            row_count: meta.row_count,
            storage_path: meta.parquet_path,
        };
        record.normalize();
        record
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeleteResponse {
    #[serde(default)]
    pub message: String,
}

/// One page of rows read from either the raw CSV or the converted file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileDataResponse {
    pub file_id: u64,
    pub filename: String,
    pub format: String,
    pub total_rows: u64,
    pub returned_rows: u64,
    pub offset: u64,
    pub limit: u64,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub data: Vec<Row>,
}

// ─── Statistics ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileStatistics {
    pub file_info: FileInfo,
    #[serde(default)]
    pub columns: Vec<ColumnStatistics>,
    #[serde(default)]
    pub data_quality: Option<DataQualitySummary>,
    #[serde(default)]
    pub file_sizes: Option<FileSizes>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileInfo {
    pub id: u64,
    pub filename: String,
    pub upload_timestamp: String,
    pub status: FileStatus,
    #[serde(default)]
    pub total_rows: u64,
    #[serde(default)]
    pub total_columns: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnStatistics {
    pub name: String,
    pub data_type: String,
    #[serde(default)]
    pub missing_count: u64,
    #[serde(default)]
    pub missing_percentage: f64,
    #[serde(default)]
    pub unique_count: u64,
    #[serde(default)]
    pub sample_values: Vec<serde_json::Value>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub mean_value: Option<f64>,
    pub median_value: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataQualitySummary {
    pub total_missing_values: u64,
    pub missing_percentage: f64,
    pub duplicate_rows: u64,
    pub unique_rows: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileSizes {
    pub csv_size_bytes: u64,
    pub parquet_size_bytes: u64,
    pub compression_ratio: f64,
    pub space_saved_percentage: f64,
}

// ─── Preview ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilePreview {
    pub file_id: u64,
    pub filename: String,
    pub status: FileStatus,
    pub rows_requested: u64,
    pub csv_preview: PreviewTable,
    /// Absent while the conversion has not produced an artifact yet.
    #[serde(default)]
    pub parquet_preview: Option<PreviewTable>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PreviewTable {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub data: Vec<Row>,
    #[serde(default)]
    pub rows_returned: u64,
}

/// Signed link to a converted (or raw) artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DownloadLink {
    pub download_url: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub expires_at: Option<String>,
    #[serde(default)]
    pub expiration_hours: Option<u32>,
}

// ─── Dashboard analytics ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardOverview {
    pub overview: OverviewCounts,
    pub storage: StorageSummary,
    #[serde(default)]
    pub recent_activity: Option<RecentActivity>,
    #[serde(default)]
    pub file_distribution: Option<FileDistribution>,
    #[serde(default)]
    pub performance: Option<Performance>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverviewCounts {
    pub total_files: u64,
    pub processed_files: u64,
    pub processing_files: u64,
    pub error_files: u64,
    pub success_rate_percentage: f64,
    pub total_rows_processed: u64,
    pub average_rows_per_file: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageSummary {
    pub total_csv_size_bytes: u64,
    pub total_parquet_size_bytes: u64,
    pub space_saved_bytes: i64,
    pub space_saved_percentage: f64,
    pub compression_ratio: f64,
    #[serde(default)]
    pub total_csv_size_mb: f64,
    #[serde(default)]
    pub total_parquet_size_mb: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecentActivity {
    pub files_this_week: u64,
    pub rows_this_week: u64,
    #[serde(default)]
    pub latest_uploads: Vec<LatestUpload>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LatestUpload {
    pub filename: String,
    pub upload_time: String,
    pub status: FileStatus,
    #[serde(default)]
    pub rows: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileDistribution {
    pub by_status: HashMap<String, u64>,
    #[serde(default)]
    pub largest_files: Vec<RankedFile>,
    #[serde(default)]
    pub most_rows: Vec<RankedFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedFile {
    pub filename: String,
    pub size_mb: f64,
    pub rows: u64,
    pub upload_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Performance {
    pub average_compression_ratio: f64,
    pub total_storage_saved_mb: f64,
    pub processing_efficiency: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityData {
    pub period_days: u32,
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub daily_activity: Vec<DailyActivity>,
    pub summary: ActivitySummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyActivity {
    pub date: String,
    pub files_uploaded: u64,
    pub files_processed: u64,
    pub files_failed: u64,
    pub total_rows: u64,
    pub total_size_mb: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivitySummary {
    pub total_files: u64,
    pub total_processed: u64,
    pub total_rows: u64,
    pub total_size_mb: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataQuality {
    pub total_files_analyzed: u64,
    #[serde(default)]
    pub data_completeness: Vec<Completeness>,
    #[serde(default)]
    pub file_quality_scores: Vec<QualityScore>,
    pub overall: QualityOverall,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Completeness {
    pub filename: String,
    pub completeness_percentage: f64,
    pub missing_values: u64,
    pub total_cells: u64,
    pub duplicate_rows: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QualityScore {
    pub filename: String,
    pub quality_score: f64,
    pub rows: u64,
    pub columns: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QualityOverall {
    pub average_completeness: f64,
    pub average_quality_score: f64,
    pub files_with_high_quality: u64,
    pub files_with_issues: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemStats {
    pub directories: Directories,
    pub database: DatabaseStats,
    #[serde(default)]
    pub processing: Option<ProcessingLimits>,
    #[serde(default)]
    pub api_info: Option<ApiInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Directories {
    pub uploads: DirectoryStats,
    pub parquet: DirectoryStats,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DirectoryStats {
    pub exists: bool,
    pub file_count: u64,
    pub total_size_bytes: u64,
    #[serde(default)]
    pub total_size_mb: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseStats {
    pub total_files: u64,
    #[serde(default)]
    pub status_counts: HashMap<String, u64>,
    pub total_rows_processed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessingLimits {
    #[serde(default)]
    pub supported_formats: Vec<String>,
    #[serde(default)]
    pub supported_encodings: Vec<String>,
    #[serde(default)]
    pub supported_delimiters: Vec<String>,
    pub max_file_size_mb: f64,
    pub processing_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiInfo {
    pub version: String,
    #[serde(default)]
    pub uptime_check: Option<String>,
    #[serde(default)]
    pub token_expiry_days: Option<u32>,
    #[serde(default)]
    pub cors_enabled: bool,
}
