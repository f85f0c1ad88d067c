//! Data models for csvdash.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a file record.
///
/// Records fetched from (or confirmed by) the backend carry the server id;
/// records created locally before the backend knows them carry a client id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileId {
    Remote(u64),
    Local(String),
}

impl FileId {
    pub fn new_local() -> Self {
        FileId::Local(format!("local-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_remote(&self) -> Option<u64> {
        match self {
            FileId::Remote(id) => Some(*id),
            FileId::Local(_) => None,
        }
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileId::Remote(id) => write!(f, "{}", id),
            FileId::Local(id) => write!(f, "{}", id),
        }
    }
}

impl FromStr for FileId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().parse::<u64>() {
            Ok(id) => FileId::Remote(id),
            Err(_) => FileId::Local(s.trim().to_string()),
        })
    }
}

impl From<u64> for FileId {
    fn from(id: u64) -> Self {
        FileId::Remote(id)
    }
}

/// Conversion status of an uploaded file, as reported by the backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum FileStatus {
    #[serde(alias = "processing", alias = "PROCESSING")]
    Processing,
    #[serde(alias = "error", alias = "ERROR")]
    Error,
    #[serde(alias = "done", alias = "DONE")]
    Done,
}

impl FileStatus {
    /// Done and Error never transition automatically.
    pub fn is_terminal(self) -> bool {
        matches!(self, FileStatus::Done | FileStatus::Error)
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Processing => write!(f, "Processing"),
            FileStatus::Error => write!(f, "Error"),
            FileStatus::Done => write!(f, "Done"),
        }
    }
}

/// Client-side view of an uploaded file and its conversion status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileRecord {
    pub id: FileId,
    #[serde(alias = "fileName")]
    pub filename: String,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub upload_timestamp: DateTime<Utc>,
    pub status: FileStatus,
    #[serde(default)]
    pub row_count: Option<u64>,
    /// Location of the converted artifact on the backend.
    #[serde(default, alias = "parquet_path")]
    pub storage_path: Option<String>,
}

impl FileRecord {
    /// Replace the status (and the row count, if given), keeping the record consistent:
    /// Done always has a row count, Processing never has a storage path,
    /// Error never carries a row count.
    pub fn apply_status(&mut self, status: FileStatus, row_count: Option<u64>) {
        self.status = status;
        if row_count.is_some() {
            self.row_count = row_count;
        }
        self.normalize();
    }

    pub(crate) fn normalize(&mut self) {
        match self.status {
            FileStatus::Processing => self.storage_path = None,
            FileStatus::Done => {
                self.row_count.get_or_insert(0);
            }
            FileStatus::Error => self.row_count = None,
        }
    }

    /// Row count if the backend has reported one.
    pub fn rows_display(&self) -> String {
        self.row_count
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string())
    }
}

/// A file record before the store has assigned it an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFileRecord {
    pub filename: String,
    pub upload_timestamp: DateTime<Utc>,
    pub status: FileStatus,
    pub row_count: Option<u64>,
    pub storage_path: Option<String>,
}

impl NewFileRecord {
    pub fn processing(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            upload_timestamp: Utc::now(),
            status: FileStatus::Processing,
            row_count: None,
            storage_path: None,
        }
    }

    pub fn into_record(self, id: FileId) -> FileRecord {
        let mut record = FileRecord {
            id,
            filename: self.filename,
            upload_timestamp: self.upload_timestamp,
            status: self.status,
            row_count: self.row_count,
            storage_path: self.storage_path,
        };
        record.normalize();
        record
    }
}

/// Authentication state derived from the persisted token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub is_authenticated: bool,
    pub token: Option<String>,
}

/// Cosmetic light/dark preference, persisted with the session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    Light,
    Dark,
}

impl ThemeMode {
    pub fn toggled(self) -> Self {
        match self {
            ThemeMode::Light => ThemeMode::Dark,
            ThemeMode::Dark => ThemeMode::Light,
        }
    }
}

impl fmt::Display for ThemeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThemeMode::Light => write!(f, "light"),
            ThemeMode::Dark => write!(f, "dark"),
        }
    }
}

impl FromStr for ThemeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "light" => Ok(ThemeMode::Light),
            "dark" => Ok(ThemeMode::Dark),
            other => Err(format!("unknown theme '{}', expected light or dark", other)),
        }
    }
}

/// Backend timestamps come either as RFC 3339 or as naive ISO-8601 in UTC.
pub(crate) mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub fn parse(raw: &str) -> Result<DateTime<Utc>, String> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .map(|naive| naive.and_utc())
            .map_err(|e| format!("invalid timestamp {:?}: {}", raw, e))
    }
}
