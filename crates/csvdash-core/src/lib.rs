//! csvdash-core: client-side core of the csvdash dashboard.
//!
//! The backend does the parsing, conversion and statistics. This crate keeps
//! the local view of that work consistent: a [`Store`] holding the session and
//! the known files, a [`Gateway`] to the backend, and an [`UploadController`]
//! that follows each upload until the backend reports Done or Error.

pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod responses;
pub mod storage;
pub mod store;
pub mod upload;

pub use client::DashboardClient;
pub use config::DashboardConfig;
pub use error::{CsvdashError, ErrorKind, Result};
pub use gateway::{
    DataFormat, DataQuery, DownloadQuery, Gateway, GatewayConfig, HttpGateway, UploadFile,
};
pub use models::{FileId, FileRecord, FileStatus, NewFileRecord, Session, ThemeMode};
pub use storage::{MemorySessionStorage, PersistentSession, SessionStorage, YamlSessionStorage};
pub use store::{Store, StoreState, TransientFileCache};
pub use upload::{BatchReport, Resolution, ResolutionPolicy, UploadController, UploadOutcome};
