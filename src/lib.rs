pub mod buffer;
pub mod cache;
pub mod commands;
pub mod config;
pub mod document;
pub mod error;
pub mod format;
pub mod integrations;
pub mod markdown;
pub mod merge;
pub mod models;
pub mod parser;
pub mod sort;
pub mod tags;
pub mod timestamp;
pub mod upload;

pub use commands::{Command, CommandReport, Diary};
pub use error::{DiaryError, DiaryResult, SyncError};
