//! Error taxonomy for report runs.
//!
//! Every variant except [`ReportError::PerItemDiff`] is fatal to the
//! enclosing run: it unwinds through fetch and aggregation untouched and is
//! returned by the orchestrator with no partial result. `PerItemDiff` is only
//! produced during diff refinement, where the orchestrator logs it and keeps
//! the record's reported summary. Nothing is retried automatically.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("no stored credential, please log in")]
    NoCredential,

    #[error("invalid start or end date format, expected DD/MM/YYYY")]
    InvalidDateFormat,

    #[error("no repositories matched the run parameters")]
    NoRepositories,

    #[error("repository not found, please check the repo path: {0}")]
    RepoNotFound(String),

    #[error("session expired, please log in again")]
    SessionExpired,

    #[error("unexpected response status: {0}")]
    UnexpectedStatus(u16),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("diff metadata unavailable: {0}")]
    PerItemDiff(String),

    #[error("report run cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, ReportError>;
