//! Collaborator interfaces for the report pipeline.
//!
//! The orchestrator is generic over these traits; production code plugs in
//! the reqwest-backed fetcher and the config/env-backed stores, tests plug in
//! `mockall` mocks. Storage-backed collaborators (repositories, groups, test
//! patterns, credentials, history) are external to this crate's core: the
//! traits mirror their observed contracts and nothing more.
//!
//! All traits are `Send + Sync` and async; mocks are generated for the test
//! build and behind the `test-export-mocks` feature so integration tests and
//! downstream consumers can share them.

use std::collections::BTreeMap;

use async_trait::async_trait;
use mockall::automock;

use crate::cancel::CancelToken;
use crate::error::ReportError;
use crate::model::{LineTotals, MergeRequestRecord, MergeRequestState, Repository};

/// An authentication token map (cookie name → value), rendered into a
/// `Cookie` header by the fetcher. Ordered so the rendering is deterministic.
pub type Credential = BTreeMap<String, String>;

/// Supplies the session credential for the remote service.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// The stored credential, or `None` when the user has never logged in.
    async fn get_credential(&self) -> Option<Credential>;

    /// Best-effort re-acquisition of a fresh credential. May fail; callers
    /// must not depend on it succeeding.
    async fn refresh_credential(
        &self,
    ) -> Result<Credential, Box<dyn std::error::Error + Send + Sync>>;
}

/// Lists known repositories and group memberships.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RepoDirectory: Send + Sync {
    async fn list_repositories(&self) -> Vec<Repository>;

    async fn list_repositories_for_group(&self, group_id: &str) -> Vec<Repository>;
}

/// Lists the configured test-file patterns (matched as lowercase substrings
/// of changed-file paths).
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait TestPatternStore: Send + Sync {
    async fn list_patterns(&self) -> Vec<String>;
}

/// Fetches merge-request activity for one repository from the remote service.
///
/// `fetch_merge_requests` returns the complete creation-descending list, or a
/// fatal [`ReportError`]. `fetch_diff_totals` re-derives line counts from the
/// per-file diff listing, skipping files whose lowercased path contains any
/// of `test_patterns`; its errors (other than [`ReportError::Cancelled`]) are
/// recoverable per item.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait MergeRequestSource: Send + Sync {
    async fn fetch_merge_requests(
        &self,
        repo_path: &str,
        state: MergeRequestState,
        label: Option<String>,
        credential: &Credential,
        cancel: &CancelToken,
    ) -> Result<Vec<MergeRequestRecord>, ReportError>;

    async fn fetch_diff_totals(
        &self,
        repo_path: &str,
        iid: u64,
        test_patterns: &[String],
        credential: &Credential,
        cancel: &CancelToken,
    ) -> Result<LineTotals, ReportError>;
}

/// Persists `{run parameters, result}` pairs and assigns opaque run ids.
/// Consumed by the orchestrator's caller, never by the pipeline itself.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn record(
        &self,
        params: &crate::model::RunParameters,
        result: &crate::model::AggregationResult,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>>;
}
