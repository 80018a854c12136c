//! Report orchestration: drives fetch → filter → refine → aggregate per
//! target repository and assembles the composite result.
//!
//! One [`ReportRun`] value is one run. It owns the cancellation token for
//! that run; callers wanting external cancellation clone the token via
//! [`ReportRun::cancel_token`] before executing. The pipeline is a single
//! cooperative task: repositories, pages and per-merge-request diff fetches
//! are processed strictly sequentially, and every network call races the
//! token.
//!
//! Error handling is fail-fast: any fatal [`ReportError`] (including
//! `Cancelled`) discards all partial aggregation and is returned as-is. The
//! only recoverable spot is diff refinement, where a per-item failure is
//! logged and that record keeps its server-reported summary.

use tracing::{error, info, warn};

use crate::aggregate::{aggregate_records, merge_into_result};
use crate::cancel::CancelToken;
use crate::contract::{CredentialStore, MergeRequestSource, RepoDirectory, TestPatternStore};
use crate::error::ReportError;
use crate::filter::{filter_records, parse_window};
use crate::model::{normalize_repo_path, AggregationResult, ReportTarget, RunParameters};

pub struct ReportRun {
    cancel: CancelToken,
}

impl ReportRun {
    /// Allocate a run with a fresh cancellation token.
    pub fn new() -> Self {
        ReportRun {
            cancel: CancelToken::new(),
        }
    }

    /// Handle for requesting cancellation before or while the run executes.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Execute the full pipeline and return the composite result, or the
    /// first fatal error with no partial result.
    pub async fn execute<S, C, R, T>(
        &self,
        params: &RunParameters,
        source: &S,
        credentials: &C,
        directory: &R,
        patterns: &T,
    ) -> Result<AggregationResult, ReportError>
    where
        S: MergeRequestSource,
        C: CredentialStore,
        R: RepoDirectory,
        T: TestPatternStore,
    {
        info!("starting report run");

        let credential = credentials
            .get_credential()
            .await
            .ok_or(ReportError::NoCredential)?;

        let (start, end) = parse_window(&params.start_date, &params.end_date)?;

        let repos = match &params.target {
            ReportTarget::Group(group_id) => {
                directory.list_repositories_for_group(group_id).await
            }
            ReportTarget::Repositories(ids) => directory
                .list_repositories()
                .await
                .into_iter()
                .filter(|repo| ids.contains(&repo.id))
                .collect(),
        };
        if repos.is_empty() {
            error!("no repositories matched the run parameters");
            return Err(ReportError::NoRepositories);
        }

        let test_patterns: Vec<String> = if params.exclude_tests {
            patterns
                .list_patterns()
                .await
                .into_iter()
                .map(|pattern| pattern.to_lowercase())
                .collect()
        } else {
            Vec::new()
        };

        let mut result = AggregationResult::default();
        for repo in &repos {
            if self.cancel.is_cancelled() {
                return Err(ReportError::Cancelled);
            }

            let path = normalize_repo_path(&repo.remote_path);
            info!(repo = %path, "fetching merge requests");
            let records = source
                .fetch_merge_requests(
                    &path,
                    params.state,
                    params.label.clone(),
                    &credential,
                    &self.cancel,
                )
                .await?;

            let mut records = filter_records(records, start, end, params.ticket_mode);
            info!(repo = %path, kept = records.len(), "filtered merge requests");

            if params.exclude_tests {
                for record in &mut records {
                    match source
                        .fetch_diff_totals(
                            &path,
                            record.iid,
                            &test_patterns,
                            &credential,
                            &self.cancel,
                        )
                        .await
                    {
                        Ok(totals) => record.diff_stats = totals,
                        Err(ReportError::Cancelled) => return Err(ReportError::Cancelled),
                        Err(error) => warn!(
                            repo = %path,
                            iid = record.iid,
                            error = %error,
                            "diff refinement failed, keeping reported summary"
                        ),
                    }
                }
            }

            merge_into_result(&mut result, &repo.id, aggregate_records(&records));
        }

        info!("report run complete");
        Ok(result)
    }
}

impl Default for ReportRun {
    fn default() -> Self {
        ReportRun::new()
    }
}
