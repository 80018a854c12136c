//! Data model for contribution-credit report runs.
//!
//! All types here are plain data: constructed once, carried through the
//! fetch → filter → refine → aggregate pipeline, and serialised for history
//! persistence by the caller.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Classification filter for the remote merge-request query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeRequestState {
    All,
    Opened,
    Merged,
    Closed,
}

impl MergeRequestState {
    /// Value for the GraphQL `state` variable.
    pub fn as_query_value(&self) -> &'static str {
        match self {
            MergeRequestState::All => "all",
            MergeRequestState::Opened => "opened",
            MergeRequestState::Merged => "merged",
            MergeRequestState::Closed => "closed",
        }
    }
}

impl FromStr for MergeRequestState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(MergeRequestState::All),
            "opened" => Ok(MergeRequestState::Opened),
            "merged" => Ok(MergeRequestState::Merged),
            "closed" => Ok(MergeRequestState::Closed),
            other => Err(format!("unknown merge request state: {other}")),
        }
    }
}

/// Which repositories a run targets: a stored group, or an explicit id set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportTarget {
    Group(String),
    Repositories(Vec<String>),
}

/// Immutable inputs for one report run. Dates are `DD/MM/YYYY`, inclusive at
/// day granularity on both ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunParameters {
    pub target: ReportTarget,
    pub start_date: String,
    pub end_date: String,
    pub state: MergeRequestState,
    pub label: Option<String>,
    /// Keep only merge requests whose title starts with `#`.
    pub ticket_mode: bool,
    /// Re-derive line counts from per-file diffs, excluding test files.
    pub exclude_tests: bool,
}

/// A repository known to the directory collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub id: String,
    pub name: String,
    /// Full URL or bare path; normalised with [`normalize_repo_path`] before use.
    pub remote_path: String,
}

/// Added/removed line counts, either the server-reported summary or the
/// refined per-file sum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineTotals {
    pub additions: u64,
    pub deletions: u64,
}

/// A merge-request assignee as reported by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignee {
    pub name: String,
    pub username: String,
    pub avatar_url: String,
}

/// One merge request, unique per (repository, `iid`). The diff summary is
/// overwritten in place during diff refinement and never mutated otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeRequestRecord {
    pub id: String,
    /// Sequence number within the repository.
    pub iid: u64,
    pub created_at: String,
    pub title: String,
    pub merged_at: Option<String>,
    pub web_url: String,
    pub diff_stats: LineTotals,
    pub assignees: Vec<Assignee>,
}

/// Accumulated credit for one contributor name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssigneeCredit {
    pub additions: u64,
    pub deletions: u64,
    pub avatar_url: String,
}

/// Composite result of a full, uncancelled run.
///
/// Maps are ordered by key with insert-if-absent accumulation; the synthetic
/// "Unassigned" contributor appears in `overall_total` and the per-name maps
/// but never in `overall_total_excluding_unassigned`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationResult {
    pub overall_total: LineTotals,
    pub overall_total_excluding_unassigned: LineTotals,
    /// Repository id → assignee name → credit.
    pub per_repo: BTreeMap<String, BTreeMap<String, AssigneeCredit>>,
    /// Assignee name → cross-repository credit.
    pub per_user: BTreeMap<String, AssigneeCredit>,
}

/// Normalise a stored repository path for use in API routes: if the input is
/// an absolute URL, keep only its path component; either way strip leading
/// and trailing slashes.
pub fn normalize_repo_path(raw: &str) -> String {
    let path = match reqwest::Url::parse(raw) {
        Ok(url) => url.path().to_string(),
        Err(_) => raw.to_string(),
    };
    path.trim_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_scheme_host_and_slashes() {
        assert_eq!(
            normalize_repo_path("https://gitlab.com/acme/dev/backend/"),
            "acme/dev/backend"
        );
        assert_eq!(normalize_repo_path("/acme/backend/"), "acme/backend");
        assert_eq!(normalize_repo_path("acme/backend"), "acme/backend");
    }

    #[test]
    fn state_round_trips_through_from_str() {
        for (text, state) in [
            ("all", MergeRequestState::All),
            ("opened", MergeRequestState::Opened),
            ("merged", MergeRequestState::Merged),
            ("closed", MergeRequestState::Closed),
        ] {
            assert_eq!(text.parse::<MergeRequestState>().unwrap(), state);
            assert_eq!(state.as_query_value(), text);
        }
        assert!("rejected".parse::<MergeRequestState>().is_err());
    }
}
