//! GitLab-backed [`MergeRequestSource`]: cursor-paginated GraphQL fetch of
//! merge requests plus the per-file diff-metadata fetch used for test-file
//! exclusion.
//!
//! Redirects are not followed so that a redirect-like status is observable
//! and classified as an expired session instead of silently landing on a
//! login page.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{header, redirect, StatusCode};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::contract::{Credential, CredentialStore, MergeRequestSource};
use crate::error::ReportError;
use crate::model::{Assignee, LineTotals, MergeRequestRecord, MergeRequestState};

const PAGE_SIZE: usize = 100;

const GRAPHQL_QUERY: &str = r#"
query getProjectMergeRequestsEE(
  $fullPath: ID!, $sort: MergeRequestSort, $state: MergeRequestState,
  $firstPageSize: Int, $afterCursor: String, $labelName: [String!]
) {
  namespace: project(fullPath: $fullPath) {
    id
    mergeRequests(
      sort: $sort, state: $state, first: $firstPageSize, after: $afterCursor, labelName: $labelName
    ) {
      pageInfo { hasNextPage endCursor }
      nodes {
        id
        iid
        createdAt
        title
        mergedAt
        webUrl
        diffStatsSummary { additions deletions }
        assignees { nodes { name username avatarUrl } }
      }
    }
  }
}
"#;

pub struct GitLabFetcher {
    client: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialStore>,
}

impl GitLabFetcher {
    pub fn new(
        base_url: impl Into<String>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, ReportError> {
        let client = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .build()?;
        let base_url: String = base_url.into();
        Ok(GitLabFetcher {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    async fn fetch_page(
        &self,
        repo_path: &str,
        state: MergeRequestState,
        label: Option<&str>,
        cookie: &str,
        cursor: Option<String>,
        cancel: &CancelToken,
    ) -> Result<Page, ReportError> {
        if cancel.is_cancelled() {
            return Err(ReportError::Cancelled);
        }

        let body = serde_json::json!({
            "query": GRAPHQL_QUERY,
            "variables": {
                "fullPath": repo_path,
                "sort": "CREATED_DESC",
                "state": state.as_query_value(),
                "firstPageSize": PAGE_SIZE,
                "afterCursor": cursor,
                "labelName": label.map(|l| vec![l]),
            },
        });

        let request = self
            .client
            .post(format!("{}/api/graphql", self.base_url))
            .header(header::COOKIE, cookie)
            .json(&body)
            .send();
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ReportError::Cancelled),
            response = request => response?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(self.classify_status(status, repo_path).await);
        }

        let payload = tokio::select! {
            _ = cancel.cancelled() => return Err(ReportError::Cancelled),
            payload = response.json::<Value>() => payload?,
        };

        match parse_page(&payload) {
            Some(page) => Ok(page),
            None => Err(self.probe_missing_namespace(repo_path, cookie, cancel).await),
        }
    }

    async fn classify_status(&self, status: StatusCode, repo_path: &str) -> ReportError {
        warn!(status = %status, repo = repo_path, "merge request query returned non-success status");
        if status == StatusCode::NOT_FOUND {
            ReportError::RepoNotFound(repo_path.to_string())
        } else if status.is_redirection() {
            self.try_refresh_credential().await;
            ReportError::SessionExpired
        } else {
            ReportError::UnexpectedStatus(status.as_u16())
        }
    }

    /// Two-step diagnostic after a malformed/empty GraphQL payload: probe the
    /// repository path directly to tell a missing repository apart from an
    /// expired session.
    async fn probe_missing_namespace(
        &self,
        repo_path: &str,
        cookie: &str,
        cancel: &CancelToken,
    ) -> ReportError {
        let probe = self
            .client
            .get(format!("{}/{}", self.base_url, repo_path))
            .header(header::COOKIE, cookie)
            .send();
        let response = tokio::select! {
            _ = cancel.cancelled() => return ReportError::Cancelled,
            response = probe => match response {
                Ok(response) => response,
                Err(error) => return ReportError::Network(error),
            },
        };

        debug!(status = %response.status(), repo = repo_path, "existence probe after malformed payload");
        if response.status() == StatusCode::NOT_FOUND {
            return ReportError::RepoNotFound(repo_path.to_string());
        }
        self.try_refresh_credential().await;
        ReportError::SessionExpired
    }

    async fn try_refresh_credential(&self) {
        match self.credentials.refresh_credential().await {
            Ok(_) => info!("refreshed session credential"),
            Err(error) => warn!(error = %error, "credential refresh failed"),
        }
    }
}

#[async_trait]
impl MergeRequestSource for GitLabFetcher {
    async fn fetch_merge_requests(
        &self,
        repo_path: &str,
        state: MergeRequestState,
        label: Option<String>,
        credential: &Credential,
        cancel: &CancelToken,
    ) -> Result<Vec<MergeRequestRecord>, ReportError> {
        let cookie = cookie_header(credential);
        collect_pages(|cursor| {
            self.fetch_page(repo_path, state, label.as_deref(), &cookie, cursor, cancel)
        })
        .await
    }

    async fn fetch_diff_totals(
        &self,
        repo_path: &str,
        iid: u64,
        test_patterns: &[String],
        credential: &Credential,
        cancel: &CancelToken,
    ) -> Result<LineTotals, ReportError> {
        if cancel.is_cancelled() {
            return Err(ReportError::Cancelled);
        }

        let url = format!(
            "{}/{}/-/merge_requests/{}/diffs_metadata.json?diff_head=true&view=inline&w=0",
            self.base_url, repo_path, iid
        );
        let request = self
            .client
            .get(&url)
            .header(header::COOKIE, cookie_header(credential))
            .send();
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ReportError::Cancelled),
            response = request => response?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(ReportError::UnexpectedStatus(status.as_u16()));
        }

        let payload = tokio::select! {
            _ = cancel.cancelled() => return Err(ReportError::Cancelled),
            payload = response.json::<Value>() => payload?,
        };
        refined_totals(&payload, test_patterns)
    }
}

/// Render the credential map into a `Cookie` header value.
fn cookie_header(credential: &Credential) -> String {
    credential
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// One page of the paginated merge-request query.
struct Page {
    nodes: Vec<MergeRequestRecord>,
    has_next_page: bool,
    end_cursor: Option<String>,
}

/// Drive cursor pagination over `fetch_page`, concatenating nodes in page
/// order until the server reports no further page. The accumulated list is
/// unbounded and fully materialised.
async fn collect_pages<F, Fut>(mut fetch_page: F) -> Result<Vec<MergeRequestRecord>, ReportError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page, ReportError>>,
{
    let mut records = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = fetch_page(cursor.take()).await?;
        records.extend(page.nodes);
        if !page.has_next_page {
            break;
        }
        cursor = page.end_cursor;
    }
    Ok(records)
}

/// Extract a page from the GraphQL payload; `None` marks a malformed or
/// empty payload shape (missing `data.namespace.mergeRequests.pageInfo`).
fn parse_page(payload: &Value) -> Option<Page> {
    let merge_requests = payload
        .get("data")?
        .get("namespace")?
        .get("mergeRequests")?;
    let page_info = merge_requests.get("pageInfo")?;

    let nodes = merge_requests
        .get("nodes")
        .and_then(Value::as_array)
        .map(|nodes| nodes.iter().map(parse_record).collect())
        .unwrap_or_default();

    Some(Page {
        nodes,
        has_next_page: page_info
            .get("hasNextPage")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        end_cursor: page_info
            .get("endCursor")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

fn parse_record(node: &Value) -> MergeRequestRecord {
    let text = |key: &str| {
        node.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    // GitLab serialises iid as a string.
    let iid = node
        .get("iid")
        .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
        .unwrap_or(0);

    let assignees = node
        .pointer("/assignees/nodes")
        .and_then(Value::as_array)
        .map(|nodes| {
            nodes
                .iter()
                .map(|a| Assignee {
                    name: a.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
                    username: a
                        .get("username")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    avatar_url: a
                        .get("avatarUrl")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    MergeRequestRecord {
        id: text("id"),
        iid,
        created_at: text("createdAt"),
        title: text("title"),
        merged_at: node
            .get("mergedAt")
            .and_then(Value::as_str)
            .map(str::to_string),
        web_url: text("webUrl"),
        diff_stats: LineTotals {
            additions: node
                .pointer("/diffStatsSummary/additions")
                .and_then(Value::as_u64)
                .unwrap_or(0),
            deletions: node
                .pointer("/diffStatsSummary/deletions")
                .and_then(Value::as_u64)
                .unwrap_or(0),
        },
        assignees,
    }
}

/// Sum added/removed lines over the diff listing, skipping files whose
/// lowercased path contains any test pattern as a substring.
fn refined_totals(payload: &Value, test_patterns: &[String]) -> Result<LineTotals, ReportError> {
    let files = payload
        .get("diff_files")
        .and_then(Value::as_array)
        .ok_or_else(|| ReportError::PerItemDiff("payload has no diff_files list".to_string()))?;

    let mut totals = LineTotals::default();
    for file in files {
        let path = file
            .get("new_path")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_lowercase();
        if test_patterns.iter().any(|pattern| path.contains(pattern)) {
            continue;
        }
        totals.additions += file.get("added_lines").and_then(Value::as_u64).unwrap_or(0);
        totals.deletions += file.get("removed_lines").and_then(Value::as_u64).unwrap_or(0);
    }
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page_payload(titles: &[&str], has_next: bool, cursor: Option<&str>) -> Value {
        json!({
            "data": { "namespace": { "id": "gid://gitlab/Project/1", "mergeRequests": {
                "pageInfo": { "hasNextPage": has_next, "endCursor": cursor },
                "nodes": titles.iter().map(|title| json!({
                    "id": format!("gid://gitlab/MergeRequest/{title}"),
                    "iid": "7",
                    "createdAt": "2024-03-10T12:00:00Z",
                    "title": title,
                    "mergedAt": null,
                    "webUrl": "https://gitlab.com/acme/backend/-/merge_requests/7",
                    "diffStatsSummary": { "additions": 10, "deletions": 4 },
                    "assignees": { "nodes": [
                        { "name": "Alice", "username": "alice", "avatarUrl": "https://example.com/a.png" }
                    ] }
                })).collect::<Vec<_>>()
            } } }
        })
    }

    #[tokio::test]
    async fn pagination_issues_one_request_per_page_and_keeps_order() {
        let mut pages = vec![
            parse_page(&page_payload(&["#1", "#2"], true, Some("cursor-1"))).unwrap(),
            parse_page(&page_payload(&["#3"], true, Some("cursor-2"))).unwrap(),
            parse_page(&page_payload(&["#4"], false, None)).unwrap(),
        ];
        let mut seen_cursors = Vec::new();

        let records = collect_pages(|cursor| {
            seen_cursors.push(cursor);
            futures::future::ready(Ok(pages.remove(0)))
        })
        .await
        .unwrap();

        assert_eq!(
            seen_cursors,
            vec![None, Some("cursor-1".to_string()), Some("cursor-2".to_string())]
        );
        let titles: Vec<_> = records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["#1", "#2", "#3", "#4"]);
    }

    #[tokio::test]
    async fn pagination_stops_on_first_error() {
        let mut calls = 0;
        let result = collect_pages(|_cursor| {
            calls += 1;
            futures::future::ready(Err(ReportError::SessionExpired))
        })
        .await;
        assert!(matches!(result, Err(ReportError::SessionExpired)));
        assert_eq!(calls, 1);
    }

    #[test]
    fn parse_page_reads_nodes_and_page_info() {
        let page = parse_page(&page_payload(&["#123 fix"], true, Some("abc"))).unwrap();
        assert!(page.has_next_page);
        assert_eq!(page.end_cursor.as_deref(), Some("abc"));
        assert_eq!(page.nodes.len(), 1);

        let record = &page.nodes[0];
        assert_eq!(record.iid, 7);
        assert_eq!(record.title, "#123 fix");
        assert_eq!(record.diff_stats, LineTotals { additions: 10, deletions: 4 });
        assert_eq!(record.assignees[0].name, "Alice");
    }

    #[test]
    fn malformed_payloads_are_not_pages() {
        assert!(parse_page(&json!({})).is_none());
        assert!(parse_page(&json!({ "data": { "namespace": null } })).is_none());
        assert!(parse_page(&json!({ "data": { "namespace": { "id": "x" } } })).is_none());
    }

    #[test]
    fn refined_totals_skips_test_files_by_substring() {
        let payload = json!({ "diff_files": [
            { "new_path": "src/lib.rs", "added_lines": 10, "removed_lines": 2 },
            { "new_path": "src/Tests/helper.rs", "added_lines": 50, "removed_lines": 9 },
            { "new_path": "docs/changelog.md", "added_lines": 3, "removed_lines": 1 },
        ] });
        let patterns = vec!["test".to_string(), "mock".to_string()];
        let totals = refined_totals(&payload, &patterns).unwrap();
        assert_eq!(totals, LineTotals { additions: 13, deletions: 3 });
    }

    #[test]
    fn refined_totals_rejects_missing_diff_listing() {
        assert!(matches!(
            refined_totals(&json!({ "message": "nope" }), &[]),
            Err(ReportError::PerItemDiff(_))
        ));
    }

    #[test]
    fn cookie_header_joins_pairs_deterministically() {
        let mut credential = Credential::new();
        credential.insert("_gitlab_session".to_string(), "abc123".to_string());
        credential.insert("known_sign_in".to_string(), "xyz".to_string());
        assert_eq!(
            cookie_header(&credential),
            "_gitlab_session=abc123; known_sign_in=xyz"
        );
    }
}
