//! Credit aggregation: splits each merge request's line totals across its
//! assignees and accumulates per-repository, per-contributor and overall.

use std::collections::BTreeMap;

use tracing::debug;

use crate::model::{AggregationResult, Assignee, AssigneeCredit, LineTotals, MergeRequestRecord};

/// Synthetic contributor used when a merge request has no assignee.
pub const UNASSIGNED: &str = "Unassigned";

/// Credit accumulated over one repository's filtered merge requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoAggregate {
    /// Assignee name → credit within this repository.
    pub per_assignee: BTreeMap<String, AssigneeCredit>,
    pub total: LineTotals,
    pub total_excluding_unassigned: LineTotals,
}

/// Aggregate a filtered (and optionally diff-refined) merge-request list for
/// one repository.
///
/// Every assignee of a record is credited the same floored share
/// `(⌊A/N⌋, ⌊D/N⌋)`; the integer-division remainder is credited to no one, so
/// the credited sum can undershoot the record's totals. This mirrors the
/// observed behaviour and is deliberately left uncorrected.
pub fn aggregate_records(records: &[MergeRequestRecord]) -> RepoAggregate {
    let unassigned = [Assignee {
        name: UNASSIGNED.to_string(),
        username: String::new(),
        avatar_url: String::new(),
    }];

    let mut aggregate = RepoAggregate::default();
    for record in records {
        debug!(title = %record.title, "aggregating merge request");
        let assignees: &[Assignee] = if record.assignees.is_empty() {
            &unassigned
        } else {
            &record.assignees
        };

        let share = LineTotals {
            additions: record.diff_stats.additions / assignees.len() as u64,
            deletions: record.diff_stats.deletions / assignees.len() as u64,
        };

        for assignee in assignees {
            aggregate.total.additions += share.additions;
            aggregate.total.deletions += share.deletions;
            if assignee.name != UNASSIGNED {
                aggregate.total_excluding_unassigned.additions += share.additions;
                aggregate.total_excluding_unassigned.deletions += share.deletions;
            }

            let credit = aggregate
                .per_assignee
                .entry(assignee.name.clone())
                .or_insert_with(|| AssigneeCredit {
                    avatar_url: assignee.avatar_url.clone(),
                    ..AssigneeCredit::default()
                });
            credit.additions += share.additions;
            credit.deletions += share.deletions;
        }
    }
    aggregate
}

/// Merge one repository's aggregate into the composite run result.
pub fn merge_into_result(result: &mut AggregationResult, repo_id: &str, aggregate: RepoAggregate) {
    result.overall_total.additions += aggregate.total.additions;
    result.overall_total.deletions += aggregate.total.deletions;
    result.overall_total_excluding_unassigned.additions +=
        aggregate.total_excluding_unassigned.additions;
    result.overall_total_excluding_unassigned.deletions +=
        aggregate.total_excluding_unassigned.deletions;

    for (name, credit) in &aggregate.per_assignee {
        let user = result
            .per_user
            .entry(name.clone())
            .or_insert_with(|| AssigneeCredit {
                avatar_url: credit.avatar_url.clone(),
                ..AssigneeCredit::default()
            });
        user.additions += credit.additions;
        user.deletions += credit.deletions;
    }

    result
        .per_repo
        .insert(repo_id.to_string(), aggregate.per_assignee);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(additions: u64, deletions: u64, assignees: &[&str]) -> MergeRequestRecord {
        MergeRequestRecord {
            id: "gid://gitlab/MergeRequest/1".to_string(),
            iid: 1,
            created_at: "2024-03-10T12:00:00Z".to_string(),
            title: "#1".to_string(),
            merged_at: None,
            web_url: String::new(),
            diff_stats: LineTotals {
                additions,
                deletions,
            },
            assignees: assignees
                .iter()
                .map(|name| Assignee {
                    name: name.to_string(),
                    username: name.to_lowercase(),
                    avatar_url: format!("https://example.com/{name}.png"),
                })
                .collect(),
        }
    }

    #[test]
    fn even_split_credits_each_assignee_exactly() {
        let aggregate = aggregate_records(&[record(10, 4, &["Alice", "Bob"])]);
        for name in ["Alice", "Bob"] {
            let credit = &aggregate.per_assignee[name];
            assert_eq!((credit.additions, credit.deletions), (5, 2));
        }
        // The credited sum equals the record totals exactly here.
        assert_eq!(aggregate.total, LineTotals { additions: 10, deletions: 4 });
    }

    #[test]
    fn uneven_split_drops_the_remainder() {
        let aggregate = aggregate_records(&[record(7, 3, &["Alice", "Bob"])]);
        for name in ["Alice", "Bob"] {
            let credit = &aggregate.per_assignee[name];
            assert_eq!((credit.additions, credit.deletions), (3, 1));
        }
        // 1 addition and 1 deletion are credited to no one.
        assert_eq!(aggregate.total, LineTotals { additions: 6, deletions: 2 });
    }

    #[test]
    fn no_assignees_credits_the_unassigned_bucket_in_full() {
        let aggregate = aggregate_records(&[record(9, 5, &[])]);
        let credit = &aggregate.per_assignee[UNASSIGNED];
        assert_eq!((credit.additions, credit.deletions), (9, 5));
        assert_eq!(credit.avatar_url, "");
        assert_eq!(aggregate.total, LineTotals { additions: 9, deletions: 5 });
        assert_eq!(aggregate.total_excluding_unassigned, LineTotals::default());
    }

    #[test]
    fn credits_accumulate_across_records() {
        let aggregate = aggregate_records(&[
            record(10, 4, &["Alice", "Bob"]),
            record(6, 2, &["Alice"]),
        ]);
        let alice = &aggregate.per_assignee["Alice"];
        assert_eq!((alice.additions, alice.deletions), (11, 4));
        let bob = &aggregate.per_assignee["Bob"];
        assert_eq!((bob.additions, bob.deletions), (5, 2));
        assert_eq!(aggregate.total, LineTotals { additions: 16, deletions: 6 });
    }

    #[test]
    fn merge_accumulates_per_user_across_repositories() {
        let mut result = AggregationResult::default();
        merge_into_result(
            &mut result,
            "backend",
            aggregate_records(&[record(10, 4, &["Alice"])]),
        );
        merge_into_result(
            &mut result,
            "frontend",
            aggregate_records(&[record(4, 2, &["Alice"]), record(3, 0, &[])]),
        );

        let alice = &result.per_user["Alice"];
        assert_eq!((alice.additions, alice.deletions), (14, 6));
        assert_eq!(result.per_repo["backend"]["Alice"].additions, 10);
        assert_eq!(result.per_repo["frontend"][UNASSIGNED].additions, 3);
        assert_eq!(result.overall_total, LineTotals { additions: 17, deletions: 6 });
        assert_eq!(
            result.overall_total_excluding_unassigned,
            LineTotals { additions: 14, deletions: 6 }
        );
    }
}
