//! Window and classification filtering of fetched merge requests.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, SubsecRound, Utc};

use crate::error::ReportError;
use crate::model::MergeRequestRecord;

/// Parse `DD/MM/YYYY` start/end dates into a closed UTC window covering the
/// whole of both days: `[start 00:00:00, end 23:59:59]`.
pub fn parse_window(
    start_date: &str,
    end_date: &str,
) -> Result<(DateTime<Utc>, DateTime<Utc>), ReportError> {
    let start = NaiveDate::parse_from_str(start_date, "%d/%m/%Y")
        .map_err(|_| ReportError::InvalidDateFormat)?;
    let end = NaiveDate::parse_from_str(end_date, "%d/%m/%Y")
        .map_err(|_| ReportError::InvalidDateFormat)?;

    let start = start.and_time(NaiveTime::MIN).and_utc();
    let end = (end.and_time(NaiveTime::MIN) + Duration::days(1) - Duration::seconds(1)).and_utc();
    Ok((start, end))
}

/// Keep a record iff its creation timestamp parses (RFC 3339) and lies within
/// the closed `[start, end]` window at second granularity, and — when
/// `ticket_mode` is set — its title starts with `#`. Order is preserved;
/// records with unparseable timestamps are dropped, not errored.
pub fn filter_records(
    records: Vec<MergeRequestRecord>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    ticket_mode: bool,
) -> Vec<MergeRequestRecord> {
    records
        .into_iter()
        .filter(|record| {
            let created = match DateTime::parse_from_rfc3339(&record.created_at) {
                Ok(t) => t.with_timezone(&Utc).trunc_subsecs(0),
                Err(_) => return false,
            };
            if created < start || created > end {
                return false;
            }
            !ticket_mode || record.title.starts_with('#')
        })
        .collect()
}
