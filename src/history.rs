//! File-backed run history: appends one JSON line per completed run and
//! assigns an opaque run id. The pipeline itself never touches history; the
//! CLI records `{run parameters, result}` after a successful run.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::contract::HistorySink;
use crate::model::{AggregationResult, RunParameters};

pub struct FileHistory {
    path: PathBuf,
}

impl FileHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileHistory { path: path.into() }
    }
}

#[derive(Serialize)]
struct HistoryEntry<'a> {
    id: String,
    recorded_at: String,
    run_parameters: &'a RunParameters,
    result: &'a AggregationResult,
}

#[async_trait]
impl HistorySink for FileHistory {
    async fn record(
        &self,
        params: &RunParameters,
        result: &AggregationResult,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let entry = HistoryEntry {
            id: Uuid::new_v4().to_string(),
            recorded_at: Utc::now().to_rfc3339(),
            run_parameters: params,
            result,
        };
        let line = serde_json::to_string(&entry)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(entry.id)
    }
}
