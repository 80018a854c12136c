use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::warn;

use crate::contract::HistorySink;
use crate::fetch::GitLabFetcher;
use crate::history::FileHistory;
use crate::load_config::load_config;
use crate::model::{MergeRequestState, ReportTarget, RunParameters};
use crate::report::ReportRun;
use crate::store::{ConfigDirectory, ConfigPatternStore, EnvCredentialStore};

/// CLI for mr-ledger: contribution-credit reports from merge-request activity.
#[derive(Parser)]
#[clap(
    name = "mr-ledger",
    version,
    about = "Produce contribution-credit reports from GitLab merge-request activity"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a report over the configured repositories and print the result
    Run {
        /// Path to the YAML config file (repos, groups, test patterns)
        #[clap(long)]
        config: PathBuf,
        /// Window start date, DD/MM/YYYY (inclusive)
        #[clap(long)]
        start: String,
        /// Window end date, DD/MM/YYYY (inclusive)
        #[clap(long)]
        end: String,
        /// Target a configured group of repositories
        #[clap(long, conflicts_with = "repos")]
        group: Option<String>,
        /// Target explicit repository ids (comma separated)
        #[clap(long, value_delimiter = ',')]
        repos: Vec<String>,
        /// Merge-request state filter: all, opened, merged or closed
        #[clap(long, default_value = "all")]
        state: String,
        /// Only count merge requests carrying this label
        #[clap(long)]
        label: Option<String>,
        /// Keep titles that do not start with '#' (ticket mode is on by default)
        #[clap(long)]
        no_ticket_mode: bool,
        /// Re-derive line counts from per-file diffs, excluding test files
        #[clap(long)]
        exclude_tests: bool,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run {
            config,
            start,
            end,
            group,
            repos,
            state,
            label,
            no_ticket_mode,
            exclude_tests,
        } => {
            let config = load_config(config)?;

            let target = match group {
                Some(group_id) => ReportTarget::Group(group_id),
                None if !repos.is_empty() => ReportTarget::Repositories(repos),
                None => anyhow::bail!("No repositories specified: pass --group or --repos"),
            };
            let state: MergeRequestState = state
                .parse()
                .map_err(|message: String| anyhow::anyhow!(message))?;

            let params = RunParameters {
                target,
                start_date: start,
                end_date: end,
                state,
                label,
                ticket_mode: !no_ticket_mode,
                exclude_tests,
            };

            let credentials = Arc::new(EnvCredentialStore::new());
            let fetcher = GitLabFetcher::new(&config.gitlab_url, credentials.clone())?;
            let directory = ConfigDirectory::from_config(&config);
            let patterns = ConfigPatternStore::from_config(&config);

            let report_run = ReportRun::new();
            let cancel = report_run.cancel_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            });

            println!("Report starting...");
            match report_run
                .execute(&params, &fetcher, credentials.as_ref(), &directory, &patterns)
                .await
            {
                Ok(result) => {
                    if let Some(history_file) = &config.history_file {
                        match FileHistory::new(history_file).record(&params, &result).await {
                            Ok(run_id) => println!("Run recorded as {run_id}"),
                            Err(error) => {
                                warn!(error = %error, "failed to record run history")
                            }
                        }
                    }
                    println!("Report complete.\n{}", serde_json::to_string_pretty(&result)?);
                    Ok(())
                }
                Err(e) => {
                    eprintln!("[ERROR] Report failed: {e}");
                    Err(e.into())
                }
            }
        }
    }
}
