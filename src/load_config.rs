//! Static YAML configuration: the GitLab base URL plus the repository,
//! group and test-pattern catalogues that the config-backed collaborators
//! serve. No secrets live here; the session credential comes from the
//! environment.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Deserialize;
use tracing::{error, info};

use crate::model::Repository;

fn default_gitlab_url() -> String {
    "https://gitlab.com".to_string()
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_gitlab_url")]
    pub gitlab_url: String,
    #[serde(default)]
    pub repos: Vec<RepoEntry>,
    #[serde(default)]
    pub groups: Vec<GroupEntry>,
    #[serde(default)]
    pub test_patterns: Vec<String>,
    /// Where run history records are appended, if anywhere.
    #[serde(default)]
    pub history_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct RepoEntry {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Full URL or bare project path on the GitLab instance.
    pub gitlab_path: String,
}

#[derive(Debug, Deserialize)]
pub struct GroupEntry {
    pub id: String,
    #[serde(default)]
    pub repos: Vec<String>,
}

impl RepoEntry {
    pub fn to_repository(&self) -> Repository {
        Repository {
            id: self.id.clone(),
            name: if self.name.is_empty() {
                self.id.clone()
            } else {
                self.name.clone()
            },
            remote_path: self.gitlab_path.clone(),
        }
    }
}

/// Load and parse the YAML config file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let config: AppConfig = match serde_yaml::from_str(&config_content) {
        Ok(config) => config,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    info!(
        repos = config.repos.len(),
        groups = config.groups.len(),
        gitlab_url = %config.gitlab_url,
        "Config loaded successfully"
    );
    Ok(config)
}
