//! Config- and environment-backed collaborator implementations.
//!
//! These stand in for the host application's persistent stores: the
//! repository/group catalogue and test patterns come from the loaded YAML
//! config, the session credential from an environment variable holding a
//! JSON cookie map. Refreshing the credential re-reads the environment; a
//! richer host would re-acquire it from a browser profile, which is outside
//! this crate.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tracing::warn;

use crate::contract::{Credential, CredentialStore, RepoDirectory, TestPatternStore};
use crate::load_config::AppConfig;
use crate::model::Repository;

/// Default environment variable holding the JSON cookie map.
pub const CREDENTIAL_ENV_VAR: &str = "GITLAB_COOKIE";

pub struct ConfigDirectory {
    repos: Vec<Repository>,
    groups: HashMap<String, Vec<String>>,
}

impl ConfigDirectory {
    pub fn from_config(config: &AppConfig) -> Self {
        ConfigDirectory {
            repos: config.repos.iter().map(|entry| entry.to_repository()).collect(),
            groups: config
                .groups
                .iter()
                .map(|group| (group.id.clone(), group.repos.clone()))
                .collect(),
        }
    }
}

#[async_trait]
impl RepoDirectory for ConfigDirectory {
    async fn list_repositories(&self) -> Vec<Repository> {
        self.repos.clone()
    }

    async fn list_repositories_for_group(&self, group_id: &str) -> Vec<Repository> {
        let Some(member_ids) = self.groups.get(group_id) else {
            warn!(group = group_id, "unknown group id");
            return Vec::new();
        };
        self.repos
            .iter()
            .filter(|repo| member_ids.contains(&repo.id))
            .cloned()
            .collect()
    }
}

pub struct ConfigPatternStore {
    patterns: Vec<String>,
}

impl ConfigPatternStore {
    pub fn from_config(config: &AppConfig) -> Self {
        ConfigPatternStore {
            patterns: config.test_patterns.clone(),
        }
    }
}

#[async_trait]
impl TestPatternStore for ConfigPatternStore {
    async fn list_patterns(&self) -> Vec<String> {
        self.patterns.clone()
    }
}

/// Reads the credential from an environment variable containing a JSON
/// object of cookie name → value pairs.
pub struct EnvCredentialStore {
    var: String,
}

impl EnvCredentialStore {
    pub fn new() -> Self {
        EnvCredentialStore {
            var: CREDENTIAL_ENV_VAR.to_string(),
        }
    }

    pub fn with_var(var: impl Into<String>) -> Self {
        EnvCredentialStore { var: var.into() }
    }

    fn read(&self) -> Option<Credential> {
        let raw = std::env::var(&self.var).ok()?;
        match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
            Ok(map) if !map.is_empty() => Some(map),
            Ok(_) => None,
            Err(error) => {
                warn!(var = %self.var, error = %error, "credential env var is not a JSON cookie map");
                None
            }
        }
    }
}

impl Default for EnvCredentialStore {
    fn default() -> Self {
        EnvCredentialStore::new()
    }
}

#[async_trait]
impl CredentialStore for EnvCredentialStore {
    async fn get_credential(&self) -> Option<Credential> {
        self.read()
    }

    async fn refresh_credential(
        &self,
    ) -> Result<Credential, Box<dyn std::error::Error + Send + Sync>> {
        self.read()
            .ok_or_else(|| format!("no credential available in {}", self.var).into())
    }
}
