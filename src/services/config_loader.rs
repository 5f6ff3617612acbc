use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::models::{Identifier, NewContest};
use crate::services::api_client::{RanklistQuery, ScoringRule, TieBreaker};

pub const CONFIG_PATH_ENV: &str = "MROJ_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "mroj.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Unset means requests wait as long as the server takes.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitConfig {
    #[serde(default = "default_language")]
    pub default_language: String,
    #[serde(default)]
    pub default_user_id: u32,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            default_language: default_language(),
            default_user_id: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusConfig {
    /// Re-fetch interval for a job that is not finished yet. 0 disables it.
    #[serde(default = "default_auto_refresh_seconds")]
    pub auto_refresh_seconds: f64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            auto_refresh_seconds: default_auto_refresh_seconds(),
        }
    }
}

/// Prefilled values of the "new contest" form.
#[derive(Debug, Clone, Deserialize)]
pub struct ContestTemplate {
    #[serde(default = "default_contest_name")]
    pub name: String,
    #[serde(default = "default_contest_from")]
    pub from: String,
    #[serde(default = "default_contest_to")]
    pub to: String,
    #[serde(default = "default_problem_ids")]
    pub problem_ids: Vec<Identifier>,
    #[serde(default = "default_user_ids")]
    pub user_ids: Vec<Identifier>,
    #[serde(default = "default_submission_limit")]
    pub submission_limit: u32,
}

impl Default for ContestTemplate {
    fn default() -> Self {
        Self {
            name: default_contest_name(),
            from: default_contest_from(),
            to: default_contest_to(),
            problem_ids: default_problem_ids(),
            user_ids: default_user_ids(),
            submission_limit: default_submission_limit(),
        }
    }
}

impl ContestTemplate {
    pub fn to_new_contest(&self) -> NewContest {
        NewContest {
            name: self.name.clone(),
            from: self.from.clone(),
            to: self.to.clone(),
            problem_ids: self.problem_ids.clone(),
            user_ids: self.user_ids.clone(),
            submission_limit: self.submission_limit,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RanklistConfig {
    #[serde(default)]
    pub scoring_rule: Option<ScoringRule>,
    #[serde(default)]
    pub tie_breaker: Option<TieBreaker>,
}

impl RanklistConfig {
    pub fn query(&self) -> RanklistQuery {
        RanklistQuery {
            scoring_rule: self.scoring_rule,
            tie_breaker: self.tie_breaker,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct MrojConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub submit: SubmitConfig,
    #[serde(default)]
    pub status: StatusConfig,
    #[serde(default)]
    pub contest_template: ContestTemplate,
    #[serde(default)]
    pub ranklist: RanklistConfig,
}

fn default_base_url() -> String {
    "http://127.0.0.1:12345".to_string()
}

fn default_state_file() -> PathBuf {
    PathBuf::from(".mroj").join("state.json")
}

fn default_language() -> String {
    "Rust".to_string()
}

fn default_auto_refresh_seconds() -> f64 {
    2.0
}

fn default_contest_name() -> String {
    "Rust Course Project 2".to_string()
}

fn default_contest_from() -> String {
    "2022-08-27T02:05:29.000Z".to_string()
}

fn default_contest_to() -> String {
    "2022-08-27T02:05:30.000Z".to_string()
}

fn default_problem_ids() -> Vec<Identifier> {
    vec![Identifier::from(0), Identifier::from(1)]
}

fn default_user_ids() -> Vec<Identifier> {
    vec![Identifier::from(0), Identifier::from(1), Identifier::from(2)]
}

fn default_submission_limit() -> u32 {
    32
}

/// Config file path: `$MROJ_CONFIG`, else `mroj.toml` in the working dir.
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

pub fn load_mroj_config(config_path: &Path) -> Result<MrojConfig> {
    if !config_path.exists() {
        info!("{} not found, using defaults", config_path.display());
        return Ok(MrojConfig::default());
    }

    let raw = fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config at {}", config_path.display()))?;

    toml::from_str::<MrojConfig>(&raw)
        .with_context(|| format!("Failed to parse config at {}", config_path.display()))
}
