use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::catalog::CatalogOptions;
use crate::error::EngineError;
use crate::ledger::VotePolicy;
use crate::model::{LabelSet, RaterId, RaterRole};
use crate::partition::PartitionScheme;
use crate::recorder::DEFAULT_MAX_COMMENT_CHARS;
use crate::render::StripLayout;
use crate::store::LogOptions;

/// Directory holding project state, relative to the project root.
pub const PROJECT_DIR: &str = ".ecglabel";

/// Config file name inside [`PROJECT_DIR`].
pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub assignment: AssignmentConfig,
    #[serde(default = "default_raters")]
    pub raters: Vec<RaterConfig>,
    #[serde(default)]
    pub annotation: AnnotationConfig,
    #[serde(default)]
    pub render: StripLayout,
    #[serde(default)]
    pub store: StoreConfig,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            dataset: DatasetConfig::default(),
            assignment: AssignmentConfig::default(),
            raters: default_raters(),
            annotation: AnnotationConfig::default(),
            render: StripLayout::default(),
            store: StoreConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Signal CSV, relative to the project root unless absolute.
    #[serde(default = "default_signals_path")]
    pub signals: PathBuf,
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate_hz: f64,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            signals: default_signals_path(),
            sampling_rate_hz: default_sampling_rate(),
            delimiter: default_delimiter(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignmentConfig {
    #[serde(default)]
    pub scheme: PartitionScheme,
    #[serde(default)]
    pub vote_policy: VotePolicy,
    /// Raters whose votes are compared. Defaults to every classifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quorum: Option<Vec<RaterId>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaterConfig {
    pub id: RaterId,
    #[serde(default)]
    pub role: RaterRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationConfig {
    #[serde(default)]
    pub labels: LabelSet,
    #[serde(default = "default_max_comment_chars")]
    pub max_comment_chars: usize,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            labels: LabelSet::default(),
            max_comment_chars: default_max_comment_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Annotation log, relative to the project directory unless absolute.
    #[serde(default = "default_log_path")]
    pub log: PathBuf,
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    #[serde(default)]
    pub durable: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            log: default_log_path(),
            lock_timeout_ms: default_lock_timeout_ms(),
            durable: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
    /// Rater identity used when neither `--rater` nor `ECGLABEL_RATER` is set.
    #[serde(default)]
    pub rater: Option<RaterId>,
}

/// A validated configuration, ready to drive the engine.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Classifiers in roster order; the partition roster.
    pub classifiers: Vec<RaterId>,
    pub reviewers: Vec<RaterId>,
    pub quorum: Vec<RaterId>,
    pub scheme: PartitionScheme,
    pub vote_policy: VotePolicy,
    pub labels: LabelSet,
    pub max_comment_chars: usize,
    pub layout: StripLayout,
    pub catalog: CatalogOptions,
    pub signals_path: PathBuf,
    pub log_path: PathBuf,
    pub log: LogOptions,
}

impl ResolvedConfig {
    #[must_use]
    pub fn role_of(&self, rater: &RaterId) -> Option<RaterRole> {
        if self.classifiers.contains(rater) {
            Some(RaterRole::Classifier)
        } else if self.reviewers.contains(rater) {
            Some(RaterRole::Reviewer)
        } else {
            None
        }
    }

    /// Every configured rater, classifiers first.
    #[must_use]
    pub fn all_raters(&self) -> Vec<RaterId> {
        self.classifiers
            .iter()
            .chain(&self.reviewers)
            .cloned()
            .collect()
    }
}

impl ProjectConfig {
    /// Check the configuration and resolve paths against `project_root`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Configuration`] for an empty or repeated
    /// roster, a roster the partition scheme cannot use, a quorum naming an
    /// unknown classifier, an empty label set or an invalid render layout.
    pub fn validate(&self, project_root: &Path) -> Result<ResolvedConfig, EngineError> {
        let mut seen = HashSet::new();
        for rater in &self.raters {
            if !seen.insert(&rater.id) {
                return Err(EngineError::config(format!(
                    "rater '{}' is declared more than once",
                    rater.id
                )));
            }
        }

        let by_role = |role: RaterRole| -> Vec<RaterId> {
            self.raters
                .iter()
                .filter(|r| r.role == role)
                .map(|r| r.id.clone())
                .collect()
        };
        let classifiers = by_role(RaterRole::Classifier);
        let reviewers = by_role(RaterRole::Reviewer);

        if classifiers.is_empty() {
            return Err(EngineError::config("no classifier raters are configured"));
        }
        let scheme = self.assignment.scheme;
        if let Some(required) = scheme.required_raters() {
            if classifiers.len() != required {
                return Err(EngineError::config(format!(
                    "{scheme} scheme needs exactly {required} classifiers, {} configured",
                    classifiers.len()
                )));
            }
        }

        let quorum = match &self.assignment.quorum {
            None => classifiers.clone(),
            Some(quorum) => {
                if quorum.is_empty() {
                    return Err(EngineError::config("assignment.quorum is empty"));
                }
                if let Some(unknown) = quorum.iter().find(|r| !classifiers.contains(*r)) {
                    return Err(EngineError::config(format!(
                        "quorum rater '{unknown}' is not a configured classifier"
                    )));
                }
                quorum.clone()
            }
        };

        if self.annotation.labels.is_empty() {
            return Err(EngineError::config("annotation.labels is empty"));
        }
        if !self.dataset.sampling_rate_hz.is_finite() || self.dataset.sampling_rate_hz <= 0.0 {
            return Err(EngineError::config(format!(
                "dataset.sampling_rate_hz must be positive, got {}",
                self.dataset.sampling_rate_hz
            )));
        }
        self.render.validate()?;

        let project_dir = project_root.join(PROJECT_DIR);
        Ok(ResolvedConfig {
            classifiers,
            reviewers,
            quorum,
            scheme,
            vote_policy: self.assignment.vote_policy,
            labels: self.annotation.labels.clone(),
            max_comment_chars: self.annotation.max_comment_chars,
            layout: self.render,
            catalog: CatalogOptions {
                sampling_rate_hz: self.dataset.sampling_rate_hz,
                delimiter: self.dataset.delimiter,
            },
            signals_path: project_root.join(&self.dataset.signals),
            log_path: project_dir.join(&self.store.log),
            log: LogOptions {
                lock_timeout: Duration::from_millis(self.store.lock_timeout_ms),
                durable: self.store.durable,
            },
        })
    }
}

#[must_use]
pub fn config_path(project_root: &Path) -> PathBuf {
    project_root.join(PROJECT_DIR).join(CONFIG_FILE)
}

pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = config_path(project_root);
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("ecglabel/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// The annotated default config written by `ecgl init`.
///
/// # Errors
///
/// Returns an error if the defaults cannot be serialized.
pub fn default_config_toml() -> Result<String> {
    toml::to_string_pretty(&ProjectConfig::default()).context("Failed to serialize default config")
}

fn default_raters() -> Vec<RaterConfig> {
    [
        ("user1", RaterRole::Classifier),
        ("user2", RaterRole::Classifier),
        ("user3", RaterRole::Reviewer),
    ]
    .into_iter()
    .filter_map(|(id, role)| RaterId::new(id).ok().map(|id| RaterConfig { id, role }))
    .collect()
}

fn default_signals_path() -> PathBuf {
    PathBuf::from("signals.csv")
}

const fn default_sampling_rate() -> f64 {
    300.0
}

const fn default_delimiter() -> char {
    ','
}

const fn default_max_comment_chars() -> usize {
    DEFAULT_MAX_COMMENT_CHARS
}

fn default_log_path() -> PathBuf {
    PathBuf::from("annotations.log")
}

const fn default_lock_timeout_ms() -> u64 {
    2_000
}
