//! Engine policy and batch configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::checker::{SamplingConfig, Tolerance};
use crate::extract::ExtractionConfig;
use crate::simplify::SimplifyConfig;

/// Everything that decides how a single evaluation compares answers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalConfig {
    #[serde(default)]
    pub tolerance: Tolerance,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub simplify: SimplifyConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

/// Which query-results file of a model to evaluate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawSelection", into = "RawSelection")]
pub enum ModelSelection {
    Skip,
    /// The file with the greatest timestamp suffix.
    Latest,
    /// The file with exactly this suffix.
    Timestamp(String),
}

/// On-disk form: `true`/`false`, `"latest"`, or a timestamp string.
#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawSelection {
    Flag(bool),
    Stamp(String),
}

impl From<RawSelection> for ModelSelection {
    fn from(raw: RawSelection) -> Self {
        match raw {
            RawSelection::Flag(false) => ModelSelection::Skip,
            RawSelection::Flag(true) => ModelSelection::Latest,
            RawSelection::Stamp(s) => match s.trim() {
                "" | "skip" | "false" => ModelSelection::Skip,
                "latest" | "true" => ModelSelection::Latest,
                stamp => ModelSelection::Timestamp(stamp.to_string()),
            },
        }
    }
}

impl From<ModelSelection> for RawSelection {
    fn from(selection: ModelSelection) -> Self {
        match selection {
            ModelSelection::Skip => RawSelection::Flag(false),
            ModelSelection::Latest => RawSelection::Stamp("latest".into()),
            ModelSelection::Timestamp(s) => RawSelection::Stamp(s),
        }
    }
}

/// Top-level hm2eval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Where the query layer wrote `<model>_<stamp>.json` files.
    #[serde(default = "default_query_results_dir")]
    pub query_results_dir: PathBuf,
    /// Where timestamped evaluation reports are written.
    #[serde(default = "default_eval_results_dir")]
    pub eval_results_dir: PathBuf,
    /// Model name to file selection.
    #[serde(default)]
    pub models: BTreeMap<String, ModelSelection>,
    /// Max concurrent evaluations.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    #[serde(default)]
    pub eval: EvalConfig,
}

fn default_query_results_dir() -> PathBuf {
    PathBuf::from("./query_results")
}
fn default_eval_results_dir() -> PathBuf {
    PathBuf::from("./eval_results")
}
fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            query_results_dir: default_query_results_dir(),
            eval_results_dir: default_eval_results_dir(),
            models: BTreeMap::new(),
            parallelism: default_parallelism(),
            eval: EvalConfig::default(),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

fn resolve_path(path: &Path) -> PathBuf {
    PathBuf::from(resolve_env_vars(&path.to_string_lossy()))
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `hm2eval.toml` in the current directory
/// 2. `~/.config/hm2eval/config.toml`
///
/// Environment variable override: `HM2EVAL_PARALLELISM`.
pub fn load_config() -> Result<BatchConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<BatchConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("hm2eval.toml");
        if local.exists() {
            Some(local)
        } else if let Some(home) = dirs_path() {
            let global = home.join("config.toml");
            if global.exists() {
                Some(global)
            } else {
                None
            }
        } else {
            None
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!("loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<BatchConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => BatchConfig::default(),
    };

    if let Ok(value) = std::env::var("HM2EVAL_PARALLELISM") {
        config.parallelism = value
            .trim()
            .parse()
            .with_context(|| format!("invalid HM2EVAL_PARALLELISM: {value}"))?;
    }
    if config.parallelism == 0 {
        anyhow::bail!("parallelism must be at least 1");
    }

    config.query_results_dir = resolve_path(&config.query_results_dir);
    config.eval_results_dir = resolve_path(&config.eval_results_dir);

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("hm2eval"))
}
