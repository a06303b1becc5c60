//! Evaluation reports and their on-disk layout.
//!
//! A report is a directory named after the local time it was written
//! (`%m%d%H%M%S`) containing `success_results.json` and
//! `failed_results.json`, each mapping model name to its records.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::EvalRecord;

pub const SUCCESS_FILE: &str = "success_results.json";
pub const FAILED_FILE: &str = "failed_results.json";

/// Records grouped per model, split by whether evaluation succeeded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalReport {
    pub success_results: BTreeMap<String, Vec<EvalRecord>>,
    pub failed_results: BTreeMap<String, Vec<EvalRecord>>,
}

impl EvalReport {
    pub fn from_records(records: impl IntoIterator<Item = EvalRecord>) -> Self {
        let mut report = Self::default();
        for record in records {
            let model = record.model_name.clone();
            // Every model gets an entry on both sides, even if empty.
            report.success_results.entry(model.clone()).or_default();
            report.failed_results.entry(model.clone()).or_default();
            let side = if record.success {
                &mut report.success_results
            } else {
                &mut report.failed_results
            };
            side.entry(model).or_default().push(record);
        }
        report
    }

    /// Every model that appears in the report.
    pub fn models(&self) -> Vec<&str> {
        let mut models: Vec<&str> = self
            .success_results
            .keys()
            .chain(self.failed_results.keys())
            .map(String::as_str)
            .collect();
        models.sort_unstable();
        models.dedup();
        models
    }

    pub fn len(&self) -> usize {
        self.success_results
            .values()
            .chain(self.failed_results.values())
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the report into a new timestamped subdirectory of `base`.
    pub fn save(&self, base: &Path) -> Result<PathBuf> {
        let stamp = chrono::Local::now().format("%m%d%H%M%S").to_string();
        let dir = base.join(stamp);
        self.save_to(&dir)?;
        Ok(dir)
    }

    /// Write the two result files into `dir`.
    pub fn save_to(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        write_json(&dir.join(SUCCESS_FILE), &self.success_results)?;
        write_json(&dir.join(FAILED_FILE), &self.failed_results)?;
        tracing::info!("saved report to {}", dir.display());
        Ok(())
    }

    /// Load a report directory written by [`EvalReport::save`].
    pub fn load(dir: &Path) -> Result<Self> {
        Ok(Self {
            success_results: read_json(&dir.join(SUCCESS_FILE))?,
            failed_results: read_json(&dir.join(FAILED_FILE))?,
        })
    }
}

fn write_json(path: &Path, value: &BTreeMap<String, Vec<EvalRecord>>) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize report")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write report to {}", path.display()))
}

fn read_json(path: &Path) -> Result<BTreeMap<String, Vec<EvalRecord>>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read report from {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse report JSON: {}", path.display()))
}

/// The report subdirectory of `base` with the greatest name.
pub fn latest_report_dir(base: &Path) -> Result<PathBuf> {
    let mut latest: Option<PathBuf> = None;
    for entry in std::fs::read_dir(base)
        .with_context(|| format!("failed to read directory: {}", base.display()))?
    {
        let path = entry?.path();
        if !path.join(SUCCESS_FILE).is_file() {
            continue;
        }
        if latest
            .as_ref()
            .map_or(true, |best| path.file_name() > best.file_name())
        {
            latest = Some(path);
        }
    }
    latest.with_context(|| format!("no evaluation reports in {}", base.display()))
}
