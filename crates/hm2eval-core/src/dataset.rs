//! Locating and loading query-result files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::{BatchConfig, ModelSelection};
use crate::model::QueryRecord;

/// File-name stem of a model: lowercase, with `-`, space and `.` mapped to `_`.
pub fn normalize_model_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '-' | ' ' | '.' => '_',
            c => c,
        })
        .collect::<String>()
        .to_lowercase()
}

/// The query-results file each selected model should be evaluated from.
///
/// Models selected as `Skip` are left out. A missing file is an error.
pub fn find_query_result_files(config: &BatchConfig) -> Result<BTreeMap<String, PathBuf>> {
    let dir = &config.query_results_dir;
    let mut files = BTreeMap::new();

    for (model, selection) in &config.models {
        let base = normalize_model_name(model);
        let path = match selection {
            ModelSelection::Skip => continue,
            ModelSelection::Latest => latest_file(dir, &base)?,
            ModelSelection::Timestamp(stamp) => {
                let path = dir.join(format!("{base}_{stamp}.json"));
                if !path.exists() {
                    anyhow::bail!("file not found: {}", path.display());
                }
                path
            }
        };
        tracing::debug!("{model}: {}", path.display());
        files.insert(model.clone(), path);
    }

    Ok(files)
}

/// The `<base>_<stamp>.json` file with the greatest stamp.
fn latest_file(dir: &Path, base: &str) -> Result<PathBuf> {
    let prefix = format!("{base}_");
    let mut best: Option<(String, PathBuf)> = None;

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let path = entry?.path();
        if path.extension().map_or(true, |ext| ext != "json") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let Some(rest) = stem.strip_prefix(&prefix) else {
            continue;
        };
        // `gpt_4o_mini_*` must not match the base `gpt_4o`.
        if rest.contains('_') {
            continue;
        }
        if best.as_ref().map_or(true, |(stamp, _)| rest > stamp.as_str()) {
            best = Some((rest.to_string(), path.clone()));
        }
    }

    best.map(|(_, path)| path).with_context(|| {
        format!(
            "no files found matching pattern: {}",
            dir.join(format!("{base}_*.json")).display()
        )
    })
}

/// Read one query-results file.
pub fn load_query_results(path: &Path) -> Result<Vec<QueryRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read query results: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse query results: {}", path.display()))
}

/// Read every `.json` file in `dir`, skipping the ones that fail to load.
pub fn load_query_directory(dir: &Path) -> Result<Vec<QueryRecord>> {
    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut records = Vec::new();
    for path in paths {
        match load_query_results(&path) {
            Ok(batch) => records.extend(batch),
            Err(e) => tracing::warn!("skipping {}: {e:#}", path.display()),
        }
    }
    Ok(records)
}

/// Load the records of every model selected in `config`.
pub fn load_selected(config: &BatchConfig) -> Result<Vec<QueryRecord>> {
    let mut records = Vec::new();
    for (model, path) in find_query_result_files(config)? {
        let batch = load_query_results(&path)?;
        tracing::info!("loaded {} records for {model}", batch.len());
        records.extend(batch);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const RECORDS: &str = r#"[
        {"prompt_idx": 0, "model_name": "GPT-4o", "response": "\\boxed{2}",
         "error": null, "prompt": "p", "solution": "2", "parameters": "", "type": "t"}
    ]"#;

    fn config(dir: &Path, models: &[(&str, ModelSelection)]) -> BatchConfig {
        BatchConfig {
            query_results_dir: dir.to_path_buf(),
            models: models
                .iter()
                .map(|(m, s)| (m.to_string(), s.clone()))
                .collect(),
            ..BatchConfig::default()
        }
    }

    #[test]
    fn normalizes_names() {
        assert_eq!(normalize_model_name("GPT-4o Mini.v2"), "gpt_4o_mini_v2");
    }

    #[test]
    fn latest_and_explicit_selection() {
        let tmp = TempDir::new().unwrap();
        for stamp in ["0101000000", "0614120000", "0301000000"] {
            std::fs::write(tmp.path().join(format!("gpt_4o_{stamp}.json")), RECORDS).unwrap();
        }
        std::fs::write(tmp.path().join("gpt_4o_mini_0701000000.json"), RECORDS).unwrap();

        let files = find_query_result_files(&config(
            tmp.path(),
            &[
                ("GPT-4o", ModelSelection::Latest),
                ("gpt-4o-mini", ModelSelection::Timestamp("0701000000".into())),
                ("llama", ModelSelection::Skip),
            ],
        ))
        .unwrap();
        assert_eq!(files.len(), 2);
        assert!(files["GPT-4o"].ends_with("gpt_4o_0614120000.json"));
        assert!(files["gpt-4o-mini"].ends_with("gpt_4o_mini_0701000000.json"));
    }

    #[test]
    fn missing_files_are_errors() {
        let tmp = TempDir::new().unwrap();
        let err = find_query_result_files(&config(tmp.path(), &[("m", ModelSelection::Latest)]))
            .unwrap_err();
        assert!(err.to_string().contains("no files found"));

        let err = find_query_result_files(&config(
            tmp.path(),
            &[("m", ModelSelection::Timestamp("1".into()))],
        ))
        .unwrap_err();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn directory_skips_bad_files() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a_1.json"), RECORDS).unwrap();
        std::fs::write(tmp.path().join("b_1.json"), "not json").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();
        let records = load_query_directory(tmp.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].model_name, "GPT-4o");
    }
}
