//! The `hm2eval check` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use hm2eval_core::config::load_config_from;
use hm2eval_core::{AnswerKind, Evaluator};

/// `@path` reads the text from a file; anything else is taken literally.
fn read_arg(value: &str) -> Result<String> {
    match value.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read response file: {path}")),
        None => Ok(value.to_string()),
    }
}

pub fn execute(
    response: String,
    solution: String,
    parameters: String,
    kind: Option<String>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let kind = kind
        .map(|k| k.parse::<AnswerKind>().map_err(anyhow::Error::msg))
        .transpose()?;
    let config = load_config_from(config_path.as_deref())?;
    let response = read_arg(&response)?;

    let evaluator = Evaluator::new(config.eval);
    let result = evaluator.evaluate(kind, &response, &solution, &parameters);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
