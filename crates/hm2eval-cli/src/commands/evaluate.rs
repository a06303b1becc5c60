//! The `hm2eval evaluate` command.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use hm2eval_core::batch::{BatchEvaluator, ProgressReporter};
use hm2eval_core::config::load_config_from;
use hm2eval_core::dataset::{load_query_directory, load_query_results, load_selected};
use hm2eval_core::model::EvalRecord;
use hm2eval_core::report::EvalReport;
use hm2eval_core::statistics::summarize;
use hm2eval_core::Evaluator;

use super::summarize::print_summary;

/// Console progress reporter.
struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn on_record_complete(&self, _index: usize, record: &EvalRecord) {
        let status = match (record.success, record.is_equivalent) {
            (true, Some(true)) => "PASS".to_string(),
            (true, _) => "FAIL".to_string(),
            (false, _) => match record.failure {
                Some(kind) => format!("ERROR {kind}"),
                None => "ERROR".to_string(),
            },
        };
        eprintln!(
            "  {} :: prompt {} [{}]",
            record.model_name, record.prompt_idx, status
        );
    }

    fn on_batch_complete(&self, total: usize, succeeded: usize, elapsed: Duration) {
        eprintln!(
            "\nEvaluated {total} records ({succeeded} parsed, {} failed) in {:.1}s",
            total - succeeded,
            elapsed.as_secs_f64()
        );
    }
}

pub async fn execute(
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    config_path: Option<PathBuf>,
    parallelism: Option<usize>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;

    let records = match &input {
        Some(path) if path.is_dir() => load_query_directory(path)?,
        Some(path) => load_query_results(path)?,
        None => load_selected(&config)?,
    };
    tracing::debug!("loaded {} query records", records.len());
    if records.is_empty() {
        anyhow::bail!("no query results to evaluate");
    }

    let parallelism = parallelism.unwrap_or(config.parallelism);
    if parallelism == 0 {
        anyhow::bail!("parallelism must be at least 1");
    }

    eprintln!(
        "hm2eval v{} - Evaluating {} records with parallelism {}",
        env!("CARGO_PKG_VERSION"),
        records.len(),
        parallelism
    );
    eprintln!();

    let batch = BatchEvaluator::new(Evaluator::new(config.eval.clone()), parallelism);
    let results = batch.run(records, &ConsoleReporter).await?;

    let report = EvalReport::from_records(results);
    print_summary(&summarize(&report));

    let base = output.unwrap_or(config.eval_results_dir);
    let dir = report
        .save(&base)
        .with_context(|| format!("failed to save report under {}", base.display()))?;
    eprintln!("\nReport saved to {}", dir.display());

    Ok(())
}
