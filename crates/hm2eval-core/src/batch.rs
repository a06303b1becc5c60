//! Parallel evaluation of query-result records.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;

use crate::engine::Evaluator;
use crate::error::{EvalError, ExtractError};
use crate::model::{EvalRecord, QueryRecord};
use crate::result::EvaluationResult;

/// Progress reporting trait.
pub trait ProgressReporter: Send + Sync {
    fn on_record_complete(&self, index: usize, record: &EvalRecord);
    fn on_batch_complete(&self, total: usize, succeeded: usize, elapsed: Duration);
}

/// No-op progress reporter.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn on_record_complete(&self, _: usize, _: &EvalRecord) {}
    fn on_batch_complete(&self, _: usize, _: usize, _: Duration) {}
}

/// Evaluates many records on the blocking pool, `parallelism` at a time.
pub struct BatchEvaluator {
    evaluator: Arc<Evaluator>,
    parallelism: usize,
}

impl BatchEvaluator {
    pub fn new(evaluator: Evaluator, parallelism: usize) -> Self {
        Self {
            evaluator: Arc::new(evaluator),
            parallelism: parallelism.max(1),
        }
    }

    /// Evaluate every record. The output is in input order.
    pub async fn run(
        &self,
        records: Vec<QueryRecord>,
        progress: &dyn ProgressReporter,
    ) -> Result<Vec<EvalRecord>> {
        let start = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let total = records.len();

        let mut futures = FuturesUnordered::new();
        for (index, record) in records.into_iter().enumerate() {
            let evaluator = Arc::clone(&self.evaluator);
            let semaphore = Arc::clone(&semaphore);
            futures.push(async move {
                let _permit = semaphore
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|_| anyhow::anyhow!("semaphore closed"))?;
                let problem = record.problem();
                let response = record.model_response();
                let outcome = tokio::task::spawn_blocking({
                    let problem = problem.clone();
                    let response = response.clone();
                    move || evaluate_record(&evaluator, &problem, &response)
                })
                .await;
                let result = outcome.unwrap_or_else(|e| {
                    tracing::error!(
                        "evaluation of {}/{} aborted: {e}",
                        response.model_name,
                        problem.prompt_idx
                    );
                    EvaluationResult::failure(&EvalError::Indeterminate(format!(
                        "evaluation aborted: {e}"
                    )))
                });
                anyhow::Ok((index, EvalRecord::new(&problem, &response, &result)))
            });
        }

        let mut slots: Vec<Option<EvalRecord>> = vec![None; total];
        let mut succeeded = 0usize;
        while let Some(done) = futures.next().await {
            let (index, record) = done?;
            if record.success {
                succeeded += 1;
            }
            progress.on_record_complete(index, &record);
            slots[index] = Some(record);
        }

        let elapsed = start.elapsed();
        progress.on_batch_complete(total, succeeded, elapsed);
        tracing::info!(
            "evaluated {total} records ({succeeded} parsed) in {:.1}s",
            elapsed.as_secs_f64()
        );
        Ok(slots.into_iter().flatten().collect())
    }
}

fn evaluate_record(
    evaluator: &Evaluator,
    problem: &crate::model::Problem,
    response: &crate::model::ModelResponse,
) -> EvaluationResult {
    if response.text.trim().is_empty() {
        if let Some(error) = &response.error {
            tracing::warn!(
                "{} prompt {}: query failed: {error}",
                response.model_name,
                problem.prompt_idx
            );
            return EvaluationResult::failure(&ExtractError::QueryFailed(error.clone()).into());
        }
    }
    evaluator.evaluate(
        problem.kind,
        &response.text,
        &problem.solution,
        &problem.parameters,
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::result::FailureKind;

    fn record(idx: usize, response: Option<&str>, error: Option<&str>, solution: &str) -> QueryRecord {
        QueryRecord {
            prompt_idx: idx,
            model_name: "m".into(),
            response: response.map(str::to_string),
            error: error.map(str::to_string),
            prompt: String::new(),
            solution: solution.into(),
            parameters: "x = 2".into(),
            category: "t".into(),
            date: None,
            kind: None,
        }
    }

    struct Recorder(Mutex<Vec<usize>>);

    impl ProgressReporter for Recorder {
        fn on_record_complete(&self, index: usize, _: &EvalRecord) {
            self.0.lock().unwrap().push(index);
        }
        fn on_batch_complete(&self, _: usize, _: usize, _: Duration) {}
    }

    #[tokio::test]
    async fn preserves_order_and_isolates_failures() {
        let records: Vec<QueryRecord> = (0..20)
            .map(|i| match i % 3 {
                0 => record(i, Some(r"\boxed{2x}"), None, "2 x"),
                1 => record(i, Some("the answer is blah"), None, "x"),
                _ => record(i, None, Some("rate limited"), "x"),
            })
            .collect();

        let recorder = Recorder(Mutex::new(Vec::new()));
        let batch = BatchEvaluator::new(Evaluator::default(), 4);
        let out = batch.run(records, &recorder).await.unwrap();

        assert_eq!(out.len(), 20);
        for (i, r) in out.iter().enumerate() {
            assert_eq!(r.prompt_idx, i);
            match i % 3 {
                0 => assert_eq!(r.is_equivalent, Some(true)),
                1 => assert_eq!(r.failure, Some(FailureKind::ParseFailure)),
                _ => {
                    assert_eq!(r.failure, Some(FailureKind::ExtractionFailure));
                    assert!(r.error.as_deref().unwrap().contains("rate limited"));
                }
            }
        }
        assert_eq!(recorder.0.lock().unwrap().len(), 20);
    }

    #[tokio::test]
    async fn empty_batch() {
        let batch = BatchEvaluator::new(Evaluator::default(), 2);
        assert!(batch.run(Vec::new(), &NoopReporter).await.unwrap().is_empty());
    }
}
