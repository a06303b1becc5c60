//! Aggregate statistics over an evaluation report.
//!
//! Rates are percentages rounded to one decimal place. A model's parse rate
//! counts every record; its pass@1 counts only the records that parsed.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::EvalRecord;
use crate::report::EvalReport;
use crate::result::FailureKind;

/// Counts for one problem category of one model.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategorySummary {
    pub parsed: usize,
    pub equivalent: usize,
    pub pass_rate: f64,
}

/// Statistics for one model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub model: String,
    pub total: usize,
    pub parsed: usize,
    pub equivalent: usize,
    /// Parsed records over all records.
    pub parse_rate: f64,
    /// Equivalent records over parsed records.
    pub pass_at_1: f64,
    /// Equivalent records over all records.
    pub overall_rate: f64,
    pub by_category: BTreeMap<String, CategorySummary>,
    pub failures: BTreeMap<FailureKind, usize>,
}

/// Statistics for one prompt across models.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptSummary {
    pub prompt_idx: usize,
    pub queries: usize,
    pub parsed: usize,
    pub equivalent: usize,
    pub parse_rate: f64,
    pub pass_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub models: Vec<ModelSummary>,
    pub prompts: Vec<PromptSummary>,
}

/// `numerator / denominator` as a percentage with one decimal; 0 when empty.
pub fn rate(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    let percent = numerator as f64 / denominator as f64 * 100.0;
    (percent * 10.0).round() / 10.0
}

fn is_equivalent(record: &EvalRecord) -> bool {
    record.success && record.is_equivalent == Some(true)
}

pub fn summarize(report: &EvalReport) -> Summary {
    let mut per_model: BTreeMap<&str, Vec<&EvalRecord>> = BTreeMap::new();
    for model in report.models() {
        per_model.entry(model).or_default();
    }
    for record in report
        .success_results
        .values()
        .chain(report.failed_results.values())
        .flatten()
    {
        per_model
            .entry(record.model_name.as_str())
            .or_default()
            .push(record);
    }

    let models = per_model
        .into_iter()
        .map(|(model, records)| summarize_model(model, &records))
        .collect();

    let mut per_prompt: BTreeMap<usize, (usize, usize, usize)> = BTreeMap::new();
    for record in report
        .success_results
        .values()
        .chain(report.failed_results.values())
        .flatten()
    {
        let entry = per_prompt.entry(record.prompt_idx).or_default();
        entry.0 += 1;
        entry.1 += usize::from(record.success);
        entry.2 += usize::from(is_equivalent(record));
    }
    let prompts = per_prompt
        .into_iter()
        .map(|(prompt_idx, (queries, parsed, equivalent))| PromptSummary {
            prompt_idx,
            queries,
            parsed,
            equivalent,
            parse_rate: rate(parsed, queries),
            pass_rate: rate(equivalent, parsed),
        })
        .collect();

    Summary { models, prompts }
}

fn summarize_model(model: &str, records: &[&EvalRecord]) -> ModelSummary {
    let total = records.len();
    let parsed = records.iter().filter(|r| r.success).count();
    let equivalent = records.iter().filter(|r| is_equivalent(r)).count();

    let mut by_category: BTreeMap<String, CategorySummary> = BTreeMap::new();
    let mut failures: BTreeMap<FailureKind, usize> = BTreeMap::new();
    for record in records {
        if record.success {
            let entry = by_category.entry(record.category.clone()).or_default();
            entry.parsed += 1;
            entry.equivalent += usize::from(is_equivalent(record));
        } else if let Some(kind) = record.failure {
            *failures.entry(kind).or_default() += 1;
        }
    }
    for entry in by_category.values_mut() {
        entry.pass_rate = rate(entry.equivalent, entry.parsed);
    }

    ModelSummary {
        model: model.to_string(),
        total,
        parsed,
        equivalent,
        parse_rate: rate(parsed, total),
        pass_at_1: rate(equivalent, parsed),
        overall_rate: rate(equivalent, total),
        by_category,
        failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(model: &str, idx: usize, category: &str, outcome: Option<bool>) -> EvalRecord {
        EvalRecord {
            success: outcome.is_some(),
            is_equivalent: outcome,
            model_name: model.into(),
            prompt_idx: idx,
            category: category.into(),
            response: String::new(),
            solution: String::new(),
            parameter: String::new(),
            error: outcome.is_none().then(|| "domain failure".to_string()),
            failure: outcome.is_none().then_some(FailureKind::DomainFailure),
        }
    }

    #[test]
    fn rate_rounding() {
        assert_eq!(rate(1, 3), 33.3);
        assert_eq!(rate(2, 3), 66.7);
        assert_eq!(rate(0, 0), 0.0);
        assert_eq!(rate(5, 5), 100.0);
    }

    #[test]
    fn model_and_prompt_statistics() {
        let report = EvalReport::from_records(vec![
            record("a", 0, "algebra", Some(true)),
            record("a", 1, "algebra", Some(false)),
            record("a", 2, "calculus", Some(true)),
            record("a", 3, "calculus", None),
            record("b", 0, "algebra", None),
        ]);
        let summary = summarize(&report);

        let a = &summary.models[0];
        assert_eq!(a.model, "a");
        assert_eq!((a.total, a.parsed, a.equivalent), (4, 3, 2));
        assert_eq!(a.parse_rate, 75.0);
        assert_eq!(a.pass_at_1, 66.7);
        assert_eq!(a.overall_rate, 50.0);
        assert_eq!(a.by_category["algebra"].pass_rate, 50.0);
        assert_eq!(a.by_category["calculus"].pass_rate, 100.0);
        assert_eq!(a.failures[&FailureKind::DomainFailure], 1);

        let b = &summary.models[1];
        assert_eq!((b.total, b.parsed), (1, 0));
        assert_eq!(b.pass_at_1, 0.0);

        let p0 = &summary.prompts[0];
        assert_eq!((p0.queries, p0.parsed, p0.equivalent), (2, 1, 1));
        assert_eq!(p0.parse_rate, 50.0);
        assert_eq!(p0.pass_rate, 100.0);
    }

    #[test]
    fn summary_serializes() {
        let report = EvalReport::from_records(vec![record("a", 0, "t", None)]);
        let json = serde_json::to_value(summarize(&report)).unwrap();
        assert_eq!(json["models"][0]["failures"]["domain_failure"], 1);
    }
}
