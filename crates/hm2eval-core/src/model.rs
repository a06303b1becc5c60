//! Dataset and result record types.
//!
//! These mirror the JSON files exchanged with the query layer: one
//! [`QueryRecord`] per model response, one [`EvalRecord`] per evaluation.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::expr::AnswerKind;
use crate::result::{EvaluationResult, FailureKind};

/// A parametrized problem instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Problem {
    pub prompt_idx: usize,
    /// Forces the comparison rule; detected from the solution when absent.
    pub kind: Option<AnswerKind>,
    pub solution: String,
    pub parameters: String,
    /// Problem category, `type` in the dataset.
    pub category: String,
}

/// One model's raw answer to a problem.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelResponse {
    pub model_name: String,
    pub prompt_idx: usize,
    pub text: String,
    /// Set when the query itself failed.
    pub error: Option<String>,
}

/// One element of a query-results JSON array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub prompt_idx: usize,
    pub model_name: String,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub prompt: String,
    pub solution: String,
    /// Either a bindings string or a JSON object of bindings.
    #[serde(default, deserialize_with = "parameters_as_text")]
    pub parameters: String,
    #[serde(rename = "type", default)]
    pub category: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<AnswerKind>,
}

fn parameters_as_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

impl QueryRecord {
    pub fn problem(&self) -> Problem {
        Problem {
            prompt_idx: self.prompt_idx,
            kind: self.kind,
            solution: self.solution.clone(),
            parameters: self.parameters.clone(),
            category: self.category.clone(),
        }
    }

    pub fn model_response(&self) -> ModelResponse {
        ModelResponse {
            model_name: self.model_name.clone(),
            prompt_idx: self.prompt_idx,
            text: self.response.clone().unwrap_or_default(),
            error: self.error.clone().filter(|e| !e.is_empty()),
        }
    }
}

/// The evaluation of one query record, as written to the report files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalRecord {
    pub success: bool,
    pub is_equivalent: Option<bool>,
    pub model_name: String,
    pub prompt_idx: usize,
    #[serde(rename = "type")]
    pub category: String,
    pub response: String,
    pub solution: String,
    pub parameter: String,
    /// Written as `""` when the evaluation succeeded.
    #[serde(
        default,
        serialize_with = "error_as_text",
        deserialize_with = "error_from_text"
    )]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

fn error_as_text<S>(error: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(error.as_deref().unwrap_or(""))
}

fn error_from_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let error = Option::<String>::deserialize(deserializer)?;
    Ok(error.filter(|e| !e.is_empty()))
}

impl EvalRecord {
    pub fn new(problem: &Problem, response: &ModelResponse, result: &EvaluationResult) -> Self {
        Self {
            success: result.success(),
            is_equivalent: result.is_equivalent(),
            model_name: response.model_name.clone(),
            prompt_idx: problem.prompt_idx,
            category: problem.category.clone(),
            response: response.text.clone(),
            solution: problem.solution.clone(),
            parameter: problem.parameters.clone(),
            error: result.error_message().map(str::to_string),
            failure: result.failure_kind(),
        }
    }
}
