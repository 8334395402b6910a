//! Request and response bodies of the remote config evaluation endpoint.
use serde::{Deserialize, Serialize};

use crate::{EvaluationContext, ValueType};

/// Body of a batch evaluation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluateRequest {
    /// Evaluation context captured when the request was dispatched.
    pub context: EvaluationContext,
    /// Requested config names, in request order.
    pub names: Vec<String>,
}

/// Body of a batch evaluation response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluateResponse {
    /// Response payload.
    pub data: EvaluateData,
}

/// Payload of [`EvaluateResponse`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluateData {
    /// Per-name outcomes. Entries that fail to parse do not fail the whole response.
    pub results: Vec<TryParse<EvaluationResult>>,
}

impl EvaluateResponse {
    /// Build a response out of per-name results.
    pub fn new(results: impl IntoIterator<Item = EvaluationResult>) -> Self {
        EvaluateResponse {
            data: EvaluateData {
                results: results.into_iter().map(TryParse::Parsed).collect(),
            },
        }
    }
}

/// `TryParse` allows the subfield to fail parsing without failing the parsing of the whole
/// structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TryParse<T> {
    /// Successfully parsed entry.
    Parsed(T),
    /// Raw entry this SDK version could not understand.
    ParseFailed(serde_json::Value),
}

impl<'a, T> From<&'a TryParse<T>> for Option<&'a T> {
    fn from(value: &TryParse<T>) -> Option<&T> {
        match value {
            TryParse::Parsed(v) => Some(v),
            TryParse::ParseFailed(_) => None,
        }
    }
}

/// Server evaluation outcome for a single config name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Config name.
    pub name: String,
    /// Success or failure of the evaluation.
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Per-name evaluation outcome, tagged by `status` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Outcome {
    /// The server evaluated the config.
    #[serde(rename_all = "camelCase")]
    Success {
        /// Declared type of `value`.
        value_type: ValueType,
        /// Raw value, always a string on the wire.
        value: String,
    },
    /// The server failed to evaluate the config.
    Fail {
        /// Error tag, e.g. `ConfigNotFound` or `ServerError`.
        error: String,
    },
}

impl EvaluationResult {
    /// Successful outcome for `name`.
    pub fn success(name: impl Into<String>, value_type: ValueType, value: impl Into<String>) -> Self {
        EvaluationResult {
            name: name.into(),
            outcome: Outcome::Success {
                value_type,
                value: value.into(),
            },
        }
    }

    /// Failed outcome for `name`.
    pub fn fail(name: impl Into<String>, error: impl Into<String>) -> Self {
        EvaluationResult {
            name: name.into(),
            outcome: Outcome::Fail {
                error: error.into(),
            },
        }
    }
}
