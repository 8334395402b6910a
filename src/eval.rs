use std::{collections::HashMap, sync::Arc};

use crate::{
    wire::{Outcome, TryParse},
    ConfigValue, EvaluateResponse, Error, EvaluationError, Result,
};

/// What the server response means for a single requested name.
#[derive(Debug)]
pub(crate) enum Resolution {
    /// Fresh value from the server.
    Fresh(ConfigValue),
    /// No fresh value; fall back to cache or default and annotate with the error.
    Degraded(EvaluationError),
}

impl EvaluateResponse {
    /// Index outcomes by config name. If the server returned a name more than once, the first
    /// entry wins.
    pub(crate) fn outcomes_by_name(&self) -> HashMap<&str, &Outcome> {
        let mut outcomes = HashMap::with_capacity(self.data.results.len());
        for result in &self.data.results {
            match result {
                TryParse::Parsed(result) => {
                    outcomes
                        .entry(result.name.as_str())
                        .or_insert(&result.outcome);
                }
                TryParse::ParseFailed(raw) => {
                    log::warn!(target: "tweakship", raw:serde; "skipping remote config result that failed to parse");
                }
            }
        }
        outcomes
    }
}

/// Decide how `name` resolves given the indexed response outcomes.
///
/// Fails only if the server sent a malformed `json` value.
pub(crate) fn resolve_name(outcomes: &HashMap<&str, &Outcome>, name: &str) -> Result<Resolution> {
    let Some(outcome) = outcomes.get(name) else {
        return Ok(Resolution::Degraded(EvaluationError::ConfigNotFound));
    };

    match outcome {
        Outcome::Success { value_type, value } => {
            let value = value_type.parse(value).map_err(|err| {
                log::warn!(target: "tweakship", name, value_type:serde; "server returned malformed JSON value: {}", err);
                Error::InvalidJsonValue {
                    name: name.to_owned(),
                    source: Arc::new(err),
                }
            })?;
            Ok(Resolution::Fresh(value))
        }
        Outcome::Fail { error } => Ok(Resolution::Degraded(EvaluationError::from_tag(error))),
    }
}
