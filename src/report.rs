//! The single JSON record a module run prints on stdout.

use serde::Serialize;
use serde_json::Value;

use crate::applier::Outcome;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diff {
    pub before: String,
    pub after: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleResult {
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<Diff>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub failed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

impl ModuleResult {
    pub fn success(outcome: &Outcome, with_diff: bool) -> Self {
        let diff = with_diff.then(|| Diff {
            // Diff renderers expect newline-terminated text
            before: format!("{}\n", outcome.before),
            after: format!("{}\n", outcome.value),
        });
        Self {
            changed: outcome.changed,
            value: Some(outcome.value.to_json()),
            diff,
            failed: false,
            msg: None,
        }
    }

    pub fn failure(msg: impl Into<String>) -> Self {
        Self {
            changed: false,
            value: None,
            diff: None,
            failed: true,
            msg: Some(msg.into()),
        }
    }

    pub fn to_json_line(&self) -> String {
        // Only fails on non-string map keys, which this record has none of
        serde_json::to_string(self).unwrap_or_else(|e| {
            serde_json::json!({"failed": true, "changed": false, "msg": format!("cannot encode result: {e}")})
                .to_string()
        })
    }
}
