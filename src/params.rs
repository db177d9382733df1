//! Module parameters
//!
//! Parameters arrive either as the JSON args file the automation controller
//! hands to binary modules, or as command line flags. Both end up in
//! `ModuleParams`, which is validated into an immutable `Invocation`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::applier::{DesiredState, Mode};
use crate::constants::module;
use crate::store::{Location, LocationError};

#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("failed to read args file {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("args file {} is not a valid parameter object", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("missing required arguments: {0}")]
    Missing(String),

    #[error("Unsupported parameters for ({name}) module: {names}", name = module::NAME)]
    Unsupported { names: String },

    #[error("argument '{0}' must not be empty")]
    Empty(&'static str),

    #[error("argument 'value' is of type {0} and must be a string")]
    ValueType(&'static str),

    #[error("argument 'path' is invalid")]
    Location(#[from] LocationError),
}

/// Requested state, as spelled in parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum State {
    #[default]
    Present,
    Reset,
    ResetRecursively,
    Get,
}

impl From<State> for Mode {
    fn from(state: State) -> Self {
        match state {
            State::Present => Mode::Apply,
            State::Reset => Mode::Reset,
            State::ResetRecursively => Mode::ResetRecursively,
            State::Get => Mode::Get,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModuleParams {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub state: State,
    /// Kept as raw JSON so numeric values can be accepted as their text
    #[serde(default)]
    pub value: Option<Value>,
    /// Accepted for compatibility; the location comes from `path`
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(rename = "_ansible_check_mode", default)]
    pub check_mode: bool,
    #[serde(rename = "_ansible_diff", default)]
    pub diff: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A validated run request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub desired: DesiredState,
    pub check_mode: bool,
    pub diff: bool,
}

impl ModuleParams {
    pub fn from_file(path: &Path) -> Result<Self, ParamsError> {
        let contents = fs::read_to_string(path).map_err(|source| ParamsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents).map_err(|source| ParamsError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }

    pub fn into_invocation(self) -> Result<Invocation, ParamsError> {
        let unsupported: Vec<&str> = self
            .extra
            .keys()
            .map(String::as_str)
            .filter(|name| !name.starts_with(module::INTERNAL_PARAM_PREFIX))
            .collect();
        if !unsupported.is_empty() {
            return Err(ParamsError::Unsupported {
                names: unsupported.join(", "),
            });
        }

        let missing: Vec<&str> = [("path", self.path.is_none()), ("key", self.key.is_none())]
            .into_iter()
            .filter_map(|(name, absent)| absent.then_some(name))
            .collect();
        if !missing.is_empty() {
            return Err(ParamsError::Missing(missing.join(", ")));
        }

        let path = self.path.unwrap_or_default();
        let key = self.key.unwrap_or_default();
        if path.trim().is_empty() {
            return Err(ParamsError::Empty("path"));
        }
        if key.trim().is_empty() {
            return Err(ParamsError::Empty("key"));
        }

        let value = match self.value {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::Bool(_)) => return Err(ParamsError::ValueType("bool")),
            Some(Value::Array(_)) => return Err(ParamsError::ValueType("list")),
            Some(Value::Object(_)) => return Err(ParamsError::ValueType("dict")),
        };

        if let Some(schema) = &self.schema {
            debug!(schema = %schema, "'schema' parameter is accepted but not used");
        }

        let location = Location::parse(path.trim())?;
        Ok(Invocation {
            desired: DesiredState {
                location,
                key: key.trim().to_string(),
                mode: self.state.into(),
                value,
            },
            check_mode: self.check_mode,
            diff: self.diff,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> ModuleParams {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_minimal_params_default_to_present() {
        let invocation = params(json!({"path": "org.gnome.system.proxy", "key": "mode"}))
            .into_invocation()
            .unwrap();
        assert_eq!(invocation.desired.location, Location::new("org.gnome.system.proxy"));
        assert_eq!(invocation.desired.key, "mode");
        assert_eq!(invocation.desired.mode, Mode::Apply);
        assert_eq!(invocation.desired.value, None);
        assert!(!invocation.check_mode);
        assert!(!invocation.diff);
    }

    #[test]
    fn test_all_states_parse() {
        for (text, mode) in [
            ("present", Mode::Apply),
            ("reset", Mode::Reset),
            ("reset-recursively", Mode::ResetRecursively),
            ("get", Mode::Get),
        ] {
            let invocation = params(json!({"path": "org.example", "key": "k", "state": text}))
                .into_invocation()
                .unwrap();
            assert_eq!(invocation.desired.mode, mode, "state {text}");
        }
    }

    #[test]
    fn test_unknown_state_is_rejected() {
        let result: Result<ModuleParams, _> =
            serde_json::from_value(json!({"path": "org.example", "key": "k", "state": "absent"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_internal_flags_are_read_and_others_ignored() {
        let invocation = params(json!({
            "path": "org.example",
            "key": "k",
            "_ansible_check_mode": true,
            "_ansible_diff": true,
            "_ansible_verbosity": 3,
            "_ansible_module_name": "gsettings"
        }))
        .into_invocation()
        .unwrap();
        assert!(invocation.check_mode);
        assert!(invocation.diff);
    }

    #[test]
    fn test_unsupported_parameters_are_rejected() {
        let err = params(json!({"path": "org.example", "key": "k", "name": "x", "force": true}))
            .into_invocation()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unsupported parameters for (gsettings) module: force, name"
        );
    }

    #[test]
    fn test_missing_required_parameters() {
        let err = params(json!({"state": "get"})).into_invocation().unwrap_err();
        assert_eq!(err.to_string(), "missing required arguments: path, key");

        let err = params(json!({"path": "org.example", "key": "  "})).into_invocation().unwrap_err();
        assert!(matches!(err, ParamsError::Empty("key")));
    }

    #[test]
    fn test_value_accepts_strings_and_numbers() {
        let invocation = params(json!({"path": "org.example", "key": "k", "value": "'manual'"}))
            .into_invocation()
            .unwrap();
        assert_eq!(invocation.desired.value.as_deref(), Some("'manual'"));

        let invocation = params(json!({"path": "org.example", "key": "k", "value": 3128}))
            .into_invocation()
            .unwrap();
        assert_eq!(invocation.desired.value.as_deref(), Some("3128"));

        let invocation = params(json!({"path": "org.example", "key": "k", "value": null}))
            .into_invocation()
            .unwrap();
        assert_eq!(invocation.desired.value, None);
    }

    #[test]
    fn test_value_rejects_structured_types() {
        let err = params(json!({"path": "org.example", "key": "k", "value": true}))
            .into_invocation()
            .unwrap_err();
        assert!(matches!(err, ParamsError::ValueType("bool")));

        let err = params(json!({"path": "org.example", "key": "k", "value": ["a"]}))
            .into_invocation()
            .unwrap_err();
        assert!(matches!(err, ParamsError::ValueType("list")));
    }

    #[test]
    fn test_relocatable_path_and_bad_path() {
        let invocation = params(json!({"path": "org.example.Profile:/org/example/p1/", "key": "k"}))
            .into_invocation()
            .unwrap();
        assert_eq!(
            invocation.desired.location,
            Location::with_path("org.example.Profile", "/org/example/p1/")
        );

        let err = params(json!({"path": "org.example:nope", "key": "k"}))
            .into_invocation()
            .unwrap_err();
        assert!(matches!(err, ParamsError::Location(_)));
    }

    #[test]
    fn test_schema_parameter_is_accepted() {
        let invocation = params(json!({"path": "org.example", "key": "k", "schema": "whatever"}))
            .into_invocation()
            .unwrap();
        assert_eq!(invocation.desired.location, Location::new("org.example"));
    }

    #[test]
    fn test_from_file_reports_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("args");
        fs::write(&path, "path=org.example key=k").unwrap();
        let err = ModuleParams::from_file(&path).unwrap_err();
        assert!(matches!(err, ParamsError::Json { .. }), "{err}");

        let err = ModuleParams::from_file(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, ParamsError::Read { .. }), "{err}");
    }
}
