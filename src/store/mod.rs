//! Settings store boundary
//!
//! The module never talks to GSettings directly; it goes through the
//! `SettingsStore` trait so the store handle can be built by the caller and
//! swapped out in tests.
//!
//! - **cli**: drives the `gsettings` executable (default backend)
//! - **memory**: in-process store with schemas built in code
//! - **native**: GIO bindings (cargo feature `gio`)

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::variant::{Variant, VariantType};

pub mod cli;
pub mod memory;

#[cfg(feature = "gio")]
pub mod native;

pub use cli::GsettingsCli;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no such schema '{0}'")]
    UnknownSchema(String),

    #[error("no such key '{key}' in schema '{location}'")]
    UnknownKey { location: String, key: String },

    #[error("key '{key}' in '{location}' is not writable")]
    NotWritable { location: String, key: String },

    #[error("value of type '{found}' does not match type '{expected}' of key '{key}'")]
    TypeMismatch {
        key: String,
        expected: VariantType,
        found: VariantType,
    },

    #[error("{program} not found")]
    NotInstalled {
        program: String,
        #[source]
        source: which::Error,
    },

    #[error("failed to run {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' failed: {message}")]
    CommandFailed { command: String, message: String },

    #[error("unexpected output from '{command}': {message}")]
    UnexpectedOutput { command: String, message: String },

    #[error("settings backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid settings location '{text}': {reason}")]
pub struct LocationError {
    pub text: String,
    pub reason: String,
}

/// A schema id, with a path when the schema is relocatable.
///
/// Written `org.gnome.system.proxy` or
/// `org.gnome.Terminal.Legacy.Profile:/org/gnome/terminal/legacy/profiles:/:b1dcc9dd/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub schema: String,
    pub path: Option<String>,
}

impl Location {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            path: None,
        }
    }

    pub fn with_path(schema: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            path: Some(path.into()),
        }
    }

    pub fn parse(text: &str) -> Result<Self, LocationError> {
        let invalid = |reason: &str| LocationError {
            text: text.to_string(),
            reason: reason.to_string(),
        };

        // Paths may themselves contain ':' so split on the first one only
        let (schema, path) = match text.split_once(':') {
            Some((schema, path)) => (schema, Some(path)),
            None => (text, None),
        };

        if schema.is_empty() {
            return Err(invalid("schema id is empty"));
        }
        if !schema
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-' || b == b'_')
        {
            return Err(invalid("schema id contains invalid characters"));
        }

        if let Some(path) = path {
            if !path.starts_with('/') || !path.ends_with('/') {
                return Err(invalid("path must begin and end with '/'"));
            }
            if path.contains("//") {
                return Err(invalid("path must not contain '//'"));
            }
        }

        Ok(Self {
            schema: schema.to_string(),
            path: path.map(str::to_string),
        })
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}:{}", self.schema, path),
            None => f.write_str(&self.schema),
        }
    }
}

impl FromStr for Location {
    type Err = LocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Location::parse(s)
    }
}

/// Operations the applier needs from a schema-backed settings database.
pub trait SettingsStore {
    /// Declared type of `key`.
    fn value_type(&self, location: &Location, key: &str) -> Result<VariantType, StoreError>;

    /// Effective value: the user override if present, else the default.
    fn value(&self, location: &Location, key: &str) -> Result<Variant, StoreError>;

    fn default_value(&self, location: &Location, key: &str) -> Result<Variant, StoreError>;

    /// The user override, `None` when the key is at its default.
    fn user_value(&self, location: &Location, key: &str) -> Result<Option<Variant>, StoreError>;

    fn set_value(&mut self, location: &Location, key: &str, value: &Variant) -> Result<(), StoreError>;

    /// Remove the user override for `key`.
    fn reset(&mut self, location: &Location, key: &str) -> Result<(), StoreError>;

    fn list_keys(&self, location: &Location) -> Result<Vec<String>, StoreError>;

    /// Child locations, as `(name, location)` pairs.
    fn list_children(&self, location: &Location) -> Result<Vec<(String, Location)>, StoreError>;
}
