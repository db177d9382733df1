//! Idempotent apply/reset of a single setting
//!
//! One run is: read the current value, branch on the requested mode,
//! optionally write or reset, read the value back. In check mode the same
//! decision is made but nothing is written and the outcome is a prediction.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::constants::module;
use crate::error::ApplyError;
use crate::store::{Location, SettingsStore};
use crate::variant::Variant;

/// Requested mode of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Write the desired value if it differs from the current one
    Apply,
    /// Clear the user override of the key
    Reset,
    /// Clear every user override in the key's location and its children
    ResetRecursively,
    /// Only report the current value
    Get,
}

/// What the caller asked for. Built once per run and never modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredState {
    pub location: Location,
    pub key: String,
    pub mode: Mode,
    /// Typed literal, only used by `Mode::Apply`
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub changed: bool,
    /// Value observed before anything was done
    pub before: Variant,
    /// Value after the run, or the predicted value in check mode
    pub value: Variant,
}

impl Outcome {
    fn unchanged(value: Variant) -> Self {
        Self {
            changed: false,
            before: value.clone(),
            value,
        }
    }
}

pub fn apply<S: SettingsStore + ?Sized>(
    store: &mut S,
    desired: &DesiredState,
    check_mode: bool,
) -> Result<Outcome, ApplyError> {
    let location = &desired.location;
    let key = desired.key.as_str();
    debug!(location = %location, key = key, mode = ?desired.mode, check_mode, "applying setting");

    match desired.mode {
        Mode::Get => Ok(Outcome::unchanged(store.value(location, key)?)),

        Mode::Apply => {
            let literal = desired.value.as_deref().unwrap_or(module::DEFAULT_VALUE);
            let ty = store.value_type(location, key)?;
            let wanted = Variant::parse(literal, Some(&ty)).map_err(|source| ApplyError::MalformedValue {
                key: key.to_string(),
                literal: literal.to_string(),
                source,
            })?;

            let before = store.value(location, key)?;
            if before == wanted {
                debug!(location = %location, key = key, value = %before, "value already set");
                return Ok(Outcome::unchanged(before));
            }
            if check_mode {
                return Ok(Outcome {
                    changed: true,
                    before,
                    value: wanted,
                });
            }

            store.set_value(location, key, &wanted)?;
            let value = store.value(location, key)?;
            info!(location = %location, key = key, from = %before, to = %value, "value changed");
            Ok(Outcome {
                changed: true,
                before,
                value,
            })
        }

        Mode::Reset => {
            let before = store.value(location, key)?;
            if store.user_value(location, key)?.is_none() {
                debug!(location = %location, key = key, "no user override to reset");
                return Ok(Outcome::unchanged(before));
            }
            if check_mode {
                let value = store.default_value(location, key)?;
                return Ok(Outcome {
                    changed: true,
                    before,
                    value,
                });
            }

            store.reset(location, key)?;
            let value = store.value(location, key)?;
            info!(location = %location, key = key, from = %before, to = %value, "key reset");
            Ok(Outcome {
                changed: true,
                before,
                value,
            })
        }

        Mode::ResetRecursively => {
            let before = store.value(location, key)?;
            let predicted = if check_mode && store.user_value(location, key)?.is_some() {
                store.default_value(location, key)?
            } else {
                before.clone()
            };

            let mut visited = HashSet::new();
            let cleared = reset_tree(&mut *store, location, check_mode, &mut visited)?;
            if cleared == 0 {
                return Ok(Outcome::unchanged(before));
            }
            info!(location = %location, cleared, check_mode, "overrides reset recursively");

            let value = if check_mode {
                predicted
            } else {
                store.value(location, key)?
            };
            Ok(Outcome {
                changed: true,
                before,
                value,
            })
        }
    }
}

/// Clear overrides under `location`, depth first. Returns how many keys had one.
fn reset_tree<S: SettingsStore + ?Sized>(
    store: &mut S,
    location: &Location,
    check_mode: bool,
    visited: &mut HashSet<Location>,
) -> Result<usize, ApplyError> {
    if !visited.insert(location.clone()) {
        return Ok(0);
    }

    let mut cleared = 0;
    for key in store.list_keys(location)? {
        if store.user_value(location, &key)?.is_some() {
            debug!(location = %location, key = %key, check_mode, "resetting override");
            if !check_mode {
                store.reset(location, &key)?;
            }
            cleared += 1;
        }
    }

    for (name, child) in store.list_children(location)? {
        debug!(parent = %location, child = %name, "descending into child schema");
        cleared += reset_tree(&mut *store, &child, check_mode, visited)?;
    }

    Ok(cleared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreError};

    fn proxy() -> Location {
        Location::new("org.gnome.system.proxy")
    }

    fn http() -> Location {
        Location::new("org.gnome.system.proxy.http")
    }

    fn desired(location: Location, key: &str, mode: Mode, value: Option<&str>) -> DesiredState {
        DesiredState {
            location,
            key: key.to_string(),
            mode,
            value: value.map(str::to_string),
        }
    }

    fn proxy_store() -> MemoryStore {
        MemoryStore::new()
            .with_key(&proxy(), "mode", Variant::string("none"))
            .with_key(&proxy(), "ignore-hosts", Variant::string_array(&["localhost"]))
            .with_key(&http(), "host", Variant::string(""))
            .with_key(&http(), "port", Variant::Int32(8080))
            .with_child(&proxy(), "http", &http())
    }

    #[test]
    fn test_apply_writes_when_different() {
        let mut store = proxy_store();
        let outcome = apply(&mut store, &desired(proxy(), "mode", Mode::Apply, Some("'manual'")), false).unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.before, Variant::string("none"));
        assert_eq!(outcome.value, Variant::string("manual"));
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_apply_is_noop_when_equal() {
        let mut store = proxy_store();
        store.set_value(&proxy(), "mode", &Variant::string("manual")).unwrap();

        let outcome = apply(&mut store, &desired(proxy(), "mode", Mode::Apply, Some("'manual'")), false).unwrap();
        assert!(!outcome.changed);
        assert_eq!(outcome.value, Variant::string("manual"));
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_apply_twice_changes_once() {
        let mut store = proxy_store();
        let request = desired(proxy(), "mode", Mode::Apply, Some("'auto'"));
        assert!(apply(&mut store, &request, false).unwrap().changed);
        assert!(!apply(&mut store, &request, false).unwrap().changed);
    }

    #[test]
    fn test_apply_uses_key_type_for_numbers() {
        let mut store = proxy_store();
        let outcome = apply(&mut store, &desired(http(), "port", Mode::Apply, Some("3128")), false).unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.value, Variant::Int32(3128));
    }

    #[test]
    fn test_apply_default_literal_is_empty_string_array() {
        let mut store = proxy_store();
        let outcome = apply(&mut store, &desired(proxy(), "ignore-hosts", Mode::Apply, None), false).unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.value, Variant::string_array::<&str>(&[]));
    }

    #[test]
    fn test_apply_malformed_literal_never_writes() {
        let mut store = proxy_store();
        for literal in ["manual", "'unterminated", "42", "['a']"] {
            let err = apply(&mut store, &desired(proxy(), "mode", Mode::Apply, Some(literal)), false).unwrap_err();
            assert!(matches!(err, ApplyError::MalformedValue { .. }), "{literal}: {err}");
        }
        assert_eq!(store.write_count(), 0);
        assert_eq!(store.value(&proxy(), "mode").unwrap(), Variant::string("none"));
    }

    #[test]
    fn test_apply_check_mode_predicts_without_writing() {
        let mut store = proxy_store();
        let outcome = apply(&mut store, &desired(proxy(), "mode", Mode::Apply, Some("'manual'")), true).unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.value, Variant::string("manual"));
        assert_eq!(store.write_count(), 0);
        assert_eq!(store.value(&proxy(), "mode").unwrap(), Variant::string("none"));
    }

    #[test]
    fn test_reset_without_override_is_noop() {
        let mut store = proxy_store();
        let outcome = apply(&mut store, &desired(proxy(), "mode", Mode::Reset, None), false).unwrap();
        assert!(!outcome.changed);
        assert_eq!(outcome.value, Variant::string("none"));
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn test_reset_clears_override() {
        let mut store = MemoryStore::new().with_override(
            &proxy(),
            "mode",
            Variant::string("none"),
            Variant::string("manual"),
        );
        let outcome = apply(&mut store, &desired(proxy(), "mode", Mode::Reset, None), false).unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.before, Variant::string("manual"));
        assert_eq!(outcome.value, Variant::string("none"));
        assert_eq!(store.user_value(&proxy(), "mode").unwrap(), None);
    }

    #[test]
    fn test_reset_check_mode_predicts_default() {
        let mut store = MemoryStore::new().with_override(
            &proxy(),
            "mode",
            Variant::string("none"),
            Variant::string("manual"),
        );
        let outcome = apply(&mut store, &desired(proxy(), "mode", Mode::Reset, None), true).unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.value, Variant::string("none"));
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn test_reset_recursively_clears_children() {
        let mut store = proxy_store();
        store.set_value(&proxy(), "mode", &Variant::string("manual")).unwrap();
        store.set_value(&http(), "host", &Variant::string("proxy.example.com")).unwrap();
        store.set_value(&http(), "port", &Variant::Int32(3128)).unwrap();

        let outcome = apply(&mut store, &desired(proxy(), "mode", Mode::ResetRecursively, None), false).unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.value, Variant::string("none"));
        assert_eq!(store.user_value(&http(), "host").unwrap(), None);
        assert_eq!(store.user_value(&http(), "port").unwrap(), None);
    }

    #[test]
    fn test_reset_recursively_counts_child_only_overrides() {
        let mut store = proxy_store();
        store.set_value(&http(), "host", &Variant::string("proxy.example.com")).unwrap();

        let outcome = apply(&mut store, &desired(proxy(), "mode", Mode::ResetRecursively, None), false).unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.value, Variant::string("none"));
        assert_eq!(store.value(&http(), "host").unwrap(), Variant::string(""));
    }

    #[test]
    fn test_reset_recursively_without_overrides_is_noop() {
        let mut store = proxy_store();
        let outcome = apply(&mut store, &desired(proxy(), "mode", Mode::ResetRecursively, None), false).unwrap();
        assert!(!outcome.changed);
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn test_reset_recursively_check_mode() {
        let mut store = proxy_store();
        store.set_value(&proxy(), "mode", &Variant::string("manual")).unwrap();
        store.set_value(&http(), "port", &Variant::Int32(3128)).unwrap();
        let writes = store.write_count();

        let outcome = apply(&mut store, &desired(proxy(), "mode", Mode::ResetRecursively, None), true).unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.value, Variant::string("none"));
        assert_eq!(store.write_count(), writes);
        assert_eq!(store.value(&http(), "port").unwrap(), Variant::Int32(3128));
    }

    #[test]
    fn test_reset_recursively_survives_child_cycle() {
        let mut store = proxy_store().with_child(&http(), "parent", &proxy());
        store.set_value(&http(), "port", &Variant::Int32(1)).unwrap();
        let outcome = apply(&mut store, &desired(proxy(), "mode", Mode::ResetRecursively, None), false).unwrap();
        assert!(outcome.changed);
    }

    #[test]
    fn test_get_never_changes() {
        let mut store = proxy_store();
        store.set_value(&http(), "host", &Variant::string("proxy.example.com")).unwrap();
        let writes = store.write_count();

        for check_mode in [false, true] {
            let outcome = apply(&mut store, &desired(http(), "host", Mode::Get, None), check_mode).unwrap();
            assert!(!outcome.changed);
            assert_eq!(outcome.value, Variant::string("proxy.example.com"));
        }
        assert_eq!(store.write_count(), writes);
    }

    #[test]
    fn test_unknown_location_and_key() {
        let mut store = proxy_store();
        let err = apply(
            &mut store,
            &desired(Location::new("org.example.missing"), "mode", Mode::Get, None),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, ApplyError::UnknownLocation(_)), "{err}");

        let err = apply(&mut store, &desired(proxy(), "nope", Mode::Apply, Some("'x'")), false).unwrap_err();
        assert!(matches!(err, ApplyError::UnknownKey { .. }), "{err}");
    }

    #[test]
    fn test_store_failure_is_surfaced() {
        let mut store = proxy_store().with_read_only(&proxy(), "mode");
        let err = apply(&mut store, &desired(proxy(), "mode", Mode::Apply, Some("'manual'")), false).unwrap_err();
        assert!(matches!(err, ApplyError::Store(StoreError::NotWritable { .. })), "{err}");
    }
}
