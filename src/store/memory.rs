//! In-process settings store
//!
//! Schemas, defaults and overrides are built in code. Used by the test suite
//! to exercise the appliers without a desktop session.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use super::{Location, SettingsStore, StoreError};
use crate::variant::{Variant, VariantType};

#[derive(Debug, Clone)]
struct MemoryKey {
    default: Variant,
    user: Option<Variant>,
    writable: bool,
}

#[derive(Debug, Clone, Default)]
struct MemorySchema {
    keys: BTreeMap<String, MemoryKey>,
    children: BTreeMap<String, Location>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    schemas: HashMap<Location, MemorySchema>,
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `key` with its schema default, creating the schema if needed.
    pub fn with_key(mut self, location: &Location, key: &str, default: Variant) -> Self {
        self.schemas.entry(location.clone()).or_default().keys.insert(
            key.to_string(),
            MemoryKey {
                default,
                user: None,
                writable: true,
            },
        );
        self
    }

    /// Declare `key` with a default and an existing user override.
    pub fn with_override(mut self, location: &Location, key: &str, default: Variant, user: Variant) -> Self {
        self.schemas.entry(location.clone()).or_default().keys.insert(
            key.to_string(),
            MemoryKey {
                default,
                user: Some(user),
                writable: true,
            },
        );
        self
    }

    /// Mark an already declared key as locked down.
    pub fn with_read_only(mut self, location: &Location, key: &str) -> Self {
        if let Some(entry) = self
            .schemas
            .get_mut(location)
            .and_then(|schema| schema.keys.get_mut(key))
        {
            entry.writable = false;
        }
        self
    }

    /// Register `child` under `parent` as `name`, creating both schemas if needed.
    pub fn with_child(mut self, parent: &Location, name: &str, child: &Location) -> Self {
        self.schemas.entry(child.clone()).or_default();
        self.schemas
            .entry(parent.clone())
            .or_default()
            .children
            .insert(name.to_string(), child.clone());
        self
    }

    /// Number of successful writes and resets performed so far.
    pub fn write_count(&self) -> usize {
        self.writes
    }

    fn schema(&self, location: &Location) -> Result<&MemorySchema, StoreError> {
        self.schemas
            .get(location)
            .ok_or_else(|| StoreError::UnknownSchema(location.to_string()))
    }

    fn key(&self, location: &Location, key: &str) -> Result<&MemoryKey, StoreError> {
        self.schema(location)?
            .keys
            .get(key)
            .ok_or_else(|| unknown_key(location, key))
    }

    fn writable_key(&mut self, location: &Location, key: &str) -> Result<&mut MemoryKey, StoreError> {
        let entry = self
            .schemas
            .get_mut(location)
            .ok_or_else(|| StoreError::UnknownSchema(location.to_string()))?
            .keys
            .get_mut(key)
            .ok_or_else(|| unknown_key(location, key))?;
        if !entry.writable {
            return Err(StoreError::NotWritable {
                location: location.to_string(),
                key: key.to_string(),
            });
        }
        Ok(entry)
    }
}

fn unknown_key(location: &Location, key: &str) -> StoreError {
    StoreError::UnknownKey {
        location: location.to_string(),
        key: key.to_string(),
    }
}

impl SettingsStore for MemoryStore {
    fn value_type(&self, location: &Location, key: &str) -> Result<VariantType, StoreError> {
        Ok(self.key(location, key)?.default.value_type())
    }

    fn value(&self, location: &Location, key: &str) -> Result<Variant, StoreError> {
        let entry = self.key(location, key)?;
        Ok(entry.user.clone().unwrap_or_else(|| entry.default.clone()))
    }

    fn default_value(&self, location: &Location, key: &str) -> Result<Variant, StoreError> {
        Ok(self.key(location, key)?.default.clone())
    }

    fn user_value(&self, location: &Location, key: &str) -> Result<Option<Variant>, StoreError> {
        Ok(self.key(location, key)?.user.clone())
    }

    fn set_value(&mut self, location: &Location, key: &str, value: &Variant) -> Result<(), StoreError> {
        let entry = self.writable_key(location, key)?;
        let expected = entry.default.value_type();
        let found = value.value_type();
        if expected != found {
            return Err(StoreError::TypeMismatch {
                key: key.to_string(),
                expected,
                found,
            });
        }
        entry.user = Some(value.clone());
        self.writes += 1;
        debug!(location = %location, key = key, value = %value, "memory store: set");
        Ok(())
    }

    fn reset(&mut self, location: &Location, key: &str) -> Result<(), StoreError> {
        self.writable_key(location, key)?.user = None;
        self.writes += 1;
        debug!(location = %location, key = key, "memory store: reset");
        Ok(())
    }

    fn list_keys(&self, location: &Location) -> Result<Vec<String>, StoreError> {
        Ok(self.schema(location)?.keys.keys().cloned().collect())
    }

    fn list_children(&self, location: &Location) -> Result<Vec<(String, Location)>, StoreError> {
        Ok(self
            .schema(location)?
            .children
            .iter()
            .map(|(name, child)| (name.clone(), child.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proxy() -> Location {
        Location::new("org.gnome.system.proxy")
    }

    #[test]
    fn test_value_falls_back_to_default() {
        let store = MemoryStore::new().with_key(&proxy(), "mode", Variant::string("none"));
        assert_eq!(store.value(&proxy(), "mode").unwrap(), Variant::string("none"));
        assert_eq!(store.user_value(&proxy(), "mode").unwrap(), None);
    }

    #[test]
    fn test_set_and_reset_track_override() {
        let mut store = MemoryStore::new().with_key(&proxy(), "mode", Variant::string("none"));
        store.set_value(&proxy(), "mode", &Variant::string("manual")).unwrap();
        assert_eq!(store.value(&proxy(), "mode").unwrap(), Variant::string("manual"));
        assert_eq!(
            store.user_value(&proxy(), "mode").unwrap(),
            Some(Variant::string("manual"))
        );

        store.reset(&proxy(), "mode").unwrap();
        assert_eq!(store.value(&proxy(), "mode").unwrap(), Variant::string("none"));
        assert_eq!(store.write_count(), 2);
    }

    #[test]
    fn test_set_rejects_wrong_type() {
        let mut store = MemoryStore::new().with_key(&proxy(), "mode", Variant::string("none"));
        let err = store.set_value(&proxy(), "mode", &Variant::Int32(1)).unwrap_err();
        assert!(matches!(err, StoreError::TypeMismatch { .. }), "{err}");
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn test_unknown_schema_and_key() {
        let store = MemoryStore::new().with_key(&proxy(), "mode", Variant::string("none"));
        assert!(matches!(
            store.value(&Location::new("org.example.missing"), "mode"),
            Err(StoreError::UnknownSchema(_))
        ));
        assert!(matches!(
            store.value(&proxy(), "missing"),
            Err(StoreError::UnknownKey { .. })
        ));
    }

    #[test]
    fn test_read_only_key_refuses_writes() {
        let mut store = MemoryStore::new()
            .with_key(&proxy(), "mode", Variant::string("none"))
            .with_read_only(&proxy(), "mode");
        assert!(matches!(
            store.set_value(&proxy(), "mode", &Variant::string("auto")),
            Err(StoreError::NotWritable { .. })
        ));
        assert!(matches!(store.reset(&proxy(), "mode"), Err(StoreError::NotWritable { .. })));
    }

    #[test]
    fn test_children_are_listed() {
        let http = Location::new("org.gnome.system.proxy.http");
        let store = MemoryStore::new()
            .with_key(&proxy(), "mode", Variant::string("none"))
            .with_child(&proxy(), "http", &http);
        assert_eq!(
            store.list_children(&proxy()).unwrap(),
            vec![("http".to_string(), http.clone())]
        );
        assert!(store.list_keys(&http).unwrap().is_empty());
    }
}
