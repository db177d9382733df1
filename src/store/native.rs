//! Settings store backed by GIO
//!
//! Schemas are looked up through the default `SettingsSchemaSource` before a
//! `gio::Settings` is built, since GIO aborts the process on an unknown schema.
//! Values are exchanged with GLib in text form.

use ::gio::prelude::*;
use tracing::debug;

use super::{Location, SettingsStore, StoreError};
use crate::variant::{Variant, VariantType};

pub struct GioStore {
    source: ::gio::SettingsSchemaSource,
}

impl GioStore {
    pub fn new() -> Result<Self, StoreError> {
        let source = ::gio::SettingsSchemaSource::default()
            .ok_or_else(|| StoreError::Backend("no GSettings schemas are installed".to_string()))?;
        Ok(Self { source })
    }

    fn open(&self, location: &Location) -> Result<(::gio::Settings, ::gio::SettingsSchema), StoreError> {
        let schema = self
            .source
            .lookup(&location.schema, true)
            .ok_or_else(|| StoreError::UnknownSchema(location.to_string()))?;

        match (schema.path(), location.path.as_deref()) {
            (None, None) => {
                return Err(StoreError::Backend(format!(
                    "schema '{}' is relocatable (path must be specified)",
                    location.schema
                )));
            }
            (Some(_), Some(_)) => {
                return Err(StoreError::Backend(format!(
                    "schema '{}' is not relocatable (path must not be specified)",
                    location.schema
                )));
            }
            _ => {}
        }

        let settings = ::gio::Settings::new_full(&schema, None::<&::gio::SettingsBackend>, location.path.as_deref());
        Ok((settings, schema))
    }

    fn open_key(
        &self,
        location: &Location,
        key: &str,
    ) -> Result<(::gio::Settings, ::gio::SettingsSchemaKey), StoreError> {
        let (settings, schema) = self.open(location)?;
        if !schema.has_key(key) {
            return Err(StoreError::UnknownKey {
                location: location.to_string(),
                key: key.to_string(),
            });
        }
        Ok((settings, schema.key(key)))
    }

    fn require_writable(settings: &::gio::Settings, location: &Location, key: &str) -> Result<(), StoreError> {
        if settings.is_writable(key) {
            Ok(())
        } else {
            Err(StoreError::NotWritable {
                location: location.to_string(),
                key: key.to_string(),
            })
        }
    }
}

fn from_glib(value: &::glib::Variant) -> Result<Variant, StoreError> {
    let type_string = value.type_().as_str().to_string();
    let ty = VariantType::parse(&type_string).map_err(|e| StoreError::Backend(e.to_string()))?;
    let text = value.print(true);
    Variant::parse(text.as_str(), Some(&ty)).map_err(|e| StoreError::Backend(format!("cannot read '{text}': {e}")))
}

fn to_glib(value: &Variant) -> Result<::glib::Variant, StoreError> {
    let type_string = value.value_type().to_string();
    let ty = ::glib::VariantTy::new(&type_string).map_err(|e| StoreError::Backend(e.to_string()))?;
    ::glib::Variant::parse(Some(ty), &value.to_string()).map_err(|e| StoreError::Backend(e.to_string()))
}

impl SettingsStore for GioStore {
    fn value_type(&self, location: &Location, key: &str) -> Result<VariantType, StoreError> {
        let (_, schema_key) = self.open_key(location, key)?;
        VariantType::parse(schema_key.value_type().as_str()).map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn value(&self, location: &Location, key: &str) -> Result<Variant, StoreError> {
        let (settings, _) = self.open_key(location, key)?;
        from_glib(&settings.value(key))
    }

    fn default_value(&self, location: &Location, key: &str) -> Result<Variant, StoreError> {
        let (_, schema_key) = self.open_key(location, key)?;
        from_glib(&schema_key.default_value())
    }

    fn user_value(&self, location: &Location, key: &str) -> Result<Option<Variant>, StoreError> {
        let (settings, _) = self.open_key(location, key)?;
        settings.user_value(key).as_ref().map(from_glib).transpose()
    }

    fn set_value(&mut self, location: &Location, key: &str, value: &Variant) -> Result<(), StoreError> {
        let (settings, _) = self.open_key(location, key)?;
        Self::require_writable(&settings, location, key)?;
        settings
            .set_value(key, &to_glib(value)?)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        ::gio::Settings::sync();
        debug!(location = %location, key = key, "gio: value written");
        Ok(())
    }

    fn reset(&mut self, location: &Location, key: &str) -> Result<(), StoreError> {
        let (settings, _) = self.open_key(location, key)?;
        Self::require_writable(&settings, location, key)?;
        settings.reset(key);
        ::gio::Settings::sync();
        debug!(location = %location, key = key, "gio: key reset");
        Ok(())
    }

    fn list_keys(&self, location: &Location) -> Result<Vec<String>, StoreError> {
        let (_, schema) = self.open(location)?;
        let mut keys: Vec<String> = schema.list_keys().iter().map(|k| k.to_string()).collect();
        keys.sort();
        Ok(keys)
    }

    fn list_children(&self, location: &Location) -> Result<Vec<(String, Location)>, StoreError> {
        let (settings, schema) = self.open(location)?;
        let mut children = Vec::new();
        for name in schema.list_children() {
            let child = settings.child(&name);
            let child_schema = child.property::<::gio::SettingsSchema>("settings-schema");
            let child_location = if child_schema.path().is_some() {
                Location::new(child_schema.id().as_str())
            } else {
                Location::with_path(child_schema.id().as_str(), child.property::<String>("path"))
            };
            children.push((name.to_string(), child_location));
        }
        Ok(children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::glib::prelude::*;

    fn glib_parse(ty: &str, text: &str) -> ::glib::Variant {
        let ty = ::glib::VariantTy::new(ty).unwrap();
        ::glib::Variant::parse(Some(ty), text).unwrap()
    }

    #[test]
    fn test_bytestring_keeps_nul_both_ways() {
        let ours = Variant::parse("b'hi'", None).unwrap();
        let theirs = to_glib(&ours).unwrap();
        assert_eq!(theirs.fixed_array::<u8>().unwrap(), b"hi\0");
        assert_eq!(from_glib(&theirs).unwrap(), ours);

        let theirs = glib_parse("ay", r"b'\001a'");
        assert_eq!(from_glib(&theirs).unwrap(), Variant::parse(r"b'\001a'", None).unwrap());
    }

    #[test]
    fn test_non_finite_doubles_cross_over() {
        for value in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            let theirs = value.to_variant();
            let ours = from_glib(&theirs).unwrap();
            assert_eq!(ours, Variant::Double(value));
            let back = to_glib(&ours).unwrap().get::<f64>().unwrap();
            if value.is_nan() {
                assert!(back.is_nan());
            } else {
                assert_eq!(back, value);
            }
        }
    }

    #[test]
    fn test_containers_cross_over() {
        for (ty, text) in [
            ("as", "['a', 'b']"),
            ("as", "@as []"),
            ("a(ss)", "[('xkb', 'us'), ('xkb', 'de')]"),
            ("a{sv}", "{'size': <uint32 12>, 'name': <'Cantarell'>}"),
            ("mu", "just 3"),
            ("u", "uint32 7"),
        ] {
            let theirs = glib_parse(ty, text);
            let ours = from_glib(&theirs).unwrap();
            assert_eq!(ours.value_type().to_string(), ty, "{text}");
            assert_eq!(to_glib(&ours).unwrap(), theirs, "{text}");
        }
    }
}
