//! Settings store backed by the `gsettings` command line tool
//!
//! Every operation is one `gsettings` invocation. Values cross the process
//! boundary in GVariant text format and are parsed against the key's type as
//! reported by `gsettings range`.
//!
//! `gsettings` has no command for reading the schema default or the bare user
//! value. Running `get` with `GSETTINGS_BACKEND=memory` reads the default
//! (that backend holds no overrides). A key counts as overridden when its
//! effective value differs from the default, so an override that equals the
//! default is reported as no override.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use super::{Location, SettingsStore, StoreError};
use crate::constants::gsettings;
use crate::variant::{Variant, VariantType};

#[derive(Debug, Clone)]
pub struct GsettingsCli {
    program: PathBuf,
}

impl GsettingsCli {
    /// Resolve the executable, either `program` or `gsettings` from `PATH`.
    pub fn locate(program: Option<&Path>) -> Result<Self, StoreError> {
        let wanted = program.unwrap_or_else(|| Path::new(gsettings::PROGRAM));
        let program = which::which(wanted).map_err(|source| StoreError::NotInstalled {
            program: wanted.display().to_string(),
            source,
        })?;
        debug!(program = %program.display(), "using gsettings executable");
        Ok(Self { program })
    }

    /// Run one gsettings subcommand and return its stdout without the trailing newline.
    fn run(&self, args: &[&str], defaults_only: bool, key: Option<&str>) -> Result<String, StoreError> {
        let command_line = format!("gsettings {}", args.join(" "));
        debug!(command = %command_line, defaults_only, "running gsettings");

        let mut command = Command::new(&self.program);
        command.args(args);
        if defaults_only {
            command.env(gsettings::BACKEND_ENV, gsettings::MEMORY_BACKEND);
        }

        let output = command.output().map_err(|source| StoreError::Spawn {
            program: self.program.display().to_string(),
            source,
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let location = args.get(1).copied().unwrap_or_default();
            return Err(classify_failure(&command_line, location, key, stderr.trim()));
        }

        let stdout = String::from_utf8(output.stdout).map_err(|e| StoreError::UnexpectedOutput {
            command: command_line.clone(),
            message: e.to_string(),
        })?;
        Ok(stdout.trim_end_matches('\n').to_string())
    }

    fn read(&self, location: &Location, key: &str, defaults_only: bool) -> Result<Variant, StoreError> {
        let ty = self.value_type(location, key)?;
        let target = location.to_string();
        let text = self.run(&["get", &target, key], defaults_only, Some(key))?;
        Variant::parse(&text, Some(&ty)).map_err(|e| StoreError::UnexpectedOutput {
            command: format!("gsettings get {target} {key}"),
            message: format!("cannot parse '{text}': {e}"),
        })
    }
}

/// Map a gsettings diagnostic onto a typed error.
fn classify_failure(command: &str, location: &str, key: Option<&str>, stderr: &str) -> StoreError {
    if stderr.contains("No such schema") {
        StoreError::UnknownSchema(location.to_string())
    } else if stderr.contains("No such key") {
        StoreError::UnknownKey {
            location: location.to_string(),
            key: key.unwrap_or_default().to_string(),
        }
    } else if stderr.contains("not writable") {
        StoreError::NotWritable {
            location: location.to_string(),
            key: key.unwrap_or_default().to_string(),
        }
    } else {
        StoreError::CommandFailed {
            command: command.to_string(),
            message: if stderr.is_empty() {
                "exited with failure status".to_string()
            } else {
                stderr.to_string()
            },
        }
    }
}

/// Interpret `gsettings range` output.
///
/// ```text
/// type s            plain key
/// enum\n'a'\n'b'    enumerated string
/// flags\n'x'\n'y'   string array of flag nicks
/// range i 0 100     numeric range
/// ```
fn parse_range(output: &str) -> Result<VariantType, String> {
    let first = output.lines().next().unwrap_or_default().trim();
    let mut words = first.split_whitespace();
    match words.next() {
        Some("type") | Some("range") => {
            let type_string = words.next().ok_or_else(|| format!("missing type in '{first}'"))?;
            VariantType::parse(type_string).map_err(|e| e.to_string())
        }
        Some("enum") => Ok(VariantType::String),
        Some("flags") => Ok(VariantType::array_of(VariantType::String)),
        _ => Err(format!("unrecognised range description '{first}'")),
    }
}

/// Interpret `gsettings list-children` output: `name   schema.id[:/path/]` per line.
fn parse_children(output: &str) -> Result<Vec<(String, Location)>, String> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let mut words = line.split_whitespace();
            match (words.next(), words.next()) {
                (Some(name), Some(target)) => Location::parse(target)
                    .map(|location| (name.to_string(), location))
                    .map_err(|e| e.to_string()),
                _ => Err(format!("malformed child line '{line}'")),
            }
        })
        .collect()
}

impl SettingsStore for GsettingsCli {
    fn value_type(&self, location: &Location, key: &str) -> Result<VariantType, StoreError> {
        let target = location.to_string();
        let output = self.run(&["range", &target, key], false, Some(key))?;
        parse_range(&output).map_err(|message| StoreError::UnexpectedOutput {
            command: format!("gsettings range {target} {key}"),
            message,
        })
    }

    fn value(&self, location: &Location, key: &str) -> Result<Variant, StoreError> {
        self.read(location, key, false)
    }

    fn default_value(&self, location: &Location, key: &str) -> Result<Variant, StoreError> {
        self.read(location, key, true)
    }

    fn user_value(&self, location: &Location, key: &str) -> Result<Option<Variant>, StoreError> {
        let current = self.value(location, key)?;
        let default = self.default_value(location, key)?;
        Ok((current != default).then_some(current))
    }

    fn set_value(&mut self, location: &Location, key: &str, value: &Variant) -> Result<(), StoreError> {
        let target = location.to_string();
        let text = value.to_string();
        self.run(&["set", &target, key, &text], false, Some(key))?;
        Ok(())
    }

    fn reset(&mut self, location: &Location, key: &str) -> Result<(), StoreError> {
        let target = location.to_string();
        self.run(&["reset", &target, key], false, Some(key))?;
        Ok(())
    }

    fn list_keys(&self, location: &Location) -> Result<Vec<String>, StoreError> {
        let target = location.to_string();
        let output = self.run(&["list-keys", &target], false, None)?;
        let mut keys: Vec<String> = output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn list_children(&self, location: &Location) -> Result<Vec<(String, Location)>, StoreError> {
        let target = location.to_string();
        let output = self.run(&["list-children", &target], false, None)?;
        parse_children(&output).map_err(|message| StoreError::UnexpectedOutput {
            command: format!("gsettings list-children {target}"),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range_plain_type() {
        assert_eq!(parse_range("type s\n").unwrap(), VariantType::String);
        assert_eq!(
            parse_range("type a(ss)").unwrap(),
            VariantType::parse("a(ss)").unwrap()
        );
    }

    #[test]
    fn test_parse_range_enum_and_flags() {
        assert_eq!(
            parse_range("enum\n'none'\n'manual'\n'auto'\n").unwrap(),
            VariantType::String
        );
        assert_eq!(
            parse_range("flags\n'a'\n'b'").unwrap(),
            VariantType::array_of(VariantType::String)
        );
    }

    #[test]
    fn test_parse_range_numeric_range() {
        assert_eq!(parse_range("range i 0 65535").unwrap(), VariantType::Int32);
        assert_eq!(parse_range("range u 1 10").unwrap(), VariantType::Uint32);
    }

    #[test]
    fn test_parse_range_rejects_garbage() {
        assert!(parse_range("").is_err());
        assert!(parse_range("type").is_err());
        assert!(parse_range("whatever s").is_err());
    }

    #[test]
    fn test_parse_children_fixed_and_relocatable() {
        let output = "http    org.gnome.system.proxy.http\n\
                      profile org.example.Profile:/org/example/profile/\n";
        let children = parse_children(output).unwrap();
        assert_eq!(
            children,
            vec![
                ("http".to_string(), Location::new("org.gnome.system.proxy.http")),
                (
                    "profile".to_string(),
                    Location::with_path("org.example.Profile", "/org/example/profile/")
                ),
            ]
        );
        assert!(parse_children("").unwrap().is_empty());
        assert!(parse_children("lonely").is_err());
    }

    #[test]
    fn test_classify_failure_messages() {
        let err = classify_failure("gsettings get x k", "x", Some("k"), "No such schema “x”");
        assert!(matches!(err, StoreError::UnknownSchema(ref s) if s == "x"));

        let err = classify_failure("gsettings get x k", "x", Some("k"), "No such key “k”");
        assert!(matches!(err, StoreError::UnknownKey { ref key, .. } if key == "k"));

        let err = classify_failure("gsettings set x k 1", "x", Some("k"), "The key is not writable");
        assert!(matches!(err, StoreError::NotWritable { .. }));

        let err = classify_failure("gsettings set x k 1", "x", Some("k"), "");
        assert!(matches!(err, StoreError::CommandFailed { ref message, .. } if message.contains("failure")));
    }

    #[test]
    fn test_locate_missing_program() {
        let err = GsettingsCli::locate(Some(Path::new("/nonexistent/bin/gsettings"))).unwrap_err();
        assert!(matches!(err, StoreError::NotInstalled { .. }), "{err}");
    }
}
