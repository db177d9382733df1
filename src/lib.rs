//! Declarative management of GNOME (GSettings) keys.
//!
//! `applier` decides and performs the change for one key, `store` talks to the
//! settings database, and `variant` parses and prints GVariant text literals.
//!
//! The default store drives the `gsettings` executable, which cannot read a
//! bare user override. There a key counts as overridden only when its value
//! differs from the schema default. The `gio` store reads overrides exactly.

#![forbid(unsafe_code)]

pub mod applier;
pub mod constants;
pub mod error;
pub mod params;
pub mod report;
pub mod store;
pub mod variant;
