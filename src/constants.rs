//! Application-wide constants
//!
//! Parameter names, environment variables and external program names used
//! throughout the module, kept in one place.

/// Module parameter constants
pub mod module {
    /// Module name reported in parameter errors
    pub const NAME: &str = "gsettings";

    /// Literal applied when `state=present` is given without a value
    pub const DEFAULT_VALUE: &str = "@as []";

    /// Prefix of controller-internal parameters, which are accepted and ignored
    pub const INTERNAL_PARAM_PREFIX: &str = "_ansible_";
}

/// gsettings executable constants
pub mod gsettings {
    /// Executable looked up on `PATH` when no override is given
    pub const PROGRAM: &str = "gsettings";

    /// Environment variable overriding the executable location
    pub const BIN_ENV: &str = "GSETTINGS_BIN";

    /// Environment variable selecting the GSettings backend of a child process
    pub const BACKEND_ENV: &str = "GSETTINGS_BACKEND";

    /// Backend without user overrides, used to read schema defaults
    pub const MEMORY_BACKEND: &str = "memory";
}

/// Logging constants
pub mod logging {
    /// Environment variable holding the log level
    pub const LEVEL_ENV: &str = "LOG_LEVEL";

    /// Level used when `LOG_LEVEL` is unset
    pub const DEFAULT_LEVEL: &str = "warn";
}

/// Process exit codes
pub mod exit {
    /// Module reported `failed: true`
    pub const FAILURE: u8 = 1;
}
