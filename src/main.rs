#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde_json::Value;
use tracing::{debug, error, Level as TraceLevel};
use tracing_subscriber::FmtSubscriber;

use gsettings_module::applier;
use gsettings_module::constants::{exit, gsettings, logging};
use gsettings_module::params::{Invocation, ModuleParams, State};
use gsettings_module::report::ModuleResult;
use gsettings_module::store::{GsettingsCli, SettingsStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Drive the gsettings executable. An override equal to the schema
    /// default is reported as no override
    #[default]
    Cli,
    /// Talk to GIO directly and read overrides exactly (needs the `gio` feature)
    Gio,
}

/// Apply, reset or read a GNOME settings key and report the result as JSON.
///
/// Run with a single args file as the automation controller does, or pass
/// the parameters as flags.
#[derive(Debug, Parser)]
#[command(name = "gsettings", version)]
struct Cli {
    /// JSON file holding the module parameters
    #[arg(conflicts_with_all = ["path", "key", "state", "value", "schema"])]
    args_file: Option<PathBuf>,

    /// Schema id, optionally followed by ':' and a path for relocatable schemas
    #[arg(long)]
    path: Option<String>,

    #[arg(long)]
    key: Option<String>,

    #[arg(long, value_enum)]
    state: Option<State>,

    /// GVariant text literal, e.g. "'manual'" or "['a', 'b']"
    #[arg(long, allow_hyphen_values = true)]
    value: Option<String>,

    #[arg(long)]
    schema: Option<String>,

    /// Report what would change without writing
    #[arg(long)]
    check: bool,

    /// Include before/after values in the result
    #[arg(long)]
    diff: bool,

    #[arg(long, value_enum, default_value = "cli")]
    backend: Backend,

    /// gsettings executable to run instead of the one on PATH
    #[arg(long, env = gsettings::BIN_ENV)]
    gsettings_bin: Option<PathBuf>,
}

fn init_logging() -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let log_level = match std::env::var(logging::LEVEL_ENV)
        .unwrap_or_else(|_| logging::DEFAULT_LEVEL.to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "info" => TraceLevel::INFO,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::WARN,
    };

    // stdout carries the result record only
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
}

fn load_invocation(cli: &Cli) -> Result<Invocation> {
    let params = match &cli.args_file {
        Some(path) => ModuleParams::from_file(path)?,
        None => ModuleParams {
            path: cli.path.clone(),
            key: cli.key.clone(),
            state: cli.state.unwrap_or_default(),
            value: cli.value.clone().map(Value::String),
            schema: cli.schema.clone(),
            ..Default::default()
        },
    };

    let mut invocation = params.into_invocation()?;
    invocation.check_mode |= cli.check;
    invocation.diff |= cli.diff;
    Ok(invocation)
}

#[cfg(feature = "gio")]
fn open_gio() -> Result<Box<dyn SettingsStore>> {
    Ok(Box::new(gsettings_module::store::native::GioStore::new()?))
}

#[cfg(not(feature = "gio"))]
fn open_gio() -> Result<Box<dyn SettingsStore>> {
    anyhow::bail!("the gio backend is not available in this build (enable the 'gio' feature)")
}

fn open_store(backend: Backend, program: Option<&Path>) -> Result<Box<dyn SettingsStore>> {
    match backend {
        Backend::Cli => {
            let store = GsettingsCli::locate(program).context("cannot open settings backend")?;
            Ok(Box::new(store))
        }
        Backend::Gio => open_gio(),
    }
}

fn run(cli: &Cli) -> Result<ModuleResult> {
    let invocation = load_invocation(cli)?;
    debug!(?invocation, backend = ?cli.backend, "module invocation");

    let mut store = open_store(cli.backend, cli.gsettings_bin.as_deref())?;
    let outcome = applier::apply(&mut *store, &invocation.desired, invocation.check_mode)?;
    Ok(ModuleResult::success(&outcome, invocation.diff))
}

fn main() -> ExitCode {
    if let Err(e) = init_logging() {
        eprintln!("failed to install log subscriber: {e}");
    }

    let result = match Cli::try_parse() {
        Ok(cli) => run(&cli).unwrap_or_else(|err| {
            error!("{err:#}");
            ModuleResult::failure(format!("{err:#}"))
        }),
        // --help and --version
        Err(err) if !err.use_stderr() => err.exit(),
        Err(err) => {
            error!(kind = ?err.kind(), "invalid command line");
            ModuleResult::failure(err.to_string().trim_end())
        }
    };

    println!("{}", result.to_json_line());

    if result.failed {
        ExitCode::from(exit::FAILURE)
    } else {
        ExitCode::SUCCESS
    }
}
