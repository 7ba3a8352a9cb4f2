//! volt - plugin repository and profile manager
//!
//! Exit codes:
//! - 0: success, or help/version was requested
//! - 10: the arguments could not be parsed or normalized
//! - 11: the operation itself failed

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use volt_core::config::VoltConfig;
use volt_core::rebuild::StartDirRebuilder;
use volt_core::reconcile::find_orphans;
use volt_core::{
    normalize_imported_repos, normalize_repos, LockJson, Registrar, ReposPath, VoltPaths,
};

mod profile_cli;

use profile_cli::ProfileCommand;

const EXIT_ARGS: u8 = 10;
const EXIT_OPERATION: u8 = 11;

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "volt", about = "Vim plugin repository and profile manager", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Set log level
    #[arg(long, default_value = "info", global = true)]
    log_level: LogLevel,

    /// Override the volt directory (default: $VOLTPATH or ~/volt)
    #[arg(long, global = true)]
    volt_path: Option<PathBuf>,
}

#[derive(Parser, Debug)]
enum Command {
    /// Enable repositories in the current profile
    ///
    /// Shortcut of: volt profile add {current profile} {repository}...
    Enable {
        /// Repositories to enable (e.g. tyru/caw.vim)
        #[arg(required = true, value_name = "REPOSITORY")]
        repos: Vec<String>,
    },

    /// Import a local repository into lock.json
    ///
    /// 1st form: volt import {repository}
    ///   Register {repository}, already placed under $VOLTPATH/repos
    ///
    /// 2nd form: volt import {from} {repository}
    ///   Copy the local directory {from} in as {repository}
    Import {
        /// Repository, or the directory to import from when a second argument follows
        #[arg(value_name = "FROM|REPOSITORY")]
        first: String,

        /// Repository name for the imported directory
        #[arg(value_name = "REPOSITORY")]
        repository: Option<String>,
    },

    /// Manage profiles
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },

    /// List repository directories that lock.json does not know about
    Orphans {
        /// Delete them
        #[arg(long)]
        remove: bool,
    },
}

/// A command whose arguments have been normalized
#[derive(Debug, PartialEq)]
pub(crate) enum Request {
    Enable(Vec<ReposPath>),
    Import {
        from: Option<PathBuf>,
        repos_path: ReposPath,
    },
    ProfileAdd {
        name: String,
        repos_paths: Vec<ReposPath>,
    },
    ProfileList,
    Orphans {
        remove: bool,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Enable { .. } => "enable",
            Command::Import { .. } => "import",
            Command::Profile { .. } => "profile",
            Command::Orphans { .. } => "orphans",
        }
    }

    /// Turn raw arguments into canonical repository paths
    fn into_request(self) -> volt_core::Result<Request> {
        match self {
            Command::Enable { repos } => Ok(Request::Enable(normalize_all(&repos)?)),
            Command::Import { first, repository } => match repository {
                None => Ok(Request::Import {
                    from: None,
                    repos_path: normalize_repos(&first)?,
                }),
                Some(repository) => Ok(Request::Import {
                    from: Some(PathBuf::from(first)),
                    repos_path: normalize_imported_repos(&repository)?,
                }),
            },
            Command::Profile { command } => command.into_request(),
            Command::Orphans { remove } => Ok(Request::Orphans { remove }),
        }
    }
}

fn normalize_all(inputs: &[String]) -> volt_core::Result<Vec<ReposPath>> {
    inputs.iter().map(|input| normalize_repos(input)).collect()
}

/// Initialize tracing with CLI flags
fn initialize_tracing(log_level: &LogLevel) {
    let filter = EnvFilter::new(log_level.to_filter_directive());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version go to stdout, usage errors to stderr
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(EXIT_ARGS),
            };
        }
    };

    initialize_tracing(&cli.log_level);

    let name = cli.command.name();
    let request = match cli.command.into_request() {
        Ok(request) => request,
        Err(e) => {
            error!("Failed to parse args: {}", e);
            return ExitCode::from(EXIT_ARGS);
        }
    };
    debug!("Running {:?}", request);

    match run(request, cli.volt_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Failed to {}: {:#}", name, e);
            ExitCode::from(EXIT_OPERATION)
        }
    }
}

fn run(request: Request, volt_path: Option<PathBuf>) -> Result<()> {
    let mut paths = VoltPaths::resolve(volt_path.as_deref())?;
    let config = VoltConfig::load_from_path(&paths.config_file())?;
    if let Some(vim_dir) = config.rebuild.vim_dir {
        paths.vim_dir = vim_dir;
    }
    debug!("Using volt directory {}", paths.root.display());

    let rebuilder = StartDirRebuilder;
    let registrar = Registrar::new(&paths, &rebuilder)
        .with_stale_after(config.transaction.stale_after());

    match request {
        Request::Enable(repos_paths) => {
            let change = registrar.enable(&repos_paths)?;
            profile_cli::print_change(&change);
            Ok(())
        }
        Request::Import { from, repos_path } => {
            let repos = match from {
                Some(from) => registrar.import(&from, &repos_path)?,
                None => registrar.import_in_place(&repos_path)?,
            };
            println!(
                "Imported '{}' ({}, trx_id {})",
                repos.path,
                match repos.repos_type {
                    volt_core::ReposType::Git => "git",
                    volt_core::ReposType::Static => "static",
                },
                repos.trx_id
            );
            Ok(())
        }
        Request::ProfileAdd { name, repos_paths } => {
            let change = registrar.add_to_profile(Some(&name), &repos_paths)?;
            profile_cli::print_change(&change);
            Ok(())
        }
        Request::ProfileList => {
            let lock = LockJson::load_from_path(&paths.lock_json())?;
            profile_cli::print_profiles(&lock);
            Ok(())
        }
        Request::Orphans { remove } => orphans_command(&paths, &registrar, remove),
    }
}

fn orphans_command(paths: &VoltPaths, registrar: &Registrar<'_>, remove: bool) -> Result<()> {
    let orphans = if remove {
        registrar.remove_orphans()?
    } else {
        let lock = LockJson::load_from_path(&paths.lock_json())?;
        find_orphans(paths, &lock).context("Failed to scan repository directory")?
    };

    if orphans.is_empty() {
        println!("No unregistered repositories.");
        return Ok(());
    }

    let verb = if remove { "Removed" } else { "Unregistered" };
    for orphan in &orphans {
        println!("{verb}: {} ({})", orphan.repos_path, orphan.dir.display());
    }
    if !remove {
        println!("\nRegister them with 'volt import {{repository}}' or delete them with 'volt orphans --remove'.");
    }
    Ok(())
}
