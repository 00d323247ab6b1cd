use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use log::LevelFilter;
use thiserror::Error;

use ghasum::config::{self, CliFlags, ConfigError};
use ghasum::domain::UpdateReport;
use ghasum::infrastructure::{repo, RepoError};
use ghasum::operations::{self, OperationsError};

#[derive(Debug, Error)]
enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Operations(#[from] OperationsError),
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser)]
#[command(name = "ghasum")]
#[command(about = "Supply-chain integrity checksums for GitHub Actions dependencies")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the record file from the current workflows
    Init(TargetArgs),
    /// Update the record file's checksums for the current workflows
    Update {
        #[command(flatten)]
        target: TargetArgs,
        /// Ignore syntax errors in the existing record file, fixing them in
        /// the process, and override any checksum mismatches it contains
        #[arg(long)]
        force: bool,
    },
    /// Verify the current workflows against the record file
    Verify {
        #[command(flatten)]
        target: TargetArgs,
        /// Fail instead of fetching a repository that is not in the cache
        #[arg(long)]
        offline: bool,
    },
    /// List the resolved action dependencies for the current workflows
    List(TargetArgs),
}

#[derive(Args)]
struct TargetArgs {
    /// A repository directory, or a single workflow file (optionally
    /// suffixed with `:job`). Defaults to the current directory.
    target: Option<String>,

    /// The cache directory to use. Defaults to `.ghasum` in the user's home directory
    #[arg(long)]
    cache: Option<PathBuf>,
    /// Disable the persistent cache in favor of a single-run ephemeral one
    #[arg(long = "no-cache")]
    no_cache: bool,
    /// Disable eviction of stale cache entries on startup
    #[arg(long = "no-evict")]
    no_evict: bool,
    /// Do not resolve or check transitive action dependencies
    #[arg(long = "no-transitive")]
    no_transitive: bool,
}

fn main() -> ExitCode {
    init_logging();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, CliError> {
    match cli.command {
        Command::Init(target) => {
            let cfg = build_config(target)?;
            operations::initialize(&cfg)?;
            println!("Ok");
            Ok(ExitCode::SUCCESS)
        }
        Command::Update { target, force } => {
            let cfg = build_config(target)?;
            let report = operations::update(&cfg, force)?;
            println!("{}", format_update_report(&report));
            Ok(ExitCode::SUCCESS)
        }
        Command::Verify { target, offline } => {
            let (repo_root, workflow, job) = resolve_target(&target.target)?;
            let mut flags = cli_flags(&target);
            flags.offline = offline;
            flags.workflow = workflow;
            flags.job = job;
            let cfg = config::resolve(repo_root, flags)?;
            let report = operations::verify(&cfg)?;
            if report.is_ok() {
                println!(
                    "Ok (verified {} action{})",
                    report.total,
                    if report.total == 1 { "" } else { "s" }
                );
                Ok(ExitCode::SUCCESS)
            } else {
                eprintln!("{} problem(s) occurred during validation:", report.problems.len());
                for problem in &report.problems {
                    eprintln!("  {problem}");
                }
                Ok(ExitCode::from(3))
            }
        }
        Command::List(target) => {
            let cfg = build_config(target)?;
            let listing = operations::list(&cfg)?;
            print!("{listing}");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_config(target: TargetArgs) -> Result<operations::Config, CliError> {
    let (repo_root, workflow, job) = resolve_target(&target.target)?;
    let mut flags = cli_flags(&target);
    flags.workflow = workflow;
    flags.job = job;
    Ok(config::resolve(repo_root, flags)?)
}

fn cli_flags(target: &TargetArgs) -> CliFlags {
    CliFlags {
        cache: target.cache.clone(),
        no_cache: target.no_cache,
        no_evict: target.no_evict,
        no_transitive: target.no_transitive,
        offline: false,
        workflow: None,
        job: None,
    }
}

/// Resolve a CLI target string into a repository root and, if the target
/// names a single workflow file, the path of that file relative to the root
/// and an optional job name from a `:job` suffix.
///
/// # Errors
///
/// Returns [`CliError::Usage`] if the target does not exist or is not inside
/// a recognisable `.github/workflows` layout, or [`CliError::Repo`] if no
/// `.github` directory can be found above a directory target.
fn resolve_target(
    target: &Option<String>,
) -> Result<(PathBuf, Option<String>, Option<String>), CliError> {
    let cwd = env::current_dir()?;
    let mut raw = target.clone().unwrap_or_else(|| cwd.to_string_lossy().into_owned());

    let mut job = None;
    if let Some(idx) = raw.rfind(':') {
        if idx > 1 {
            job = Some(raw[idx + 1..].to_string());
            raw.truncate(idx);
        }
    }

    let path = PathBuf::from(&raw);
    let metadata = std::fs::metadata(&path)
        .map_err(|_| CliError::Usage(format!("target not found: {raw}")))?;

    if metadata.is_dir() {
        let repo_root = repo::find_root_from(&path)?;
        Ok((repo_root, None, job))
    } else {
        let workflows_dir = path
            .parent()
            .ok_or_else(|| CliError::Usage(format!("not a workflow file: {raw}")))?;
        let github_dir = workflows_dir
            .parent()
            .ok_or_else(|| CliError::Usage(format!("not a workflow file: {raw}")))?;
        let repo_root = github_dir
            .parent()
            .ok_or_else(|| CliError::Usage(format!("not a workflow file: {raw}")))?
            .to_path_buf();
        let workflow = path
            .strip_prefix(&repo_root)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");
        Ok((repo_root, Some(workflow), job))
    }
}

fn format_update_report(report: &UpdateReport) -> String {
    let mut changes = Vec::new();
    if report.added > 0 {
        changes.push(format!("{} added", report.added));
    }
    if report.overridden > 0 {
        changes.push(format!("{} overridden", report.overridden));
    }
    if report.removed > 0 {
        changes.push(format!("{} removed", report.removed));
    }
    if report.kept > 0 {
        changes.push(format!("{} kept", report.kept));
    }

    if changes.is_empty() {
        "Ok (nothing changed)".to_string()
    } else {
        format!("Ok ({})", changes.join(", "))
    }
}

fn init_logging() {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .format_timestamp(None);
    builder.init();
}
