//! shopsync copies a remote shop database into the local environment and
//! rewrites domains, configuration and arbitrary data so the copy is usable
//! for development.

// shopsync/src/main.rs
mod config;
mod errors;
mod overrides;
mod process;
mod remote;
mod sync;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use which::which;

use config::overrides_file::OVERRIDE_FILE_NAME;
use config::{Environment, LocalSettings, SyncSettings};
use errors::SyncError;
use overrides::post_sync::PostSyncOutcome;
use overrides::OverrideReport;
use process::runner::SystemRunner;
use sync::{SyncOptions, SyncOutcome};

#[derive(Parser)]
#[command(
    name = "shopsync",
    version,
    about = "Synchronize a remote shop database into the local environment"
)]
struct Cli {
    /// Remote environment to synchronize from.
    #[arg(value_enum, required_unless_present = "config_only")]
    environment: Option<Environment>,

    /// Keep the downloaded dump file after a successful import.
    #[arg(long)]
    keep_dump: bool,

    /// Dump and download only; leave the local database untouched.
    #[arg(long)]
    skip_import: bool,

    /// Do not gzip the dump on the remote host.
    #[arg(long)]
    no_compression: bool,

    /// Import without applying domain/config overrides afterwards.
    #[arg(long)]
    skip_overrides: bool,

    /// Dump all tables, ignoring the override file's ignore_tables list.
    #[arg(long)]
    no_ignore_tables: bool,

    /// Apply the declarative override file only, without any remote work.
    #[arg(
        long,
        value_name = "PATH",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = OVERRIDE_FILE_NAME
    )]
    config_only: Option<PathBuf>,

    /// Do not clear the application cache after the sync.
    #[arg(long)]
    skip_cache_clear: bool,

    /// Do not run the override file's post_sync_commands.
    #[arg(long)]
    skip_post_commands: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    let cli = Cli::parse();
    let environment = cli.environment;

    match run_app(cli).await {
        Ok(_) => {
            println!("✅ Synchronization completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Error: {e:#}");
            if is_auth_related(&e) {
                let env_hint = environment
                    .map(|env| env.to_string().to_uppercase())
                    .unwrap_or_else(|| "<ENVIRONMENT>".to_string());
                eprintln!(
                    "💡 Check the SYNC_{env_hint}_SSH_* settings (host, user, key path) and \
                     that the host accepts your key; the remote command never ran."
                );
            }
            ExitCode::FAILURE
        }
    }
}

fn is_auth_related(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        cause
            .downcast_ref::<SyncError>()
            .is_some_and(SyncError::is_auth_related)
    })
}

async fn run_app(cli: Cli) -> Result<()> {
    if let Some(path) = &cli.config_only {
        println!("⚙️  Applying overrides from {}...", path.display());
        let local = LocalSettings::resolve().context("failed to resolve local configuration")?;
        let (report, post_sync) = sync::run_config_only(
            path,
            &local,
            &SystemRunner,
            cli.skip_cache_clear,
            cli.skip_post_commands,
        )
        .await
        .context("config-only run failed")?;

        print_override_summary(&report);
        print_post_sync_summary(post_sync.as_ref());
        return Ok(());
    }

    let environment = cli
        .environment
        .context("an environment is required unless --config-only is used")?;

    preflight(&required_tools(cli.skip_import))?;

    let settings =
        SyncSettings::resolve(environment).context("failed to resolve sync configuration")?;
    let options = SyncOptions {
        environment,
        keep_dump: cli.keep_dump,
        skip_import: cli.skip_import,
        compress: !cli.no_compression,
        skip_overrides: cli.skip_overrides,
        apply_ignore_tables: !cli.no_ignore_tables,
        skip_cache_clear: cli.skip_cache_clear,
        skip_post_commands: cli.skip_post_commands,
        override_file_path: PathBuf::from(OVERRIDE_FILE_NAME),
        local_dump_dir: PathBuf::from("."),
    };

    let outcome = sync::run_sync_flow(&options, &settings, &SystemRunner)
        .await
        .with_context(|| format!("{environment} synchronization failed"))?;

    print_outcome_summary(&outcome);
    Ok(())
}

fn required_tools(skip_import: bool) -> Vec<&'static str> {
    let mut tools = vec!["ssh", "scp"];
    if !skip_import {
        tools.push("mysql");
    }
    tools
}

fn preflight(programs: &[&str]) -> Result<()> {
    for program in programs {
        which(program).with_context(|| {
            format!("{program} executable not found in PATH. Please install it before syncing.")
        })?;
    }
    Ok(())
}

fn print_outcome_summary(outcome: &SyncOutcome) {
    if outcome.local_dump_retained {
        println!(
            "💾 Local dump kept at {}",
            outcome.artifact.local_path.display()
        );
    }
    if let Some(report) = &outcome.override_report {
        print_override_summary(report);
    }
    print_post_sync_summary(outcome.post_sync.as_ref());
}

fn print_override_summary(report: &OverrideReport) {
    let source = match report.source {
        Some(overrides::OverrideSource::ConfigFile) => "declarative file",
        Some(overrides::OverrideSource::Environment) => "environment",
        _ => "none",
    };
    println!(
        "🔎 Overrides ({source}): {} domain row(s) updated{}, {} config entr{} applied, {} SQL update(s) run",
        report.domain_rows_updated,
        if report.fallback_applied {
            " (fallback)"
        } else {
            ""
        },
        report.config_entries_applied,
        if report.config_entries_applied == 1 {
            "y"
        } else {
            "ies"
        },
        report.sql_statements_applied
    );
    for warning in &report.warnings {
        eprintln!("⚠️  {warning}");
    }
}

fn print_post_sync_summary(post_sync: Option<&PostSyncOutcome>) {
    let Some(outcome) = post_sync else {
        return;
    };
    if outcome.all_succeeded() {
        println!("🏁 {} post-sync command(s) completed.", outcome.executed);
    } else {
        for failure in &outcome.failures {
            eprintln!("⚠️  Post-sync command failed: {failure}");
        }
        println!(
            "🏁 Post-sync finished with {} failure(s); sync itself succeeded.",
            outcome.failures.len()
        );
    }
}
