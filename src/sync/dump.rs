// shopsync/src/sync/dump.rs
//! Dump orchestration: one composed remote command producing a single dump
//! file with structure first, data second, definers stripped throughout.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::config::{DbConfig, Environment, SshTarget};
use crate::errors::{Result, SyncError};
use crate::process::runner::ProcessRunner;
use crate::process::{Invocation, LONG_TIMEOUT, SHORT_TIMEOUT};
use crate::remote::script::{RemoteScript, ShellPipeline};
use crate::remote::ssh::ssh_invocation;
use crate::sync::definer::sed_invocation;

/// Remote dumps land outside the project tree so a failed sync never leaves
/// artifacts in the application directory.
pub const REMOTE_DUMP_DIR: &str = "/tmp";

/// The dump file as it travels through the pipeline. Ownership transfers
/// stage to stage: created remotely, downloaded, imported, cleaned up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpArtifact {
    pub remote_path: String,
    pub local_path: PathBuf,
    pub compressed: bool,
}

impl DumpArtifact {
    /// Path of the plain-SQL file on the remote host, before compression
    /// renames it.
    pub fn remote_sql_path(&self) -> &str {
        if self.compressed {
            self.remote_path
                .strip_suffix(".gz")
                .unwrap_or(&self.remote_path)
        } else {
            &self.remote_path
        }
    }
}

/// Plans the artifact for a sync run: `sync_<environment>_<timestamp>.sql[.gz]`
/// under /tmp remotely and `local_dir` locally.
pub fn plan_artifact(
    environment: Environment,
    timestamp: &NaiveDateTime,
    compress: bool,
    local_dir: &Path,
) -> DumpArtifact {
    let mut file_name = format!(
        "sync_{}_{}.sql",
        environment,
        timestamp.format("%Y-%m-%d_%H%M%S")
    );
    if compress {
        file_name.push_str(".gz");
    }
    DumpArtifact {
        remote_path: format!("{REMOTE_DUMP_DIR}/{file_name}"),
        local_path: local_dir.join(file_name),
        compressed: compress,
    }
}

/// Checks whether the remote mysqldump knows `--column-statistics`. Newer
/// clients dumping from older servers fail without disabling it.
pub fn probe_column_statistics(
    runner: &impl ProcessRunner,
    target: &SshTarget,
) -> Result<bool> {
    let script =
        RemoteScript::new().then(ShellPipeline::new(Invocation::new("mysqldump").arg("--help")));
    let output = runner
        .run(&ssh_invocation(target, &script), SHORT_TIMEOUT)
        .map_err(|e| SyncError::Dump(format!("failed to probe remote mysqldump: {e}")))?;

    Ok(output.success() && output.stdout.contains("column-statistics"))
}

fn mysqldump_base(db: &DbConfig, disable_column_statistics: bool) -> Invocation {
    let mut invocation = Invocation::new("mysqldump")
        .args(["-h", &db.host])
        .args(["-P", &db.port.to_string()])
        .args(["-u", &db.user])
        .env("MYSQL_PWD", &db.password);
    if disable_column_statistics {
        invocation = invocation.arg("--column-statistics=0");
    }
    invocation
}

/// Composes the full remote dump command: structure phase (no rows, with
/// routines and triggers), data phase (no schema, exclusions applied), then
/// optional in-place compression. One SSH round trip.
pub fn build_dump_script(
    db: &DbConfig,
    ignore_tables: &[String],
    artifact: &DumpArtifact,
    disable_column_statistics: bool,
) -> RemoteScript {
    let sql_path = artifact.remote_sql_path().to_string();

    let structure = mysqldump_base(db, disable_column_statistics)
        .args(["--no-data", "--routines"])
        .arg(&db.name);

    let mut data = mysqldump_base(db, disable_column_statistics)
        .args(["--no-create-info", "--skip-triggers"]);
    for table in ignore_tables {
        data = data.arg(format!("--ignore-table={}.{table}", db.name));
    }
    data = data.arg(&db.name);

    let mut script = RemoteScript::new()
        .then(
            ShellPipeline::new(structure)
                .pipe(sed_invocation())
                .create(&sql_path),
        )
        .then(
            ShellPipeline::new(data)
                .pipe(sed_invocation())
                .append(&sql_path),
        );
    if artifact.compressed {
        script = script.then(ShellPipeline::new(
            Invocation::new("gzip").args(["-f", &sql_path]),
        ));
    }
    script
}

/// Runs the composed dump command on the remote host. Non-zero exit is fatal
/// for the stage; stderr is surfaced verbatim.
pub fn create_remote_dump(
    runner: &impl ProcessRunner,
    target: &SshTarget,
    db: &DbConfig,
    ignore_tables: &[String],
    artifact: &DumpArtifact,
    disable_column_statistics: bool,
) -> Result<()> {
    if db.name.is_empty() {
        return Err(SyncError::Dump(
            "remote database name is empty".to_string(),
        ));
    }

    println!(
        "📦 Creating remote dump {} ({} excluded table{})...",
        artifact.remote_path,
        ignore_tables.len(),
        if ignore_tables.len() == 1 { "" } else { "s" }
    );

    let script = build_dump_script(db, ignore_tables, artifact, disable_column_statistics);
    let output = runner
        .run(&ssh_invocation(target, &script), LONG_TIMEOUT)
        .map_err(|e| SyncError::Dump(e.to_string()))?;

    if !output.success() {
        return Err(SyncError::Dump(output.stderr.trim().to_string()));
    }
    println!("✓ Remote dump created.");
    Ok(())
}
