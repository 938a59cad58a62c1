// shopsync/src/sync/transfer.rs
//! Download of the remote dump and best-effort remote cleanup.

use std::fs;

use crate::config::SshTarget;
use crate::errors::{Result, SyncError};
use crate::process::runner::ProcessRunner;
use crate::process::{Invocation, LONG_TIMEOUT, SHORT_TIMEOUT};
use crate::remote::script::{RemoteScript, ShellPipeline};
use crate::remote::ssh::{scp_invocation, ssh_invocation};
use crate::sync::dump::DumpArtifact;

/// Copies the dump to its local path. A transfer that "succeeds" but leaves
/// no bytes behind is still a failure; empty dumps import as silent no-ops.
pub fn download_dump(
    runner: &impl ProcessRunner,
    target: &SshTarget,
    artifact: &DumpArtifact,
) -> Result<()> {
    println!(
        "⬇️  Downloading {} to {}...",
        artifact.remote_path,
        artifact.local_path.display()
    );

    let invocation = scp_invocation(target, &artifact.remote_path, &artifact.local_path);
    let output = runner
        .run(&invocation, LONG_TIMEOUT)
        .map_err(|e| SyncError::Transfer(e.to_string()))?;

    if !output.success() {
        return Err(SyncError::Transfer(output.stderr.trim().to_string()));
    }

    let metadata = fs::metadata(&artifact.local_path).map_err(|_| {
        SyncError::Transfer(format!(
            "transfer reported success but {} does not exist",
            artifact.local_path.display()
        ))
    })?;
    if metadata.len() == 0 {
        return Err(SyncError::Transfer(format!(
            "downloaded dump {} is empty",
            artifact.local_path.display()
        )));
    }

    println!("✓ Dump downloaded ({} bytes).", metadata.len());
    Ok(())
}

/// Removes the remote dump. Fire-and-forget: a leftover file on the remote
/// host is worth a warning, never a failed sync.
pub fn remove_remote_dump(runner: &impl ProcessRunner, target: &SshTarget, remote_path: &str) {
    let script = RemoteScript::new().then(ShellPipeline::new(
        Invocation::new("rm").args(["-f", remote_path]),
    ));
    match runner.run(&ssh_invocation(target, &script), SHORT_TIMEOUT) {
        Ok(output) if output.success() => {
            println!("🧹 Removed remote dump {remote_path}.");
        }
        Ok(output) => {
            eprintln!(
                "⚠️  Could not remove remote dump {remote_path}: {}",
                output.stderr.trim()
            );
        }
        Err(e) => {
            eprintln!("⚠️  Could not remove remote dump {remote_path}: {e}");
        }
    }
}
