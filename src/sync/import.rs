// shopsync/src/sync/import.rs
//! Import of the downloaded dump into the local database. The mysql client's
//! stdin receives: check-relaxing preamble, every dump byte run through
//! decompression and the definer filter, then the re-enabling coda. Partial
//! imports are not rolled back; a failed import means a failed sync.

use std::fs::File;
use std::io::{BufReader, Write};

use flate2::read::GzDecoder;

use crate::config::DbConfig;
use crate::errors::{Result, SyncError};
use crate::process::runner::ProcessRunner;
use crate::process::{Invocation, LONG_TIMEOUT};
use crate::sync::definer::DefinerFilter;
use crate::sync::dump::DumpArtifact;

/// Session statements sent before any dump content. Foreign-key and
/// uniqueness checks are deferred for throughput; NO_AUTO_VALUE_ON_ZERO keeps
/// explicit zero ids from being re-assigned.
const PREAMBLE: &[&str] = &[
    "SET FOREIGN_KEY_CHECKS=0;",
    "SET UNIQUE_CHECKS=0;",
    "SET SESSION sql_mode='NO_AUTO_VALUE_ON_ZERO';",
];

const CODA: &[&str] = &["SET FOREIGN_KEY_CHECKS=1;", "SET UNIQUE_CHECKS=1;"];

fn mysql_client(db: &DbConfig) -> Invocation {
    Invocation::new("mysql")
        .args(["-h", &db.host])
        .args(["-P", &db.port.to_string()])
        .args(["-u", &db.user])
        .arg(&db.name)
        .env("MYSQL_PWD", &db.password)
}

/// Streams the dump into the local database.
pub fn import_dump(
    runner: &impl ProcessRunner,
    db: &DbConfig,
    artifact: &DumpArtifact,
) -> Result<()> {
    if db.name.is_empty() {
        return Err(SyncError::Import("local database name is empty".to_string()));
    }

    println!(
        "📥 Importing {} into local database {}...",
        artifact.local_path.display(),
        db.name
    );

    let filter = DefinerFilter::new()
        .map_err(|e| SyncError::Import(format!("definer filter failed to compile: {e}")))?;

    let mut feed = |writer: &mut dyn Write| -> std::io::Result<()> {
        for statement in PREAMBLE {
            writeln!(writer, "{statement}")?;
        }
        let file = File::open(&artifact.local_path)?;
        if artifact.compressed {
            filter.copy_filtered(BufReader::new(GzDecoder::new(file)), writer)?;
        } else {
            filter.copy_filtered(BufReader::new(file), writer)?;
        }
        for statement in CODA {
            writeln!(writer, "{statement}")?;
        }
        Ok(())
    };

    let invocation = mysql_client(db);
    let output = runner
        .run_with_input(&invocation, &mut feed, LONG_TIMEOUT)
        .map_err(|e| SyncError::Import(e.to_string()))?;

    if !output.success() {
        return Err(SyncError::Import(output.stderr.trim().to_string()));
    }
    println!("✓ Dump imported.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;
    use std::path::Path;

    use flate2::write::GzEncoder;
    use flate2::Compression;

    use super::*;
    use crate::process::fake::FakeRunner;

    fn local_db() -> DbConfig {
        DbConfig {
            host: "127.0.0.1".to_string(),
            port: 3306,
            name: "shop".to_string(),
            user: "app".to_string(),
            password: "secret".to_string(),
        }
    }

    const DUMP: &str = "CREATE TABLE `a` (id int);\n\
                        /*!50013 DEFINER=`prod`@`%` SQL SECURITY DEFINER*/\n\
                        INSERT INTO `a` VALUES (1);\n";

    fn artifact(dir: &Path, compressed: bool) -> anyhow::Result<DumpArtifact> {
        let name = if compressed { "dump.sql.gz" } else { "dump.sql" };
        let local_path = dir.join(name);
        if compressed {
            let mut encoder = GzEncoder::new(std::fs::File::create(&local_path)?, Compression::default());
            encoder.write_all(DUMP.as_bytes())?;
            encoder.finish()?;
        } else {
            std::fs::write(&local_path, DUMP)?;
        }
        Ok(DumpArtifact {
            remote_path: format!("/tmp/{name}"),
            local_path,
            compressed,
        })
    }

    fn assert_stream_shape(streamed: &str) {
        // Preamble before any dump content, coda after all of it.
        assert!(streamed.starts_with(
            "SET FOREIGN_KEY_CHECKS=0;\nSET UNIQUE_CHECKS=0;\n\
             SET SESSION sql_mode='NO_AUTO_VALUE_ON_ZERO';\n"
        ));
        assert!(streamed.ends_with("SET FOREIGN_KEY_CHECKS=1;\nSET UNIQUE_CHECKS=1;\n"));
        assert!(streamed.contains("CREATE TABLE `a` (id int);"));
        assert!(streamed.contains("INSERT INTO `a` VALUES (1);"));
        assert!(!streamed.contains("DEFINER"));
    }

    #[test]
    fn streams_plain_dump_with_preamble_filter_and_coda() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let runner = FakeRunner::default();

        import_dump(&runner, &local_db(), &artifact(dir.path(), false)?)?;

        let calls = runner.calls.borrow();
        assert_eq!(calls[0].program, "mysql");
        assert!(calls[0].args.contains(&"shop".to_string()));
        assert!(calls[0]
            .envs
            .contains(&("MYSQL_PWD".to_string(), "secret".to_string())));

        let inputs = runner.inputs.borrow();
        assert_stream_shape(std::str::from_utf8(&inputs[0])?);
        Ok(())
    }

    #[test]
    fn decompresses_gzipped_dump_before_filtering() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let runner = FakeRunner::default();

        import_dump(&runner, &local_db(), &artifact(dir.path(), true)?)?;

        let inputs = runner.inputs.borrow();
        assert_stream_shape(std::str::from_utf8(&inputs[0])?);
        Ok(())
    }

    #[test]
    fn client_failure_is_an_import_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let runner = FakeRunner::with_outputs(vec![FakeRunner::failed(
            "ERROR 1049 (42000): Unknown database 'shop'",
        )]);

        let result = import_dump(&runner, &local_db(), &artifact(dir.path(), false)?);
        assert!(matches!(result, Err(SyncError::Import(_))));
        Ok(())
    }
}
