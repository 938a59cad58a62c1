// shopsync/src/remote/ssh.rs
use std::path::Path;

use crate::config::SshTarget;
use crate::process::Invocation;
use crate::remote::script::RemoteScript;

/// stderr fragments that indicate an authentication or connectivity problem
/// rather than a failure of the remote command itself.
const AUTH_FAILURE_MARKERS: &[&str] = &[
    "permission denied",
    "host key verification failed",
    "connection refused",
    "connection timed out",
    "authentication failed",
    "no route to host",
    "could not resolve hostname",
];

pub fn is_auth_failure(stderr: &str) -> bool {
    let lowered = stderr.to_ascii_lowercase();
    AUTH_FAILURE_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

pub fn destination(target: &SshTarget) -> String {
    format!("{}@{}", target.user, target.host)
}

/// `ssh` invocation executing `script` on the target. BatchMode keeps
/// failures non-interactive so they surface on stderr instead of hanging on
/// a password prompt.
pub fn ssh_invocation(target: &SshTarget, script: &RemoteScript) -> Invocation {
    let mut invocation = Invocation::new("ssh")
        .args(["-p", &target.port.to_string()])
        .args(["-o", "BatchMode=yes"]);
    if let Some(key) = &target.key_path {
        invocation = invocation.arg("-i").arg(key.display().to_string());
    }
    invocation.arg(destination(target)).arg(script.render())
}

/// `scp` invocation copying `remote_path` from the target to `local_path`.
/// scp spells the port flag `-P`, unlike ssh.
pub fn scp_invocation(target: &SshTarget, remote_path: &str, local_path: &Path) -> Invocation {
    let mut invocation = Invocation::new("scp")
        .args(["-P", &target.port.to_string()])
        .args(["-o", "BatchMode=yes"]);
    if let Some(key) = &target.key_path {
        invocation = invocation.arg("-i").arg(key.display().to_string());
    }
    invocation
        .arg(format!("{}:{remote_path}", destination(target)))
        .arg(local_path.display().to_string())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::process::Invocation as Inv;
    use crate::remote::script::ShellPipeline;

    fn target() -> SshTarget {
        SshTarget {
            host: "staging.example.com".to_string(),
            port: 2222,
            user: "deploy".to_string(),
            key_path: Some(PathBuf::from("/home/dev/.ssh/staging")),
            remote_project_path: "/var/www/shop".to_string(),
        }
    }

    #[test]
    fn ssh_invocation_carries_port_key_and_script() {
        let script = RemoteScript::new().then(ShellPipeline::new(
            Inv::new("cat").arg("/var/www/shop/.env"),
        ));
        let invocation = ssh_invocation(&target(), &script);

        assert_eq!(invocation.program, "ssh");
        assert_eq!(
            invocation.args,
            vec![
                "-p",
                "2222",
                "-o",
                "BatchMode=yes",
                "-i",
                "/home/dev/.ssh/staging",
                "deploy@staging.example.com",
                "cat /var/www/shop/.env",
            ]
        );
    }

    #[test]
    fn scp_invocation_uses_capital_port_flag() {
        let invocation = scp_invocation(&target(), "/tmp/dump.sql.gz", Path::new("dump.sql.gz"));

        assert_eq!(invocation.program, "scp");
        assert_eq!(invocation.args[0], "-P");
        assert_eq!(invocation.args[1], "2222");
        assert_eq!(
            invocation.args[invocation.args.len() - 2],
            "deploy@staging.example.com:/tmp/dump.sql.gz"
        );
        assert_eq!(invocation.args[invocation.args.len() - 1], "dump.sql.gz");
    }

    #[test]
    fn classifies_auth_and_connectivity_failures() {
        assert!(is_auth_failure("deploy@host: Permission denied (publickey)."));
        assert!(is_auth_failure("Host key verification failed."));
        assert!(is_auth_failure("ssh: connect to host x port 22: Connection refused"));
        assert!(!is_auth_failure("bash: mysqldump: command not found"));
    }
}
