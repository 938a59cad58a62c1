// shopsync/src/overrides/post_sync.rs
//! Follow-up operations after a successful sync: cache invalidation and the
//! declarative file's commands, dispatched to the application console. Each
//! runs in isolation; failures are collected, never propagated.

use crate::process::runner::ProcessRunner;
use crate::process::{Invocation, LONG_TIMEOUT};

/// The host application's command runner.
pub const CONSOLE_PROGRAM: &str = "bin/console";

#[derive(Debug, Default)]
pub struct PostSyncOutcome {
    pub executed: usize,
    pub failures: Vec<String>,
}

impl PostSyncOutcome {
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Splits an opaque command string into a console invocation. Empty strings
/// yield nothing to run.
pub fn console_invocation(command: &str) -> Option<Invocation> {
    let mut parts = command.split_whitespace();
    let first = parts.next()?;
    Some(Invocation::new(CONSOLE_PROGRAM).arg(first).args(parts))
}

/// Runs cache invalidation (when enabled) followed by each configured
/// command, in order. A failing operation is reported and skipped over.
pub fn run_post_sync(
    runner: &impl ProcessRunner,
    commands: &[String],
    clear_cache: bool,
) -> PostSyncOutcome {
    let mut outcome = PostSyncOutcome::default();

    if clear_cache {
        run_console_command(runner, "cache:clear", &mut outcome);
    }
    for command in commands {
        run_console_command(runner, command, &mut outcome);
    }
    outcome
}

fn run_console_command(
    runner: &impl ProcessRunner,
    command: &str,
    outcome: &mut PostSyncOutcome,
) {
    let Some(invocation) = console_invocation(command) else {
        return;
    };

    println!("▶️  {}", invocation.command_line());
    match runner.run(&invocation, LONG_TIMEOUT) {
        Ok(output) if output.success() => {
            outcome.executed += 1;
            println!("✓ {command}");
        }
        Ok(output) => {
            eprintln!("⚠️  {command} failed: {}", output.stderr.trim());
            outcome
                .failures
                .push(format!("{command}: {}", output.stderr.trim()));
        }
        Err(e) => {
            eprintln!("⚠️  {command} could not be run: {e}");
            outcome.failures.push(format!("{command}: {e}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::fake::FakeRunner;

    #[test]
    fn splits_command_strings_into_console_arguments() {
        let invocation = console_invocation("dal:refresh:index --use-queue").expect("non-empty");
        assert_eq!(invocation.program, CONSOLE_PROGRAM);
        assert_eq!(invocation.args, vec!["dal:refresh:index", "--use-queue"]);

        assert!(console_invocation("   ").is_none());
    }

    #[test]
    fn cache_clear_runs_before_configured_commands() {
        let runner = FakeRunner::default();
        let commands = vec!["dal:refresh:index".to_string()];

        let outcome = run_post_sync(&runner, &commands, true);

        assert!(outcome.all_succeeded());
        assert_eq!(outcome.executed, 2);
        let calls = runner.calls.borrow();
        assert_eq!(calls[0].args, vec!["cache:clear"]);
        assert_eq!(calls[1].args, vec!["dal:refresh:index"]);
    }

    #[test]
    fn failing_command_does_not_stop_later_ones() {
        let runner = FakeRunner::with_outputs(vec![
            FakeRunner::failed("index is locked"),
            FakeRunner::ok(),
        ]);
        let commands = vec![
            "dal:refresh:index".to_string(),
            "theme:compile".to_string(),
        ];

        let outcome = run_post_sync(&runner, &commands, false);

        assert_eq!(outcome.executed, 1);
        assert_eq!(outcome.failures.len(), 1);
        assert!(outcome.failures[0].contains("dal:refresh:index"));
        assert_eq!(runner.calls.borrow().len(), 2);
    }

    #[test]
    fn cache_clear_can_be_disabled() {
        let runner = FakeRunner::default();
        let outcome = run_post_sync(&runner, &[], false);

        assert_eq!(outcome.executed, 0);
        assert!(runner.calls.borrow().is_empty());
    }
}
