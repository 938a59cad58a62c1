// shopsync/src/remote/script.rs
//! Remote command composition. Stages, pipes and redirections are structured
//! data; the shell string only exists at the final render step, with every
//! operand quoted.

use crate::process::Invocation;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Redirection {
    Create(String),
    Append(String),
}

/// One `a | b | c [> path | >> path]` group on the remote host.
#[derive(Debug, Clone)]
pub struct ShellPipeline {
    stages: Vec<Invocation>,
    redirection: Option<Redirection>,
}

impl ShellPipeline {
    pub fn new(first: Invocation) -> Self {
        ShellPipeline {
            stages: vec![first],
            redirection: None,
        }
    }

    pub fn pipe(mut self, next: Invocation) -> Self {
        self.stages.push(next);
        self
    }

    pub fn create(mut self, path: impl Into<String>) -> Self {
        self.redirection = Some(Redirection::Create(path.into()));
        self
    }

    pub fn append(mut self, path: impl Into<String>) -> Self {
        self.redirection = Some(Redirection::Append(path.into()));
        self
    }

    fn render(&self) -> String {
        let mut rendered = self
            .stages
            .iter()
            .map(render_invocation)
            .collect::<Vec<_>>()
            .join(" | ");
        match &self.redirection {
            Some(Redirection::Create(path)) => {
                rendered.push_str(" > ");
                rendered.push_str(&shell_quote(path));
            }
            Some(Redirection::Append(path)) => {
                rendered.push_str(" >> ");
                rendered.push_str(&shell_quote(path));
            }
            None => {}
        }
        rendered
    }
}

/// An ordered group of pipelines joined with `&&`, executed as one remote
/// command (single SSH round trip).
#[derive(Debug, Clone, Default)]
pub struct RemoteScript {
    pipelines: Vec<ShellPipeline>,
}

impl RemoteScript {
    pub fn new() -> Self {
        RemoteScript::default()
    }

    pub fn then(mut self, pipeline: ShellPipeline) -> Self {
        self.pipelines.push(pipeline);
        self
    }

    pub fn render(&self) -> String {
        self.pipelines
            .iter()
            .map(ShellPipeline::render)
            .collect::<Vec<_>>()
            .join(" && ")
    }
}

fn render_invocation(invocation: &Invocation) -> String {
    let mut parts = Vec::with_capacity(1 + invocation.envs.len() + invocation.args.len());
    for (key, value) in &invocation.envs {
        parts.push(format!("{key}={}", shell_quote(value)));
    }
    parts.push(shell_quote(&invocation.program));
    for arg in &invocation.args {
        parts.push(shell_quote(arg));
    }
    parts.join(" ")
}

/// POSIX single-quote escaping. Plain operands (paths, flags) stay readable,
/// everything else is wrapped so the remote shell never interprets it.
pub fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value.bytes().all(|b| {
            b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.' | b'/' | b':' | b'=' | b'@' | b'%' | b'+' | b',')
        });
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}
