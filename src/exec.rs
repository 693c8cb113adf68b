// src/exec.rs

//! External command execution for snapshot commands and component hooks
//!
//! Commands are given as argv vectors (never through a shell), run with
//! stdin closed, and their output is captured and logged.

use std::io;
use std::path::Path;
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::{debug, warn};

/// Why a command did not succeed
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("empty command")]
    EmptyCommand,

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// Non-zero exit; `code` is `None` when killed by a signal
    #[error("'{program}' failed with exit code {}{}", exit_label(.code), stderr_suffix(.stderr))]
    Exit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}

fn stderr_suffix(stderr: &str) -> String {
    match stderr.trim() {
        "" => String::new(),
        detail => format!(": {detail}"),
    }
}

/// Captured output of a successful command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Substitute `{name}` placeholders in every argument
pub fn render_argv(template: &[String], vars: &[(&str, &str)]) -> Vec<String> {
    template
        .iter()
        .map(|arg| {
            vars.iter().fold(arg.clone(), |acc, (key, value)| {
                acc.replace(&format!("{{{key}}}"), value)
            })
        })
        .collect()
}

/// Run `argv`, returning its captured output
///
/// `tag` prefixes the logged output lines.
pub fn run(
    argv: &[String],
    cwd: Option<&Path>,
    envs: &[(&str, &str)],
    tag: &str,
) -> Result<CommandOutput, ExecError> {
    let Some((program, args)) = argv.split_first() else {
        return Err(ExecError::EmptyCommand);
    };

    debug!("Executing: {} {:?}", program, args);

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    for (key, value) in envs {
        command.env(key, value);
    }

    let output = command
        .output()
        .map_err(|source| ExecError::Spawn {
            program: program.clone(),
            source,
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    for line in stdout.lines() {
        debug!("[{}] {}", tag, line);
    }
    for line in stderr.lines() {
        warn!("[{}] {}", tag, line);
    }

    if output.status.success() {
        Ok(CommandOutput { stdout, stderr })
    } else {
        Err(ExecError::Exit {
            program: program.clone(),
            code: output.status.code(),
            stderr,
        })
    }
}
