//! dbt subprocess runner
//!
//! Runs `dbt parse` and `dbt run` inside the dbt project directory. Every
//! invocation is bounded by an optional timeout; a timed-out child is killed.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Captured output kept on failures
const OUTPUT_TAIL_BYTES: usize = 4096;

/// dbt subcommands the dev server uses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbtCommand {
    /// `dbt parse`: refresh target/manifest.json
    Parse,
    /// `dbt run`: build every model
    RunAll,
    /// `dbt run --select <models>`
    RunModels(Vec<String>),
}

impl DbtCommand {
    fn args(&self, fail_fast: bool) -> Vec<String> {
        let mut args = Vec::new();
        match self {
            Self::Parse => args.push("parse".to_string()),
            Self::RunAll | Self::RunModels(_) => {
                args.push("run".to_string());
                if fail_fast {
                    args.push("--fail-fast".to_string());
                }
            }
        }

        if let Self::RunModels(models) = self {
            args.push("--select".to_string());
            args.extend(models.iter().cloned());
        }

        args
    }
}

impl fmt::Display for DbtCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse => write!(f, "dbt parse"),
            Self::RunAll => write!(f, "dbt run"),
            Self::RunModels(models) => write!(f, "dbt run --select {}", models.join(" ")),
        }
    }
}

/// Errors from a dbt invocation
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("Failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {}: {output}", exit_label(.code))]
    Failed {
        command: String,
        code: Option<i32>,
        output: String,
    },

    #[error("`{command}` timed out after {timeout:?}")]
    TimedOut { command: String, timeout: Duration },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

/// Runs dbt against one project directory
#[derive(Debug, Clone)]
pub struct DbtRunner {
    program: String,
    project_dir: PathBuf,
    parse_timeout: Option<Duration>,
    run_timeout: Option<Duration>,
    fail_fast: bool,
}

impl DbtRunner {
    /// Runner using `dbt` from PATH with no timeouts and `--fail-fast`
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: "dbt".to_string(),
            project_dir: project_dir.into(),
            parse_timeout: None,
            run_timeout: None,
            fail_fast: true,
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_parse_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.parse_timeout = timeout;
        self
    }

    pub fn with_run_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.run_timeout = timeout;
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// `dbt parse`
    pub async fn parse(&self) -> Result<(), RunnerError> {
        self.invoke(DbtCommand::Parse).await
    }

    /// `dbt run [--fail-fast]`
    pub async fn run_all(&self) -> Result<(), RunnerError> {
        self.invoke(DbtCommand::RunAll).await
    }

    /// `dbt run [--fail-fast] --select <models>`; a no-op for an empty list
    pub async fn run_models(&self, models: &[String]) -> Result<(), RunnerError> {
        if models.is_empty() {
            return Ok(());
        }
        self.invoke(DbtCommand::RunModels(models.to_vec())).await
    }

    /// Run one dbt command to completion
    pub async fn invoke(&self, command: DbtCommand) -> Result<(), RunnerError> {
        let timeout = match command {
            DbtCommand::Parse => self.parse_timeout,
            DbtCommand::RunAll | DbtCommand::RunModels(_) => self.run_timeout,
        };

        tracing::debug!(
            command = %command,
            dir = %self.project_dir.display(),
            "invoking dbt"
        );

        let child = Command::new(&self.program)
            .args(command.args(self.fail_fast))
            .current_dir(&self.project_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunnerError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // Dropping the `wait_with_output` future on timeout drops the child,
        // which kills it.
        let output = match timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(RunnerError::TimedOut {
                        command: command.to_string(),
                        timeout: limit,
                    })
                }
            },
            None => child.wait_with_output().await,
        }
        .map_err(|source| RunnerError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        if output.status.success() {
            tracing::debug!(command = %command, "dbt finished");
            return Ok(());
        }

        // dbt reports most failures on stdout
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Err(RunnerError::Failed {
            command: command.to_string(),
            code: output.status.code(),
            output: tail(&combined, OUTPUT_TAIL_BYTES).trim().to_string(),
        })
    }
}

/// Last `max` bytes of `text`, cut on a char boundary
fn tail(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

/// Model names for the changed `.sql` files among `paths` (file stem, deduplicated)
pub fn model_names_from_paths<P: AsRef<Path>>(paths: &[P]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for path in paths {
        let path = path.as_ref();
        if path.extension().and_then(|ext| ext.to_str()) != Some("sql") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            if !names.iter().any(|n| n == stem) {
                names.push(stem.to_string());
            }
        }
    }
    names
}
