//! jq evaluation in a child process.
//!
//! # Responsibilities
//! - Spawn the configured jq executable with whitelisted flags
//! - Stream the input over stdin and collect bounded stdout/stderr
//! - Map jq exit codes to engine errors
//!
//! # Design Decisions
//! - `kill_on_drop`: when the caller's deadline drops the future, the child
//!   is killed, so a non-terminating filter never outlives its request
//! - stdout is read with a ceiling; stderr beyond the ceiling is drained
//!   and discarded so the child never blocks on a full pipe

use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStderr, Command};

use super::{Engine, EngineError, JqOption, Output, Program};
use crate::config::EngineConfig;

/// Upper bound on captured diagnostics.
const MAX_DIAGNOSTIC_BYTES: u64 = 64 * 1024;

/// jq exit status for a filter that failed to compile.
const EXIT_COMPILE_ERROR: i32 = 3;

/// Engine backed by the `jq` executable.
#[derive(Debug, Clone)]
pub struct JqProcess {
    binary: PathBuf,
    max_output_bytes: usize,
}

impl JqProcess {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            binary: PathBuf::from(&config.jq_path),
            max_output_bytes: config.max_output_bytes,
        }
    }
}

#[async_trait]
impl Engine for JqProcess {
    async fn run(&self, program: Program) -> Result<Output, EngineError> {
        // A leading space keeps filters such as `-1` from being read as flags.
        let filter = if program.query.starts_with('-') {
            format!(" {}", program.query)
        } else {
            program.query
        };

        let mut child = Command::new(&self.binary)
            .args(program.options.iter().map(JqOption::as_flag))
            .arg(filter)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(EngineError::Unavailable)?;

        let mut stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;

        if let Some(mut stdin) = child.stdin.take() {
            let input = program.input;
            tokio::spawn(async move {
                // jq may exit without reading everything (e.g. `-n`); a broken pipe is fine.
                let _ = stdin.write_all(input.as_bytes()).await;
            });
        }
        let diagnostics = tokio::spawn(read_diagnostics(stderr));

        let mut out = Vec::new();
        (&mut stdout)
            .take(self.max_output_bytes as u64 + 1)
            .read_to_end(&mut out)
            .await
            .map_err(EngineError::Unavailable)?;

        if out.len() > self.max_output_bytes {
            let _ = child.start_kill();
            return Err(EngineError::OutputTooLarge {
                limit: self.max_output_bytes,
            });
        }

        let status = child.wait().await.map_err(EngineError::Unavailable)?;
        let diagnostics = diagnostics.await.unwrap_or_default();

        classify(
            status.code(),
            String::from_utf8_lossy(&out).into_owned(),
            diagnostics,
        )
    }
}

fn missing_pipe(name: &str) -> EngineError {
    EngineError::Unavailable(io::Error::new(
        io::ErrorKind::BrokenPipe,
        format!("jq {} was not captured", name),
    ))
}

async fn read_diagnostics(mut stderr: ChildStderr) -> String {
    let mut buf = Vec::new();
    let _ = (&mut stderr)
        .take(MAX_DIAGNOSTIC_BYTES)
        .read_to_end(&mut buf)
        .await;
    let _ = tokio::io::copy(&mut stderr, &mut tokio::io::sink()).await;
    String::from_utf8_lossy(&buf).trim_end().to_string()
}

/// Turn a finished jq run into an output or an error.
fn classify(code: Option<i32>, stdout: String, stderr: String) -> Result<Output, EngineError> {
    match code {
        Some(0) => {
            let text = if stderr.is_empty() {
                stdout
            } else if stdout.is_empty() {
                stderr
            } else {
                format!("{}\n{}", stdout, stderr)
            };
            Ok(Output { text })
        }
        Some(EXIT_COMPILE_ERROR) => Err(EngineError::Compile(non_empty(
            stderr,
            "jq: compile error",
        ))),
        Some(code) => Err(EngineError::Runtime(non_empty(
            stderr,
            &format!("jq exited with status {}", code),
        ))),
        None => Err(EngineError::Runtime(non_empty(
            stderr,
            "jq was terminated by a signal",
        ))),
    }
}

fn non_empty(message: String, fallback: &str) -> String {
    if message.is_empty() {
        fallback.to_string()
    } else {
        message
    }
}
