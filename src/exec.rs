//! Runs one block against the external runtime and captures its stdout.
use crate::blocks::Block;
use crate::script::CaseLocals;
use crate::templates::render_driver;
use anyhow::{bail, Context, Result};
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use tempfile::NamedTempFile;

/// The runtime under test: a resolved executable plus any arguments carried
/// by the override command line (e.g. `luajit -joff`).
#[derive(Debug, Clone)]
pub struct Runtime {
    program: PathBuf,
    args: Vec<String>,
}

impl Runtime {
    pub fn from_command_line(command: &str) -> Result<Self> {
        let mut words = shell_words::split(command)
            .with_context(|| format!("parse runtime command line {command:?}"))?;
        if words.is_empty() {
            bail!("runtime command line is empty");
        }
        let program = words.remove(0);
        let program = which::which(&program)
            .with_context(|| format!("locate runtime executable {program:?}"))?;
        Ok(Self {
            program,
            args: words,
        })
    }
}

/// Writes the realized driver program to a temp file and invokes the runtime
/// on it, storing the full stdout into the case-local output slot.
///
/// The call blocks until the runtime exits; no timeout is enforced, so a
/// hung runtime hangs the suite. Stderr and exit status are not part of the
/// observable result: a crashed runtime surfaces later as an output
/// mismatch.
pub fn run_block(runtime: &Runtime, block: &Block, locals: &mut CaseLocals) -> Result<()> {
    let program = render_driver(block)?;

    // Dropped on every exit path, which removes the file.
    let mut file = NamedTempFile::new().context("create driver temp file")?;
    file.write_all(program.as_bytes())
        .context("write driver program")?;
    file.flush().context("flush driver program")?;

    let output = Command::new(&runtime.program)
        .args(&runtime.args)
        .arg(file.path())
        .output()
        .with_context(|| format!("spawn runtime {}", runtime.program.display()))?;

    if !output.status.success() {
        tracing::debug!(status = %output.status, "runtime exited non-zero");
    }
    locals.out = Some(String::from_utf8_lossy(&output.stdout).into_owned());
    Ok(())
}
