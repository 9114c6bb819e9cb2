//! Validates captured runtime output, or executes side-effecting items
//! against the shared environment.
use crate::model::Item;
use crate::script::{CaseLocals, Environment, ScriptHost};
use anyhow::{anyhow, bail, Context, Result};
use regex::Regex;

/// Item names whose value is executed as statements instead of asserted.
const EXEC_ITEMS: [&str; 2] = ["assert", "exec"];

/// Applies one standalone (already evaluated) item.
///
/// Executable items run against the environment; everything else must have a
/// prior captured output to compare with and dispatches on the item name.
pub fn apply(
    item: &Item,
    env: &mut Environment,
    locals: &CaseLocals,
    host: &dyn ScriptHost,
) -> Result<()> {
    if EXEC_ITEMS.contains(&item.name.as_str()) || item.option.iter().any(|op| op == "exec") {
        return host
            .run(env, locals, &item.text())
            .with_context(|| format!("execute {} item", item.name));
    }

    let out = locals
        .out
        .as_deref()
        .ok_or_else(|| anyhow!("no captured output to assert against"))?;

    match item.name.as_str() {
        "out" => assert_out(out, item),
        other => bail!("no such assertion kind: {other}"),
    }
}

/// Compares captured output to the expected value. `like` wins over
/// `unlike`; without either flag the comparison is exact string equality.
fn assert_out(out: &str, item: &Item) -> Result<()> {
    let expected = item.text();
    if item.option.iter().any(|op| op == "like") {
        let pattern = Regex::new(&expected)
            .with_context(|| format!("invalid like pattern {expected:?}"))?;
        if !pattern.is_match(out) {
            bail!("expected output matching {expected:?}, got {out:?}");
        }
    } else if item.option.iter().any(|op| op == "unlike") {
        let pattern = Regex::new(&expected)
            .with_context(|| format!("invalid unlike pattern {expected:?}"))?;
        if pattern.is_match(out) {
            bail!("expected output not matching {expected:?}, got {out:?}");
        }
    } else if expected != out {
        bail!("expected output {expected:?}, got {out:?}");
    }
    Ok(())
}
