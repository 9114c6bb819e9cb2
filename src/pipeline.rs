//! Option pipeline applied to each item before it is grouped or asserted.
//!
//! Directives run left to right and mutate the item value in place. The
//! first unrecognized directive ends the pipeline for that item without an
//! error; later directives are skipped. That short-circuit is part of the
//! format's contract and must not be tightened into validation.
use crate::model::Item;
use crate::script::{CaseLocals, Environment, ScriptHost};
use anyhow::{Context, Result};
use regex::{Captures, Regex};
use serde_json::Value;

pub fn eval_item(
    item: &mut Item,
    env: &Environment,
    locals: &CaseLocals,
    host: &dyn ScriptHost,
) -> Result<()> {
    for op in &item.option {
        match op.as_str() {
            "eval" => {
                item.value = host
                    .evaluate(env, locals, &item.text())
                    .with_context(|| format!("eval directive on {} item", item.name))?;
            }
            "template" => {
                item.value = Value::String(substitute(&item.text(), env));
            }
            "json" => {
                item.value = serde_json::from_str(&item.text())
                    .with_context(|| format!("json directive on {} item", item.name))?;
            }
            _ => break,
        }
    }
    Ok(())
}

/// Replaces `${name}` and `$name` placeholders from the environment.
/// Substitution is non-strict: unknown names stay literally intact, and `$$`
/// escapes a dollar sign.
pub fn substitute(text: &str, env: &Environment) -> String {
    let placeholder =
        Regex::new(r"\$(?:(\$)|\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))")
            .expect("regex for template placeholders");
    placeholder
        .replace_all(text, |caps: &Captures<'_>| {
            if caps.get(1).is_some() {
                return "$".to_string();
            }
            let name = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map(|m| m.as_str())
                .unwrap_or_default();
            match env.get(name) {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
