//! Shared per-file environment and the statement/expression host behind the
//! `eval` directive, executable items, and setup/teardown code.
//!
//! The host is a deliberately small language: expressions are JSON literals,
//! variable references, or `+` chains over those; statements are assignments
//! and asserts. It sits behind `ScriptHost` so a richer engine can replace it
//! without touching the pipeline or assertion code.
use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;

/// Mutable namespace shared by reference across all cases of one file.
/// Created before the file's setup code runs and discarded after teardown.
#[derive(Debug, Default)]
pub struct Environment {
    values: BTreeMap<String, Value>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }
}

/// Case-private state. `out` holds the most recent captured runtime output
/// and is visible to expressions under that name.
#[derive(Debug, Default)]
pub struct CaseLocals {
    pub out: Option<String>,
}

/// Narrow execution interface so the underlying expression/statement
/// mechanism is pluggable per target language.
pub trait ScriptHost {
    fn evaluate(&self, env: &Environment, locals: &CaseLocals, source: &str) -> Result<Value>;
    fn run(&self, env: &mut Environment, locals: &CaseLocals, source: &str) -> Result<()>;
}

/// Default host.
///
/// Expressions: `<term> (+ <term>)*` where a term is a JSON literal or a
/// variable name (`out` resolves from the case locals first). `+` adds
/// numbers and concatenates strings or arrays.
///
/// Statements, one per line or `;`-separated: `name = <expr>`,
/// `assert <expr>`, `assert <expr> == <expr>`. Blank lines and `#` comments
/// are ignored.
#[derive(Debug, Default)]
pub struct MiniScript;

impl ScriptHost for MiniScript {
    fn evaluate(&self, env: &Environment, locals: &CaseLocals, source: &str) -> Result<Value> {
        let mut result: Option<Value> = None;
        for term in split_terms(source) {
            let value = self.term(env, locals, &term)?;
            result = Some(match result {
                None => value,
                Some(acc) => combine(acc, value)?,
            });
        }
        result.ok_or_else(|| anyhow!("empty expression"))
    }

    fn run(&self, env: &mut Environment, locals: &CaseLocals, source: &str) -> Result<()> {
        for statement in source.lines().flat_map(|line| line.split(';')) {
            let statement = statement.trim();
            if statement.is_empty() || statement.starts_with('#') {
                continue;
            }
            self.statement(env, locals, statement)
                .with_context(|| format!("in statement {statement:?}"))?;
        }
        Ok(())
    }
}

impl MiniScript {
    fn term(&self, env: &Environment, locals: &CaseLocals, token: &str) -> Result<Value> {
        let token = token.trim();
        if token.is_empty() {
            bail!("empty expression term");
        }
        if is_identifier(token) && !matches!(token, "true" | "false" | "null") {
            if token == "out" {
                if let Some(out) = &locals.out {
                    return Ok(Value::String(out.clone()));
                }
            }
            return env
                .get(token)
                .cloned()
                .ok_or_else(|| anyhow!("undefined variable: {token}"));
        }
        serde_json::from_str(token).with_context(|| format!("malformed expression term {token:?}"))
    }

    fn statement(&self, env: &mut Environment, locals: &CaseLocals, statement: &str) -> Result<()> {
        if let Some(rest) = statement.strip_prefix("assert ") {
            return self.check(env, locals, rest.trim());
        }
        if let Some((name, expr)) = split_assignment(statement) {
            let value = self.evaluate(env, locals, expr)?;
            env.set(name, value);
            return Ok(());
        }
        bail!("unknown statement form")
    }

    fn check(&self, env: &Environment, locals: &CaseLocals, condition: &str) -> Result<()> {
        if let Some((left, right)) = condition.split_once("==") {
            let left = self.evaluate(env, locals, left)?;
            let right = self.evaluate(env, locals, right)?;
            if left != right {
                bail!("assertion failed: {left} != {right}");
            }
            return Ok(());
        }
        let value = self.evaluate(env, locals, condition)?;
        if !is_truthy(&value) {
            bail!("assertion failed: {value} is not truthy");
        }
        Ok(())
    }
}

fn combine(left: Value, right: Value) -> Result<Value> {
    match (left, right) {
        (Value::String(mut a), Value::String(b)) => {
            a.push_str(&b);
            Ok(Value::String(a))
        }
        (Value::Number(a), Value::Number(b)) => {
            let number = match (a.as_i64(), b.as_i64()) {
                (Some(x), Some(y)) if x.checked_add(y).is_some() => {
                    serde_json::Number::from(x + y)
                }
                _ => {
                    let sum = a.as_f64().unwrap_or_default() + b.as_f64().unwrap_or_default();
                    serde_json::Number::from_f64(sum)
                        .ok_or_else(|| anyhow!("numeric overflow combining {a} + {b}"))?
                }
            };
            Ok(Value::Number(number))
        }
        (Value::Array(mut a), Value::Array(mut b)) => {
            a.append(&mut b);
            Ok(Value::Array(a))
        }
        (a, b) => bail!("cannot combine {} with {}", kind(&a), kind(&b)),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().unwrap_or_default() != 0.0,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn is_identifier(token: &str) -> bool {
    let mut chars = token.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Splits an expression on top-level `+`, leaving `+` inside string literals
/// alone.
fn split_terms(source: &str) -> Vec<String> {
    let mut terms = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    let mut escaped = false;
    for c in source.chars() {
        if in_string {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                current.push(c);
            }
            '+' => {
                terms.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    terms.push(current);
    terms
}

/// Matches `name = <expr>` without mistaking `==` for an assignment.
fn split_assignment(statement: &str) -> Option<(&str, &str)> {
    let (name, expr) = statement.split_once('=')?;
    let name = name.trim();
    let expr = expr.trim_start();
    if !is_identifier(name) || expr.starts_with('=') {
        return None;
    }
    Some((name, expr))
}
