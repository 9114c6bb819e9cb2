//! Reference front end for `.zt` files.
//!
//! Tokenizing the literate format is a collaborator concern: the harness
//! core consumes only the `SourceFile`/`Case`/`Item` model, and this module
//! sits behind [`CaseSource`] so a different front end can replace it.
//!
//! Format, line-oriented:
//! - `=== <name>` opens a case (the name may be blank);
//! - `--- <name> (opt1, opt2)` opens an item; the option list is optional;
//! - every other line belongs to the current item's value;
//! - items named `setup`/`teardown` before the first case header become the
//!   file-level directives.
//!
//! An item's value is its lines joined by newlines, trailing blank lines
//! stripped, with one final newline when non-empty.
use crate::model::{Case, Item, SourceFile};
use anyhow::{bail, Context, Result};
use regex::Regex;
use serde_json::Value;
use std::fs;
use std::path::Path;

pub trait CaseSource {
    fn load(&self, path: &Path) -> Result<SourceFile>;
}

/// The built-in line-oriented loader.
#[derive(Debug, Default)]
pub struct LineLoader;

impl CaseSource for LineLoader {
    fn load(&self, path: &Path) -> Result<SourceFile> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("read test file {}", path.display()))?;
        parse_source(path, &text)
    }
}

struct PendingItem {
    item: Item,
    lines: Vec<String>,
}

fn parse_source(path: &Path, text: &str) -> Result<SourceFile> {
    let item_header = Regex::new(r"^---\s*([A-Za-z_][A-Za-z0-9_.]*)\s*(?:\(([^)]*)\))?\s*$")
        .expect("regex for item headers");

    let mut source = SourceFile {
        path: path.to_path_buf(),
        setup: None,
        teardown: None,
        cases: Vec::new(),
    };
    let mut current_case: Option<Case> = None;
    let mut pending: Option<PendingItem> = None;

    for (idx, line) in text.lines().enumerate() {
        let lineno = idx + 1;
        if let Some(rest) = line.strip_prefix("===") {
            finish_item(&mut source, &mut current_case, pending.take())?;
            if let Some(case) = current_case.take() {
                source.cases.push(case);
            }
            current_case = Some(Case {
                name: rest.trim().to_string(),
                items: Vec::new(),
                lineno,
            });
        } else if line.starts_with("---") {
            let caps = item_header
                .captures(line)
                .with_context(|| format!("line {lineno}: malformed item header {line:?}"))?;
            finish_item(&mut source, &mut current_case, pending.take())?;
            let option = caps
                .get(2)
                .map(|m| {
                    m.as_str()
                        .split(',')
                        .map(|op| op.trim().to_string())
                        .filter(|op| !op.is_empty())
                        .collect()
                })
                .unwrap_or_default();
            pending = Some(PendingItem {
                item: Item {
                    name: caps[1].to_string(),
                    value: Value::String(String::new()),
                    option,
                    lineno,
                },
                lines: Vec::new(),
            });
        } else if let Some(pending) = pending.as_mut() {
            pending.lines.push(line.to_string());
        } else if !line.trim().is_empty() {
            bail!(
                "{}: line {lineno}: text outside of any item",
                path.display()
            );
        }
    }
    finish_item(&mut source, &mut current_case, pending.take())?;
    if let Some(case) = current_case.take() {
        source.cases.push(case);
    }

    Ok(source)
}

fn finish_item(
    source: &mut SourceFile,
    current_case: &mut Option<Case>,
    pending: Option<PendingItem>,
) -> Result<()> {
    let Some(PendingItem { mut item, mut lines }) = pending else {
        return Ok(());
    };
    while lines.last().is_some_and(|line| line.trim().is_empty()) {
        lines.pop();
    }
    let mut value = lines.join("\n");
    if !value.is_empty() {
        value.push('\n');
    }
    item.value = Value::String(value);

    if let Some(case) = current_case.as_mut() {
        case.items.push(item);
        return Ok(());
    }
    match item.name.as_str() {
        "setup" => source.setup = Some(item.text()),
        "teardown" => source.teardown = Some(item.text()),
        other => bail!(
            "{}: line {}: item {other:?} outside of any case",
            source.path.display(),
            item.lineno
        ),
    }
    Ok(())
}
