//! Data model produced by the front end: tagged items grouped into named
//! cases, one `SourceFile` per `.zt` file.
use serde_json::Value;
use std::path::PathBuf;

/// One tagged declaration inside a case: a code block, an expectation, or a
/// directive. `option` is an ordered pipeline; evaluation order matters.
#[derive(Debug, Clone)]
pub struct Item {
    pub name: String,
    pub value: Value,
    pub option: Vec<String>,
    pub lineno: usize,
}

impl Item {
    /// Textual form of the value. The loader always produces strings; after
    /// a `json` or `eval` directive the value may be structured, in which
    /// case its JSON serialization is used.
    pub fn text(&self) -> String {
        match &self.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// A named, ordered sequence of items. The unit test authors write.
#[derive(Debug, Clone)]
pub struct Case {
    pub name: String,
    pub items: Vec<Item>,
    pub lineno: usize,
}

/// A parsed test file: file-level setup/teardown code plus its cases.
#[derive(Debug)]
pub struct SourceFile {
    pub path: PathBuf,
    pub setup: Option<String>,
    pub teardown: Option<String>,
    pub cases: Vec<Case>,
}
