//! Binds parsed cases to reportable test units and drives a full run:
//! per-file environment lifecycle, case filtering, fail-fast case execution,
//! and the final pass/fail aggregate.
use crate::asserts;
use crate::blocks::{BlockAssembler, Element};
use crate::config::Config;
use crate::exec::{run_block, Runtime};
use crate::loader::CaseSource;
use crate::model::{Case, SourceFile};
use crate::pipeline::eval_item;
use crate::script::{CaseLocals, Environment, MiniScript, ScriptHost};
use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Leading items of a case handled before block assembly.
const COMMON_ITEMS: [&str; 2] = ["setup", "teardown"];

/// One independently reportable test: a case bound to its file of origin.
pub struct TestUnit<'a> {
    pub id: String,
    pub case: &'a Case,
}

impl<'a> TestUnit<'a> {
    pub fn bind(case: &'a Case, file: &Path) -> Self {
        Self {
            id: unit_id(&case.name, file, case.lineno),
            case,
        }
    }
}

/// Collapses every run of non-alphanumeric, non-dot characters to a single
/// underscore, yielding a stable identifier.
pub fn sanitize_case_name(name: &str) -> String {
    let collapse = Regex::new(r"[^.\w]+").expect("regex for case name sanitizer");
    collapse.replace_all(name, "_").into_owned()
}

/// Identifier encoding the originating file and line for traceability.
pub fn unit_id(name: &str, file: &Path, lineno: usize) -> String {
    format!("{}<{} +{}>", sanitize_case_name(name), file.display(), lineno)
}

/// Allow/deny regex pair applied to file paths and raw case names.
#[derive(Debug)]
pub struct NameFilter {
    only: Option<Regex>,
    except: Option<Regex>,
}

impl NameFilter {
    pub fn new(only: Option<&str>, except: Option<&str>) -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).with_context(|| format!("invalid filter pattern {pattern:?}"))
        };
        Ok(Self {
            only: only.map(compile).transpose()?,
            except: except.map(compile).transpose()?,
        })
    }

    pub fn selects(&self, name: &str) -> bool {
        if let Some(only) = &self.only {
            if !only.is_match(name) {
                return false;
            }
        }
        if let Some(except) = &self.except {
            if except.is_match(name) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Serialize)]
pub struct FileReport {
    pub path: String,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub failures: Vec<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub files: Vec<FileReport>,
}

impl RunReport {
    pub fn ok(&self) -> bool {
        self.failed == 0
    }

    fn absorb(&mut self, file: FileReport) {
        self.passed += file.passed;
        self.failed += file.failed;
        self.skipped += file.skipped;
        self.files.push(file);
    }
}

enum CaseOutcome {
    Passed,
    Skipped,
    Failed(String),
}

pub struct Harness {
    runtime: Runtime,
    host: MiniScript,
    file_filter: NameFilter,
    case_filter: NameFilter,
    flush_trailing: bool,
}

impl Harness {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            runtime: Runtime::from_command_line(&config.runtime)?,
            host: MiniScript,
            file_filter: NameFilter::new(
                config.only_file.as_deref(),
                config.except_file.as_deref(),
            )?,
            case_filter: NameFilter::new(config.only.as_deref(), config.except.as_deref())?,
            flush_trailing: config.flush_trailing,
        })
    }

    /// Runs every discovered test file sequentially and aggregates the
    /// per-file reports. Sibling files are isolated: each gets a fresh
    /// environment, and one file's case failures never abort another.
    pub fn run(&self, loader: &dyn CaseSource, root: &Path) -> Result<RunReport> {
        let mut report = RunReport::default();
        for path in discover_files(root)? {
            let display_path = path.display().to_string();
            if !self.file_filter.selects(&display_path) {
                tracing::info!("skip test file: {}", display_path);
                continue;
            }
            let source = loader.load(&path)?;
            report.absorb(self.run_file(&source)?);
        }
        Ok(report)
    }

    fn run_file(&self, source: &SourceFile) -> Result<FileReport> {
        let mut env = Environment::new();
        let locals = CaseLocals::default();
        if let Some(setup) = &source.setup {
            self.host
                .run(&mut env, &locals, setup)
                .with_context(|| format!("file setup for {}", source.path.display()))?;
        }

        let mut report = FileReport {
            path: source.path.display().to_string(),
            passed: 0,
            failed: 0,
            skipped: 0,
            failures: Vec::new(),
        };
        for case in &source.cases {
            if !self.case_filter.selects(&case.name) {
                tracing::info!("skip test case: {}", case.name);
                report.skipped += 1;
                continue;
            }
            let unit = TestUnit::bind(case, &source.path);
            match self.run_case(unit.case, &mut env) {
                CaseOutcome::Passed => {
                    tracing::info!("ok: {}", unit.id);
                    report.passed += 1;
                }
                CaseOutcome::Skipped => {
                    tracing::info!("skip empty case: {}", unit.id);
                    report.skipped += 1;
                }
                CaseOutcome::Failed(message) => {
                    tracing::error!("fail: {}: {message}", unit.id);
                    report.failures.push(format!("{}: {message}", unit.id));
                    report.failed += 1;
                }
            }
        }

        // Runs even when cases failed, so file resources are released.
        if let Some(teardown) = &source.teardown {
            self.host
                .run(&mut env, &locals, teardown)
                .with_context(|| format!("file teardown for {}", source.path.display()))?;
        }
        Ok(report)
    }

    fn run_case(&self, case: &Case, env: &mut Environment) -> CaseOutcome {
        if case.items.is_empty() {
            return CaseOutcome::Skipped;
        }
        let mut locals = CaseLocals::default();
        let mut teardowns: Vec<String> = Vec::new();
        let mut failure = self
            .run_items(case, env, &mut locals, &mut teardowns)
            .err()
            .map(|err| format!("{err:#}"));
        for code in &teardowns {
            if let Err(err) = self.host.run(env, &locals, code) {
                failure.get_or_insert_with(|| format!("case teardown: {err:#}"));
            }
        }
        match failure {
            Some(message) => CaseOutcome::Failed(message),
            None => CaseOutcome::Passed,
        }
    }

    /// Fail-fast within a case: the first error stops all further elements.
    /// Registered case teardowns still run afterwards.
    fn run_items(
        &self,
        case: &Case,
        env: &mut Environment,
        locals: &mut CaseLocals,
        teardowns: &mut Vec<String>,
    ) -> Result<()> {
        let split = case
            .items
            .iter()
            .position(|item| !COMMON_ITEMS.contains(&item.name.as_str()))
            .unwrap_or(case.items.len());

        for item in &case.items[..split] {
            let mut item = item.clone();
            eval_item(&mut item, env, locals, &self.host)
                .with_context(|| format!("{} at line {}", item.name, item.lineno))?;
            if item.name == "teardown" {
                teardowns.push(item.text());
            } else {
                self.host
                    .run(env, locals, &item.text())
                    .with_context(|| format!("setup at line {}", item.lineno))?;
            }
        }

        let mut assembler = BlockAssembler::new(self.flush_trailing);
        for item in &case.items[split..] {
            let mut item = item.clone();
            eval_item(&mut item, env, locals, &self.host)
                .with_context(|| format!("{} at line {}", item.name, item.lineno))?;
            for element in assembler.feed(item) {
                self.dispatch(element, env, locals)?;
            }
        }
        if let Some(element) = assembler.finish() {
            self.dispatch(element, env, locals)?;
        }
        Ok(())
    }

    fn dispatch(
        &self,
        element: Element,
        env: &mut Environment,
        locals: &mut CaseLocals,
    ) -> Result<()> {
        match element {
            Element::Block(block) => run_block(&self.runtime, &block, locals)
                .with_context(|| format!("block at line {}", block.lineno())),
            Element::Single(item) => asserts::apply(&item, env, locals, &self.host)
                .with_context(|| format!("{} at line {}", item.name, item.lineno)),
        }
    }
}

/// Gathers `.zt` files under the root (or the root itself when it is a
/// file), sorted for deterministic execution order.
pub fn discover_files(root: &Path) -> Result<Vec<PathBuf>> {
    if root.is_file() {
        if is_zt_file(root) {
            return Ok(vec![root.to_path_buf()]);
        }
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    collect_zt_files(root, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_zt_files(root: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    if !root.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(root).with_context(|| format!("read {}", root.display()))? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_zt_files(&path, files)?;
        } else if path.is_file() && is_zt_file(&path) {
            files.push(path);
        }
    }
    Ok(())
}

fn is_zt_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "zt")
}
