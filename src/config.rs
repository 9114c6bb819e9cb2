//! CLI argument parsing merged with `ZTEST_*` environment variables.
//!
//! Flags win over environment variables; the environment contract matches
//! what CI jobs export: `ZTEST_LUA`, `ZTEST_DIR`, `ZTEST_RUN_ONLY_FILE`,
//! `ZTEST_RUN_EXCEPT_FILE`, `ZTEST_RUN_ONLY`, `ZTEST_RUN_EXCEPT`.
use clap::Parser;
use std::path::PathBuf;

pub const DEFAULT_RUNTIME: &str = "lua";
pub const DEFAULT_TEST_DIR: &str = "tests";

#[derive(Parser, Debug, Default)]
#[command(
    name = "ztest",
    version,
    about = "Literate test harness driving an external Lua runtime",
    after_help = "Environment:\n  ZTEST_LUA              Runtime command line (default: lua)\n  ZTEST_DIR              Test root directory (default: tests)\n  ZTEST_RUN_ONLY_FILE    Only run files whose path matches this pattern\n  ZTEST_RUN_EXCEPT_FILE  Skip files whose path matches this pattern\n  ZTEST_RUN_ONLY         Only run cases whose name matches this pattern\n  ZTEST_RUN_EXCEPT       Skip cases whose name matches this pattern\n  ZTEST_LOG              Log filter (default: info)"
)]
pub struct RootArgs {
    /// Runtime command line used to execute generated driver programs
    #[arg(long, value_name = "CMD")]
    pub runtime: Option<String>,

    /// Root directory (or single file) of .zt test sources
    #[arg(long, value_name = "PATH")]
    pub dir: Option<PathBuf>,

    /// Only run files whose path matches this pattern
    #[arg(long, value_name = "REGEX")]
    pub only_file: Option<String>,

    /// Skip files whose path matches this pattern
    #[arg(long, value_name = "REGEX")]
    pub except_file: Option<String>,

    /// Only run cases whose name matches this pattern
    #[arg(long, value_name = "REGEX")]
    pub only: Option<String>,

    /// Skip cases whose name matches this pattern
    #[arg(long, value_name = "REGEX")]
    pub except: Option<String>,

    /// Also run the otherwise-dropped trailing block of each case
    #[arg(long)]
    pub flush_trailing: bool,

    /// Emit a machine-readable JSON report on stdout
    #[arg(long)]
    pub json: bool,
}

/// Resolved configuration for one harness run.
#[derive(Debug)]
pub struct Config {
    pub runtime: String,
    pub root: PathBuf,
    pub only_file: Option<String>,
    pub except_file: Option<String>,
    pub only: Option<String>,
    pub except: Option<String>,
    pub flush_trailing: bool,
    pub json: bool,
}

impl Config {
    pub fn from_args(args: RootArgs) -> Self {
        let env = |key: &str| std::env::var(key).ok().filter(|value| !value.is_empty());
        Self {
            runtime: args
                .runtime
                .or_else(|| env("ZTEST_LUA"))
                .unwrap_or_else(|| DEFAULT_RUNTIME.to_string()),
            root: args
                .dir
                .or_else(|| env("ZTEST_DIR").map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TEST_DIR)),
            only_file: args.only_file.or_else(|| env("ZTEST_RUN_ONLY_FILE")),
            except_file: args.except_file.or_else(|| env("ZTEST_RUN_EXCEPT_FILE")),
            only: args.only.or_else(|| env("ZTEST_RUN_ONLY")),
            except: args.except.or_else(|| env("ZTEST_RUN_EXCEPT")),
            flush_trailing: args.flush_trailing,
            json: args.json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_fill_the_config() {
        let config = Config::from_args(RootArgs {
            runtime: Some("cat".to_string()),
            dir: Some(PathBuf::from("/tmp/suite")),
            only: Some("^foo".to_string()),
            ..RootArgs::default()
        });
        assert_eq!(config.runtime, "cat");
        assert_eq!(config.root, PathBuf::from("/tmp/suite"));
        assert_eq!(config.only.as_deref(), Some("^foo"));
        assert!(!config.flush_trailing);
    }

    #[test]
    fn defaults_apply_when_flags_are_absent() {
        // Environment fallbacks are covered by the integration test; unit
        // tests avoid mutating process-global state.
        let config = Config::from_args(RootArgs {
            runtime: Some(DEFAULT_RUNTIME.to_string()),
            dir: Some(PathBuf::from(DEFAULT_TEST_DIR)),
            ..RootArgs::default()
        });
        assert_eq!(config.runtime, "lua");
        assert_eq!(config.root, PathBuf::from("tests"));
        assert!(config.only_file.is_none());
    }
}
