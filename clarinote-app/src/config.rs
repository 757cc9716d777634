//! Runtime configuration for the CLI.

use clarinote_json::paths::StorePaths;
use clarinote_json::DEFAULT_MAX_BACKUPS;
use std::env;
use std::path::PathBuf;

use crate::cli::opts::Cli;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Store file holding every logical key
    pub data_file: PathBuf,
    /// Directory of timestamped backups
    pub backups_dir: PathBuf,
    /// Number of backups kept
    pub max_backups: usize,
    /// Fallback log filter when RUST_LOG is unset
    pub log_level: String,
}

impl Config {
    /// Flags win over `CLARINOTE_*` environment variables, which win over the
    /// platform data directory.
    pub fn load(cli: &Cli) -> Self {
        Self::resolve(cli, |name| env::var(name).ok())
    }

    fn resolve(cli: &Cli, var: impl Fn(&str) -> Option<String>) -> Self {
        let paths = match cli
            .data_file
            .clone()
            .or_else(|| var("CLARINOTE_DATA_FILE").map(PathBuf::from))
        {
            Some(file) => StorePaths::for_file(file),
            None => StorePaths::platform(),
        };
        let data_file = paths.file;

        let backups_dir = cli
            .backups_dir
            .clone()
            .or_else(|| var("CLARINOTE_BACKUPS_DIR").map(PathBuf::from))
            .unwrap_or(paths.backups);

        let max_backups = var("CLARINOTE_MAX_BACKUPS")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_MAX_BACKUPS);

        let log_level = cli
            .log_level
            .clone()
            .or_else(|| var("CLARINOTE_LOG"))
            .unwrap_or_else(|| "warn".to_string());

        Self {
            data_file,
            backups_dir,
            max_backups,
            log_level,
        }
    }
}
