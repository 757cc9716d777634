use directories::ProjectDirs;
use std::path::{Path, PathBuf};

const STORE_FILE: &str = "clarinote.json";
const BACKUPS_DIR: &str = "backups";

/// Where the store file and its backups live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorePaths {
    pub file: PathBuf,
    pub backups: PathBuf,
}

impl StorePaths {
    /// Platform data dir, or the working directory when there is no home.
    pub fn platform() -> Self {
        let root = ProjectDirs::from("com", "clarinote", "ClariNote")
            .map(|pd| pd.data_dir().to_path_buf())
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        Self::in_dir(&root)
    }

    pub fn in_dir(root: &Path) -> Self {
        Self {
            file: root.join(STORE_FILE),
            backups: root.join(BACKUPS_DIR),
        }
    }

    /// A custom store file keeps its backups next to it.
    pub fn for_file(file: PathBuf) -> Self {
        let backups = file
            .parent()
            .map_or_else(|| PathBuf::from(BACKUPS_DIR), |p| p.join(BACKUPS_DIR));
        Self { file, backups }
    }
}
