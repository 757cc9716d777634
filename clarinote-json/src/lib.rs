use chrono::{DateTime, Utc};
use clarinote_core::{CoreError, StoreBackend};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tempfile::NamedTempFile;

pub mod paths;

const FILE_VERSION: u32 = 1;
pub const DEFAULT_MAX_BACKUPS: usize = 10;

#[derive(Clone, Serialize, Deserialize)]
struct FileImage {
    version: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    /// Raw JSON text per key; each value is parsed only when read.
    entries: BTreeMap<String, String>,
}

impl FileImage {
    fn empty() -> Self {
        let now = Utc::now();
        Self {
            version: FILE_VERSION,
            created_at: now,
            updated_at: now,
            entries: BTreeMap::new(),
        }
    }
}

/// In-memory copy of the file plus the modification time it was taken at.
struct Cached {
    image: FileImage,
    mtime: Option<SystemTime>,
}

/// Single-file store backend. The whole image is rewritten atomically on each
/// write and a timestamped copy is kept in the backups directory.
///
/// Another process may write the same file. Reads and writes first pick up
/// a newer file, so concurrent writers only collide on the same key.
pub struct JsonFileBackend {
    path: PathBuf,
    backups_dir: PathBuf,
    max_backups: usize,
    cache: RwLock<Cached>,
}

impl JsonFileBackend {
    pub fn open_default() -> Result<Self, CoreError> {
        let paths = paths::StorePaths::platform();
        Self::open_with(paths.file, paths.backups, DEFAULT_MAX_BACKUPS)
    }

    pub fn open_with(path: PathBuf, backups_dir: PathBuf, max_backups: usize) -> Result<Self, CoreError> {
        ensure_parent_dirs(&path)?;
        ensure_dir(&backups_dir)?;
        let image = load_or_init(&path)?;
        let mtime = modified(&path);
        Ok(Self {
            path,
            backups_dir,
            max_backups: max_backups.max(1),
            cache: RwLock::new(Cached { image, mtime }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backups_dir(&self) -> &Path {
        &self.backups_dir
    }

    /// Reloads the image if the file changed since we last saw it. A file
    /// that no longer parses is left alone and the cached image kept.
    fn refresh(&self, cached: &mut Cached) {
        let mtime = modified(&self.path);
        if mtime.is_none() || mtime == cached.mtime {
            return;
        }
        let parsed = fs::read_to_string(&self.path)
            .map_err(io_err)
            .and_then(|text| serde_json::from_str::<FileImage>(&text).map_err(io_err));
        match parsed {
            Ok(image) => {
                tracing::debug!(path = %self.path.display(), "store file changed on disk, reloaded");
                cached.image = image;
                cached.mtime = mtime;
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring unreadable store file change");
            }
        }
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn io_err(e: impl std::fmt::Display) -> CoreError {
    CoreError::Storage(e.to_string())
}

fn ensure_parent_dirs(path: &Path) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    Ok(())
}

fn ensure_dir(path: &Path) -> Result<(), CoreError> {
    fs::create_dir_all(path).map_err(io_err)
}

/// A file that cannot be parsed is moved aside and replaced by an empty image.
fn load_or_init(path: &Path) -> Result<FileImage, CoreError> {
    if !path.exists() {
        let img = FileImage::empty();
        write_atomic(path, &img).map_err(io_err)?;
        return Ok(img);
    }
    let text = fs::read_to_string(path).map_err(io_err)?;
    match serde_json::from_str::<FileImage>(&text) {
        Ok(img) => Ok(img),
        Err(e) => {
            let ts = Utc::now().format("%Y%m%d-%H%M%S");
            let aside = path.with_extension(format!("corrupt-{ts}"));
            tracing::warn!(path = %path.display(), aside = %aside.display(), error = %e, "store file is corrupt, starting empty");
            fs::rename(path, &aside).map_err(io_err)?;
            let img = FileImage::empty();
            write_atomic(path, &img).map_err(io_err)?;
            Ok(img)
        }
    }
}

fn write_atomic(path: &Path, img: &FileImage) -> Result<(), std::io::Error> {
    let json = serde_json::to_vec_pretty(img)?;
    persist_bytes(path, &json)
}

fn persist_bytes(path: &Path, bytes: &[u8]) -> Result<(), std::io::Error> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn write_with_backup(path: &Path, backups_dir: &Path, max_backups: usize, img: &FileImage) -> Result<(), std::io::Error> {
    let json = serde_json::to_vec_pretty(img)?;
    persist_bytes(path, &json)?;

    let ts = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let backup_path = backups_dir.join(format!("clarinote-{ts}.json"));
    persist_bytes(&backup_path, &json)?;

    rotate_backups(backups_dir, max_backups)
}

fn rotate_backups(dir: &Path, keep: usize) -> Result<(), std::io::Error> {
    let mut entries: Vec<_> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("json"))
        .collect();
    // Names embed the timestamp, so name order is age order.
    entries.sort_by_key(|e| e.file_name());
    if entries.len() > keep {
        for e in &entries[0..entries.len() - keep] {
            let _ = fs::remove_file(e.path());
        }
    }
    Ok(())
}

impl StoreBackend for JsonFileBackend {
    fn read(&self, key: &str) -> Result<Option<String>, CoreError> {
        let mut cached = self.cache.write();
        self.refresh(&mut cached);
        Ok(cached.image.entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), CoreError> {
        // The lock is held through the file write so images land in order.
        let mut cached = self.cache.write();
        self.refresh(&mut cached);
        let mut next = cached.image.clone();
        next.entries.insert(key.to_string(), value.to_string());
        next.updated_at = Utc::now();
        write_with_backup(&self.path, &self.backups_dir, self.max_backups, &next).map_err(io_err)?;
        cached.image = next;
        cached.mtime = modified(&self.path);
        Ok(())
    }
}
