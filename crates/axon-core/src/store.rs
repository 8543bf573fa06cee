use std::fs;
use std::io::{self, BufRead};
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use log::debug;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::error::{AxonError, Result};
use crate::model::normalize_note_path;

/// Scan paths stream files above this size line by line instead of
/// buffering them whole.
pub const LARGE_FILE_THRESHOLD: u64 = 5 * 1024 * 1024;

/// Directories never listed: dot-prefixed (app state, trash) plus well-known
/// noise.
const EXCLUDED_DIRS: &[&str] = &["node_modules"];

#[derive(Debug, Clone, Copy)]
pub struct NoteMetadata {
    pub size: u64,
    pub created: Option<SystemTime>,
    pub modified: Option<SystemTime>,
}

/// The sole I/O boundary: resolves logical note paths against the vault root
/// and performs raw reads, writes and listings. Owns no caching or graph
/// state.
pub struct NoteStore {
    root: PathBuf,
}

impl NoteStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a logical note path to an absolute location. Rejects inputs
    /// that would escape the root.
    fn absolute(&self, note_path: &str) -> Result<PathBuf> {
        let normalized = normalize_note_path(note_path);
        if normalized == ".md" {
            return Err(AxonError::InvalidTarget {
                target: note_path.to_string(),
            });
        }
        for component in Path::new(&normalized).components() {
            match component {
                Component::Normal(_) => {}
                _ => {
                    return Err(AxonError::InvalidTarget {
                        target: note_path.to_string(),
                    })
                }
            }
        }
        Ok(self.root.join(normalized))
    }

    pub fn exists(&self, note_path: &str) -> bool {
        self.absolute(note_path)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }

    pub fn stat(&self, note_path: &str) -> Result<NoteMetadata> {
        let path = self.absolute(note_path)?;
        let metadata = fs::metadata(&path).map_err(|err| AxonError::io(&path, err))?;
        Ok(NoteMetadata {
            size: metadata.len(),
            created: metadata.created().ok(),
            modified: metadata.modified().ok(),
        })
    }

    pub fn read(&self, note_path: &str) -> Result<String> {
        let path = self.absolute(note_path)?;
        fs::read_to_string(&path).map_err(|err| AxonError::io(&path, err))
    }

    /// Incremental line reader for text scans over large files.
    pub fn read_lines(
        &self,
        note_path: &str,
    ) -> Result<impl Iterator<Item = io::Result<String>>> {
        let path = self.absolute(note_path)?;
        let file = fs::File::open(&path).map_err(|err| AxonError::io(&path, err))?;
        Ok(io::BufReader::new(file).lines())
    }

    /// Streaming SHA-256 of a note's content; the file is never buffered
    /// whole.
    pub fn content_hash(&self, note_path: &str) -> Result<String> {
        let path = self.absolute(note_path)?;
        let mut file = fs::File::open(&path).map_err(|err| AxonError::io(&path, err))?;
        let mut hasher = Sha256::new();
        io::copy(&mut file, &mut hasher).map_err(|err| AxonError::io(&path, err))?;
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Write `content`, creating parent directories as needed.
    pub fn write(&self, note_path: &str, content: &str) -> Result<()> {
        let path = self.absolute(note_path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AxonError::io(parent, err))?;
        }
        fs::write(&path, content).map_err(|err| AxonError::io(&path, err))
    }

    pub fn delete(&self, note_path: &str) -> Result<()> {
        let path = self.absolute(note_path)?;
        fs::remove_file(&path).map_err(|err| AxonError::io(&path, err))
    }

    pub fn rename(&self, old_path: &str, new_path: &str) -> Result<()> {
        let old_abs = self.absolute(old_path)?;
        let new_abs = self.absolute(new_path)?;
        if !old_abs.is_file() {
            return Err(AxonError::NotFound {
                path: normalize_note_path(old_path),
            });
        }
        if new_abs.exists() {
            return Err(AxonError::AlreadyExists {
                path: normalize_note_path(new_path),
            });
        }
        if let Some(parent) = new_abs.parent() {
            fs::create_dir_all(parent).map_err(|err| AxonError::io(parent, err))?;
        }
        fs::rename(&old_abs, &new_abs).map_err(|err| AxonError::io(&old_abs, err))
    }

    /// List every note under the root (or `subdir`), as sorted logical
    /// paths. Dot-prefixed and trash/system directories are pruned.
    pub fn list(&self, subdir: Option<&str>) -> Result<Vec<String>> {
        let base = match subdir {
            Some(dir) => self.root.join(dir),
            None => self.root.clone(),
        };
        if !base.is_dir() {
            return Ok(Vec::new());
        }

        let mut notes = Vec::new();
        let walker = WalkDir::new(&base)
            .follow_links(true)
            .into_iter()
            .filter_entry(|entry| {
                let name = entry.file_name().to_string_lossy();
                let excluded = entry.depth() > 0
                    && entry.file_type().is_dir()
                    && (name.starts_with('.') || EXCLUDED_DIRS.contains(&name.as_ref()));
                !excluded
            });

        for entry in walker.filter_map(|entry| entry.ok()) {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().map(|ext| ext == "md") != Some(true) {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if name.starts_with('.') {
                continue;
            }
            match path.strip_prefix(&self.root) {
                Ok(relative) => {
                    let logical = relative.to_string_lossy().replace('\\', "/");
                    notes.push(logical);
                }
                Err(_) => debug!("skipping entry outside root: {}", path.display()),
            }
        }

        notes.sort();
        Ok(notes)
    }
}
