//! Zarr v2 directory store.
//!
//! Groups are directories holding `.zgroup`, arrays hold `.zarray`, and chunk
//! keys map to nested files through the `/` dimension separator.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::{ArrayMeta, ArrayStore, StoreError, StoreResult};

const ZGROUP: &str = ".zgroup";
const ZARRAY: &str = ".zarray";

#[derive(Serialize)]
struct GroupMeta {
    zarr_format: u32,
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn write_json<M: Serialize>(path: &Path, meta: &M) -> StoreResult<()> {
    let json = serde_json::to_string_pretty(meta).map_err(|source| StoreError::Metadata {
        path: path.display().to_string(),
        source,
    })?;
    fs::write(path, json).map_err(io_err(path))
}

#[derive(Debug, Clone)]
pub struct FilesystemStore {
    root: PathBuf,
}

impl FilesystemStore {
    /// Opens `root`, creating it as a root group if needed.
    pub fn create(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(io_err(&root))?;
        let zgroup = root.join(ZGROUP);
        if !zgroup.exists() {
            write_json(&zgroup, &GroupMeta { zarr_format: 2 })?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of a node. Paths never leave the root.
    fn node_dir(&self, path: &str) -> StoreResult<PathBuf> {
        let mut dir = self.root.clone();
        for part in path.split('/').filter(|part| !part.is_empty()) {
            if part == "." || part == ".." {
                return Err(StoreError::InvalidPath {
                    path: path.to_string(),
                });
            }
            dir.push(part);
        }
        Ok(dir)
    }

    /// Prepares an empty directory for a new node.
    fn reset_dir(&self, path: &str, overwrite: bool) -> StoreResult<PathBuf> {
        let dir = self.node_dir(path)?;
        let exists = dir.join(ZGROUP).exists() || dir.join(ZARRAY).exists();
        if exists && !overwrite {
            return Err(StoreError::AlreadyExists {
                path: path.to_string(),
            });
        }
        if exists && dir != self.root {
            tracing::debug!(path = %dir.display(), "Replacing existing node");
            fs::remove_dir_all(&dir).map_err(io_err(&dir))?;
        }
        fs::create_dir_all(&dir).map_err(io_err(&dir))?;
        Ok(dir)
    }
}

impl ArrayStore for FilesystemStore {
    fn create_group(&self, path: &str, overwrite: bool) -> StoreResult<()> {
        let dir = self.reset_dir(path, overwrite)?;
        write_json(&dir.join(ZGROUP), &GroupMeta { zarr_format: 2 })
    }

    fn create_array(&self, path: &str, meta: &ArrayMeta, overwrite: bool) -> StoreResult<()> {
        let dir = self.reset_dir(path, overwrite)?;
        write_json(&dir.join(ZARRAY), meta)
    }

    fn open_array(&self, path: &str) -> StoreResult<ArrayMeta> {
        let file = self.node_dir(path)?.join(ZARRAY);
        let json = match fs::read_to_string(&file) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    path: path.to_string(),
                })
            }
            Err(e) => return Err(io_err(&file)(e)),
        };
        serde_json::from_str(&json).map_err(|source| StoreError::Metadata {
            path: file.display().to_string(),
            source,
        })
    }

    fn read_chunk(&self, path: &str, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let file = self.node_dir(path)?.join(key);
        match fs::read(&file) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(&file)(e)),
        }
    }

    fn write_chunk(&self, path: &str, key: &str, bytes: &[u8]) -> StoreResult<()> {
        let file = self.node_dir(path)?.join(key);
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        fs::write(&file, bytes).map_err(io_err(&file))
    }

    fn has_chunk(&self, path: &str, key: &str) -> StoreResult<bool> {
        Ok(self.node_dir(path)?.join(key).is_file())
    }

    fn location(&self, path: &str) -> String {
        match self.node_dir(path) {
            Ok(dir) => dir.display().to_string(),
            Err(_) => path.to_string(),
        }
    }
}
