//! Table persistence.

use std::fs;
use std::io;
use std::path::PathBuf;

use parking_lot::Mutex;
use thiserror::Error;

use super::RoiTable;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("Failed to write table '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize table '{name}': {source}")]
    Serialize {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Persists the ROI tables of a scene.
pub trait TableWriter: Send + Sync {
    fn write_table(&self, scene_path: &str, table: &RoiTable) -> Result<(), TableError>;
}

/// Writes `<root>/<scene>/tables/<name>.json`.
#[derive(Debug, Clone)]
pub struct JsonTableWriter {
    root: PathBuf,
}

impl JsonTableWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn table_path(&self, scene_path: &str, name: &str) -> PathBuf {
        self.root
            .join(scene_path)
            .join("tables")
            .join(format!("{name}.json"))
    }
}

impl TableWriter for JsonTableWriter {
    fn write_table(&self, scene_path: &str, table: &RoiTable) -> Result<(), TableError> {
        let path = self.table_path(scene_path, &table.name);
        let json = serde_json::to_string_pretty(table).map_err(|source| TableError::Serialize {
            name: table.name.clone(),
            source,
        })?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|source| TableError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        fs::write(&path, json).map_err(|source| TableError::Io { path, source })
    }
}

/// Keeps written tables in memory, keyed by scene path.
#[derive(Debug, Default)]
pub struct MemoryTableWriter {
    tables: Mutex<Vec<(String, RoiTable)>>,
}

impl MemoryTableWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tables written for `scene_path`, in write order.
    pub fn tables(&self, scene_path: &str) -> Vec<RoiTable> {
        self.tables
            .lock()
            .iter()
            .filter(|(scene, _)| scene == scene_path)
            .map(|(_, table)| table.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tables.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.lock().is_empty()
    }
}

impl TableWriter for MemoryTableWriter {
    fn write_table(&self, scene_path: &str, table: &RoiTable) -> Result<(), TableError> {
        let mut tables = self.tables.lock();
        tables.retain(|(scene, t)| !(scene == scene_path && t.name == table.name));
        tables.push((scene_path.to_string(), table.clone()));
        Ok(())
    }
}
