//! In-process store for tests and embedding.

use hashbrown::HashMap;
use parking_lot::RwLock;

use super::{ArrayMeta, ArrayStore, StoreError, StoreResult};

#[derive(Debug)]
enum Node {
    Group,
    Array {
        meta: ArrayMeta,
        chunks: HashMap<String, Vec<u8>>,
    },
}

/// Keeps every node and chunk in a map behind a read-write lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    nodes: RwLock<HashMap<String, Node>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_group(&self, path: &str) -> bool {
        matches!(self.nodes.read().get(path), Some(Node::Group))
    }

    /// Paths of all arrays, sorted.
    pub fn array_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .nodes
            .read()
            .iter()
            .filter(|(_, node)| matches!(node, Node::Array { .. }))
            .map(|(path, _)| path.clone())
            .collect();
        paths.sort();
        paths
    }

    /// Number of chunks written to the array at `path`.
    pub fn chunk_count(&self, path: &str) -> usize {
        match self.nodes.read().get(path) {
            Some(Node::Array { chunks, .. }) => chunks.len(),
            _ => 0,
        }
    }

    fn insert(&self, path: &str, node: Node, overwrite: bool) -> StoreResult<()> {
        let mut nodes = self.nodes.write();
        if nodes.contains_key(path) {
            if !overwrite {
                return Err(StoreError::AlreadyExists {
                    path: path.to_string(),
                });
            }
            let prefix = format!("{path}/");
            nodes.retain(|key, _| key != path && !key.starts_with(&prefix));
        }
        nodes.insert(path.to_string(), node);
        Ok(())
    }
}

impl ArrayStore for MemoryStore {
    fn create_group(&self, path: &str, overwrite: bool) -> StoreResult<()> {
        self.insert(path, Node::Group, overwrite)
    }

    fn create_array(&self, path: &str, meta: &ArrayMeta, overwrite: bool) -> StoreResult<()> {
        self.insert(
            path,
            Node::Array {
                meta: meta.clone(),
                chunks: HashMap::new(),
            },
            overwrite,
        )
    }

    fn open_array(&self, path: &str) -> StoreResult<ArrayMeta> {
        match self.nodes.read().get(path) {
            Some(Node::Array { meta, .. }) => Ok(meta.clone()),
            _ => Err(StoreError::NotFound {
                path: path.to_string(),
            }),
        }
    }

    fn read_chunk(&self, path: &str, key: &str) -> StoreResult<Option<Vec<u8>>> {
        match self.nodes.read().get(path) {
            Some(Node::Array { chunks, .. }) => Ok(chunks.get(key).cloned()),
            _ => Err(StoreError::NotFound {
                path: path.to_string(),
            }),
        }
    }

    fn write_chunk(&self, path: &str, key: &str, bytes: &[u8]) -> StoreResult<()> {
        match self.nodes.write().get_mut(path) {
            Some(Node::Array { chunks, .. }) => {
                chunks.insert(key.to_string(), bytes.to_vec());
                Ok(())
            }
            _ => Err(StoreError::NotFound {
                path: path.to_string(),
            }),
        }
    }

    fn has_chunk(&self, path: &str, key: &str) -> StoreResult<bool> {
        match self.nodes.read().get(path) {
            Some(Node::Array { chunks, .. }) => Ok(chunks.contains_key(key)),
            _ => Err(StoreError::NotFound {
                path: path.to_string(),
            }),
        }
    }

    fn location(&self, path: &str) -> String {
        format!("memory://{path}")
    }
}
