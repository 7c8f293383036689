//! Chunked N-dimensional array storage in the Zarr v2 layout.
//!
//! An [`ArrayStore`] persists groups, array metadata and raw chunk bytes.
//! [`ChunkedArray`] adds typed region reads and writes on top of any store.


pub mod filesystem;
pub mod memory;

pub use filesystem::FilesystemStore;
pub use memory::MemoryStore;

use std::io;
use std::marker::PhantomData;
use std::ops::Range;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pixel::{DataType, Pixel};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid array metadata at '{path}': {source}")]
    Metadata {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Node '{path}' already exists and overwrite is disabled")]
    AlreadyExists { path: String },

    #[error("No array at '{path}'")]
    NotFound { path: String },

    #[error("Node path '{path}' has a '.' or '..' component")]
    InvalidPath { path: String },

    #[error("Array '{path}' holds {actual} data, requested {expected}")]
    DataTypeMismatch {
        path: String,
        expected: DataType,
        actual: DataType,
    },

    #[error("Region {region:?} does not fit array '{path}' of shape {shape:?}")]
    RegionOutOfBounds {
        path: String,
        region: Vec<Range<u64>>,
        shape: Vec<u64>,
    },

    #[error("Buffer holds {actual} elements, region needs {expected}")]
    BufferLength { expected: usize, actual: usize },

    #[error("Chunk '{key}' of array '{path}' has {actual} bytes, expected {expected}")]
    CorruptChunk {
        path: String,
        key: String,
        expected: usize,
        actual: usize,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

fn default_separator() -> String {
    ".".to_string()
}

/// Contents of a `.zarray` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayMeta {
    pub zarr_format: u32,
    pub shape: Vec<u64>,
    pub chunks: Vec<u64>,
    pub dtype: DataType,
    pub compressor: Option<serde_json::Value>,
    pub fill_value: serde_json::Value,
    pub order: String,
    pub filters: Option<Vec<serde_json::Value>>,
    #[serde(default = "default_separator")]
    pub dimension_separator: String,
}

impl ArrayMeta {
    /// Uncompressed C-order array with zero fill and `/`-separated chunk keys.
    pub fn new(shape: Vec<u64>, chunks: Vec<u64>, dtype: DataType) -> Self {
        assert_eq!(
            shape.len(),
            chunks.len(),
            "chunk rank must equal array rank"
        );
        assert!(chunks.iter().all(|&c| c > 0), "chunk sizes must be > 0");
        Self {
            zarr_format: 2,
            shape,
            chunks,
            dtype,
            compressor: None,
            fill_value: serde_json::Value::from(0),
            order: "C".to_string(),
            filters: None,
            dimension_separator: "/".to_string(),
        }
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Elements per chunk. Edge chunks are stored at full size too.
    pub fn chunk_len(&self) -> usize {
        self.chunks.iter().product::<u64>() as usize
    }

    /// Number of chunks along each axis.
    pub fn chunk_grid_shape(&self) -> Vec<u64> {
        self.shape
            .iter()
            .zip(&self.chunks)
            .map(|(&s, &c)| s.div_ceil(c))
            .collect()
    }

    pub fn chunk_key(&self, index: &[u64]) -> String {
        index
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(&self.dimension_separator)
    }

    /// Full chunk extent, possibly reaching past the array edge.
    pub fn chunk_space(&self, index: &[u64]) -> Region {
        Region::new(
            index
                .iter()
                .zip(&self.chunks)
                .map(|(&i, &c)| i * c..(i + 1) * c)
                .collect(),
        )
    }

    /// Chunk extent clipped to the array shape.
    pub fn chunk_region(&self, index: &[u64]) -> Region {
        let space = self.chunk_space(index);
        Region::new(
            space
                .ranges
                .iter()
                .zip(&self.shape)
                .map(|(r, &s)| r.start..r.end.min(s))
                .collect(),
        )
    }

    /// Indices of every chunk that intersects `region`, in C order.
    pub fn chunk_indices(&self, region: &Region) -> Vec<Vec<u64>> {
        if region.is_empty() {
            return Vec::new();
        }
        let bounds: Vec<Range<u64>> = region
            .ranges
            .iter()
            .zip(&self.chunks)
            .map(|(r, &c)| r.start / c..(r.end - 1) / c + 1)
            .collect();
        Region::new(bounds).points()
    }

    pub fn contains(&self, region: &Region) -> bool {
        region.rank() == self.rank()
            && region
                .ranges
                .iter()
                .zip(&self.shape)
                .all(|(r, &s)| r.start <= r.end && r.end <= s)
    }
}

/// Axis-aligned box of array indices, one half-open range per axis.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Region {
    pub ranges: Vec<Range<u64>>,
}

impl Region {
    pub fn new(ranges: Vec<Range<u64>>) -> Self {
        Self { ranges }
    }

    pub fn full(shape: &[u64]) -> Self {
        Self::new(shape.iter().map(|&s| 0..s).collect())
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.ranges.len()
    }

    pub fn shape(&self) -> Vec<u64> {
        self.ranges
            .iter()
            .map(|r| r.end.saturating_sub(r.start))
            .collect()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.shape().iter().product::<u64>() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.iter().any(|r| r.start >= r.end)
    }

    pub fn intersect(&self, other: &Region) -> Option<Region> {
        debug_assert_eq!(self.rank(), other.rank());
        let ranges: Vec<Range<u64>> = self
            .ranges
            .iter()
            .zip(&other.ranges)
            .map(|(a, b)| a.start.max(b.start)..a.end.min(b.end))
            .collect();
        let region = Region::new(ranges);
        (!region.is_empty()).then_some(region)
    }

    /// Every index in the region, last axis fastest.
    pub fn points(&self) -> Vec<Vec<u64>> {
        if self.is_empty() {
            return Vec::new();
        }
        let mut points = Vec::with_capacity(self.len());
        let mut current: Vec<u64> = self.ranges.iter().map(|r| r.start).collect();
        loop {
            points.push(current.clone());
            if !advance(&mut current, &self.ranges, self.rank()) {
                return points;
            }
        }
    }
}

/// Odometer step over the first `axes` axes. Returns false once exhausted.
fn advance(current: &mut [u64], ranges: &[Range<u64>], axes: usize) -> bool {
    for axis in (0..axes).rev() {
        current[axis] += 1;
        if current[axis] < ranges[axis].end {
            return true;
        }
        current[axis] = ranges[axis].start;
    }
    false
}

fn strides(shape: &[u64]) -> Vec<usize> {
    let mut strides = vec![1usize; shape.len()];
    for axis in (0..shape.len().saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1] * shape[axis + 1] as usize;
    }
    strides
}

fn offset_in(point: &[u64], region: &Region, strides: &[usize]) -> usize {
    point
        .iter()
        .zip(&region.ranges)
        .zip(strides)
        .map(|((&p, r), &s)| (p - r.start) as usize * s)
        .sum()
}

/// Copies `window` (absolute indices) from a C-order buffer covering `src_region`
/// into a C-order buffer covering `dst_region`.
pub fn copy_window<T: Copy>(
    src: &[T],
    src_region: &Region,
    dst: &mut [T],
    dst_region: &Region,
    window: &Region,
) {
    let rank = window.rank();
    if rank == 0 || window.is_empty() {
        return;
    }
    let src_strides = strides(&src_region.shape());
    let dst_strides = strides(&dst_region.shape());
    let run = (window.ranges[rank - 1].end - window.ranges[rank - 1].start) as usize;

    let mut current: Vec<u64> = window.ranges.iter().map(|r| r.start).collect();
    loop {
        let s = offset_in(&current, src_region, &src_strides);
        let d = offset_in(&current, dst_region, &dst_strides);
        dst[d..d + run].copy_from_slice(&src[s..s + run]);
        if !advance(&mut current, &window.ranges, rank - 1) {
            return;
        }
    }
}

/// Persistence backend for groups, array metadata and chunk bytes.
///
/// Paths are `/`-separated and relative to the store root. Distinct chunks may
/// be written concurrently.
pub trait ArrayStore: Send + Sync {
    fn create_group(&self, path: &str, overwrite: bool) -> StoreResult<()>;

    fn create_array(&self, path: &str, meta: &ArrayMeta, overwrite: bool) -> StoreResult<()>;

    fn open_array(&self, path: &str) -> StoreResult<ArrayMeta>;

    /// Raw chunk bytes, `None` when the chunk was never written.
    fn read_chunk(&self, path: &str, key: &str) -> StoreResult<Option<Vec<u8>>>;

    fn write_chunk(&self, path: &str, key: &str, bytes: &[u8]) -> StoreResult<()>;

    fn has_chunk(&self, path: &str, key: &str) -> StoreResult<bool> {
        Ok(self.read_chunk(path, key)?.is_some())
    }

    /// Human-readable location of `path`, reported in scene outputs.
    fn location(&self, path: &str) -> String;
}

/// Typed view of one array in a store.
pub struct ChunkedArray<'s, T> {
    store: &'s dyn ArrayStore,
    path: String,
    meta: ArrayMeta,
    _pixel: PhantomData<T>,
}

impl<T> std::fmt::Debug for ChunkedArray<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedArray")
            .field("path", &self.path)
            .field("shape", &self.meta.shape)
            .field("chunks", &self.meta.chunks)
            .field("dtype", &self.meta.dtype)
            .finish()
    }
}

impl<'s, T: Pixel> ChunkedArray<'s, T> {
    pub fn create(
        store: &'s dyn ArrayStore,
        path: &str,
        shape: Vec<u64>,
        chunks: Vec<u64>,
        overwrite: bool,
    ) -> StoreResult<Self> {
        let meta = ArrayMeta::new(shape, chunks, T::DATA_TYPE);
        store.create_array(path, &meta, overwrite)?;
        Ok(Self {
            store,
            path: path.to_string(),
            meta,
            _pixel: PhantomData,
        })
    }

    pub fn open(store: &'s dyn ArrayStore, path: &str) -> StoreResult<Self> {
        let meta = store.open_array(path)?;
        if meta.dtype != T::DATA_TYPE {
            return Err(StoreError::DataTypeMismatch {
                path: path.to_string(),
                expected: T::DATA_TYPE,
                actual: meta.dtype,
            });
        }
        Ok(Self {
            store,
            path: path.to_string(),
            meta,
            _pixel: PhantomData,
        })
    }

    #[inline]
    pub fn meta(&self) -> &ArrayMeta {
        &self.meta
    }

    #[inline]
    pub fn shape(&self) -> &[u64] {
        &self.meta.shape
    }

    #[inline]
    pub fn chunks(&self) -> &[u64] {
        &self.meta.chunks
    }

    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn location(&self) -> String {
        self.store.location(&self.path)
    }

    fn check_region(&self, region: &Region) -> StoreResult<()> {
        if self.meta.contains(region) {
            Ok(())
        } else {
            Err(StoreError::RegionOutOfBounds {
                path: self.path.clone(),
                region: region.ranges.clone(),
                shape: self.meta.shape.clone(),
            })
        }
    }

    fn decode(&self, key: &str, bytes: &[u8]) -> StoreResult<Vec<T>> {
        let len = self.meta.chunk_len();
        let expected = len * std::mem::size_of::<T>();
        if bytes.len() != expected {
            return Err(StoreError::CorruptChunk {
                path: self.path.clone(),
                key: key.to_string(),
                expected,
                actual: bytes.len(),
            });
        }
        let mut values = vec![T::default(); len];
        bytemuck::cast_slice_mut::<T, u8>(&mut values).copy_from_slice(bytes);
        Ok(values)
    }

    fn load_chunk(&self, key: &str) -> StoreResult<Option<Vec<T>>> {
        self.store
            .read_chunk(&self.path, key)?
            .map(|bytes| self.decode(key, &bytes))
            .transpose()
    }

    /// Writes `data`, laid out in C order over `region`.
    ///
    /// Chunks fully covered by the region are replaced; partially covered
    /// chunks are read, patched and written back.
    pub fn write_region(&self, region: &Region, data: &[T]) -> StoreResult<()> {
        self.check_region(region)?;
        if data.len() != region.len() {
            return Err(StoreError::BufferLength {
                expected: region.len(),
                actual: data.len(),
            });
        }

        for index in self.meta.chunk_indices(region) {
            let key = self.meta.chunk_key(&index);
            let space = self.meta.chunk_space(&index);
            let clipped = self.meta.chunk_region(&index);
            let Some(window) = region.intersect(&clipped) else {
                continue;
            };

            let mut chunk = if window == clipped {
                vec![T::default(); self.meta.chunk_len()]
            } else {
                self.load_chunk(&key)?
                    .unwrap_or_else(|| vec![T::default(); self.meta.chunk_len()])
            };
            copy_window(data, region, &mut chunk, &space, &window);
            self.store
                .write_chunk(&self.path, &key, bytemuck::cast_slice(&chunk))?;
        }
        Ok(())
    }

    /// Reads `region` into a C-order buffer. Missing chunks read as the fill value.
    pub fn read_region(&self, region: &Region) -> StoreResult<Vec<T>> {
        self.check_region(region)?;
        let mut out = vec![T::default(); region.len()];

        for index in self.meta.chunk_indices(region) {
            let key = self.meta.chunk_key(&index);
            let Some(window) = region.intersect(&self.meta.chunk_region(&index)) else {
                continue;
            };
            if let Some(chunk) = self.load_chunk(&key)? {
                let space = self.meta.chunk_space(&index);
                copy_window(&chunk, &space, &mut out, region, &window);
            }
        }
        Ok(out)
    }

    /// Chunks that were never written.
    pub fn missing_chunks(&self) -> StoreResult<Vec<Vec<u64>>> {
        let grid = Region::full(&self.meta.chunk_grid_shape());
        let mut missing = Vec::new();
        for index in grid.points() {
            if !self.store.has_chunk(&self.path, &self.meta.chunk_key(&index))? {
                missing.push(index);
            }
        }
        Ok(missing)
    }
}
