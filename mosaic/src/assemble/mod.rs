//! Writes tile planes into the full-resolution chunked array.
//!
//! Array axes are `[t, c, z, y, x]`, with `t` dropped entirely when the scene
//! has a single time point. Chunks are one plane of one tile.


use std::sync::atomic::{AtomicUsize, Ordering};

use common::parallel::try_par_for_each_limited;
use common::Buffer2;
use thiserror::Error;

use crate::layout::{Placement, TileLayout};
use crate::pixel::Pixel;
use crate::progress::{report_progress, ConversionStage, ProgressCallback};
use crate::store::{ArrayStore, ChunkedArray, Region, StoreError, StoreResult};
use crate::tile::{FrameDims, PlaneIndex, TileSource};

fn plane_suffix(plane: &Option<PlaneIndex>) -> String {
    plane.map(|p| format!(" plane {p}")).unwrap_or_default()
}

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("Tile {tile}{} has shape {actual:?} (y, x), expected {expected:?}", plane_suffix(.plane))]
    ShapeMismatch {
        tile: usize,
        plane: Option<PlaneIndex>,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Tile {tile} has (t, c, z) = {actual:?}, expected {expected:?}")]
    PlaneCountMismatch {
        tile: usize,
        expected: (usize, usize, usize),
        actual: (usize, usize, usize),
    },

    #[error("Layout places {placements} tiles but the scene has {tiles}")]
    PlacementCount { tiles: usize, placements: usize },

    #[error("Failed to read plane {plane} of tile {tile}: {source}")]
    TileRead {
        tile: usize,
        plane: PlaneIndex,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Checks that every tile reports the same frame dims as `expected`.
pub fn check_frame_dims<'a>(
    expected: FrameDims,
    tiles: impl IntoIterator<Item = (usize, &'a FrameDims)>,
) -> Result<(), AssembleError> {
    for (tile, dims) in tiles {
        if (dims.y, dims.x) != (expected.y, expected.x) {
            return Err(AssembleError::ShapeMismatch {
                tile,
                plane: None,
                expected: (expected.y, expected.x),
                actual: (dims.y, dims.x),
            });
        }
        if (dims.t, dims.c, dims.z) != (expected.t, expected.c, expected.z) {
            return Err(AssembleError::PlaneCountMismatch {
                tile,
                expected: (expected.t, expected.c, expected.z),
                actual: (dims.t, dims.c, dims.z),
            });
        }
    }
    Ok(())
}

/// Where every tile plane goes in the assembled array.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyPlan {
    pub dims: FrameDims,
    pub placements: Vec<Placement>,
    /// Canvas `(height, width)` in pixels.
    pub canvas: (u64, u64),
    /// Tiles never share a chunk, so they can be written concurrently.
    pub disjoint: bool,
}

impl AssemblyPlan {
    pub fn from_layout(layout: &TileLayout, dims: FrameDims) -> Self {
        let (h, w) = (dims.y as u64, dims.x as u64);
        Self {
            dims,
            placements: layout.placements(h, w),
            canvas: layout.canvas(h, w),
            disjoint: layout.is_disjoint(),
        }
    }

    #[inline]
    pub fn has_time_axis(&self) -> bool {
        self.dims.t > 1
    }

    /// `[t?, c, z, height, width]`.
    pub fn array_shape(&self) -> Vec<u64> {
        let d = &self.dims;
        let mut shape = Vec::with_capacity(5);
        if self.has_time_axis() {
            shape.push(d.t as u64);
        }
        shape.extend([d.c as u64, d.z as u64, self.canvas.0, self.canvas.1]);
        shape
    }

    /// `[1?, 1, 1, tile_h, tile_w]`.
    pub fn chunk_shape(&self) -> Vec<u64> {
        let mut chunks = Vec::with_capacity(5);
        if self.has_time_axis() {
            chunks.push(1);
        }
        chunks.extend([1, 1, self.dims.y as u64, self.dims.x as u64]);
        chunks
    }

    /// Array region covered by one plane of a tile at `placement`.
    pub fn plane_region(&self, placement: Placement, plane: PlaneIndex) -> Region {
        let mut ranges = Vec::with_capacity(5);
        if self.has_time_axis() {
            ranges.push(plane.t as u64..plane.t as u64 + 1);
        }
        ranges.push(plane.c as u64..plane.c as u64 + 1);
        ranges.push(plane.z as u64..plane.z as u64 + 1);
        ranges.push(placement.y..placement.y + self.dims.y as u64);
        ranges.push(placement.x..placement.x + self.dims.x as u64);
        Region::new(ranges)
    }

    /// Allocates the full-resolution array for this plan.
    pub fn create_array<'s, T: Pixel>(
        &self,
        store: &'s dyn ArrayStore,
        path: &str,
        overwrite: bool,
    ) -> StoreResult<ChunkedArray<'s, T>> {
        ChunkedArray::create(
            store,
            path,
            self.array_shape(),
            self.chunk_shape(),
            overwrite,
        )
    }
}

/// Reads back one plane of a placed tile.
pub fn read_tile_plane<T: Pixel>(
    array: &ChunkedArray<'_, T>,
    plan: &AssemblyPlan,
    tile: usize,
    plane: PlaneIndex,
) -> StoreResult<Buffer2<T>> {
    let region = plan.plane_region(plan.placements[tile], plane);
    let pixels = array.read_region(&region)?;
    Ok(Buffer2::new(plan.dims.x, plan.dims.y, pixels))
}

/// Writes every plane of every tile into `array`.
///
/// Disjoint plans are written with at most `max_concurrent` planes in flight.
/// Other plans are written in acquisition order, so later tiles win where
/// tiles overlap. A failure leaves already written planes in place.
pub fn assemble<T: Pixel>(
    array: &ChunkedArray<'_, T>,
    tiles: &[Box<dyn TileSource<T>>],
    plan: &AssemblyPlan,
    max_concurrent: usize,
    progress: &ProgressCallback,
) -> Result<(), AssembleError> {
    if tiles.len() != plan.placements.len() {
        return Err(AssembleError::PlacementCount {
            tiles: tiles.len(),
            placements: plan.placements.len(),
        });
    }
    check_frame_dims(
        plan.dims,
        tiles.iter().enumerate().map(|(i, t)| (i, &t.metadata().dims)),
    )?;

    let work: Vec<(usize, PlaneIndex)> = (0..tiles.len())
        .flat_map(|tile| plan.dims.planes().map(move |plane| (tile, plane)))
        .collect();
    let total = work.len();
    let done = AtomicUsize::new(0);

    let write_plane = |&(tile, plane): &(usize, PlaneIndex)| -> Result<(), AssembleError> {
        let buffer = tiles[tile]
            .read_plane(plane)
            .map_err(|source| AssembleError::TileRead {
                tile,
                plane,
                source,
            })?;
        let expected = (plan.dims.y, plan.dims.x);
        if buffer.shape() != expected {
            return Err(AssembleError::ShapeMismatch {
                tile,
                plane: Some(plane),
                expected,
                actual: buffer.shape(),
            });
        }
        array.write_region(
            &plan.plane_region(plan.placements[tile], plane),
            buffer.pixels(),
        )?;

        let current = done.fetch_add(1, Ordering::Relaxed) + 1;
        report_progress(progress, current, total, ConversionStage::Tiles);
        Ok(())
    };

    if plan.disjoint {
        try_par_for_each_limited(&work, max_concurrent.max(1), write_plane)?;
    } else {
        work.iter().try_for_each(write_plane)?;
    }

    tracing::debug!(
        path = array.path(),
        tiles = tiles.len(),
        planes = total,
        parallel = plan.disjoint,
        "Tiles written"
    );
    Ok(())
}
