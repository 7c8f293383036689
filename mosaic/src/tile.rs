//! Tile metadata and the pixel-source capability consumed from acquisition readers.

use std::fmt;

use common::Buffer2;
use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::pixel::Pixel;

/// Frame dimensions of one tile, in `(t, c, z, y, x)` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameDims {
    pub t: usize,
    pub c: usize,
    pub z: usize,
    pub y: usize,
    pub x: usize,
}

impl FrameDims {
    pub const fn new(t: usize, c: usize, z: usize, y: usize, x: usize) -> Self {
        Self { t, c, z, y, x }
    }

    /// Number of `(t, c, z)` planes.
    #[inline]
    pub const fn plane_count(&self) -> usize {
        self.t * self.c * self.z
    }

    /// All planes, `t` outermost and `z` innermost.
    pub fn planes(self) -> impl Iterator<Item = PlaneIndex> {
        let FrameDims { t, c, z, .. } = self;
        (0..t).flat_map(move |ti| {
            (0..c).flat_map(move |ci| (0..z).map(move |zi| PlaneIndex::new(ti, ci, zi)))
        })
    }

    /// Linear position of `plane` in [`FrameDims::planes`] order.
    #[inline]
    pub const fn plane_offset(&self, plane: PlaneIndex) -> usize {
        (plane.t * self.c + plane.c) * self.z + plane.z
    }

    #[inline]
    pub const fn contains(&self, plane: PlaneIndex) -> bool {
        plane.t < self.t && plane.c < self.c && plane.z < self.z
    }

    #[inline]
    pub const fn is_3d(&self) -> bool {
        self.z > 1
    }

    #[inline]
    pub const fn is_time_series(&self) -> bool {
        self.t > 1
    }
}

/// Address of one 2-D plane within a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PlaneIndex {
    pub t: usize,
    pub c: usize,
    pub z: usize,
}

impl PlaneIndex {
    pub const fn new(t: usize, c: usize, z: usize) -> Self {
        Self { t, c, z }
    }
}

impl fmt::Display for PlaneIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(t={}, c={}, z={})", self.t, self.c, self.z)
    }
}

/// Acquisition metadata of a single tile as reported by the reader.
#[derive(Debug, Clone, PartialEq)]
pub struct TileMetadata {
    /// Position of the tile in acquisition order.
    pub index: usize,
    pub dims: FrameDims,
    /// Raw stage position `(x, y)` in scanner units.
    pub stage_position: DVec2,
    /// Scanner units per micrometer for the `(x, y)` stage axes.
    pub stage_scale: [Option<f64>; 2],
    /// Pixels per micrometer along `(x, y, z)`. `None` when the reader has no scale for the axis.
    pub pixel_scale: [Option<f64>; 3],
}

/// Lazily decoded pixels of one tile.
///
/// Implementations wrap whatever container decoder backs the acquisition; the
/// assembler only ever asks for one plane at a time.
pub trait TileSource<T: Pixel>: Send + Sync {
    fn metadata(&self) -> &TileMetadata;

    /// Decodes one `(t, c, z)` plane as a `dims.x` by `dims.y` buffer.
    fn read_plane(&self, plane: PlaneIndex) -> anyhow::Result<Buffer2<T>>;
}

/// A tile whose planes are already decoded into memory.
#[derive(Debug, Clone)]
pub struct InMemoryTile<T> {
    metadata: TileMetadata,
    planes: Vec<Buffer2<T>>,
}

impl<T: Pixel> InMemoryTile<T> {
    /// `planes` must be in [`FrameDims::planes`] order.
    pub fn new(metadata: TileMetadata, planes: Vec<Buffer2<T>>) -> Self {
        assert_eq!(
            planes.len(),
            metadata.dims.plane_count(),
            "plane count must equal t * c * z"
        );
        Self { metadata, planes }
    }

    /// Generates every plane with `f`.
    pub fn from_fn(metadata: TileMetadata, mut f: impl FnMut(PlaneIndex) -> Buffer2<T>) -> Self {
        let planes = metadata.dims.planes().map(&mut f).collect();
        Self { metadata, planes }
    }
}

impl<T: Pixel> TileSource<T> for InMemoryTile<T> {
    fn metadata(&self) -> &TileMetadata {
        &self.metadata
    }

    fn read_plane(&self, plane: PlaneIndex) -> anyhow::Result<Buffer2<T>> {
        let dims = &self.metadata.dims;
        if !dims.contains(plane) {
            anyhow::bail!(
                "plane {plane} is outside tile {} with dims {dims:?}",
                self.metadata.index
            );
        }
        Ok(self.planes[dims.plane_offset(plane)].clone())
    }
}
