//! Testing utilities for mosaic.

#![allow(dead_code)]

use common::Buffer2;
use glam::DVec2;

use crate::batch::SceneReader;
use crate::geometry::{extract_scene_geometry, AxisTransform, PhysicalGeometry};
use crate::pixel::Pixel;
use crate::tile::{FrameDims, InMemoryTile, PlaneIndex, TileMetadata, TileSource};

/// Initialize tracing subscriber for tests.
/// Safe to call multiple times - will only initialize once.
pub fn init_tracing() {
    common::log_setup::init_test_logging();
}

/// Deterministic pixel value, distinct for neighbouring tiles, planes and pixels.
pub fn pattern_value<T: Pixel>(tile: usize, plane: PlaneIndex, x: usize, y: usize) -> T {
    let v = (tile * 37 + plane.t * 11 + plane.c * 5 + plane.z * 3 + y * 7 + x) % 200;
    <T as num_traits::NumCast>::from(v).unwrap()
}

pub fn pattern_plane<T: Pixel>(tile: usize, plane: PlaneIndex, dims: FrameDims) -> Buffer2<T> {
    Buffer2::from_fn(dims.x, dims.y, |x, y| pattern_value(tile, plane, x, y))
}

/// Metadata of a tile with square pixels, stage in micrometers.
pub fn tile_metadata(
    index: usize,
    dims: FrameDims,
    position_um: DVec2,
    tile_um: f64,
) -> TileMetadata {
    TileMetadata {
        index,
        dims,
        stage_position: position_um,
        stage_scale: [Some(1.0), Some(1.0)],
        pixel_scale: [
            Some(dims.x as f64 / tile_um),
            Some(dims.y as f64 / tile_um),
            (dims.z > 1).then_some(1.0),
        ],
    }
}

/// A rows x cols raster acquisition with uniform overlap.
#[derive(Debug, Clone)]
pub struct RasterScene {
    pub rows: usize,
    pub cols: usize,
    /// Overlap fraction between neighbours.
    pub overlap: f64,
    /// Physical tile width and height in micrometers.
    pub tile_um: f64,
    pub dims: FrameDims,
    /// Scanner units per micrometer.
    pub stage_scale: f64,
    pub origin_um: DVec2,
    /// Odd rows are scanned right to left.
    pub serpentine: bool,
}

impl RasterScene {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            overlap: 0.1,
            tile_um: 100.0,
            dims: FrameDims::new(1, 1, 1, 16, 16),
            stage_scale: 1.0,
            origin_um: DVec2::ZERO,
            serpentine: false,
        }
    }

    pub fn with_overlap(mut self, overlap: f64) -> Self {
        self.overlap = overlap;
        self
    }

    pub fn with_dims(mut self, dims: FrameDims) -> Self {
        self.dims = dims;
        self
    }

    pub fn with_stage_scale(mut self, stage_scale: f64) -> Self {
        self.stage_scale = stage_scale;
        self
    }

    pub fn with_origin(mut self, x: f64, y: f64) -> Self {
        self.origin_um = DVec2::new(x, y);
        self
    }

    pub fn serpentine(mut self) -> Self {
        self.serpentine = true;
        self
    }

    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    /// Grid cell `(row, col)` of every tile, in acquisition order.
    pub fn cells(&self) -> Vec<(usize, usize)> {
        let (cols, serpentine) = (self.cols, self.serpentine);
        (0..self.rows)
            .flat_map(move |r| {
                let reversed = serpentine && r % 2 == 1;
                (0..cols).map(move |c| (r, if reversed { cols - 1 - c } else { c }))
            })
            .collect()
    }

    pub fn metadata(&self) -> Vec<TileMetadata> {
        let step = self.tile_um * (1.0 - self.overlap);
        self.cells()
            .into_iter()
            .enumerate()
            .map(|(index, (r, c))| {
                let position_um = self.origin_um + DVec2::new(c as f64 * step, r as f64 * step);
                let mut meta = tile_metadata(index, self.dims, position_um, self.tile_um);
                meta.stage_position = position_um * self.stage_scale;
                meta.stage_scale = [Some(self.stage_scale); 2];
                meta
            })
            .collect()
    }

    pub fn geometries(&self) -> Vec<PhysicalGeometry> {
        extract_scene_geometry(&self.metadata(), AxisTransform::IDENTITY).unwrap()
    }

    pub fn tiles<T: Pixel>(&self) -> Vec<InMemoryTile<T>> {
        let dims = self.dims;
        self.metadata()
            .into_iter()
            .map(|meta| {
                let index = meta.index;
                InMemoryTile::from_fn(meta, |plane| pattern_plane(index, plane, dims))
            })
            .collect()
    }

    pub fn sources<T: Pixel>(&self) -> Vec<Box<dyn TileSource<T>>> {
        self.tiles::<T>()
            .into_iter()
            .map(|t| Box::new(t) as Box<dyn TileSource<T>>)
            .collect()
    }
}

/// Reader over named scenes held in memory. Scenes listed without tiles fail to load.
pub struct InMemoryReader<T> {
    scenes: Vec<(String, Option<Vec<InMemoryTile<T>>>)>,
}

impl<T: Pixel> InMemoryReader<T> {
    pub fn new() -> Self {
        Self { scenes: Vec::new() }
    }

    pub fn with_scene(mut self, name: &str, tiles: Vec<InMemoryTile<T>>) -> Self {
        self.scenes.push((name.to_string(), Some(tiles)));
        self
    }

    pub fn with_unreadable_scene(mut self, name: &str) -> Self {
        self.scenes.push((name.to_string(), None));
        self
    }
}

impl<T: Pixel> SceneReader<T> for InMemoryReader<T> {
    fn scene_names(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.scenes.iter().map(|(name, _)| name.clone()).collect())
    }

    fn list_tiles(&self, scene: &str) -> anyhow::Result<Vec<Box<dyn TileSource<T>>>> {
        let (_, tiles) = self
            .scenes
            .iter()
            .find(|(name, _)| name == scene)
            .ok_or_else(|| anyhow::anyhow!("unknown scene '{scene}'"))?;
        let tiles = tiles
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("scene '{scene}' is unreadable"))?;
        Ok(tiles
            .iter()
            .cloned()
            .map(|t| Box::new(t) as Box<dyn TileSource<T>>)
            .collect())
    }
}
