//! Mosaic - microscope tile stitching.
//!
//! Turns scenes of overlapping tiles, acquired at continuous stage positions,
//! into one chunked multi-resolution array per scene:
//! - Physical tile geometry from stage positions and pixel scales
//! - Overlap estimation and validation across neighbouring tiles
//! - Integer grid resolution, or verbatim placement as a fallback
//! - Parallel assembly into a Zarr v2 chunked array
//! - Box-downsampled pyramid levels
//! - Per-tile and per-scene region-of-interest tables
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use mosaic::{ConversionConfig, FilesystemStore, JsonTableWriter, SceneConverter};
//!
//! let store = FilesystemStore::create("plate.zarr")?;
//! let tables = JsonTableWriter::new("plate.zarr");
//! let converter = SceneConverter::<u16>::new(&store, &tables, ConversionConfig::default());
//!
//! let report = converter.convert_batch(&reader)?;
//! println!("{} scenes converted", report.converted.len());
//! ```

pub(crate) mod assemble;
pub(crate) mod batch;
pub(crate) mod config;
pub(crate) mod error;
pub(crate) mod geometry;
pub(crate) mod grid;
pub(crate) mod layout;
pub(crate) mod overlap;
pub(crate) mod pixel;
pub(crate) mod progress;
pub(crate) mod pyramid;
pub mod regions;
pub(crate) mod scene;
pub mod store;
pub(crate) mod tile;

#[cfg(test)]
pub mod testing;

pub mod prelude;

// ============================================================================
// Tiles and pixels
// ============================================================================

pub use pixel::{DataType, Pixel};
pub use tile::{FrameDims, InMemoryTile, PlaneIndex, TileMetadata, TileSource};

// ============================================================================
// Geometry, overlap and grid
// ============================================================================

pub use geometry::{
    extract_geometry, extract_scene_geometry, scene_origin, AxisTransform, GeometryError,
    PhysicalGeometry, SpatialAxis,
};
pub use grid::{resolve_grid, GridCoordinate, GridError, GridExtent, TileGrid};
pub use layout::{
    resolve_layout, verbatim_placements, LayoutError, LayoutKind, Placement, StitchingMode,
    TileLayout,
};
pub use overlap::{
    classify_pairs, estimate_overlap, OverlapConfig, OverlapError, OverlapFraction, OverlapPair,
    PairDirection,
};

// ============================================================================
// Assembly and pyramid
// ============================================================================

pub use assemble::{assemble, check_frame_dims, read_tile_plane, AssembleError, AssemblyPlan};
pub use pyramid::{
    build_pyramid, level_chunks, level_path, level_shape, BoxDownsampler, CoarsenMethod,
    Downsampler, PyramidConfig,
};
pub use store::{
    ArrayMeta, ArrayStore, ChunkedArray, FilesystemStore, MemoryStore, Region, StoreError,
};

// ============================================================================
// Region tables
// ============================================================================

pub use regions::{
    emit_regions, BoundingBox, JsonTableWriter, MemoryTableWriter, RegionRecord, RegionTables,
    RoiTable, TableError, TableKind, TableWriter,
};

// ============================================================================
// Pipeline
// ============================================================================

pub use batch::{run_batch, BatchReport, SceneReader, SkippedScene};
pub use config::{ConfigError, ConversionConfig};
pub use error::{SceneError, SceneErrorKind};
pub use progress::{ConversionProgress, ConversionStage, ProgressCallback};
pub use scene::{scene_path, SceneConverter, SceneOutput};
