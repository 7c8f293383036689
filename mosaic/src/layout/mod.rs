//! Stitching strategy: where every tile lands in the assembled canvas.


use glam::DVec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{scene_origin, PhysicalGeometry};
use crate::grid::{resolve_grid, GridCoordinate, GridError, TileGrid};
use crate::overlap::{estimate_overlap, OverlapConfig, OverlapError, OverlapFraction};
use crate::tile::FrameDims;

/// How tile positions are turned into canvas placements.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StitchingMode {
    /// Like `Grid`, but scenes that cannot be gridded fall back to verbatim positions.
    Auto,
    /// Estimate overlap and snap tiles to an integer grid.
    #[default]
    Grid,
    /// Place every tile at its stage position converted to pixels.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LayoutKind {
    Grid,
    Verbatim,
}

/// Top-left pixel of a tile in the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Placement {
    pub y: u64,
    pub x: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TileLayout {
    Grid {
        grid: TileGrid,
        /// `None` when the scene had a single tile and no overlap was measured.
        overlap: Option<OverlapFraction>,
    },
    Verbatim {
        origins: Vec<Placement>,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    #[error(transparent)]
    Overlap(#[from] OverlapError),
    #[error(transparent)]
    Grid(#[from] GridError),
}

impl TileLayout {
    pub fn kind(&self) -> LayoutKind {
        match self {
            TileLayout::Grid { .. } => LayoutKind::Grid,
            TileLayout::Verbatim { .. } => LayoutKind::Verbatim,
        }
    }

    pub fn overlap(&self) -> Option<OverlapFraction> {
        match self {
            TileLayout::Grid { overlap, .. } => *overlap,
            TileLayout::Verbatim { .. } => None,
        }
    }

    pub fn grid_coordinate(&self, tile: usize) -> Option<GridCoordinate> {
        match self {
            TileLayout::Grid { grid, .. } => grid.coordinates().get(tile).copied(),
            TileLayout::Verbatim { .. } => None,
        }
    }

    pub fn tile_count(&self) -> usize {
        match self {
            TileLayout::Grid { grid, .. } => grid.len(),
            TileLayout::Verbatim { origins } => origins.len(),
        }
    }

    /// Top-left pixel of every tile for tiles of `tile_h` x `tile_w` pixels.
    ///
    /// Grid row and column map to the y and x array axes respectively.
    pub fn placements(&self, tile_h: u64, tile_w: u64) -> Vec<Placement> {
        match self {
            TileLayout::Grid { grid, .. } => grid
                .coordinates()
                .iter()
                .map(|c| Placement {
                    y: c.row as u64 * tile_h,
                    x: c.col as u64 * tile_w,
                })
                .collect(),
            TileLayout::Verbatim { origins } => origins.clone(),
        }
    }

    /// Canvas size `(height, width)` in pixels.
    pub fn canvas(&self, tile_h: u64, tile_w: u64) -> (u64, u64) {
        match self {
            TileLayout::Grid { grid, .. } => {
                let extent = grid.extent();
                (extent.rows as u64 * tile_h, extent.cols as u64 * tile_w)
            }
            TileLayout::Verbatim { origins } => origins.iter().fold((0, 0), |(h, w), p| {
                (h.max(p.y + tile_h), w.max(p.x + tile_w))
            }),
        }
    }

    /// True when no two tiles share a pixel, so tile writes may run concurrently.
    pub fn is_disjoint(&self) -> bool {
        matches!(self, TileLayout::Grid { .. })
    }
}

fn pixels_per_um(pixels: usize, size_um: f64) -> f64 {
    if size_um > 0.0 {
        pixels as f64 / size_um
    } else {
        1.0
    }
}

/// Places every tile at its stage offset from the scene origin, in pixels.
pub fn verbatim_placements(geometries: &[PhysicalGeometry], dims: FrameDims) -> Vec<Placement> {
    let Some(first) = geometries.first() else {
        return Vec::new();
    };
    let scale = DVec2::new(
        pixels_per_um(dims.x, first.size_um.x),
        pixels_per_um(dims.y, first.size_um.y),
    );
    let origin = scene_origin(geometries);

    geometries
        .iter()
        .map(|g| {
            let px = (g.position_um - origin) * scale;
            Placement {
                y: px.y.round_ties_even().max(0.0) as u64,
                x: px.x.round_ties_even().max(0.0) as u64,
            }
        })
        .collect()
}

/// Chooses the layout of a scene according to `mode`.
pub fn resolve_layout(
    geometries: &[PhysicalGeometry],
    dims: FrameDims,
    mode: StitchingMode,
    config: &OverlapConfig,
) -> Result<TileLayout, LayoutError> {
    let verbatim = || TileLayout::Verbatim {
        origins: verbatim_placements(geometries, dims),
    };

    if mode == StitchingMode::None {
        return Ok(verbatim());
    }
    if geometries.len() == 1 {
        return Ok(TileLayout::Grid {
            grid: TileGrid::single(),
            overlap: None,
        });
    }

    let overlap = match estimate_overlap(geometries, config) {
        Ok(overlap) => overlap,
        Err(err @ OverlapError::InsufficientData { .. }) => {
            tracing::warn!(reason = %err, "Falling back to verbatim tile positions");
            return Ok(verbatim());
        }
        Err(err) if mode == StitchingMode::Auto => {
            tracing::warn!(reason = %err, "Falling back to verbatim tile positions");
            return Ok(verbatim());
        }
        Err(err) => return Err(err.into()),
    };

    match resolve_grid(geometries, overlap) {
        Ok(grid) => Ok(TileLayout::Grid {
            grid,
            overlap: Some(overlap),
        }),
        Err(err) if mode == StitchingMode::Auto => {
            tracing::warn!(reason = %err, "Falling back to verbatim tile positions");
            Ok(verbatim())
        }
        Err(err) => Err(err.into()),
    }
}
