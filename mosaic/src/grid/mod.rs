//! Integer tile grid from continuous stage positions.
//!
//! Positions are normalized to the scene origin, divided by the tile size and
//! multiplied by the overlap factor, which compresses overlapping steps back to
//! whole tile steps. Every tile must land on its own cell.

#[cfg(test)]
mod tests;

use std::fmt;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{scene_origin, PhysicalGeometry, SpatialAxis};
use crate::overlap::OverlapFraction;

/// Cell of a tile in the grid. `row` follows y, `col` follows x.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct GridCoordinate {
    pub row: usize,
    pub col: usize,
}

impl GridCoordinate {
    pub const ORIGIN: GridCoordinate = GridCoordinate { row: 0, col: 0 };

    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for GridCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(row {}, col {})", self.row, self.col)
    }
}

/// Bounding size of a grid, `(max(row) + 1, max(col) + 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GridExtent {
    pub rows: usize,
    pub cols: usize,
}

impl GridExtent {
    #[inline]
    pub const fn cells(&self) -> usize {
        self.rows * self.cols
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    #[error("Tiles {first} and {second} both resolve to grid cell {coordinate}")]
    Collision {
        first: usize,
        second: usize,
        coordinate: GridCoordinate,
    },

    #[error("Tile {tile} resolves to negative grid cell (row {row}, col {col})")]
    NegativeCoordinate { tile: usize, row: i64, col: i64 },

    #[error("Reference tile has degenerate {axis} size {size_um} um")]
    DegenerateTileSize { axis: SpatialAxis, size_um: f64 },

    #[error("Tile {tile} has a non-finite normalized position")]
    NonFinitePosition { tile: usize },
}

/// Grid cells of all tiles of a scene, in acquisition order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TileGrid {
    coordinates: Vec<GridCoordinate>,
    extent: GridExtent,
}

impl TileGrid {
    /// A grid holding one tile at `(0, 0)`.
    pub fn single() -> Self {
        Self {
            coordinates: vec![GridCoordinate::ORIGIN],
            extent: GridExtent { rows: 1, cols: 1 },
        }
    }

    #[inline]
    pub fn coordinates(&self) -> &[GridCoordinate] {
        &self.coordinates
    }

    #[inline]
    pub fn coordinate(&self, tile: usize) -> GridCoordinate {
        self.coordinates[tile]
    }

    #[inline]
    pub fn extent(&self) -> GridExtent {
        self.extent
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    /// True when every cell of the extent holds a tile.
    pub fn is_dense(&self) -> bool {
        self.coordinates.len() == self.extent.cells()
    }
}

fn reference_size(geometry: &PhysicalGeometry) -> Result<glam::DVec2, GridError> {
    let size = geometry.size_xy();
    for (axis, size_um) in [(SpatialAxis::X, size.x), (SpatialAxis::Y, size.y)] {
        if !(size_um.is_finite() && size_um > 0.0) {
            return Err(GridError::DegenerateTileSize { axis, size_um });
        }
    }
    Ok(size)
}

/// Resolves the grid cell of every tile.
///
/// The first tile's size is the step reference for the whole scene. Rounding is
/// half-to-even on both axes.
pub fn resolve_grid(
    geometries: &[PhysicalGeometry],
    overlap: OverlapFraction,
) -> Result<TileGrid, GridError> {
    let Some(first) = geometries.first() else {
        return Ok(TileGrid::default());
    };
    let size = reference_size(first)?;
    let origin = scene_origin(geometries);
    let factor = overlap.factor();

    let mut occupied: HashMap<GridCoordinate, usize> = HashMap::with_capacity(geometries.len());
    let mut coordinates = Vec::with_capacity(geometries.len());
    let mut extent = GridExtent::default();

    for (tile, geometry) in geometries.iter().enumerate() {
        let scaled = (geometry.position_um - origin) / size * factor;
        if !scaled.is_finite() {
            return Err(GridError::NonFinitePosition { tile });
        }
        let col = scaled.x.round_ties_even() as i64;
        let row = scaled.y.round_ties_even() as i64;
        if row < 0 || col < 0 {
            return Err(GridError::NegativeCoordinate { tile, row, col });
        }

        let coordinate = GridCoordinate::new(row as usize, col as usize);
        if let Some(&first) = occupied.get(&coordinate) {
            return Err(GridError::Collision {
                first,
                second: tile,
                coordinate,
            });
        }
        occupied.insert(coordinate, tile);

        extent.rows = extent.rows.max(coordinate.row + 1);
        extent.cols = extent.cols.max(coordinate.col + 1);
        coordinates.push(coordinate);
    }

    tracing::debug!(
        tiles = coordinates.len(),
        rows = extent.rows,
        cols = extent.cols,
        "Grid resolved"
    );

    Ok(TileGrid {
        coordinates,
        extent,
    })
}
