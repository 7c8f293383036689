//! Physical tile geometry.
//!
//! Converts the raw stage position and pixel counts a reader reports for each
//! tile into micrometers. Everything downstream (overlap, grid, region tables)
//! works on [`PhysicalGeometry`] only.


use glam::{DVec2, DVec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tile::TileMetadata;

/// Spatial axis of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SpatialAxis {
    X,
    Y,
    Z,
}

/// Errors that make a tile's geometry undefined.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("Tile {tile} reports {pixels} pixels along {axis} but has no scale for that axis")]
    MissingScale {
        tile: usize,
        axis: SpatialAxis,
        pixels: usize,
    },

    #[error("Tile {tile} has invalid {axis} pixel scale {scale} (must be finite and > 0)")]
    InvalidScale {
        tile: usize,
        axis: SpatialAxis,
        scale: f64,
    },

    #[error("Tile {tile} has no stage scale for the {axis} position")]
    MissingStageScale { tile: usize, axis: SpatialAxis },

    #[error("Tile {tile} has invalid {axis} stage scale {scale} (must be finite and > 0)")]
    InvalidStageScale {
        tile: usize,
        axis: SpatialAxis,
        scale: f64,
    },

    #[error("Tile {tile} has non-finite stage position ({x}, {y})")]
    NonFinitePosition { tile: usize, x: f64, y: f64 },
}

/// Mapping between the scanner's stage axes and the image axes.
///
/// Applied to micrometer positions: swap first, then inversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisTransform {
    pub swap_xy: bool,
    pub invert_x: bool,
    pub invert_y: bool,
}

impl AxisTransform {
    pub const IDENTITY: AxisTransform = AxisTransform {
        swap_xy: false,
        invert_x: false,
        invert_y: false,
    };

    #[inline]
    pub fn apply(&self, position: DVec2) -> DVec2 {
        let mut p = if self.swap_xy {
            DVec2::new(position.y, position.x)
        } else {
            position
        };
        if self.invert_x {
            p.x = -p.x;
        }
        if self.invert_y {
            p.y = -p.y;
        }
        p
    }
}

/// Size and position of one tile in micrometers.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PhysicalGeometry {
    /// Extent along `(x, y, z)`. Axes without metadata have zero extent.
    pub size_um: DVec3,
    /// Stage position `(x, y)`.
    pub position_um: DVec2,
}

impl PhysicalGeometry {
    #[inline]
    pub fn size_xy(&self) -> DVec2 {
        self.size_um.truncate()
    }

    /// Far corner `(x + size_x, y + size_y)`.
    #[inline]
    pub fn end_um(&self) -> DVec2 {
        self.position_um + self.size_xy()
    }
}

fn checked_scale(scale: f64) -> bool {
    scale.is_finite() && scale > 0.0
}

fn axis_extent(
    tile: usize,
    axis: SpatialAxis,
    pixels: usize,
    scale: Option<f64>,
) -> Result<f64, GeometryError> {
    match scale {
        Some(scale) if !checked_scale(scale) => {
            Err(GeometryError::InvalidScale { tile, axis, scale })
        }
        Some(scale) => Ok(pixels as f64 / scale),
        // A single-sample axis without scale is an absent axis.
        None if pixels <= 1 => Ok(0.0),
        None => Err(GeometryError::MissingScale { tile, axis, pixels }),
    }
}

fn stage_coordinate(
    tile: usize,
    axis: SpatialAxis,
    raw: f64,
    scale: Option<f64>,
) -> Result<f64, GeometryError> {
    match scale {
        None => Err(GeometryError::MissingStageScale { tile, axis }),
        Some(scale) if !checked_scale(scale) => {
            Err(GeometryError::InvalidStageScale { tile, axis, scale })
        }
        Some(scale) => Ok(raw / scale),
    }
}

/// Extracts the physical geometry of one tile.
pub fn extract_geometry(tile: &TileMetadata) -> Result<PhysicalGeometry, GeometryError> {
    let index = tile.index;
    let raw = tile.stage_position;
    if !raw.is_finite() {
        return Err(GeometryError::NonFinitePosition {
            tile: index,
            x: raw.x,
            y: raw.y,
        });
    }

    let [scale_x, scale_y, scale_z] = tile.pixel_scale;
    let size_um = DVec3::new(
        axis_extent(index, SpatialAxis::X, tile.dims.x, scale_x)?,
        axis_extent(index, SpatialAxis::Y, tile.dims.y, scale_y)?,
        axis_extent(index, SpatialAxis::Z, tile.dims.z, scale_z)?,
    );

    let [stage_x, stage_y] = tile.stage_scale;
    let position_um = DVec2::new(
        stage_coordinate(index, SpatialAxis::X, raw.x, stage_x)?,
        stage_coordinate(index, SpatialAxis::Y, raw.y, stage_y)?,
    );

    Ok(PhysicalGeometry {
        size_um,
        position_um,
    })
}

/// Extracts the geometry of every tile of a scene, in acquisition order, with
/// `transform` applied to the positions.
pub fn extract_scene_geometry(
    tiles: &[TileMetadata],
    transform: AxisTransform,
) -> Result<Vec<PhysicalGeometry>, GeometryError> {
    tiles
        .iter()
        .map(|tile| {
            let mut geometry = extract_geometry(tile)?;
            geometry.position_um = transform.apply(geometry.position_um);
            Ok(geometry)
        })
        .collect()
}

/// Minimum `(x, y)` position over all tiles; the scene's zero origin.
pub fn scene_origin(geometries: &[PhysicalGeometry]) -> DVec2 {
    geometries
        .iter()
        .map(|g| g.position_um)
        .reduce(DVec2::min)
        .unwrap_or(DVec2::ZERO)
}
