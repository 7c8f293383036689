//! Per-tile and per-scene region-of-interest tables.
//!
//! Boxes are in micrometers, translated so the scene origin is `(0, 0)`, and
//! stored as `f32`.


pub mod writer;

pub use writer::{JsonTableWriter, MemoryTableWriter, TableError, TableWriter};

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::geometry::{scene_origin, PhysicalGeometry};
use crate::grid::GridCoordinate;
use crate::layout::TileLayout;

/// Column names of every ROI table, in storage order.
pub const COLUMNS: [&str; 6] = [
    "x_micrometer",
    "y_micrometer",
    "z_micrometer",
    "len_x_micrometer",
    "len_y_micrometer",
    "len_z_micrometer",
];

pub const SCENE_LABEL: &str = "scene";

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    #[serde(rename = "x_micrometer")]
    pub x: f32,
    #[serde(rename = "y_micrometer")]
    pub y: f32,
    #[serde(rename = "z_micrometer")]
    pub z: f32,
    #[serde(rename = "len_x_micrometer")]
    pub len_x: f32,
    #[serde(rename = "len_y_micrometer")]
    pub len_y: f32,
    #[serde(rename = "len_z_micrometer")]
    pub len_z: f32,
}

impl BoundingBox {
    fn from_corners(min: DVec3, max: DVec3) -> Self {
        let len = max - min;
        Self {
            x: min.x as f32,
            y: min.y as f32,
            z: min.z as f32,
            len_x: len.x as f32,
            len_y: len.y as f32,
            len_z: len.z as f32,
        }
    }

    pub fn as_array(&self) -> [f32; 6] {
        [self.x, self.y, self.z, self.len_x, self.len_y, self.len_z]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRecord {
    pub label: String,
    /// `None` for the scene record.
    pub tile_index: Option<usize>,
    /// `None` unless the scene was snapped to a grid.
    pub grid: Option<GridCoordinate>,
    #[serde(flatten)]
    pub bbox: BoundingBox,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TableKind {
    /// One row per field of view (tile).
    FovRoi,
    /// A single row spanning the whole scene.
    SceneRoi,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiTable {
    pub name: String,
    pub kind: TableKind,
    pub columns: Vec<String>,
    pub rows: Vec<RegionRecord>,
}

impl RoiTable {
    pub fn new(name: impl Into<String>, kind: TableKind, rows: Vec<RegionRecord>) -> Self {
        Self {
            name: name.into(),
            kind,
            columns: COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }
}

/// Region records of one scene.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionTables {
    pub tiles: Vec<RegionRecord>,
    pub scene: RegionRecord,
}

impl RegionTables {
    pub fn into_tables(self, fov_name: &str, scene_name: &str) -> [RoiTable; 2] {
        [
            RoiTable::new(fov_name, TableKind::FovRoi, self.tiles),
            RoiTable::new(scene_name, TableKind::SceneRoi, vec![self.scene]),
        ]
    }
}

/// Builds one record per tile plus the union record of the scene.
pub fn emit_regions(geometries: &[PhysicalGeometry], layout: &TileLayout) -> RegionTables {
    let origin = scene_origin(geometries).extend(0.0);
    let mut union_min = DVec3::splat(f64::INFINITY);
    let mut union_max = DVec3::splat(f64::NEG_INFINITY);

    let tiles = geometries
        .iter()
        .enumerate()
        .map(|(index, g)| {
            let min = g.position_um.extend(0.0) - origin;
            let max = min + g.size_um;
            union_min = union_min.min(min);
            union_max = union_max.max(max);
            RegionRecord {
                label: format!("FOV_{}", index + 1),
                tile_index: Some(index),
                grid: layout.grid_coordinate(index),
                bbox: BoundingBox::from_corners(min, max),
            }
        })
        .collect::<Vec<_>>();

    let scene_box = if tiles.is_empty() {
        BoundingBox::default()
    } else {
        BoundingBox::from_corners(union_min, union_max)
    };

    RegionTables {
        tiles,
        scene: RegionRecord {
            label: SCENE_LABEL.to_string(),
            tile_index: None,
            grid: None,
            bbox: scene_box,
        },
    }
}
