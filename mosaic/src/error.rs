//! Per-scene failure taxonomy.

use serde::Serialize;
use thiserror::Error;

use crate::assemble::AssembleError;
use crate::geometry::GeometryError;
use crate::grid::GridError;
use crate::layout::LayoutError;
use crate::overlap::OverlapError;
use crate::regions::TableError;
use crate::store::StoreError;

/// Anything that stops one scene from converting. Sibling scenes are unaffected.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("Failed to list tiles: {source}")]
    Reader {
        #[source]
        source: anyhow::Error,
    },

    #[error("Scene has no tiles")]
    EmptyScene,

    #[error("Scene path '{path}' is already used by another scene in this batch")]
    DuplicatePath { path: String },

    #[error("Scene name '{name}' does not map to a usable store path")]
    InvalidName { name: String },

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Assemble(#[from] AssembleError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Table(#[from] TableError),
}

/// Stable classification of a [`SceneError`], used in batch summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SceneErrorKind {
    Reader,
    EmptyScene,
    DuplicatePath,
    InvalidName,
    Geometry,
    InsufficientData,
    InconsistentOverlap,
    GridCollision,
    InvalidGrid,
    ShapeMismatch,
    TileRead,
    Store,
    Table,
}

impl SceneError {
    pub fn kind(&self) -> SceneErrorKind {
        match self {
            SceneError::Reader { .. } => SceneErrorKind::Reader,
            SceneError::EmptyScene => SceneErrorKind::EmptyScene,
            SceneError::DuplicatePath { .. } => SceneErrorKind::DuplicatePath,
            SceneError::InvalidName { .. } => SceneErrorKind::InvalidName,
            SceneError::Geometry(_) => SceneErrorKind::Geometry,
            SceneError::Layout(LayoutError::Overlap(OverlapError::InsufficientData { .. })) => {
                SceneErrorKind::InsufficientData
            }
            SceneError::Layout(LayoutError::Overlap(OverlapError::InconsistentOverlap {
                ..
            })) => SceneErrorKind::InconsistentOverlap,
            SceneError::Layout(LayoutError::Grid(GridError::Collision { .. })) => {
                SceneErrorKind::GridCollision
            }
            SceneError::Layout(LayoutError::Grid(_)) => SceneErrorKind::InvalidGrid,
            SceneError::Assemble(
                AssembleError::ShapeMismatch { .. }
                | AssembleError::PlaneCountMismatch { .. }
                | AssembleError::PlacementCount { .. },
            ) => SceneErrorKind::ShapeMismatch,
            SceneError::Assemble(AssembleError::TileRead { .. }) => SceneErrorKind::TileRead,
            SceneError::Assemble(AssembleError::Store(_)) | SceneError::Store(_) => {
                SceneErrorKind::Store
            }
            SceneError::Table(_) => SceneErrorKind::Table,
        }
    }
}
