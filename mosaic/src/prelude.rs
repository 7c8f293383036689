//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use mosaic::prelude::*;
//! ```

// Tiles
pub use crate::{FrameDims, Pixel, PlaneIndex, TileMetadata, TileSource};

// Pipeline
pub use crate::{
    BatchReport, ConversionConfig, SceneConverter, SceneError, SceneOutput, SceneReader,
    StitchingMode,
};

// Storage
pub use crate::{ArrayStore, FilesystemStore, JsonTableWriter, MemoryStore, TableWriter};
