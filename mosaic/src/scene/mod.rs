//! Single-scene conversion pipeline.
//!
//! geometry -> layout -> full-resolution array -> pyramid -> region tables.


use crate::assemble::{assemble, check_frame_dims, AssemblyPlan};
use crate::batch::{run_batch, BatchReport, SceneReader};
use crate::config::ConversionConfig;
use crate::error::SceneError;
use crate::geometry::extract_scene_geometry;
use crate::layout::{resolve_layout, LayoutKind};
use crate::overlap::OverlapFraction;
use crate::pixel::Pixel;
use crate::progress::ProgressCallback;
use crate::pyramid::{build_pyramid, level_path, BoxDownsampler, Downsampler};
use crate::regions::{emit_regions, RegionTables, TableWriter};
use crate::store::ArrayStore;
use crate::tile::{TileMetadata, TileSource};

/// Store path of a scene: spaces become `-`, slashes become `_`.
pub fn scene_path(name: &str) -> String {
    name.replace(' ', "-").replace('/', "_")
}

/// What a converted scene hands to metadata and plate bookkeeping layers.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneOutput {
    pub name: String,
    /// Group path inside the store.
    pub path: String,
    /// Store location of the scene group.
    pub location: String,
    pub is_3d: bool,
    pub is_time_series: bool,
    /// Full-resolution array shape, `[t?, c, z, y, x]`.
    pub shape: Vec<u64>,
    /// Pyramid levels written, including full resolution.
    pub levels: usize,
    pub layout: LayoutKind,
    pub overlap: Option<OverlapFraction>,
    pub regions: RegionTables,
}

/// Converts scenes of `T` pixels into an array store.
pub struct SceneConverter<'a, T: Pixel> {
    store: &'a dyn ArrayStore,
    tables: &'a dyn TableWriter,
    config: ConversionConfig,
    downsampler: Box<dyn Downsampler<T>>,
    progress: ProgressCallback,
}

impl<'a, T: Pixel> SceneConverter<'a, T> {
    pub fn new(
        store: &'a dyn ArrayStore,
        tables: &'a dyn TableWriter,
        config: ConversionConfig,
    ) -> Self {
        config.validate();
        let downsampler: Box<dyn Downsampler<T>> =
            Box::new(BoxDownsampler::new(config.pyramid.method));
        Self {
            store,
            tables,
            config,
            downsampler,
            progress: ProgressCallback::default(),
        }
    }

    pub fn with_downsampler(mut self, downsampler: Box<dyn Downsampler<T>>) -> Self {
        self.downsampler = downsampler;
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Converts one scene.
    ///
    /// A failure after the array was allocated leaves the written part in the
    /// store. Re-running the scene with `overwrite` replaces it.
    pub fn convert(
        &self,
        name: &str,
        tiles: &[Box<dyn TileSource<T>>],
    ) -> Result<SceneOutput, SceneError> {
        let path = scene_path(name);
        if matches!(path.as_str(), "" | "." | "..") {
            return Err(SceneError::InvalidName {
                name: name.to_string(),
            });
        }
        let Some(first) = tiles.first() else {
            return Err(SceneError::EmptyScene);
        };
        let dims = first.metadata().dims;
        let metadata: Vec<TileMetadata> = tiles.iter().map(|t| t.metadata().clone()).collect();
        check_frame_dims(dims, metadata.iter().enumerate().map(|(i, m)| (i, &m.dims)))
            .map_err(SceneError::from)?;

        let geometries = extract_scene_geometry(&metadata, self.config.axes)?;
        let layout = resolve_layout(
            &geometries,
            dims,
            self.config.stitching,
            &self.config.overlap,
        )?;
        tracing::info!(
            scene = name,
            tiles = tiles.len(),
            mode = %self.config.stitching,
            layout = %layout.kind(),
            overlap = ?layout.overlap().map(|o| o.fraction()),
            "Layout resolved"
        );

        self.store.create_group(&path, self.config.overwrite)?;

        let plan = AssemblyPlan::from_layout(&layout, dims);
        let array = plan.create_array::<T>(
            self.store,
            &level_path(&path, 0),
            self.config.overwrite,
        )?;
        tracing::info!(
            scene = name,
            shape = ?array.shape(),
            chunks = ?array.chunks(),
            dtype = %T::DATA_TYPE,
            "Array allocated"
        );

        assemble(
            &array,
            tiles,
            &plan,
            self.config.max_concurrent_tiles,
            &self.progress,
        )?;

        let levels = build_pyramid(
            self.store,
            &path,
            &array,
            &self.config.pyramid,
            self.downsampler.as_ref(),
            self.config.overwrite,
            &self.progress,
        )?;

        let regions = emit_regions(&geometries, &layout);
        for table in regions
            .clone()
            .into_tables(&self.config.fov_table_name, &self.config.scene_table_name)
        {
            self.tables.write_table(&path, &table)?;
        }

        tracing::info!(
            scene = name,
            path = %path,
            levels = levels.len(),
            "Scene converted"
        );

        Ok(SceneOutput {
            name: name.to_string(),
            location: self.store.location(&path),
            path,
            is_3d: dims.is_3d(),
            is_time_series: dims.is_time_series(),
            shape: plan.array_shape(),
            levels: levels.len(),
            layout: layout.kind(),
            overlap: layout.overlap(),
            regions,
        })
    }

    /// Converts every scene `reader` lists. Failed scenes are reported, not fatal.
    pub fn convert_batch(&self, reader: &dyn SceneReader<T>) -> Result<BatchReport, SceneError> {
        run_batch(self, reader)
    }
}
