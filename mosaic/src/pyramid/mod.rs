//! Multi-resolution levels by integer box downsampling in y and x.
//!
//! Level `k + 1` is derived from level `k` chunk by chunk. Every output chunk
//! maps to a disjoint source window, so chunks are computed in parallel.


use common::Buffer2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::pixel::Pixel;
use crate::progress::{report_progress, ConversionStage, ProgressCallback};
use crate::store::{ArrayMeta, ArrayStore, ChunkedArray, Region, StoreResult};

/// How a `factor x factor` block collapses to one pixel.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CoarsenMethod {
    /// Block average. Integer pixels round to nearest.
    #[default]
    Mean,
    /// Top-left pixel of the block.
    Subsample,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PyramidConfig {
    /// Total levels including full resolution.
    pub num_levels: usize,
    /// Integer factor between consecutive levels in y and x.
    pub coarsening_xy: usize,
    pub method: CoarsenMethod,
}

impl Default for PyramidConfig {
    fn default() -> Self {
        Self {
            num_levels: 5,
            coarsening_xy: 2,
            method: CoarsenMethod::Mean,
        }
    }
}

impl PyramidConfig {
    pub fn validate(&self) {
        assert!(self.num_levels >= 1, "pyramid num_levels must be >= 1");
        assert!(
            self.coarsening_xy >= 2,
            "pyramid coarsening_xy must be >= 2, got {}",
            self.coarsening_xy
        );
    }
}

/// Reduces one `(y, x)` plane by an integer factor.
///
/// The output is `floor(height / factor)` by `floor(width / factor)`.
pub trait Downsampler<T: Pixel>: Send + Sync {
    fn downsample(&self, plane: &Buffer2<T>, factor: usize) -> Buffer2<T>;
}

/// Box filter downsampler.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoxDownsampler {
    pub method: CoarsenMethod,
}

impl BoxDownsampler {
    pub fn new(method: CoarsenMethod) -> Self {
        Self { method }
    }
}

impl<T: Pixel> Downsampler<T> for BoxDownsampler {
    fn downsample(&self, plane: &Buffer2<T>, factor: usize) -> Buffer2<T> {
        assert!(factor >= 1, "downsample factor must be >= 1");
        let (w, h) = (plane.width() / factor, plane.height() / factor);
        match self.method {
            CoarsenMethod::Subsample => {
                Buffer2::from_fn(w, h, |x, y| plane[(x * factor, y * factor)])
            }
            CoarsenMethod::Mean => {
                let inv = 1.0 / (factor * factor) as f64;
                Buffer2::from_fn(w, h, |x, y| {
                    let sum: f64 = (y * factor..(y + 1) * factor)
                        .flat_map(|sy| {
                            plane.row(sy)[x * factor..(x + 1) * factor]
                                .iter()
                                .map(|v| v.to_f64_lossy())
                        })
                        .sum();
                    T::from_mean(sum * inv)
                })
            }
        }
    }
}

/// Shape of the next level: trailing `(y, x)` axes divided by `factor`, rounded down.
pub fn level_shape(shape: &[u64], factor: usize) -> Vec<u64> {
    let n = shape.len();
    shape
        .iter()
        .enumerate()
        .map(|(axis, &s)| if axis + 2 >= n { s / factor as u64 } else { s })
        .collect()
}

/// Chunk shape of a level: trailing `(y, x)` chunks clamped to the level extent.
pub fn level_chunks(chunks: &[u64], shape: &[u64]) -> Vec<u64> {
    let n = chunks.len();
    chunks
        .iter()
        .zip(shape)
        .enumerate()
        .map(|(axis, (&c, &s))| if axis + 2 >= n { c.min(s).max(1) } else { c })
        .collect()
}

/// Path of pyramid level `level` of a scene.
pub fn level_path(scene_path: &str, level: usize) -> String {
    format!("{scene_path}/{level}")
}

fn source_window(target: &Region, factor: u64) -> Region {
    let n = target.rank();
    Region::new(
        target
            .ranges
            .iter()
            .enumerate()
            .map(|(axis, r)| {
                if axis + 2 >= n {
                    r.start * factor..r.end * factor
                } else {
                    r.clone()
                }
            })
            .collect(),
    )
}

fn downsample_chunk<T: Pixel>(
    source: &ChunkedArray<'_, T>,
    target: &ChunkedArray<'_, T>,
    index: &[u64],
    factor: usize,
    downsampler: &dyn Downsampler<T>,
) -> StoreResult<()> {
    let region = target.meta().chunk_region(index);
    let window = source_window(&region, factor as u64);
    let pixels = source.read_region(&window)?;

    let shape = window.shape();
    let n = shape.len();
    let (h, w) = (shape[n - 2] as usize, shape[n - 1] as usize);
    let mut out = Vec::with_capacity(region.len());
    for plane in pixels.chunks_exact(h * w) {
        let plane = Buffer2::new(w, h, plane.to_vec());
        out.extend_from_slice(downsampler.downsample(&plane, factor).pixels());
    }
    target.write_region(&region, &out)
}

/// Builds levels `1..num_levels` from `level0`, stored next to it under `scene_path`.
///
/// Returns the metadata of every level written, level 0 first. Stops early
/// when a level would have no pixels.
pub fn build_pyramid<T: Pixel>(
    store: &dyn ArrayStore,
    scene_path: &str,
    level0: &ChunkedArray<'_, T>,
    config: &PyramidConfig,
    downsampler: &dyn Downsampler<T>,
    overwrite: bool,
    progress: &ProgressCallback,
) -> StoreResult<Vec<ArrayMeta>> {
    config.validate();
    let factor = config.coarsening_xy;
    let mut levels = vec![level0.meta().clone()];
    let mut previous: Option<ChunkedArray<'_, T>> = None;
    let total = config.num_levels - 1;

    for level in 1..config.num_levels {
        let source = previous.as_ref().unwrap_or(level0);
        let shape = level_shape(source.shape(), factor);
        let n = shape.len();
        if shape[n - 2] == 0 || shape[n - 1] == 0 {
            tracing::warn!(
                scene = scene_path,
                level,
                requested = config.num_levels,
                "Pyramid level would be empty, stopping early"
            );
            break;
        }
        let chunks = level_chunks(source.chunks(), &shape);
        let target = ChunkedArray::<T>::create(
            store,
            &level_path(scene_path, level),
            shape,
            chunks,
            overwrite,
        )?;

        let indices = Region::full(&target.meta().chunk_grid_shape()).points();
        indices
            .par_iter()
            .try_for_each(|index| downsample_chunk(source, &target, index, factor, downsampler))?;

        tracing::info!(
            scene = scene_path,
            level,
            shape = ?target.shape(),
            "Pyramid level written"
        );
        report_progress(progress, level, total, ConversionStage::Pyramid);
        levels.push(target.meta().clone());
        previous = Some(target);
    }

    Ok(levels)
}
