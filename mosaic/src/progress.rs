//! Progress reporting for scene conversion.

use common::SharedFn;

/// Progress information for a conversion step.
#[derive(Debug, Clone)]
pub struct ConversionProgress {
    /// Completed units of work in the current stage.
    pub current: usize,
    /// Total units of work in the current stage.
    pub total: usize,
    pub stage: ConversionStage,
}

/// Stage of a scene conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ConversionStage {
    /// Writing `(tile, plane)` pairs into the full-resolution array.
    Tiles,
    /// Building downsampled levels. One unit per level.
    Pyramid,
}

/// Callback type for progress reporting.
pub type ProgressCallback = SharedFn<dyn Fn(ConversionProgress) + Send + Sync>;

/// Report progress using the callback if set.
pub fn report_progress(
    callback: &ProgressCallback,
    current: usize,
    total: usize,
    stage: ConversionStage,
) {
    callback.call_with(|f| {
        f(ConversionProgress {
            current,
            total,
            stage,
        })
    });
}
