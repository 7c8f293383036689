//! Batch conversion over all scenes of an acquisition.

use hashbrown::HashSet;

use crate::error::{SceneError, SceneErrorKind};
use crate::pixel::Pixel;
use crate::scene::{scene_path, SceneConverter, SceneOutput};
use crate::tile::TileSource;

/// Acquisition reader: lists scenes and yields their tiles in acquisition order.
pub trait SceneReader<T: Pixel> {
    fn scene_names(&self) -> anyhow::Result<Vec<String>>;

    fn list_tiles(&self, scene: &str) -> anyhow::Result<Vec<Box<dyn TileSource<T>>>>;
}

/// A scene that was not converted, with the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedScene {
    pub name: String,
    pub kind: SceneErrorKind,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub converted: Vec<SceneOutput>,
    pub skipped: Vec<SkippedScene>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.converted.len() + self.skipped.len()
    }

    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }

    pub fn log_summary(&self) {
        if self.is_complete() {
            tracing::info!(converted = self.converted.len(), "Batch finished");
            return;
        }
        tracing::warn!(
            converted = self.converted.len(),
            skipped = self.skipped.len(),
            "Batch finished with skipped scenes"
        );
        for skipped in &self.skipped {
            tracing::warn!(
                scene = %skipped.name,
                kind = %skipped.kind,
                reason = %skipped.reason,
                "Skipped"
            );
        }
    }
}

/// Converts scenes one after another. Only a failure to list scenes is fatal.
pub fn run_batch<T: Pixel>(
    converter: &SceneConverter<'_, T>,
    reader: &dyn SceneReader<T>,
) -> Result<BatchReport, SceneError> {
    let names = reader
        .scene_names()
        .map_err(|source| SceneError::Reader { source })?;
    let mut report = BatchReport::default();
    let mut paths = HashSet::new();

    for name in names {
        let result = if paths.insert(scene_path(&name)) {
            reader
                .list_tiles(&name)
                .map_err(|source| SceneError::Reader { source })
                .and_then(|tiles| converter.convert(&name, &tiles))
        } else {
            Err(SceneError::DuplicatePath {
                path: scene_path(&name),
            })
        };

        match result {
            Ok(output) => report.converted.push(output),
            Err(err) => {
                tracing::error!(scene = %name, kind = %err.kind(), "Scene skipped: {err}");
                report.skipped.push(SkippedScene {
                    name,
                    kind: err.kind(),
                    reason: err.to_string(),
                });
            }
        }
    }

    report.log_summary();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use glam::DVec2;

    use super::*;
    use crate::config::ConversionConfig;
    use crate::pyramid::PyramidConfig;
    use crate::regions::MemoryTableWriter;
    use crate::store::MemoryStore;
    use crate::testing::{init_tracing, pattern_plane, tile_metadata, InMemoryReader, RasterScene};
    use crate::tile::{FrameDims, InMemoryTile};

    fn converter<'a>(
        store: &'a MemoryStore,
        tables: &'a MemoryTableWriter,
    ) -> SceneConverter<'a, u16> {
        let config = ConversionConfig {
            pyramid: PyramidConfig {
                num_levels: 2,
                ..Default::default()
            },
            ..Default::default()
        };
        SceneConverter::new(store, tables, config)
    }

    /// Centre tile of a 3x3 raster pushed 15 um to the right.
    fn inconsistent_tiles() -> Vec<InMemoryTile<u16>> {
        let scene = RasterScene::new(3, 3).with_overlap(0.2);
        let dims = scene.dims;
        scene
            .metadata()
            .into_iter()
            .map(|mut meta| {
                if meta.index == 4 {
                    meta.stage_position.x += 15.0;
                }
                let index = meta.index;
                InMemoryTile::from_fn(meta, |p| pattern_plane(index, p, dims))
            })
            .collect()
    }

    #[test]
    fn test_failed_scenes_do_not_abort_batch() {
        init_tracing();
        let reader = InMemoryReader::<u16>::new()
            .with_scene("Position 1", RasterScene::new(2, 2).tiles())
            .with_unreadable_scene("Position 2")
            .with_scene("Position 3", inconsistent_tiles())
            .with_scene("Position 4", Vec::new())
            .with_scene("Position 5", RasterScene::new(1, 3).tiles());
        let store = MemoryStore::new();
        let tables = MemoryTableWriter::new();

        let report = converter(&store, &tables).convert_batch(&reader).unwrap();

        assert_eq!(report.total(), 5);
        assert!(!report.is_complete());
        let converted: Vec<&str> = report.converted.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(converted, vec!["Position 1", "Position 5"]);

        let skipped: Vec<(&str, SceneErrorKind)> = report
            .skipped
            .iter()
            .map(|s| (s.name.as_str(), s.kind))
            .collect();
        assert_eq!(
            skipped,
            vec![
                ("Position 2", SceneErrorKind::Reader),
                ("Position 3", SceneErrorKind::InconsistentOverlap),
                ("Position 4", SceneErrorKind::EmptyScene),
            ]
        );
        assert!(report.skipped[0].reason.contains("unreadable"));

        assert!(store.is_group("Position-1"));
        assert!(store.is_group("Position-5"));
        assert!(!store.is_group("Position-3"));
    }

    #[test]
    fn test_duplicate_scene_paths_are_skipped() {
        let reader = InMemoryReader::<u16>::new()
            .with_scene("A 1", RasterScene::new(1, 3).tiles())
            .with_scene("A-1", RasterScene::new(2, 1).tiles());
        let store = MemoryStore::new();
        let tables = MemoryTableWriter::new();

        let report = converter(&store, &tables).convert_batch(&reader).unwrap();

        assert_eq!(report.converted.len(), 1);
        assert_eq!(report.converted[0].name, "A 1");
        assert_eq!(report.skipped[0].kind, SceneErrorKind::DuplicatePath);
        assert!(report.skipped[0].reason.contains("'A-1'"));
        // The first scene's output survives.
        assert_eq!(report.converted[0].shape, vec![1, 1, 16, 48]);
    }

    #[test]
    fn test_complete_batch() {
        let dims = FrameDims::new(1, 1, 1, 8, 8);
        let lone = InMemoryTile::from_fn(tile_metadata(0, dims, DVec2::ZERO, 50.0), |p| {
            pattern_plane(0, p, dims)
        });
        let reader = InMemoryReader::<u16>::new()
            .with_scene("lone", vec![lone])
            .with_scene("raster", RasterScene::new(2, 2).tiles());
        let store = MemoryStore::new();
        let tables = MemoryTableWriter::new();

        let report = converter(&store, &tables).convert_batch(&reader).unwrap();
        assert!(report.is_complete());
        assert_eq!(report.total(), 2);
        assert_eq!(tables.len(), 4);
    }

    struct BrokenReader;

    impl SceneReader<u16> for BrokenReader {
        fn scene_names(&self) -> anyhow::Result<Vec<String>> {
            anyhow::bail!("container header is truncated")
        }

        fn list_tiles(&self, _scene: &str) -> anyhow::Result<Vec<Box<dyn TileSource<u16>>>> {
            unreachable!()
        }
    }

    #[test]
    fn test_listing_failure_is_fatal() {
        let store = MemoryStore::new();
        let tables = MemoryTableWriter::new();
        let err = converter(&store, &tables)
            .convert_batch(&BrokenReader)
            .unwrap_err();
        assert_eq!(err.kind(), SceneErrorKind::Reader);
        assert!(err.to_string().contains("truncated"));
    }
}
