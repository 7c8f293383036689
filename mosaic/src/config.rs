//! Conversion configuration.

use std::io;
use std::path::{Path, PathBuf};

use common::{FileExtensionError, FileFormat, SerdeFormatError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::AxisTransform;
use crate::layout::StitchingMode;
use crate::overlap::OverlapConfig;
use crate::pyramid::PyramidConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unsupported config file: {0}")]
    Format(#[from] FileExtensionError),

    #[error("Failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write config '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid config '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: SerdeFormatError,
    },
}

/// Settings shared by every scene of a conversion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    pub stitching: StitchingMode,
    /// Stage-to-image axis mapping applied before overlap estimation.
    pub axes: AxisTransform,
    pub overlap: OverlapConfig,
    pub pyramid: PyramidConfig,
    /// Upper bound on tile planes decoded and written at once.
    pub max_concurrent_tiles: usize,
    /// Replace existing scenes instead of failing.
    pub overwrite: bool,
    pub fov_table_name: String,
    pub scene_table_name: String,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            stitching: StitchingMode::default(),
            axes: AxisTransform::IDENTITY,
            overlap: OverlapConfig::default(),
            pyramid: PyramidConfig::default(),
            max_concurrent_tiles: 16,
            overwrite: true,
            fov_table_name: "FOV_ROI_table".to_string(),
            scene_table_name: "well_ROI_table".to_string(),
        }
    }
}

impl ConversionConfig {
    /// Loads a YAML or JSON config, picked by file extension.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let format = FileFormat::from_path(path)?;
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        common::deserialize(&text, format).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let format = FileFormat::from_path(path)?;
        let text = common::serialize(self, format).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, text).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) {
        self.overlap.validate();
        self.pyramid.validate();
        assert!(
            self.max_concurrent_tiles > 0,
            "max_concurrent_tiles must be > 0"
        );
        assert!(
            !self.fov_table_name.is_empty() && !self.scene_table_name.is_empty(),
            "table names must not be empty"
        );
        assert_ne!(
            self.fov_table_name, self.scene_table_name,
            "FOV and scene tables need distinct names"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pyramid::CoarsenMethod;

    #[test]
    fn test_defaults() {
        let config = ConversionConfig::default();
        config.validate();
        assert_eq!(config.stitching, StitchingMode::Grid);
        assert_eq!(config.overlap.tolerance, 0.1);
        assert_eq!(config.pyramid.num_levels, 5);
        assert_eq!(config.pyramid.coarsening_xy, 2);
        assert!(config.overwrite);
        assert_eq!(config.fov_table_name, "FOV_ROI_table");
        assert_eq!(config.scene_table_name, "well_ROI_table");
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("convert.yaml");
        std::fs::write(
            &path,
            "stitching: auto\naxes:\n  swap_xy: true\npyramid:\n  num_levels: 3\n  method: subsample\noverwrite: false\n",
        )
        .unwrap();

        let config = ConversionConfig::from_file(&path).unwrap();
        assert_eq!(config.stitching, StitchingMode::Auto);
        assert!(config.axes.swap_xy);
        assert!(!config.axes.invert_x);
        assert_eq!(config.pyramid.num_levels, 3);
        assert_eq!(config.pyramid.method, CoarsenMethod::Subsample);
        assert_eq!(config.pyramid.coarsening_xy, 2);
        assert!(!config.overwrite);
        assert_eq!(config.max_concurrent_tiles, 16);
    }

    #[test]
    fn test_save_and_load_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("convert.json");
        let config = ConversionConfig {
            stitching: StitchingMode::None,
            max_concurrent_tiles: 4,
            ..Default::default()
        };
        config.save(&path).unwrap();
        assert_eq!(ConversionConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ConversionConfig::from_file(&dir.path().join("convert.toml")),
            Err(ConfigError::Format(_))
        ));
        assert!(matches!(
            ConversionConfig::from_file(&dir.path().join("missing.yaml")),
            Err(ConfigError::Read { .. })
        ));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{ \"stitching\": \"sideways\" }").unwrap();
        assert!(matches!(
            ConversionConfig::from_file(&bad),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    #[should_panic(expected = "FOV and scene tables need distinct names")]
    fn test_validate_rejects_same_table_names() {
        ConversionConfig {
            scene_table_name: "FOV_ROI_table".to_string(),
            ..Default::default()
        }
        .validate();
    }
}
