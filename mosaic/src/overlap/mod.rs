//! Overlap estimation from consecutive tile positions.
//!
//! Walks the tiles in acquisition order and looks at each step from one tile
//! to the next. Steps that move along exactly one axis by less than a tile
//! width are adjacent overlapping tiles; each yields the factor
//! `2 - offset / tile_size`, which is `1 + overlap`. All factors of a scene must
//! agree within a tolerance. Diagonal steps (end of a raster row) carry no
//! constraint and are skipped.


use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::PhysicalGeometry;

/// Overlap estimation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlapConfig {
    /// Absolute tolerance between the factors of different tile pairs.
    pub tolerance: f64,
    /// Offsets at or below this many micrometers count as "no movement".
    pub epsilon_um: f64,
    /// Minimum number of classified pairs needed to trust the estimate.
    pub min_pairs: usize,
}

impl Default for OverlapConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.1,
            epsilon_um: 0.1,
            min_pairs: 2,
        }
    }
}

impl OverlapConfig {
    pub fn validate(&self) {
        assert!(
            self.tolerance.is_finite() && self.tolerance > 0.0,
            "overlap tolerance must be finite and > 0, got {}",
            self.tolerance
        );
        assert!(
            self.epsilon_um.is_finite() && self.epsilon_um >= 0.0,
            "overlap epsilon_um must be finite and >= 0, got {}",
            self.epsilon_um
        );
        assert!(self.min_pairs >= 1, "overlap min_pairs must be >= 1");
    }
}

/// Direction of a step between two consecutive tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum PairDirection {
    Horizontal,
    Vertical,
}

/// One classified step between consecutive tiles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapPair {
    pub prev: usize,
    pub next: usize,
    pub direction: PairDirection,
    /// Offset magnitude along the moving axis.
    pub offset_um: f64,
    /// Tile extent along the moving axis.
    pub tile_size_um: f64,
    /// `2 - offset_um / tile_size_um`.
    pub factor: f64,
}

/// Scene-wide overlap.
///
/// Stored as the grid scaling factor `1 + overlap`, which is what the grid
/// resolver multiplies normalized positions by.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct OverlapFraction(f64);

impl OverlapFraction {
    /// No overlap: tiles abut exactly.
    pub const NONE: OverlapFraction = OverlapFraction(1.0);

    pub fn from_factor(factor: f64) -> Self {
        assert!(
            (1.0..2.0).contains(&factor),
            "overlap factor must be in [1, 2), got {factor}"
        );
        Self(factor)
    }

    pub fn from_fraction(fraction: f64) -> Self {
        Self::from_factor(1.0 + fraction)
    }

    /// Grid scaling factor, `1 + fraction`.
    #[inline]
    pub fn factor(self) -> f64 {
        self.0
    }

    /// Shared fraction of adjacent tiles, in `[0, 1)`.
    #[inline]
    pub fn fraction(self) -> f64 {
        self.0 - 1.0
    }
}

impl fmt::Display for OverlapFraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}%", self.fraction() * 100.0)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OverlapError {
    #[error(
        "Cannot estimate overlap: {classified} classifiable tile pair(s), at least {required} required"
    )]
    InsufficientData { classified: usize, required: usize },

    #[error(
        "Inconsistent overlap between tiles {prev} and {next}: factor {actual:.4} differs from \
         {expected:.4} (tiles {reference_prev} and {reference_next}) by more than {tolerance}"
    )]
    InconsistentOverlap {
        prev: usize,
        next: usize,
        expected: f64,
        actual: f64,
        tolerance: f64,
        reference_prev: usize,
        reference_next: usize,
    },
}

/// Classifies every consecutive tile pair as horizontal, vertical or skipped.
///
/// A pair is classified when the offset magnitude along one axis exceeds
/// `epsilon_um`, the other axis moves at most `epsilon_um`, and the offset is
/// strictly smaller than the tile size along the moving axis. Steps too small
/// to yield a factor below 2 are skipped.
pub fn classify_pairs(geometries: &[PhysicalGeometry], epsilon_um: f64) -> Vec<OverlapPair> {
    geometries
        .windows(2)
        .enumerate()
        .filter_map(|(prev, pair)| {
            let (a, b) = (&pair[0], &pair[1]);
            let delta = (b.position_um - a.position_um).abs();
            let size = a.size_xy();

            let (direction, offset_um, tile_size_um) = if delta.x > epsilon_um
                && delta.y <= epsilon_um
            {
                (PairDirection::Horizontal, delta.x, size.x)
            } else if delta.y > epsilon_um && delta.x <= epsilon_um {
                (PairDirection::Vertical, delta.y, size.y)
            } else {
                return None;
            };

            if tile_size_um <= 0.0 || offset_um >= tile_size_um {
                return None;
            }
            // Steps below one ULP of the tile size round the factor up to 2.
            let factor = 2.0 - offset_um / tile_size_um;
            if !(1.0..2.0).contains(&factor) {
                return None;
            }

            Some(OverlapPair {
                prev,
                next: prev + 1,
                direction,
                offset_um,
                tile_size_um,
                factor,
            })
        })
        .collect()
}

/// Estimates the scene overlap.
///
/// Returns the factor of the first classified pair once every other pair agrees
/// with it within `config.tolerance`.
pub fn estimate_overlap(
    geometries: &[PhysicalGeometry],
    config: &OverlapConfig,
) -> Result<OverlapFraction, OverlapError> {
    let pairs = classify_pairs(geometries, config.epsilon_um);
    if pairs.len() < config.min_pairs {
        return Err(OverlapError::InsufficientData {
            classified: pairs.len(),
            required: config.min_pairs,
        });
    }

    let reference = pairs[0];
    if let Some(bad) = pairs
        .iter()
        .find(|p| (p.factor - reference.factor).abs() > config.tolerance)
    {
        return Err(OverlapError::InconsistentOverlap {
            prev: bad.prev,
            next: bad.next,
            expected: reference.factor,
            actual: bad.factor,
            tolerance: config.tolerance,
            reference_prev: reference.prev,
            reference_next: reference.next,
        });
    }

    tracing::debug!(
        pairs = pairs.len(),
        horizontal = pairs
            .iter()
            .filter(|p| p.direction == PairDirection::Horizontal)
            .count(),
        factor = reference.factor,
        "Overlap estimated"
    );

    Ok(OverlapFraction::from_factor(reference.factor))
}
