use glam::{DVec2, DVec3};

use super::*;

fn tile(x: f64, y: f64) -> PhysicalGeometry {
    sized(x, y, 100.0, 100.0)
}

fn sized(x: f64, y: f64, w: f64, h: f64) -> PhysicalGeometry {
    PhysicalGeometry {
        size_um: DVec3::new(w, h, 0.0),
        position_um: DVec2::new(x, y),
    }
}

fn coords(grid: &TileGrid) -> Vec<(usize, usize)> {
    grid.coordinates().iter().map(|c| (c.row, c.col)).collect()
}

#[test]
fn test_uniform_overlap_assigns_distinct_cells() {
    for fraction in [0.05, 0.1, 0.2, 0.3] {
        let step = 100.0 * (1.0 - fraction);
        let tiles: Vec<_> = (0..4)
            .flat_map(|r| (0..5).map(move |c| tile(c as f64 * step, r as f64 * step)))
            .collect();
        let grid = resolve_grid(&tiles, OverlapFraction::from_fraction(fraction)).unwrap();

        let mut unique = coords(&grid);
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), tiles.len(), "fraction {fraction}");
        assert_eq!(grid.extent(), GridExtent { rows: 4, cols: 5 });
        assert!(grid.is_dense());
    }
}

#[test]
fn test_row_follows_y_and_col_follows_x() {
    let tiles = [tile(90.0, 0.0), tile(0.0, 90.0)];
    let grid = resolve_grid(&tiles, OverlapFraction::from_fraction(0.1)).unwrap();
    assert_eq!(grid.coordinate(0), GridCoordinate::new(0, 1));
    assert_eq!(grid.coordinate(1), GridCoordinate::new(1, 0));
    assert_eq!(grid.extent(), GridExtent { rows: 2, cols: 2 });
}

#[test]
fn test_positions_are_normalized_to_scene_origin() {
    let tiles = [
        tile(-500.0, 1200.0),
        tile(-410.0, 1200.0),
        tile(-500.0, 1290.0),
    ];
    let grid = resolve_grid(&tiles, OverlapFraction::from_fraction(0.1)).unwrap();
    assert_eq!(coords(&grid), vec![(0, 0), (0, 1), (1, 0)]);
}

#[test]
fn test_sparse_grid_is_allowed() {
    // 3x3 raster with the centre tile missing.
    let tiles: Vec<_> = (0..3)
        .flat_map(|r| (0..3).map(move |c| (r, c)))
        .filter(|&(r, c)| (r, c) != (1, 1))
        .map(|(r, c)| tile(c as f64 * 80.0, r as f64 * 80.0))
        .collect();
    let grid = resolve_grid(&tiles, OverlapFraction::from_fraction(0.2)).unwrap();
    assert_eq!(grid.len(), 8);
    assert_eq!(grid.extent(), GridExtent { rows: 3, cols: 3 });
    assert!(!grid.is_dense());
}

#[test]
fn test_collision_is_an_error() {
    // Two tiles 10 um apart round to the same cell.
    let tiles = [tile(0.0, 0.0), tile(90.0, 0.0), tile(100.0, 0.0)];
    let err = resolve_grid(&tiles, OverlapFraction::from_fraction(0.1)).unwrap_err();
    assert_eq!(
        err,
        GridError::Collision {
            first: 1,
            second: 2,
            coordinate: GridCoordinate::new(0, 1),
        }
    );
}

#[test]
fn test_rectangular_tiles_use_per_axis_size() {
    let tiles = [
        sized(0.0, 0.0, 200.0, 50.0),
        sized(180.0, 0.0, 200.0, 50.0),
        sized(0.0, 45.0, 200.0, 50.0),
    ];
    let grid = resolve_grid(&tiles, OverlapFraction::from_fraction(0.1)).unwrap();
    assert_eq!(coords(&grid), vec![(0, 0), (0, 1), (1, 0)]);
}

#[test]
fn test_rounding_is_half_to_even() {
    // factor 1.25, size 100: 40 um -> 0.5 -> 0, 200 um -> 2.5 -> 2, 120 um -> 1.5 -> 2.
    let tiles = [tile(0.0, 0.0), tile(40.0, 200.0), tile(120.0, 0.0)];
    let grid = resolve_grid(&tiles, OverlapFraction::from_factor(1.25)).unwrap();
    assert_eq!(coords(&grid), vec![(0, 0), (2, 0), (0, 2)]);
    assert_eq!(grid.extent(), GridExtent { rows: 3, cols: 3 });
}

#[test]
fn test_single_tile_resolves_to_origin() {
    let grid = resolve_grid(&[tile(1234.0, -56.0)], OverlapFraction::NONE).unwrap();
    assert_eq!(grid, TileGrid::single());
}

#[test]
fn test_empty_scene_gives_empty_grid() {
    let grid = resolve_grid(&[], OverlapFraction::NONE).unwrap();
    assert!(grid.is_empty());
    assert_eq!(grid.extent().cells(), 0);
}

#[test]
fn test_degenerate_reference_size() {
    let tiles = [sized(0.0, 0.0, 100.0, 0.0), tile(90.0, 0.0)];
    assert_eq!(
        resolve_grid(&tiles, OverlapFraction::from_fraction(0.1)),
        Err(GridError::DegenerateTileSize {
            axis: SpatialAxis::Y,
            size_um: 0.0
        })
    );
}

#[test]
fn test_non_finite_position() {
    let tiles = [tile(0.0, 0.0), tile(f64::NAN, 0.0)];
    assert!(matches!(
        resolve_grid(&tiles, OverlapFraction::NONE),
        Err(GridError::NonFinitePosition { .. })
    ));
}

#[test]
fn test_collision_message_names_both_tiles() {
    let err = GridError::Collision {
        first: 3,
        second: 7,
        coordinate: GridCoordinate::new(1, 2),
    };
    assert_eq!(
        err.to_string(),
        "Tiles 3 and 7 both resolve to grid cell (row 1, col 2)"
    );
}

// Step c maps to c * (1 - f^2), so a wide row at high overlap drifts by a
// whole cell before its end and the resolver reports a clash.
#[test]
fn test_high_overlap_wide_row_collides() {
    let tiles: Vec<_> = (0..4).map(|c| tile(c as f64 * 55.0, 0.0)).collect();
    let err = resolve_grid(&tiles, OverlapFraction::from_fraction(0.45)).unwrap_err();
    assert!(matches!(
        err,
        GridError::Collision {
            first: 2,
            second: 3,
            ..
        }
    ));
}

// The same drift at 10% overlap: 0.99 c reaches a half-cell error at c = 50.
#[test]
fn test_ten_percent_overlap_collides_past_fifty_columns() {
    let row = |cols: usize| -> Vec<PhysicalGeometry> {
        (0..cols).map(|c| tile(c as f64 * 90.0, 0.0)).collect()
    };
    let overlap = OverlapFraction::from_fraction(0.1);

    let grid = resolve_grid(&row(51), overlap).unwrap();
    assert_eq!(grid.extent(), GridExtent { rows: 1, cols: 51 });

    let err = resolve_grid(&row(52), overlap).unwrap_err();
    assert!(matches!(
        err,
        GridError::Collision {
            first: 50,
            second: 51,
            ..
        }
    ));
}
