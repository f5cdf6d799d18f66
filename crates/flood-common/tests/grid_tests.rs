//! Tests for grid georeferencing and event keys working together.

use flood_common::{BoundingBox, Crs, EventKey, GeoTransform, RasterGrid};

// ============================================================================
// RasterGrid geometry
// ============================================================================

#[test]
fn test_cell_centers_inside_bounds() {
    let grid = RasterGrid::new(
        Some(Crs::EQUI7_EUROPE),
        GeoTransform::new(4_000_000.0, 2_500_000.0, 20.0, 20.0),
        300,
        200,
    )
    .unwrap();
    let bounds = grid.bounds();

    for (col, row) in [(0, 0), (299, 0), (0, 199), (299, 199), (150, 100)] {
        let (x, y) = grid.cell_center(col, row);
        assert!(bounds.contains_point(x, y), "center of ({col}, {row}) outside bounds");
    }
}

#[test]
fn test_cell_center_maps_back_to_cell() {
    let grid = RasterGrid::new(
        None,
        GeoTransform::new(-3.0, 44.0, 0.01, 0.02),
        120,
        80,
    )
    .unwrap();

    let (x, y) = grid.cell_center(17, 42);
    let (col, row) = grid.transform.world_to_pixel(x, y);
    assert_eq!(col.floor() as usize, 17);
    assert_eq!(row.floor() as usize, 42);
}

#[test]
fn test_downsample_keeps_origin_and_shrinks_extent() {
    let grid = RasterGrid::new(
        Some(Crs::WGS84),
        GeoTransform::new(0.0, 10.0, 1.0, 1.0),
        10,
        7,
    )
    .unwrap();

    let down = grid.downsampled(2).unwrap();
    assert_eq!((down.width, down.height), (5, 3));
    assert_eq!(down.bounds(), BoundingBox::new(0.0, 4.0, 10.0, 10.0));
    assert_eq!(down.crs, Some(Crs::WGS84));
}

#[test]
fn test_with_crs_only_changes_reference() {
    let grid = RasterGrid::new(None, GeoTransform::new(0.0, 1.0, 0.1, 0.1), 10, 10).unwrap();
    let tagged = grid.with_crs(Crs::EQUI7_EUROPE);
    assert_eq!(tagged.crs, Some(Crs::EQUI7_EUROPE));
    assert_eq!(tagged.transform, grid.transform);
    assert_eq!((tagged.width, tagged.height), (grid.width, grid.height));
}

// ============================================================================
// EventKey ordering
// ============================================================================

#[test]
fn test_event_keys_sort_chronologically() {
    let mut keys: Vec<EventKey> = [
        "2024-03-01__2024-03-05",
        "2023-11-20__2023-11-30",
        "2024-03-01__2024-03-02",
    ]
    .iter()
    .map(|s| s.parse().unwrap())
    .collect();
    keys.sort();

    let tokens: Vec<String> = keys.iter().map(EventKey::token).collect();
    assert_eq!(
        tokens,
        vec![
            "2023-11-20__2023-11-30",
            "2024-03-01__2024-03-02",
            "2024-03-01__2024-03-05",
        ]
    );
}
