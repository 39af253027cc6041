// Tests for sector grid partitioning

use grazer_core::grid::{Bounds, Region, SectorGrid};

fn default_grid() -> SectorGrid {
    SectorGrid::new(Bounds::singapore(), 6, 8)
}

// ============================================================================
// Coverage Tests
// ============================================================================

#[test]
fn test_sectors_tile_the_bounding_box() {
    let grid = default_grid();
    let bounds = Bounds::singapore();
    let sectors = grid.sectors();
    assert_eq!(sectors.len(), 48);

    for sector in &sectors {
        assert!(sector.bounds.min_lat >= bounds.min_lat - 1e-9);
        assert!(sector.bounds.max_lat <= bounds.max_lat + 1e-9);
        assert!(sector.bounds.min_lng >= bounds.min_lng - 1e-9);
        assert!(sector.bounds.max_lng <= bounds.max_lng + 1e-9);
        assert!(sector.center_lat > sector.bounds.min_lat);
        assert!(sector.center_lat < sector.bounds.max_lat);
    }

    // Total sector area equals the box area, so there are no gaps.
    let area: f64 = sectors
        .iter()
        .map(|s| {
            (s.bounds.max_lat - s.bounds.min_lat) * (s.bounds.max_lng - s.bounds.min_lng)
        })
        .sum();
    let box_area = (bounds.max_lat - bounds.min_lat) * (bounds.max_lng - bounds.min_lng);
    assert!((area - box_area).abs() < 1e-9);
}

#[test]
fn test_sector_order_is_row_major_and_deterministic() {
    let grid = default_grid();
    let sectors = grid.sectors();

    for (i, sector) in sectors.iter().enumerate() {
        assert_eq!(sector.index, i);
        assert_eq!(sector.row, i / 8);
        assert_eq!(sector.col, i % 8);
    }

    // Same inputs, same sectors.
    let again = default_grid().sectors();
    assert_eq!(sectors, again);
}

#[test]
fn test_out_of_range_index() {
    let grid = default_grid();
    assert!(grid.sector(47).is_some());
    assert!(grid.sector(48).is_none());
}

// ============================================================================
// Region Tests
// ============================================================================

#[test]
fn test_region_sector_counts() {
    let grid = default_grid();

    assert_eq!(grid.sectors_in(Region::Central).len(), 12); // rows 2-4 x cols 3-6
    assert_eq!(grid.sectors_in(Region::East).len(), 12); // cols 7-8
    assert_eq!(grid.sectors_in(Region::West).len(), 12); // cols 1-2
    assert_eq!(grid.sectors_in(Region::North).len(), 16); // rows 5-6
    assert_eq!(grid.sectors_in(Region::Northeast).len(), 12); // rows 4-6 x cols 5-8
    assert_eq!(grid.sectors_in(Region::South).len(), 16); // rows 1-2
}

#[test]
fn test_region_parsing() {
    assert_eq!("east".parse::<Region>().unwrap(), Region::East);
    assert_eq!("NorthEast".parse::<Region>().unwrap(), Region::Northeast);
    assert!("midlands".parse::<Region>().is_err());
}
