use std::str::FromStr;

use grazer_reader::MapView;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Error;

/// Geographic bounding box of the crawl area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Singapore extents, the fixed crawl area.
    pub fn singapore() -> Self {
        Self {
            min_lat: 1.2,
            max_lat: 1.5,
            min_lng: 103.6,
            max_lng: 104.0,
        }
    }
}

/// One rectangular cell of the grid. Transient planning unit; never
/// persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sector {
    /// Row-major index in `0..rows*cols`, the crawl's iteration order.
    pub index: usize,
    pub row: usize,
    pub col: usize,
    pub center_lat: f64,
    pub center_lng: f64,
    pub bounds: Bounds,
}

impl Sector {
    /// Build the map-view descriptor the page reader needs to render
    /// this sector.
    pub fn view(&self, zoom: u8) -> MapView {
        MapView::new(self.center_lat, self.center_lng, zoom)
    }
}

/// Named subsets of the grid, taken from the compass-quadrant layout of
/// the Singapore crawl. Predicates use 1-based row/column positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Central,
    East,
    West,
    North,
    Northeast,
    South,
}

impl Region {
    fn contains(&self, row1: usize, col1: usize) -> bool {
        match self {
            Region::Central => (2..=4).contains(&row1) && (3..=6).contains(&col1),
            Region::East => (7..=8).contains(&col1),
            Region::West => (1..=2).contains(&col1),
            Region::North => (5..=6).contains(&row1),
            Region::Northeast => (4..=6).contains(&row1) && (5..=8).contains(&col1),
            Region::South => (1..=2).contains(&row1),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Central => "central",
            Region::East => "east",
            Region::West => "west",
            Region::North => "north",
            Region::Northeast => "northeast",
            Region::South => "south",
        }
    }
}

impl FromStr for Region {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "central" => Ok(Region::Central),
            "east" => Ok(Region::East),
            "west" => Ok(Region::West),
            "north" => Ok(Region::North),
            "northeast" => Ok(Region::Northeast),
            "south" => Ok(Region::South),
            other => Err(Error::UnknownRegion(other.to_string())),
        }
    }
}

/// Partitions the bounding box into `rows * cols` sectors with no gaps
/// and no required overlap. Pure; the same inputs always produce the
/// same sectors in the same row-major order.
#[derive(Debug, Clone)]
pub struct SectorGrid {
    bounds: Bounds,
    rows: usize,
    cols: usize,
    lat_step: f64,
    lng_step: f64,
}

impl SectorGrid {
    pub fn new(bounds: Bounds, rows: usize, cols: usize) -> Self {
        assert!(rows > 0 && cols > 0, "grid dimensions must be non-zero");
        Self {
            bounds,
            rows,
            cols,
            lat_step: (bounds.max_lat - bounds.min_lat) / rows as f64,
            lng_step: (bounds.max_lng - bounds.min_lng) / cols as f64,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(Bounds::singapore(), config.grid_rows, config.grid_cols)
    }

    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sector(&self, index: usize) -> Option<Sector> {
        if index >= self.len() {
            return None;
        }
        let row = index / self.cols;
        let col = index % self.cols;

        let min_lat = self.bounds.min_lat + row as f64 * self.lat_step;
        let min_lng = self.bounds.min_lng + col as f64 * self.lng_step;

        Some(Sector {
            index,
            row,
            col,
            center_lat: min_lat + self.lat_step / 2.0,
            center_lng: min_lng + self.lng_step / 2.0,
            bounds: Bounds {
                min_lat,
                max_lat: min_lat + self.lat_step,
                min_lng,
                max_lng: min_lng + self.lng_step,
            },
        })
    }

    /// All sectors in row-major order.
    pub fn sectors(&self) -> Vec<Sector> {
        (0..self.len())
            .map(|i| self.sector(i).expect("index in range"))
            .collect()
    }

    /// Sectors belonging to a named region, still in row-major order.
    pub fn sectors_in(&self, region: Region) -> Vec<Sector> {
        self.sectors()
            .into_iter()
            .filter(|s| region.contains(s.row + 1, s.col + 1))
            .collect()
    }
}
