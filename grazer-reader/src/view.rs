use url::Url;

use crate::error::{ReadError, Result};

/// Everything a page reader needs to render one map view: a centre
/// coordinate plus the site-specific viewport parameters. Built by the
/// query builder in grazer-core, one per sector.
#[derive(Debug, Clone, PartialEq)]
pub struct MapView {
    pub lat: f64,
    pub lng: f64,
    pub zoom: u8,
    /// Maximum listings the site returns per view.
    pub limit: u16,
}

impl MapView {
    pub fn new(lat: f64, lng: f64, zoom: u8) -> Self {
        Self {
            lat,
            lng,
            zoom,
            limit: 81,
        }
    }

    /// Render the site's searchmap URL for this view. The constant
    /// parameters (search kind 3, empty location, page 1, miles,
    /// default order) mirror what the site's own frontend sends for a
    /// coordinate-based search.
    pub fn search_url(&self, base: &str) -> Result<Url> {
        let mut url = Url::parse(base)
            .and_then(|u| u.join("searchmap/"))
            .map_err(|e| ReadError::InvalidUrl(format!("{base}: {e}")))?;
        url.query_pairs_mut()
            .append_pair("s", "3")
            .append_pair("location", "")
            .append_pair("lat", &self.lat.to_string())
            .append_pair("lng", &self.lng.to_string())
            .append_pair("page", "1")
            .append_pair("zoom", &self.zoom.to_string())
            .append_pair("metric", "mi")
            .append_pair("limit", &self.limit.to_string())
            .append_pair("order", "default");
        Ok(url)
    }
}
