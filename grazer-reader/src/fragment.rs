use serde::{Deserialize, Serialize};

/// One raw marker/listing unit as reported by a rendered map view.
///
/// Everything is optional at this boundary: map views carry decorative
/// and clustered markers that never resolve to a real venue. Validation
/// happens downstream in the record extractor, not here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawFragment {
    pub name: Option<String>,
    /// Latitude as reported by the page, unparsed.
    pub lat: Option<String>,
    /// Longitude as reported by the page, unparsed.
    pub lng: Option<String>,
    pub address: Option<String>,
    /// Venue page URL on the source site, absolute.
    pub listing_url: Option<String>,
    pub category: Option<String>,
    pub rating: Option<String>,
    pub review_count: Option<String>,
    pub price_range: Option<String>,
    pub is_vegan: bool,
    pub is_vegetarian: bool,
    pub has_veg_options: bool,
}

/// Fields scraped from a venue's detail/reviews page during enrichment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawDetailFragment {
    pub phone: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price_range: Option<String>,
    pub rating: Option<String>,
    pub review_count: Option<String>,
    pub hours: Option<String>,
    pub features: Vec<String>,
    pub images: Vec<String>,
}

impl RawFragment {
    pub fn new(name: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self {
            name: Some(name.into()),
            lat: Some(lat.to_string()),
            lng: Some(lng.to_string()),
            ..Default::default()
        }
    }
}
