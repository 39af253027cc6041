use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A point-of-interest record. Identity for deduplication is the
/// coordinate pair, never the name: franchises repeat names across
/// locations, but two records cannot share one physical spot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Place {
    /// Store-assigned on first successful insert; 0 until then.
    #[serde(default)]
    pub id: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    /// Venue page on the source site; enrichment fetch target and
    /// provenance URL.
    pub listing_url: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price_range: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<i64>,
    pub hours: Option<String>,
    pub features: Vec<String>,
    pub images: Vec<String>,
    // The three dietary tiers are independent booleans and may overlap;
    // downstream filtering derives its own exclusive categories.
    pub is_vegan: bool,
    pub is_vegetarian: bool,
    pub has_veg_options: bool,
    /// Unix seconds.
    pub scraped_at: i64,
}

impl Place {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            id: 0,
            name: name.into(),
            latitude,
            longitude,
            address: None,
            phone: None,
            website: None,
            listing_url: None,
            description: None,
            category: None,
            price_range: None,
            rating: None,
            review_count: None,
            hours: None,
            features: Vec::new(),
            images: Vec::new(),
            is_vegan: false,
            is_vegetarian: false,
            has_veg_options: false,
            scraped_at: Utc::now().timestamp(),
        }
    }

    /// How many of the optional descriptive fields are still absent.
    /// Drives enrichment candidate selection.
    pub fn missing_field_count(&self) -> usize {
        [
            self.address.is_none(),
            self.phone.is_none(),
            self.website.is_none(),
            self.description.is_none(),
            self.category.is_none(),
            self.price_range.is_none(),
            self.rating.is_none(),
            self.review_count.is_none(),
            self.hours.is_none(),
            self.features.is_empty(),
            self.images.is_empty(),
        ]
        .into_iter()
        .filter(|missing| *missing)
        .count()
    }
}

/// A partial update produced by the enrichment pass. Only fields set
/// here are candidates for writing, and the store only fills columns
/// that are currently null. Values written by the crawl pass or a
/// manual correction are never overwritten.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlacePatch {
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price_range: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<i64>,
    pub hours: Option<String>,
    pub features: Option<Vec<String>>,
    pub images: Option<Vec<String>>,
}

impl PlacePatch {
    pub fn is_empty(&self) -> bool {
        self.address.is_none()
            && self.phone.is_none()
            && self.website.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.price_range.is_none()
            && self.rating.is_none()
            && self.review_count.is_none()
            && self.hours.is_none()
            && self.features.is_none()
            && self.images.is_none()
    }
}
