use grazer_reader::{RawDetailFragment, RawFragment};
use tracing::debug;

use crate::model::{Place, PlacePatch};

/// Why a raw fragment was dropped before persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Empty or missing name.
    MissingName,
    /// Latitude or longitude absent or unparseable. By far the most
    /// common rejection: cluster bubbles and decorative markers carry
    /// no coordinate pair.
    MissingCoordinates,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::MissingName => write!(f, "missing name"),
            RejectReason::MissingCoordinates => write!(f, "missing coordinates"),
        }
    }
}

/// Validate a raw fragment into a candidate record. Required fields
/// reject the fragment; optional fields degrade to absent on any parse
/// failure.
pub fn extract_place(fragment: &RawFragment) -> Result<Place, RejectReason> {
    let name = fragment
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or(RejectReason::MissingName)?;

    let latitude = parse_coord(fragment.lat.as_deref()).ok_or(RejectReason::MissingCoordinates)?;
    let longitude = parse_coord(fragment.lng.as_deref()).ok_or(RejectReason::MissingCoordinates)?;

    let mut place = Place::new(name, latitude, longitude);
    place.address = clean(fragment.address.as_deref());
    place.listing_url = clean(fragment.listing_url.as_deref());
    place.category = clean(fragment.category.as_deref());
    place.price_range = clean(fragment.price_range.as_deref());
    place.rating = fragment.rating.as_deref().and_then(parse_rating);
    place.review_count = fragment.review_count.as_deref().and_then(parse_count);
    place.is_vegan = fragment.is_vegan;
    place.is_vegetarian = fragment.is_vegetarian;
    place.has_veg_options = fragment.has_veg_options;

    Ok(place)
}

/// Convert a detail-page fragment into a partial update.
pub fn detail_patch(detail: &RawDetailFragment) -> PlacePatch {
    PlacePatch {
        address: clean(detail.address.as_deref()),
        phone: clean(detail.phone.as_deref()),
        website: clean(detail.website.as_deref()),
        description: clean(detail.description.as_deref()),
        category: clean(detail.category.as_deref()),
        price_range: clean(detail.price_range.as_deref()),
        rating: detail.rating.as_deref().and_then(parse_rating),
        review_count: detail.review_count.as_deref().and_then(parse_count),
        hours: clean(detail.hours.as_deref()),
        features: (!detail.features.is_empty()).then(|| detail.features.clone()),
        images: (!detail.images.is_empty()).then(|| detail.images.clone()),
    }
}

fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_coord(raw: Option<&str>) -> Option<f64> {
    let value: f64 = raw?.trim().parse().ok()?;
    value.is_finite().then_some(value)
}

/// Ratings arrive as "4.5" or as text like "4.5 stars"; take the first
/// numeric run. Unparseable input degrades to None.
fn parse_rating(raw: &str) -> Option<f64> {
    let digits: String = raw
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let rating: f64 = digits.parse().ok()?;
    if !(0.0..=5.0).contains(&rating) {
        debug!("Discarding out-of-range rating '{}'", raw);
        return None;
    }
    Some(rating)
}

fn parse_count(raw: &str) -> Option<i64> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}
