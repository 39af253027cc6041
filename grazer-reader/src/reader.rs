use crate::error::{ReadError, Result};
use crate::fragment::{RawDetailFragment, RawFragment};
use crate::view::MapView;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

/// Contract for the external page collaborator: render one map view and
/// return its raw marker fragments, or fetch one venue detail page.
///
/// The production implementation drives HTTP; tests substitute scripted
/// readers. Implementations take `&mut self` because a real reader owns
/// a single stateful browsing session.
pub trait PageReader {
    fn load_map(
        &mut self,
        view: &MapView,
    ) -> impl std::future::Future<Output = Result<Vec<RawFragment>>>;

    fn load_detail(
        &mut self,
        url: &str,
    ) -> impl std::future::Future<Output = Result<RawDetailFragment>>;
}

pub struct HttpPageReader {
    client: Client,
    base_url: String,
}

impl HttpPageReader {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, 20)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .user_agent(
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            )
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .connect_timeout(std::time::Duration::from_secs(timeout_secs / 2))
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        debug!("Fetching {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();

        match status {
            403 | 429 => return Err(ReadError::Blocked { status }),
            s if !response.status().is_success() => {
                return Err(ReadError::Status {
                    status: s,
                    url: url.to_string(),
                });
            }
            _ => {}
        }

        Ok(response.text().await?)
    }
}

impl PageReader for HttpPageReader {
    async fn load_map(&mut self, view: &MapView) -> Result<Vec<RawFragment>> {
        let url = view.search_url(&self.base_url)?;
        let body = self.fetch(url.as_str()).await?;
        let fragments = parse_map_fragments(&body, &self.base_url);
        debug!(
            "Map view ({:.4}, {:.4}): {} fragments",
            view.lat,
            view.lng,
            fragments.len()
        );
        Ok(fragments)
    }

    async fn load_detail(&mut self, url: &str) -> Result<RawDetailFragment> {
        let body = self.fetch(url).await?;
        Ok(parse_detail_fragment(&body, &self.base_url))
    }
}

/// Pull raw listing fragments out of a rendered searchmap page.
///
/// The site embeds one card element per visible marker carrying the
/// coordinates as data attributes. Cards without a coordinate pair
/// (cluster bubbles, ads) are still emitted here; classification is the
/// extractor's job.
pub fn parse_map_fragments(html: &str, base_url: &str) -> Vec<RawFragment> {
    let document = Html::parse_document(html);

    let card_selector = Selector::parse("[data-lat], [data-lng]").unwrap();
    let name_selector = Selector::parse(".venue-name").unwrap();
    let address_selector = Selector::parse(".venue-address").unwrap();
    let rating_selector = Selector::parse(".venue-rating").unwrap();
    let price_selector = Selector::parse(".venue-price").unwrap();
    let link_selector = Selector::parse("a[href]").unwrap();

    let mut fragments = Vec::new();

    for card in document.select(&card_selector) {
        let category = card
            .value()
            .attr("data-listing-type")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let listing_url = card
            .select(&link_selector)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| make_absolute(base_url, href));

        let fragment = RawFragment {
            name: first_text(&card, &name_selector),
            lat: card.value().attr("data-lat").map(str::to_string),
            lng: card.value().attr("data-lng").map(str::to_string),
            address: first_text(&card, &address_selector),
            listing_url,
            rating: first_text(&card, &rating_selector),
            review_count: card
                .value()
                .attr("data-review-count")
                .map(str::to_string),
            price_range: first_text(&card, &price_selector),
            is_vegan: matches!(category.as_deref(), Some("vegan")),
            is_vegetarian: matches!(category.as_deref(), Some("vegetarian")),
            has_veg_options: matches!(category.as_deref(), Some("veg-options")),
            category,
        };

        fragments.push(fragment);
    }

    if fragments.is_empty() {
        debug!("No marker cards found in map view page");
    }
    fragments
}

/// Parse a venue detail/reviews page into its optional field set. All
/// extraction is best-effort; a selector that matches nothing leaves
/// the field absent.
pub fn parse_detail_fragment(html: &str, base_url: &str) -> RawDetailFragment {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let street = select_text(&document, "[itemprop='streetAddress']");
    let postal = select_text(&document, "[itemprop='postalCode']");
    let address = match (street, postal) {
        (Some(s), Some(p)) => Some(format!("{s} {p}")),
        (Some(s), None) => Some(s),
        (None, Some(p)) => Some(p),
        (None, None) => select_text(&document, ".venue-address, .address"),
    };

    let phone = Selector::parse("a[href^='tel:']")
        .ok()
        .and_then(|sel| first_text(&root, &sel));

    let category = Selector::parse("[data-listing-type]")
        .ok()
        .and_then(|sel| {
            document
                .select(&sel)
                .next()
                .and_then(|el| el.value().attr("data-listing-type"))
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        });

    RawDetailFragment {
        phone,
        address,
        website: select_attr(&document, "a.venue-website[href], .venue-website a[href]", "href"),
        description: select_text(&document, ".venue-description, .description"),
        category,
        price_range: detail_price_range(&document),
        rating: select_attr(&document, "[itemprop='ratingValue']", "content")
            .or_else(|| select_text(&document, "[itemprop='ratingValue'], .rating")),
        review_count: select_attr(&document, "[itemprop='reviewCount']", "content")
            .or_else(|| select_text(&document, "[itemprop='reviewCount'], .review-count")),
        hours: select_text(&document, ".hours-summary, .opening-hours"),
        features: detail_features(&document),
        images: detail_images(&document, base_url),
    }
}

/// Price tier is rendered as three titled icons; the selected one is
/// highlighted. Fall back to any text-bearing price element.
fn detail_price_range(document: &Html) -> Option<String> {
    for tier in ["Inexpensive", "Moderate", "Expensive"] {
        let sel = Selector::parse(&format!("div[title='{tier}'].selected, div[title='{tier}'] .text-yellow-500")).ok()?;
        if document.select(&sel).next().is_some() {
            return Some(tier.to_string());
        }
    }
    select_text(document, ".price-range, .venue-price")
}

fn detail_features(document: &Html) -> Vec<String> {
    let Ok(sel) = Selector::parse(".venue-info span, .features .feature, .tags .tag") else {
        return Vec::new();
    };
    let mut seen = std::collections::HashSet::new();
    let mut features = Vec::new();
    for el in document.select(&sel) {
        let text = element_text(&el);
        if !text.is_empty() && seen.insert(text.clone()) {
            features.push(text);
        }
    }
    features
}

fn detail_images(document: &Html, base_url: &str) -> Vec<String> {
    let Ok(sel) = Selector::parse("#listing-images img, .venue-list-images img") else {
        return Vec::new();
    };
    let mut images = Vec::new();
    for img in document.select(&sel) {
        let Some(src) = img.value().attr("src") else {
            continue;
        };
        if !is_valid_image_url(src) {
            continue;
        }
        if let Some(abs) = make_absolute(base_url, src)
            && !images.contains(&abs)
        {
            images.push(abs);
        }
    }
    // Listing pages repeat gallery thumbnails; ten is plenty.
    images.truncate(10);
    images
}

fn first_text(scope: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    scope
        .select(selector)
        .map(|el| element_text(&el))
        .find(|t| !t.is_empty())
}

fn select_text(document: &Html, selectors: &str) -> Option<String> {
    let sel = Selector::parse(selectors).ok()?;
    document
        .select(&sel)
        .map(|el| element_text(&el))
        .find(|t| !t.is_empty())
}

fn select_attr(document: &Html, selectors: &str, attr: &str) -> Option<String> {
    let sel = Selector::parse(selectors).ok()?;
    document
        .select(&sel)
        .filter_map(|el| el.value().attr(attr))
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
}

fn element_text(el: &ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn make_absolute(base: &str, href: &str) -> Option<String> {
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    if let Some(rest) = href.strip_prefix("//") {
        return Some(format!("https://{rest}"));
    }
    let base_url = Url::parse(base).ok()?;
    let mut resolved = base_url.join(href).ok()?;
    resolved.set_fragment(None);
    Some(resolved.to_string())
}

fn is_valid_image_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    let has_extension = [".jpg", ".jpeg", ".png", ".gif", ".webp"]
        .iter()
        .any(|ext| lower.contains(ext));
    if !has_extension {
        return false;
    }
    const EXCLUDE: &[&str] = &[
        "logo", "icon", "avatar", "profile", "banner", "sponsor", "social",
    ];
    if EXCLUDE.iter().any(|p| lower.contains(p)) {
        warn!("Skipping non-venue image: {}", url);
        return false;
    }
    true
}
