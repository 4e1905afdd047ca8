use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::model::{PriceBand, VenueRecord, VenueSource};

const GOOGLE_SEARCH_URL: &str = "https://maps.googleapis.com/maps/api/place/textsearch/json";
const GOOGLE_PHOTO_URL: &str = "https://maps.googleapis.com/maps/api/place/photo";
const YELP_SEARCH_URL: &str = "https://api.yelp.com/v3/businesses/search";

/// Budget for one catalog search call.
pub const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);

/// How many raw results to request from each catalog.
const SEARCH_LIMIT: usize = 10;

/// Venue discovery against one external catalog.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    fn source(&self) -> VenueSource;

    async fn search(&self, activity: &str, location: &str) -> Result<Vec<VenueRecord>>;
}

// ── Google Places ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct PlacesResponse {
    #[serde(default)]
    results: Vec<Place>,
}

#[derive(Debug, Deserialize)]
struct Place {
    place_id: String,
    name: String,
    geometry: Geometry,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    user_ratings_total: Option<u32>,
    #[serde(default)]
    photos: Vec<PlacePhoto>,
    #[serde(default)]
    types: Vec<String>,
    #[serde(default)]
    price_level: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: PlaceLocation,
}

#[derive(Debug, Deserialize)]
struct PlaceLocation {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct PlacePhoto {
    photo_reference: String,
}

pub struct GooglePlacesClient {
    api_key: String,
    client: reqwest::Client,
}

impl GooglePlacesClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CatalogClient for GooglePlacesClient {
    fn source(&self) -> VenueSource {
        VenueSource::GooglePlaces
    }

    async fn search(&self, activity: &str, location: &str) -> Result<Vec<VenueRecord>> {
        if self.api_key.is_empty() {
            anyhow::bail!("google places api key not set");
        }

        let query = if location.is_empty() {
            activity.to_string()
        } else {
            format!("{activity} in {location}")
        };
        let resp: PlacesResponse = self
            .client
            .get(GOOGLE_SEARCH_URL)
            .timeout(SEARCH_TIMEOUT)
            .query(&[("query", query.as_str()), ("key", self.api_key.as_str())])
            .send()
            .await
            .context("google places search request")?
            .error_for_status()
            .context("google places search status")?
            .json()
            .await
            .context("decoding google places response")?;

        let venues = resp
            .results
            .into_iter()
            .take(SEARCH_LIMIT)
            .map(|p| {
                let photos = p
                    .photos
                    .iter()
                    .take(3)
                    .map(|ph| {
                        format!(
                            "{GOOGLE_PHOTO_URL}?maxwidth=640&photo_reference={}&key={}",
                            ph.photo_reference, self.api_key
                        )
                    })
                    .collect();
                // price_level 0 means "free" — fold into the cheapest band.
                let price = p.price_level.map(PriceBand::from_tier);
                VenueRecord {
                    venue_id: format!("gp_{}", p.place_id),
                    name: p.name,
                    lat: p.geometry.location.lat,
                    lng: p.geometry.location.lng,
                    rating: p.rating.unwrap_or(0.0),
                    review_count: p.user_ratings_total.unwrap_or(0),
                    photos,
                    category: p.types.first().cloned().unwrap_or_default(),
                    website: String::new(),
                    source: VenueSource::GooglePlaces,
                    price_range: price,
                    google_price: None,
                    yelp_price: None,
                }
            })
            .collect();
        Ok(venues)
    }
}

// ── Yelp Fusion ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct YelpResponse {
    #[serde(default)]
    businesses: Vec<Business>,
}

#[derive(Debug, Deserialize)]
struct Business {
    id: String,
    name: String,
    coordinates: Coordinates,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    review_count: Option<u32>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    categories: Vec<YelpCategory>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    price: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Coordinates {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct YelpCategory {
    title: String,
}

pub struct YelpClient {
    api_key: String,
    client: reqwest::Client,
}

impl YelpClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CatalogClient for YelpClient {
    fn source(&self) -> VenueSource {
        VenueSource::Yelp
    }

    async fn search(&self, activity: &str, location: &str) -> Result<Vec<VenueRecord>> {
        if self.api_key.is_empty() {
            anyhow::bail!("yelp api key not set");
        }

        let limit = SEARCH_LIMIT.to_string();
        let resp: YelpResponse = self
            .client
            .get(YELP_SEARCH_URL)
            .timeout(SEARCH_TIMEOUT)
            .bearer_auth(&self.api_key)
            .query(&[
                ("term", activity),
                ("location", location),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .context("yelp search request")?
            .error_for_status()
            .context("yelp search status")?
            .json()
            .await
            .context("decoding yelp response")?;

        let venues = resp
            .businesses
            .into_iter()
            .map(|b| VenueRecord {
                venue_id: format!("yelp_{}", b.id),
                name: b.name,
                lat: b.coordinates.latitude,
                lng: b.coordinates.longitude,
                rating: b.rating.unwrap_or(0.0),
                review_count: b.review_count.unwrap_or(0),
                photos: b.image_url.into_iter().collect(),
                category: b
                    .categories
                    .first()
                    .map(|c| c.title.clone())
                    .unwrap_or_default(),
                website: b.url.unwrap_or_default(),
                source: VenueSource::Yelp,
                price_range: b.price.as_deref().and_then(PriceBand::from_symbol),
                google_price: None,
                yelp_price: None,
            })
            .collect();
        Ok(venues)
    }
}
