//! Tour catalog entries: pricing, difficulty, geo data, guide references.

use bson::{doc, oid::ObjectId, DateTime, Document};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{Error, Result};

pub const DEFAULT_RATING: f64 = 4.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Difficult,
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Easy => write!(f, "easy"),
            Self::Medium => write!(f, "medium"),
            Self::Difficult => write!(f, "difficult"),
        }
    }
}

/// GeoJSON point with human-readable context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    #[serde(rename = "type", default = "point_type")]
    pub kind: String,

    /// `[longitude, latitude]`, GeoJSON order.
    pub coordinates: Vec<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Itinerary stop: a [`GeoPoint`] plus the day it is reached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Waypoint {
    #[serde(flatten)]
    pub point: GeoPoint,

    #[serde(default)]
    pub day: i32,
}

fn point_type() -> String {
    "Point".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tour {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    /// Unique; 10..=40 characters.
    pub name: String,

    /// Derived from the name; lowercase, URL-safe.
    pub slug: String,

    /// Days.
    pub duration: i32,

    pub max_group_size: i32,

    pub difficulty: Difficulty,

    #[serde(default = "default_rating")]
    pub ratings_average: f64,

    #[serde(default)]
    pub ratings_quantity: i64,

    pub price: f64,

    /// Invariant: less than `price`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_discount: Option<f64>,

    pub summary: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub image_cover: String,

    #[serde(default)]
    pub images: Vec<String>,

    #[serde(default)]
    pub start_dates: Vec<DateTime>,

    /// Hidden from default listings and aggregations.
    #[serde(default)]
    pub secret_tour: bool,

    pub start_location: GeoPoint,

    #[serde(default)]
    pub locations: Vec<Waypoint>,

    #[serde(default)]
    pub guides: Vec<ObjectId>,

    pub created_at: DateTime,
}

fn default_rating() -> f64 {
    DEFAULT_RATING
}

/// Lowercase URL-safe slug: alphanumerics kept, runs of anything else
/// collapsed to a single dash.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Ratings are stored rounded to one decimal place.
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Discount must stay below the price it discounts.
pub fn check_price_discount(price: f64, discount: Option<f64>) -> Result<()> {
    match discount {
        Some(d) if d >= price => Err(Error::Validation(format!(
            "Discount price ({d}) should be less than the regular price."
        ))),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TourResponse {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub duration: i32,
    /// Derived, not persisted.
    pub duration_weeks: f64,
    pub max_group_size: i32,
    pub difficulty: Difficulty,
    pub ratings_average: f64,
    pub ratings_quantity: i64,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_discount: Option<f64>,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub image_cover: String,
    pub images: Vec<String>,
    pub start_dates: Vec<chrono::DateTime<Utc>>,
    pub secret_tour: bool,
    pub start_location: GeoPoint,
    pub locations: Vec<Waypoint>,
    pub guides: Vec<String>,
}

impl From<Tour> for TourResponse {
    fn from(tour: Tour) -> Self {
        Self {
            id: tour.id.to_hex(),
            duration_weeks: f64::from(tour.duration) / 7.0,
            name: tour.name,
            slug: tour.slug,
            duration: tour.duration,
            max_group_size: tour.max_group_size,
            difficulty: tour.difficulty,
            ratings_average: tour.ratings_average,
            ratings_quantity: tour.ratings_quantity,
            price: tour.price,
            price_discount: tour.price_discount,
            summary: tour.summary,
            description: tour.description,
            image_cover: tour.image_cover,
            images: tour.images,
            start_dates: tour.start_dates.iter().map(|d| d.to_chrono()).collect(),
            secret_tour: tour.secret_tour,
            start_location: tour.start_location,
            locations: tour.locations,
            guides: tour.guides.iter().map(|g| g.to_hex()).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTour {
    #[validate(length(
        min = 10,
        max = 40,
        message = "A tour name must have between 10 and 40 characters."
    ))]
    pub name: String,

    #[validate(range(min = 1, message = "A tour must have a duration"))]
    pub duration: i32,

    #[validate(range(min = 1, message = "A tour must have a group size"))]
    pub max_group_size: i32,

    pub difficulty: Difficulty,

    #[validate(range(min = 0.0, message = "A tour must have a price"))]
    pub price: f64,

    pub price_discount: Option<f64>,

    #[validate(length(min = 1, message = "A tour must have a description"))]
    pub summary: String,

    pub description: Option<String>,

    #[validate(length(min = 1, message = "A tour must have a cover image"))]
    pub image_cover: String,

    #[serde(default)]
    pub images: Vec<String>,

    #[serde(default)]
    pub start_dates: Vec<chrono::DateTime<Utc>>,

    #[serde(default)]
    pub secret_tour: bool,

    pub start_location: GeoPoint,

    #[serde(default)]
    pub locations: Vec<Waypoint>,

    #[serde(default)]
    pub guides: Vec<String>,
}

impl CreateTour {
    pub fn into_tour(self) -> Result<Tour> {
        check_price_discount(self.price, self.price_discount)?;

        let guides = self
            .guides
            .iter()
            .map(|id| ObjectId::parse_str(id).map_err(Error::from))
            .collect::<Result<Vec<_>>>()?;

        Ok(Tour {
            id: ObjectId::new(),
            slug: slugify(&self.name),
            name: self.name,
            duration: self.duration,
            max_group_size: self.max_group_size,
            difficulty: self.difficulty,
            ratings_average: DEFAULT_RATING,
            ratings_quantity: 0,
            price: self.price,
            price_discount: self.price_discount,
            summary: self.summary,
            description: self.description,
            image_cover: self.image_cover,
            images: self.images,
            start_dates: self.start_dates.into_iter().map(DateTime::from_chrono).collect(),
            secret_tour: self.secret_tour,
            start_location: self.start_location,
            locations: self.locations,
            guides,
            created_at: DateTime::now(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateTour {
    #[validate(length(
        min = 10,
        max = 40,
        message = "A tour name must have between 10 and 40 characters."
    ))]
    pub name: Option<String>,

    #[validate(range(min = 1))]
    pub duration: Option<i32>,

    #[validate(range(min = 1))]
    pub max_group_size: Option<i32>,

    pub difficulty: Option<Difficulty>,

    #[validate(range(min = 0.0))]
    pub price: Option<f64>,

    pub price_discount: Option<f64>,

    #[validate(length(min = 1))]
    pub summary: Option<String>,

    pub description: Option<String>,

    #[validate(length(min = 1))]
    pub image_cover: Option<String>,

    pub images: Option<Vec<String>>,

    pub start_dates: Option<Vec<chrono::DateTime<Utc>>>,

    pub secret_tour: Option<bool>,

    pub start_location: Option<GeoPoint>,

    pub locations: Option<Vec<Waypoint>>,

    pub guides: Option<Vec<String>>,
}

impl UpdateTour {
    /// Build the partial-update document. A name change refreshes the slug.
    pub fn into_set_document(self) -> Result<Document> {
        let mut set = Document::new();

        if let Some(name) = self.name {
            set.insert("slug", slugify(&name));
            set.insert("name", name);
        }
        if let Some(duration) = self.duration {
            set.insert("duration", duration);
        }
        if let Some(size) = self.max_group_size {
            set.insert("max_group_size", size);
        }
        if let Some(difficulty) = self.difficulty {
            set.insert("difficulty", bson::to_bson(&difficulty).map_err(internal)?);
        }
        if let Some(price) = self.price {
            set.insert("price", price);
        }
        if let Some(discount) = self.price_discount {
            set.insert("price_discount", discount);
        }
        if let Some(summary) = self.summary {
            set.insert("summary", summary);
        }
        if let Some(description) = self.description {
            set.insert("description", description);
        }
        if let Some(cover) = self.image_cover {
            set.insert("image_cover", cover);
        }
        if let Some(images) = self.images {
            set.insert("images", images);
        }
        if let Some(dates) = self.start_dates {
            let dates: Vec<DateTime> = dates.into_iter().map(DateTime::from_chrono).collect();
            set.insert("start_dates", bson::to_bson(&dates).map_err(internal)?);
        }
        if let Some(secret) = self.secret_tour {
            set.insert("secret_tour", secret);
        }
        if let Some(location) = self.start_location {
            set.insert("start_location", bson::to_bson(&location).map_err(internal)?);
        }
        if let Some(locations) = self.locations {
            set.insert("locations", bson::to_bson(&locations).map_err(internal)?);
        }
        if let Some(guides) = self.guides {
            let guides = guides
                .iter()
                .map(|id| ObjectId::parse_str(id).map_err(Error::from))
                .collect::<Result<Vec<_>>>()?;
            set.insert("guides", guides);
        }

        Ok(set)
    }
}

fn internal(err: bson::ser::Error) -> Error {
    Error::Internal(format!("BSON encoding failed: {err}"))
}

/// Default listing scope: secret tours stay hidden.
pub fn visible_scope() -> Document {
    doc! { "secret_tour": { "$ne": true } }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("The Forest Hiker"), "the-forest-hiker");
        assert_eq!(slugify("  Sea   &  Sky!  "), "sea-sky");
        assert_eq!(slugify("Alpine 2000m Trek"), "alpine-2000m-trek");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn test_round_to_tenth() {
        assert_eq!(round_to_tenth(4.666_666), 4.7);
        assert_eq!(round_to_tenth(4.0), 4.0);
        assert_eq!(round_to_tenth(3.9999), 4.0);
        assert_eq!(round_to_tenth(1.04), 1.0);
    }

    #[test]
    fn test_price_discount_invariant() {
        assert!(check_price_discount(100.0, None).is_ok());
        assert!(check_price_discount(100.0, Some(50.0)).is_ok());
        assert!(check_price_discount(100.0, Some(100.0)).is_err());
        assert!(check_price_discount(100.0, Some(150.0)).is_err());
    }

    #[test]
    fn test_difficulty_wire_format() {
        assert_eq!(serde_json::to_string(&Difficulty::Medium).unwrap(), "\"medium\"");
        let parsed: Difficulty = serde_json::from_str("\"difficult\"").unwrap();
        assert_eq!(parsed, Difficulty::Difficult);
        assert!(serde_json::from_str::<Difficulty>("\"extreme\"").is_err());
    }

    fn sample_create() -> CreateTour {
        CreateTour {
            name: "The Forest Hiker".into(),
            duration: 5,
            max_group_size: 25,
            difficulty: Difficulty::Easy,
            price: 397.0,
            price_discount: None,
            summary: "Breathtaking hike through the Canadian Banff National Park".into(),
            description: None,
            image_cover: "tour-1-cover.jpg".into(),
            images: vec![],
            start_dates: vec![],
            secret_tour: false,
            start_location: GeoPoint {
                kind: "Point".into(),
                coordinates: vec![-115.570154, 51.178456],
                address: Some("Banff, CAN".into()),
                description: Some("Banff".into()),
            },
            locations: vec![],
            guides: vec![],
        }
    }

    #[test]
    fn test_create_derives_slug_and_defaults() {
        let tour = sample_create().into_tour().unwrap();
        assert_eq!(tour.slug, "the-forest-hiker");
        assert_eq!(tour.ratings_average, DEFAULT_RATING);
        assert_eq!(tour.ratings_quantity, 0);
        assert!(!tour.secret_tour);
    }

    #[test]
    fn test_create_rejects_bad_discount() {
        let mut create = sample_create();
        create.price_discount = Some(500.0);
        assert!(create.into_tour().is_err());
    }

    #[test]
    fn test_create_rejects_bad_guide_id() {
        let mut create = sample_create();
        create.guides = vec!["not-an-object-id".into()];
        assert!(matches!(create.into_tour(), Err(Error::BadRequest(_))));
    }

    #[test]
    fn test_update_document_refreshes_slug_with_name() {
        let update = UpdateTour {
            name: Some("The Snow Adventurer".into()),
            price: Some(999.0),
            ..Default::default()
        };
        let set = update.into_set_document().unwrap();
        assert_eq!(set.get_str("name").unwrap(), "The Snow Adventurer");
        assert_eq!(set.get_str("slug").unwrap(), "the-snow-adventurer");
        assert_eq!(set.get_f64("price").unwrap(), 999.0);
        assert!(!set.contains_key("duration"));
    }

    #[test]
    fn test_update_document_empty_when_no_fields() {
        let set = UpdateTour::default().into_set_document().unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_duration_weeks_derivation() {
        let mut tour = sample_create().into_tour().unwrap();
        tour.duration = 14;
        let response = TourResponse::from(tour);
        assert_eq!(response.duration_weeks, 2.0);
    }

    #[test]
    fn test_visible_scope_excludes_secret_tours() {
        let scope = visible_scope();
        assert_eq!(scope, doc! { "secret_tour": { "$ne": true } });
    }
}
