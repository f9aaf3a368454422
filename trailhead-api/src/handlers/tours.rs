//! Tour endpoints: factory CRUD plus the aggregation and geospatial reads.

use std::collections::HashMap;

use axum::{
    extract::{Multipart, Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use bson::{doc, oid::ObjectId, Document};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{crud, item};
use crate::error::{Error, Result};
use crate::media;
use crate::models::tour::{check_price_discount, visible_scope, CreateTour, UpdateTour};
use crate::models::{ReviewResponse, TourResponse, UserResponse};
use crate::query::ListParams;
use crate::state::AppState;

pub async fn list_tours(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response> {
    crud::list_resources(&state.tours(), visible_scope(), ListParams::new(params)).await
}

/// Alias route: the five best cheap tours, preset filter and projection.
pub async fn top_tours(State(state): State<AppState>) -> Result<Response> {
    let mut params = ListParams::default();
    params
        .set("limit", "5")
        .set("sort", "-ratings_average,price")
        .set("fields", "name,price,ratings_average,summary,difficulty");
    crud::list_resources(&state.tours(), visible_scope(), params).await
}

/// Single tour, with guides and reviews expanded.
pub async fn get_tour(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response> {
    let id = ObjectId::parse_str(&id)?;
    let tour = state.tours().find_by_id(visible_scope(), id).await?;

    let guides = load_guides(&state, &tour.guides).await?;
    let reviews: Vec<ReviewResponse> = state
        .db
        .reviews
        .find(doc! { "tour": tour.id })
        .await?
        .try_collect::<Vec<_>>()
        .await?
        .into_iter()
        .map(ReviewResponse::from)
        .collect();

    let mut value = serde_json::to_value(TourResponse::from(tour))?;
    value["guides"] = serde_json::to_value(guides)?;
    value["reviews"] = serde_json::to_value(reviews)?;

    Ok(item(value).into_response())
}

async fn load_guides(state: &AppState, guide_ids: &[ObjectId]) -> Result<Vec<UserResponse>> {
    if guide_ids.is_empty() {
        return Ok(Vec::new());
    }
    let users = state
        .db
        .users
        .find(doc! { "_id": { "$in": guide_ids }, "active": { "$ne": false } })
        .await?
        .try_collect::<Vec<_>>()
        .await?;
    Ok(users.into_iter().map(UserResponse::from).collect())
}

pub async fn create_tour(
    State(state): State<AppState>,
    Json(body): Json<CreateTour>,
) -> Result<Response> {
    body.validate()?;
    crud::create_resource(&state.tours(), body.into_tour()?).await
}

pub async fn update_tour(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateTour>,
) -> Result<Response> {
    body.validate()?;
    let id = ObjectId::parse_str(&id)?;

    // The discount invariant spans both the stored and the incoming values.
    let current = state.tours().find_by_id(Document::new(), id).await?;
    let price = body.price.unwrap_or(current.price);
    let discount = body.price_discount.or(current.price_discount);
    check_price_discount(price, discount)?;

    crud::update_resource(&state.tours(), Document::new(), id, body.into_set_document()?).await
}

pub async fn delete_tour(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response> {
    crud::delete_resource(&state.tours(), Document::new(), ObjectId::parse_str(&id)?).await
}

/// Cover plus up to three gallery images, multipart.
pub async fn upload_tour_images(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Response> {
    let id = ObjectId::parse_str(&id)?;
    // 404 before accepting any bytes.
    state.tours().find_by_id(Document::new(), id).await?;

    let mut set = Document::new();
    let mut gallery: Vec<String> = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("image_cover") => {
                media::require_image(field.content_type())?;
                let filename = media::tour_image_filename(&id, None);
                let bytes = field.bytes().await?;
                media::store(
                    &state.config.uploads.directory,
                    media::TOUR_IMAGE_DIR,
                    &filename,
                    &bytes,
                )
                .await?;
                set.insert("image_cover", filename);
            }
            Some("images") => {
                if gallery.len() >= 3 {
                    return Err(Error::BadRequest(
                        "A tour can have at most 3 gallery images.".to_string(),
                    ));
                }
                media::require_image(field.content_type())?;
                let filename = media::tour_image_filename(&id, Some(gallery.len()));
                let bytes = field.bytes().await?;
                media::store(
                    &state.config.uploads.directory,
                    media::TOUR_IMAGE_DIR,
                    &filename,
                    &bytes,
                )
                .await?;
                gallery.push(filename);
            }
            _ => {}
        }
    }

    if !gallery.is_empty() {
        set.insert("images", gallery);
    }
    if set.is_empty() {
        return Err(Error::BadRequest("No images provided.".to_string()));
    }

    crud::update_resource(&state.tours(), Document::new(), id, set).await
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TourStats {
    #[serde(rename = "_id")]
    pub difficulty: String,
    pub num_tours: i64,
    pub num_ratings: i64,
    pub avg_rating: f64,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
}

/// Per-difficulty statistics over well-rated tours.
pub async fn tour_stats(State(state): State<AppState>) -> Result<Response> {
    let pipeline = vec![
        doc! { "$match": { "secret_tour": { "$ne": true } } },
        doc! { "$match": { "ratings_average": { "$gte": 4.5 } } },
        doc! { "$group": {
            "_id": { "$toUpper": "$difficulty" },
            "num_tours": { "$sum": 1 },
            "num_ratings": { "$sum": "$ratings_quantity" },
            "avg_rating": { "$avg": "$ratings_average" },
            "avg_price": { "$avg": "$price" },
            "min_price": { "$min": "$price" },
            "max_price": { "$max": "$price" },
        }},
        doc! { "$sort": { "avg_price": 1 } },
    ];

    let documents: Vec<Document> = state
        .db
        .tours
        .aggregate(pipeline)
        .await?
        .try_collect()
        .await?;
    let stats = documents
        .into_iter()
        .map(|d| bson::from_document::<TourStats>(d).map_err(|e| Error::Internal(e.to_string())))
        .collect::<Result<Vec<_>>>()?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": { "stats": stats },
    }))
    .into_response())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MonthlyPlanEntry {
    pub month: i32,
    pub num_tour_starts: i64,
    pub tours: Vec<String>,
}

/// Busiest-month breakdown of start dates for one year.
pub async fn monthly_plan(
    State(state): State<AppState>,
    Path(year): Path<i32>,
) -> Result<Response> {
    use chrono::TimeZone;

    let start = chrono::Utc
        .with_ymd_and_hms(year, 1, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| Error::BadRequest(format!("Invalid year: {year}")))?;
    let end = chrono::Utc
        .with_ymd_and_hms(year, 12, 31, 23, 59, 59)
        .single()
        .ok_or_else(|| Error::BadRequest(format!("Invalid year: {year}")))?;

    let pipeline = vec![
        doc! { "$match": { "secret_tour": { "$ne": true } } },
        doc! { "$unwind": "$start_dates" },
        doc! { "$match": { "start_dates": {
            "$gte": bson::DateTime::from_chrono(start),
            "$lte": bson::DateTime::from_chrono(end),
        }}},
        doc! { "$group": {
            "_id": { "$month": "$start_dates" },
            "num_tour_starts": { "$sum": 1 },
            "tours": { "$push": "$name" },
        }},
        doc! { "$addFields": { "month": "$_id" } },
        doc! { "$project": { "_id": 0 } },
        doc! { "$sort": { "num_tour_starts": -1 } },
        doc! { "$limit": 12 },
    ];

    let documents: Vec<Document> = state
        .db
        .tours
        .aggregate(pipeline)
        .await?
        .try_collect()
        .await?;
    let plan = documents
        .into_iter()
        .map(|d| {
            bson::from_document::<MonthlyPlanEntry>(d).map_err(|e| Error::Internal(e.to_string()))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": { "plan": plan },
    }))
    .into_response())
}

/// `lat,lng` path segment.
pub fn parse_latlng(raw: &str) -> Result<(f64, f64)> {
    let invalid = || {
        Error::BadRequest(
            "Please provide latitude and longitude in the format: lat,lng.".to_string(),
        )
    };
    let (lat, lng) = raw.split_once(',').ok_or_else(invalid)?;
    let lat = lat.trim().parse::<f64>().map_err(|_| invalid())?;
    let lng = lng.trim().parse::<f64>().map_err(|_| invalid())?;
    Ok((lat, lng))
}

/// Sphere radius in radians: distance over the earth's radius in the
/// requested unit (3963.2 mi, 6378.1 km).
pub fn radius_radians(distance: f64, unit: &str) -> f64 {
    if unit == "mi" {
        distance / 3963.2
    } else {
        distance / 6378.1
    }
}

/// Meters-to-unit multiplier for distance projection.
pub fn distance_multiplier(unit: &str) -> f64 {
    if unit == "mi" {
        0.000621371
    } else {
        0.001
    }
}

/// Tours whose start location lies within `distance` of the center point.
pub async fn tours_within(
    State(state): State<AppState>,
    Path((distance, latlng, unit)): Path<(f64, String, String)>,
) -> Result<Response> {
    let (lat, lng) = parse_latlng(&latlng)?;
    let radius = radius_radians(distance, &unit);

    let mut scope = visible_scope();
    scope.insert(
        "start_location",
        doc! { "$geoWithin": { "$centerSphere": [[lng, lat], radius] } },
    );

    crud::list_resources(&state.tours(), scope, ListParams::default()).await
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TourDistance {
    pub name: String,
    pub distance: f64,
}

/// Distance from a point to every tour's start location.
pub async fn distances(
    State(state): State<AppState>,
    Path((latlng, unit)): Path<(String, String)>,
) -> Result<Response> {
    let (lat, lng) = parse_latlng(&latlng)?;

    // $geoNear must be the first stage, so no visibility match ahead of it.
    let pipeline = vec![
        doc! { "$geoNear": {
            "near": { "type": "Point", "coordinates": [lng, lat] },
            "distanceField": "distance",
            "distanceMultiplier": distance_multiplier(&unit),
        }},
        doc! { "$project": { "_id": 0, "distance": 1, "name": 1 } },
    ];

    let documents: Vec<Document> = state
        .db
        .tours
        .aggregate(pipeline)
        .await?
        .try_collect()
        .await?;
    let rows = documents
        .into_iter()
        .map(|d| {
            bson::from_document::<TourDistance>(d).map_err(|e| Error::Internal(e.to_string()))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": { "data": rows },
    }))
    .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_latlng() {
        assert_eq!(
            parse_latlng("34.111745,-118.113491").unwrap(),
            (34.111745, -118.113491)
        );
        assert_eq!(parse_latlng(" 10.5 , 20.25 ").unwrap(), (10.5, 20.25));
        assert!(parse_latlng("34.111745").is_err());
        assert!(parse_latlng("lat,lng").is_err());
        assert!(parse_latlng("").is_err());
    }

    #[test]
    fn test_radius_conversion() {
        assert!((radius_radians(233.0, "mi") - 233.0 / 3963.2).abs() < 1e-12);
        assert!((radius_radians(233.0, "km") - 233.0 / 6378.1).abs() < 1e-12);
        // Unknown units fall back to kilometers.
        assert_eq!(radius_radians(100.0, "furlong"), radius_radians(100.0, "km"));
    }

    #[test]
    fn test_distance_multiplier() {
        assert_eq!(distance_multiplier("mi"), 0.000621371);
        assert_eq!(distance_multiplier("km"), 0.001);
    }

    #[test]
    fn test_stats_rows_deserialize_from_aggregation_shapes() {
        // $sum yields Int32 for small counts; the row type must absorb it.
        let row = bson::from_document::<TourStats>(doc! {
            "_id": "EASY",
            "num_tours": 4_i32,
            "num_ratings": 120_i64,
            "avg_rating": 4.7,
            "avg_price": 397.0,
            "min_price": 197.0,
            "max_price": 997.0,
        })
        .unwrap();
        assert_eq!(row.difficulty, "EASY");
        assert_eq!(row.num_tours, 4);
    }

    #[test]
    fn test_monthly_plan_rows_deserialize() {
        let row = bson::from_document::<MonthlyPlanEntry>(doc! {
            "month": 7_i32,
            "num_tour_starts": 3_i32,
            "tours": ["The Forest Hiker", "The Sea Explorer"],
        })
        .unwrap();
        assert_eq!(row.month, 7);
        assert_eq!(row.tours.len(), 2);
    }
}
