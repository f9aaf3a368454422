//! Review endpoints, nested under tours and standalone, plus the rating
//! aggregate recomputation they trigger.

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Extension, Json,
};
use bson::{doc, oid::ObjectId, Document};
use futures::TryStreamExt;
use serde::Deserialize;
use validator::Validate;

use super::{crud, NoContent};
use crate::error::{Error, Result};
use crate::middleware::CurrentUser;
use crate::models::review::{CreateReview, UpdateReview};
use crate::models::tour::{round_to_tenth, DEFAULT_RATING};
use crate::query::ListParams;
use crate::state::AppState;

/// One aggregation row: review count and mean rating for a tour.
#[derive(Debug, Deserialize)]
pub struct RatingStats {
    pub n_rating: i64,
    pub avg_rating: f64,
}

/// Stored aggregate values; an empty review set resets to the documented
/// defaults (count 0, average 4.5).
pub fn fold_stats(stats: Option<RatingStats>) -> (i64, f64) {
    match stats {
        Some(stats) => (stats.n_rating, round_to_tenth(stats.avg_rating)),
        None => (0, DEFAULT_RATING),
    }
}

/// Recompute a tour's rating aggregate from its current review set. Called
/// after every durable review write, with the tour id captured from the
/// affected document.
pub async fn recompute_tour_ratings(state: &AppState, tour_id: ObjectId) -> Result<()> {
    let pipeline = vec![
        doc! { "$match": { "tour": tour_id } },
        doc! { "$group": {
            "_id": "$tour",
            "n_rating": { "$sum": 1 },
            "avg_rating": { "$avg": "$rating" },
        }},
    ];

    let row: Option<Document> = state
        .db
        .reviews
        .aggregate(pipeline)
        .await?
        .try_next()
        .await?;
    let stats = row
        .map(|d| bson::from_document::<RatingStats>(d))
        .transpose()
        .map_err(|e| Error::Internal(e.to_string()))?;

    let (quantity, average) = fold_stats(stats);
    state
        .db
        .tours
        .update_one(
            doc! { "_id": tour_id },
            doc! { "$set": {
                "ratings_quantity": quantity,
                "ratings_average": average,
            }},
        )
        .await?;

    Ok(())
}

fn tour_scope(tour_id: Option<&str>) -> Result<Document> {
    match tour_id {
        Some(id) => Ok(doc! { "tour": ObjectId::parse_str(id)? }),
        None => Ok(Document::new()),
    }
}

pub async fn list_reviews(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response> {
    crud::list_resources(&state.reviews(), Document::new(), ListParams::new(params)).await
}

pub async fn list_tour_reviews(
    State(state): State<AppState>,
    Path(tour_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response> {
    crud::list_resources(
        &state.reviews(),
        tour_scope(Some(&tour_id))?,
        ListParams::new(params),
    )
    .await
}

pub async fn get_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response> {
    crud::get_resource(&state.reviews(), Document::new(), ObjectId::parse_str(&id)?).await
}

async fn create_review_inner(
    state: &AppState,
    user_id: ObjectId,
    tour_id: ObjectId,
    body: CreateReview,
) -> Result<Response> {
    body.validate()?;

    // The unique (tour, user) index turns a second review into a Conflict.
    let response =
        crud::create_resource(&state.reviews(), body.into_review(tour_id, user_id)).await?;
    recompute_tour_ratings(state, tour_id).await?;
    Ok(response)
}

/// Standalone create: tour id comes from the body.
pub async fn create_review(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(body): Json<CreateReview>,
) -> Result<Response> {
    let tour = body
        .tour
        .as_deref()
        .ok_or_else(|| Error::BadRequest("Review must belong to a tour!".to_string()))?;
    let tour_id = ObjectId::parse_str(tour)?;
    create_review_inner(&state, user.id, tour_id, body).await
}

/// Nested create: tour id comes from the path, author from the session.
pub async fn create_tour_review(
    State(state): State<AppState>,
    Path(tour_id): Path<String>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(body): Json<CreateReview>,
) -> Result<Response> {
    let tour_id = ObjectId::parse_str(&tour_id)?;
    create_review_inner(&state, user.id, tour_id, body).await
}

pub async fn update_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateReview>,
) -> Result<Response> {
    body.validate()?;
    let id = ObjectId::parse_str(&id)?;

    let updated = state
        .reviews()
        .update_by_id(Document::new(), id, body.into_set_document())
        .await?;
    // The find-and-modify result carries the tour id for the recomputation.
    recompute_tour_ratings(&state, updated.tour).await?;

    Ok(super::item(crate::models::ReviewResponse::from(updated)).into_response())
}

pub async fn delete_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response> {
    let id = ObjectId::parse_str(&id)?;

    let deleted = state.reviews().delete_by_id(Document::new(), id).await?;
    recompute_tour_ratings(&state, deleted.tour).await?;

    Ok(NoContent.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_stats_uses_aggregated_values() {
        // Three reviews rated {5, 4, 3}: count 3, average 4.0.
        let (quantity, average) = fold_stats(Some(RatingStats {
            n_rating: 3,
            avg_rating: 4.0,
        }));
        assert_eq!(quantity, 3);
        assert_eq!(average, 4.0);
    }

    #[test]
    fn test_fold_stats_rounds_to_one_decimal() {
        let (_, average) = fold_stats(Some(RatingStats {
            n_rating: 3,
            avg_rating: 4.666_666_6,
        }));
        assert_eq!(average, 4.7);
    }

    #[test]
    fn test_fold_stats_defaults_when_no_reviews_remain() {
        let (quantity, average) = fold_stats(None);
        assert_eq!(quantity, 0);
        assert_eq!(average, DEFAULT_RATING);
    }

    #[test]
    fn test_rating_stats_absorbs_int32_counts() {
        let stats = bson::from_document::<RatingStats>(doc! {
            "_id": ObjectId::new(),
            "n_rating": 2_i32,
            "avg_rating": 4.5,
        })
        .unwrap();
        assert_eq!(stats.n_rating, 2);
    }

    #[test]
    fn test_tour_scope() {
        let id = ObjectId::new();
        let scope = tour_scope(Some(&id.to_hex())).unwrap();
        assert_eq!(scope.get_object_id("tour").unwrap(), id);
        assert!(tour_scope(None).unwrap().is_empty());
        assert!(tour_scope(Some("garbage")).is_err());
    }
}
