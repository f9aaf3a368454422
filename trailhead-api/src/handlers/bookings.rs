//! Booking endpoints: hosted checkout, the payment webhook, and admin CRUD.
//!
//! A booking is only recorded when the processor confirms payment through
//! the signed webhook. The insecure variant of passing booking data back
//! through redirect query parameters is deliberately not implemented.

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Extension, Json,
};
use bson::{doc, oid::ObjectId, Document};
use futures::TryStreamExt;

use super::crud;
use crate::error::{Error, Result};
use crate::middleware::CurrentUser;
use crate::models::booking::{CreateBooking, UpdateBooking};
use crate::models::tour::visible_scope;
use crate::models::{Booking, Tour};
use crate::payments::{CheckoutSession, CHECKOUT_COMPLETED, SIGNATURE_HEADER};
use crate::query::ListParams;
use crate::state::AppState;

/// Start a checkout: load the tour, price the line item from its current
/// price, and hand back the processor-hosted session.
pub async fn get_checkout_session(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(tour_id): Path<String>,
) -> Result<Response> {
    let tour_id = ObjectId::parse_str(&tour_id)?;
    let tour = state.tours().find_by_id(visible_scope(), tour_id).await?;

    let session = state
        .payments
        .create_checkout_session(&user, &tour, &state.config.service.public_url)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "session": session,
    }))
    .into_response())
}

/// Payment-processor webhook. The signature is verified against the shared
/// secret before the payload is trusted; a completed checkout becomes a
/// booking.
pub async fn webhook_checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::BadRequest("Missing webhook signature header".to_string()))?;

    let event = state.payments.parse_webhook(&body, signature)?;

    if event.kind == CHECKOUT_COMPLETED {
        record_booking(&state, event.data.object).await?;
    } else {
        tracing::debug!(kind = %event.kind, "ignoring webhook event");
    }

    Ok(Json(serde_json::json!({ "received": true })).into_response())
}

/// Create the booking from the session's reference data. Replays of the
/// same session hit the unique index and are acknowledged without a second
/// booking.
async fn record_booking(state: &AppState, session: CheckoutSession) -> Result<()> {
    let tour_id = session
        .client_reference_id
        .as_deref()
        .ok_or_else(|| Error::BadRequest("Checkout session has no tour reference".to_string()))?;
    let tour_id = ObjectId::parse_str(tour_id)?;

    let email = session
        .customer_email
        .as_deref()
        .ok_or_else(|| Error::BadRequest("Checkout session has no customer email".to_string()))?;
    let user = state
        .db
        .users
        .find_one(doc! { "email": email.to_lowercase() })
        .await?
        .ok_or_else(|| {
            Error::BadRequest("No user matches the checkout session's customer".to_string())
        })?;

    let price = session
        .amount_total
        .map(|cents| cents as f64 / 100.0)
        .ok_or_else(|| Error::BadRequest("Checkout session has no amount".to_string()))?;

    match state
        .bookings()
        .create(Booking::new(tour_id, user.id, price, session.id.clone()))
        .await
    {
        Ok(_) => Ok(()),
        Err(Error::Conflict(_)) => {
            tracing::info!(session = %session.id, "duplicate webhook notification ignored");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

/// Tours the user has booked, for the rendered "my tours" page.
pub async fn tours_booked_by(state: &AppState, user_id: ObjectId) -> Result<Vec<Tour>> {
    let bookings: Vec<Booking> = state
        .db
        .bookings
        .find(doc! { "user": user_id })
        .await?
        .try_collect()
        .await?;

    let tour_ids: Vec<ObjectId> = bookings.iter().map(|b| b.tour).collect();
    if tour_ids.is_empty() {
        return Ok(Vec::new());
    }

    Ok(state
        .db
        .tours
        .find(doc! { "_id": { "$in": tour_ids } })
        .await?
        .try_collect()
        .await?)
}

// Admin factory surface.

pub async fn list_bookings(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response> {
    crud::list_resources(&state.bookings(), Document::new(), ListParams::new(params)).await
}

pub async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response> {
    crud::get_resource(&state.bookings(), Document::new(), ObjectId::parse_str(&id)?).await
}

pub async fn create_booking(
    State(state): State<AppState>,
    Json(body): Json<CreateBooking>,
) -> Result<Response> {
    crud::create_resource(&state.bookings(), body.into_booking()?).await
}

pub async fn update_booking(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateBooking>,
) -> Result<Response> {
    crud::update_resource(
        &state.bookings(),
        Document::new(),
        ObjectId::parse_str(&id)?,
        body.into_set_document(),
    )
    .await
}

pub async fn delete_booking(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response> {
    crud::delete_resource(&state.bookings(), Document::new(), ObjectId::parse_str(&id)?).await
}
