//! HTTP handlers and the shared response envelope.
//!
//! Success responses wrap their payload as `{ "status": "success", "data":
//! { "data": ... } }`, lists adding a `results` count; errors come from the
//! central error type.

pub mod auth;
pub mod bookings;
pub mod crud;
pub mod reviews;
pub mod tours;
pub mod users;
pub mod views;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Payload<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct ItemEnvelope<T> {
    pub status: &'static str,
    pub data: Payload<T>,
}

#[derive(Debug, Serialize)]
pub struct ListEnvelope<T> {
    pub status: &'static str,
    pub results: usize,
    pub data: Payload<Vec<T>>,
}

/// 200 with a single payload.
pub fn item<T: Serialize>(value: T) -> Json<ItemEnvelope<T>> {
    Json(ItemEnvelope {
        status: "success",
        data: Payload { data: value },
    })
}

/// 200 with a counted collection payload.
pub fn list<T: Serialize>(values: Vec<T>) -> Json<ListEnvelope<T>> {
    Json(ListEnvelope {
        status: "success",
        results: values.len(),
        data: Payload { data: values },
    })
}

/// 201 with the stored entity.
pub fn created<T: Serialize>(value: T) -> Response {
    (StatusCode::CREATED, item(value)).into_response()
}

/// 204, nothing else.
pub struct NoContent;

impl IntoResponse for NoContent {
    fn into_response(self) -> Response {
        StatusCode::NO_CONTENT.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_envelope_shape() {
        let json = serde_json::to_value(&item(serde_json::json!({"name": "x"})).0).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["data"]["data"]["name"], "x");
    }

    #[test]
    fn test_list_envelope_counts_results() {
        let json = serde_json::to_value(&list(vec![1, 2, 3]).0).unwrap();
        assert_eq!(json["results"], 3);
        assert_eq!(json["data"]["data"], serde_json::json!([1, 2, 3]));
    }
}
