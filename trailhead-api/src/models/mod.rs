//! Persisted entities and their request/response shapes.
//!
//! Each resource module pairs the storage document (BSON, `ObjectId` ids,
//! `bson::DateTime` timestamps) with client-facing DTOs: a `*Response` view
//! (hex ids, RFC 3339 timestamps, write-only fields omitted) plus validated
//! create/update payloads.

pub mod booking;
pub mod review;
pub mod tour;
pub mod user;

pub use booking::{Booking, BookingResponse, CreateBooking, UpdateBooking};
pub use review::{CreateReview, Review, ReviewResponse, UpdateReview};
pub use tour::{
    CreateTour, Difficulty, GeoPoint, Tour, TourResponse, UpdateTour, Waypoint,
};
pub use user::{Role, User, UserResponse};
