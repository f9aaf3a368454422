//! Bookings: the server-confirmed record of a paid checkout.

use bson::{oid::ObjectId, DateTime, Document};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub tour: ObjectId,

    pub user: ObjectId,

    /// Price at the time of purchase; may diverge from the tour's current
    /// price.
    pub price: f64,

    #[serde(default = "default_paid")]
    pub paid: bool,

    /// Processor checkout-session id. Unique index: a replayed webhook
    /// notification for the same session cannot create a second booking.
    pub checkout_session: String,

    pub created_at: DateTime,
}

fn default_paid() -> bool {
    true
}

impl Booking {
    pub fn new(tour: ObjectId, user: ObjectId, price: f64, checkout_session: String) -> Self {
        Self {
            id: ObjectId::new(),
            tour,
            user,
            price,
            paid: true,
            checkout_session,
            created_at: DateTime::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingResponse {
    pub id: String,
    pub tour: String,
    pub user: String,
    pub price: f64,
    pub paid: bool,
    pub created_at: chrono::DateTime<Utc>,
}

impl From<Booking> for BookingResponse {
    fn from(booking: Booking) -> Self {
        Self {
            id: booking.id.to_hex(),
            tour: booking.tour.to_hex(),
            user: booking.user.to_hex(),
            price: booking.price,
            paid: booking.paid,
            created_at: booking.created_at.to_chrono(),
        }
    }
}

/// Manual booking entry (admin tooling).
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBooking {
    pub tour: String,
    pub user: String,
    pub price: f64,
    #[serde(default = "default_paid")]
    pub paid: bool,
}

impl CreateBooking {
    pub fn into_booking(self) -> Result<Booking> {
        Ok(Booking {
            id: ObjectId::new(),
            tour: ObjectId::parse_str(&self.tour)?,
            user: ObjectId::parse_str(&self.user)?,
            price: self.price,
            paid: self.paid,
            // Manual entries have no processor session; a fresh id keeps the
            // unique index satisfied.
            checkout_session: format!("manual_{}", ObjectId::new().to_hex()),
            created_at: DateTime::now(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBooking {
    pub price: Option<f64>,
    pub paid: Option<bool>,
}

impl UpdateBooking {
    pub fn into_set_document(self) -> Document {
        let mut set = Document::new();
        if let Some(price) = self.price {
            set.insert("price", price);
        }
        if let Some(paid) = self.paid {
            set.insert("paid", paid);
        }
        set
    }
}
