//! Database connection and index bootstrap.
//!
//! Uniqueness rules (tour name, user email, one review per tour+user, one
//! booking per checkout session) live here as unique indexes; violations
//! surface as `Conflict` through the error conversion.

use bson::doc;
use mongodb::{
    options::IndexOptions, Client, Collection, Database, IndexModel,
};

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::models::{Booking, Review, Tour, User};

/// Typed handles for the fixed resource set.
#[derive(Clone)]
pub struct Collections {
    pub users: Collection<User>,
    pub tours: Collection<Tour>,
    pub reviews: Collection<Review>,
    pub bookings: Collection<Booking>,
}

impl Collections {
    pub fn new(db: &Database) -> Self {
        Self {
            users: db.collection("users"),
            tours: db.collection("tours"),
            reviews: db.collection("reviews"),
            bookings: db.collection("bookings"),
        }
    }
}

/// Connect and select the configured database.
pub async fn connect(config: &DatabaseConfig) -> Result<Database> {
    let client = Client::with_uri_str(&config.url).await?;
    let db = client.database(&config.name);
    tracing::info!(database = %config.name, "database connection established");
    Ok(db)
}

/// Create the indexes the application relies on. Idempotent.
pub async fn ensure_indexes(collections: &Collections) -> Result<()> {
    let unique = || IndexOptions::builder().unique(true).build();

    collections
        .users
        .create_index(
            IndexModel::builder()
                .keys(doc! { "email": 1 })
                .options(unique())
                .build(),
        )
        .await?;

    collections
        .tours
        .create_index(
            IndexModel::builder()
                .keys(doc! { "name": 1 })
                .options(unique())
                .build(),
        )
        .await?;
    collections
        .tours
        .create_index(IndexModel::builder().keys(doc! { "slug": 1 }).build())
        .await?;
    collections
        .tours
        .create_index(
            IndexModel::builder()
                .keys(doc! { "price": 1, "ratings_average": -1 })
                .build(),
        )
        .await?;
    collections
        .tours
        .create_index(
            IndexModel::builder()
                .keys(doc! { "start_location": "2dsphere" })
                .build(),
        )
        .await?;

    collections
        .reviews
        .create_index(
            IndexModel::builder()
                .keys(doc! { "tour": 1, "user": 1 })
                .options(unique())
                .build(),
        )
        .await?;

    collections
        .bookings
        .create_index(
            IndexModel::builder()
                .keys(doc! { "checkout_session": 1 })
                .options(unique())
                .build(),
        )
        .await?;

    Ok(())
}
