//! Reviews: one per (tour, user), 1-5 rating, aggregate recomputation source.

use bson::{oid::ObjectId, DateTime, Document};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub review: String,

    /// 1.0..=5.0
    pub rating: f64,

    pub tour: ObjectId,

    pub user: ObjectId,

    pub created_at: DateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewResponse {
    pub id: String,
    pub review: String,
    pub rating: f64,
    pub tour: String,
    pub user: String,
    pub created_at: chrono::DateTime<Utc>,
}

impl From<Review> for ReviewResponse {
    fn from(review: Review) -> Self {
        Self {
            id: review.id.to_hex(),
            review: review.review,
            rating: review.rating,
            tour: review.tour.to_hex(),
            user: review.user.to_hex(),
            created_at: review.created_at.to_chrono(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateReview {
    #[validate(length(min = 1, message = "Review cannot be empty!"))]
    pub review: String,

    #[validate(range(min = 1.0, max = 5.0, message = "Rating must be between 1 and 5"))]
    pub rating: f64,

    /// Optional in the body; nested routes take it from the path instead.
    pub tour: Option<String>,
}

impl CreateReview {
    pub fn into_review(self, tour: ObjectId, user: ObjectId) -> Review {
        Review {
            id: ObjectId::new(),
            review: self.review,
            rating: self.rating,
            tour,
            user,
            created_at: DateTime::now(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateReview {
    #[validate(length(min = 1, message = "Review cannot be empty!"))]
    pub review: Option<String>,

    #[validate(range(min = 1.0, max = 5.0, message = "Rating must be between 1 and 5"))]
    pub rating: Option<f64>,
}

impl UpdateReview {
    pub fn into_set_document(self) -> Document {
        let mut set = Document::new();
        if let Some(review) = self.review {
            set.insert("review", review);
        }
        if let Some(rating) = self.rating {
            set.insert("rating", rating);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn test_rating_bounds() {
        let base = CreateReview {
            review: "Loved it".into(),
            rating: 5.0,
            tour: None,
        };
        assert!(base.validate().is_ok());

        let low = CreateReview { rating: 0.5, ..base.clone() };
        assert!(low.validate().is_err());

        let high = CreateReview { rating: 5.5, ..base };
        assert!(high.validate().is_err());
    }

    #[test]
    fn test_empty_review_rejected() {
        let review = CreateReview {
            review: String::new(),
            rating: 3.0,
            tour: None,
        };
        assert!(review.validate().is_err());
    }

    #[test]
    fn test_update_document_only_carries_set_fields() {
        let set = UpdateReview {
            rating: Some(4.0),
            ..Default::default()
        }
        .into_set_document();
        assert_eq!(set.get_f64("rating").unwrap(), 4.0);
        assert!(!set.contains_key("review"));
    }

    #[test]
    fn test_into_review_binds_tour_and_author() {
        let tour = ObjectId::new();
        let user = ObjectId::new();
        let review = CreateReview {
            review: "Great guides".into(),
            rating: 4.0,
            tour: None,
        }
        .into_review(tour, user);
        assert_eq!(review.tour, tour);
        assert_eq!(review.user, user);
    }
}
