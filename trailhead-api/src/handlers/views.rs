//! Server-rendered pages, driven by the same data accessors as the API.

use std::collections::HashMap;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use bson::doc;
use futures::TryStreamExt;

use super::bookings::tours_booked_by;
use crate::error::{Error, Result};
use crate::middleware::OptionalUser;
use crate::models::tour::visible_scope;
use crate::models::{Review, Tour, User, UserResponse};
use crate::query::ListParams;
use crate::state::AppState;

/// Card-sized view of a tour for list pages.
pub struct TourCard {
    pub name: String,
    pub slug: String,
    pub image_cover: String,
    pub summary: String,
    pub difficulty: String,
    pub duration: i32,
    pub max_group_size: i32,
    pub price: f64,
    pub ratings_average: f64,
    pub ratings_quantity: i64,
    pub location: String,
}

impl From<Tour> for TourCard {
    fn from(tour: Tour) -> Self {
        Self {
            location: tour
                .start_location
                .description
                .clone()
                .or(tour.start_location.address.clone())
                .unwrap_or_default(),
            name: tour.name,
            slug: tour.slug,
            image_cover: tour.image_cover,
            summary: tour.summary,
            difficulty: tour.difficulty.to_string(),
            duration: tour.duration,
            max_group_size: tour.max_group_size,
            price: tour.price,
            ratings_average: tour.ratings_average,
            ratings_quantity: tour.ratings_quantity,
        }
    }
}

pub struct ReviewCard {
    pub text: String,
    pub rating: f64,
    pub author_name: String,
    pub author_photo: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "overview.html")]
pub struct OverviewTemplate {
    pub user: Option<UserResponse>,
    pub tours: Vec<TourCard>,
}

#[derive(Template, WebTemplate)]
#[template(path = "tour.html")]
pub struct TourTemplate {
    pub user: Option<UserResponse>,
    pub tour: TourCard,
    pub description: String,
    pub images: Vec<String>,
    pub guides: Vec<UserResponse>,
    pub reviews: Vec<ReviewCard>,
}

#[derive(Template, WebTemplate)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub user: Option<UserResponse>,
}

#[derive(Template, WebTemplate)]
#[template(path = "signup.html")]
pub struct SignupTemplate {
    pub user: Option<UserResponse>,
}

#[derive(Template, WebTemplate)]
#[template(path = "account.html")]
pub struct AccountTemplate {
    pub user: Option<UserResponse>,
    pub me: UserResponse,
}

#[derive(Template, WebTemplate)]
#[template(path = "my_tours.html")]
pub struct MyToursTemplate {
    pub user: Option<UserResponse>,
    pub tours: Vec<TourCard>,
}

pub async fn overview(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
) -> Result<Response> {
    let tours = state
        .tours()
        .find_all(visible_scope(), &ListParams::default())
        .await?;

    Ok(OverviewTemplate {
        user: user.map(UserResponse::from),
        tours: tours.into_iter().map(TourCard::from).collect(),
    }
    .into_response())
}

pub async fn tour_page(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    Path(slug): Path<String>,
) -> Result<Response> {
    let mut filter = visible_scope();
    filter.insert("slug", slug);

    let tour = state
        .db
        .tours
        .find_one(filter)
        .await?
        .ok_or_else(|| Error::NotFound("There is no tour with that name.".to_string()))?;

    let guides = if tour.guides.is_empty() {
        Vec::new()
    } else {
        state
            .db
            .users
            .find(doc! { "_id": { "$in": tour.guides.clone() }, "active": { "$ne": false } })
            .await?
            .try_collect::<Vec<User>>()
            .await?
            .into_iter()
            .map(UserResponse::from)
            .collect()
    };

    let reviews: Vec<Review> = state
        .db
        .reviews
        .find(doc! { "tour": tour.id })
        .await?
        .try_collect()
        .await?;

    let author_ids: Vec<_> = reviews.iter().map(|r| r.user).collect();
    let authors: HashMap<_, _> = if author_ids.is_empty() {
        HashMap::new()
    } else {
        state
            .db
            .users
            .find(doc! { "_id": { "$in": author_ids } })
            .await?
            .try_collect::<Vec<User>>()
            .await?
            .into_iter()
            .map(|u| (u.id, (u.name, u.photo)))
            .collect()
    };

    let reviews = reviews
        .into_iter()
        .map(|review| {
            let (author_name, author_photo) = authors
                .get(&review.user)
                .cloned()
                .unwrap_or_else(|| ("Former traveller".to_string(), "default.jpg".to_string()));
            ReviewCard {
                text: review.review,
                rating: review.rating,
                author_name,
                author_photo,
            }
        })
        .collect();

    Ok(TourTemplate {
        user: user.map(UserResponse::from),
        description: tour.description.clone().unwrap_or_default(),
        images: tour.images.clone(),
        tour: TourCard::from(tour),
        guides,
        reviews,
    }
    .into_response())
}

pub async fn login_page(OptionalUser(user): OptionalUser) -> Response {
    LoginTemplate {
        user: user.map(UserResponse::from),
    }
    .into_response()
}

pub async fn signup_page(OptionalUser(user): OptionalUser) -> Response {
    SignupTemplate {
        user: user.map(UserResponse::from),
    }
    .into_response()
}

pub async fn account_page(OptionalUser(user): OptionalUser) -> Response {
    match user {
        Some(user) => {
            let me = UserResponse::from(user);
            AccountTemplate {
                user: Some(me.clone()),
                me,
            }
            .into_response()
        }
        None => Redirect::to("/login").into_response(),
    }
}

pub async fn my_tours_page(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
) -> Result<Response> {
    let Some(user) = user else {
        return Ok(Redirect::to("/login").into_response());
    };

    let tours = tours_booked_by(&state, user.id).await?;

    Ok(MyToursTemplate {
        user: Some(UserResponse::from(user)),
        tours: tours.into_iter().map(TourCard::from).collect(),
    }
    .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tour::{CreateTour, Difficulty, GeoPoint};

    fn sample_tour() -> Tour {
        CreateTour {
            name: "The Forest Hiker".into(),
            duration: 5,
            max_group_size: 25,
            difficulty: Difficulty::Easy,
            price: 397.0,
            price_discount: None,
            summary: "Breathtaking hike".into(),
            description: Some("Long description".into()),
            image_cover: "tour-1-cover.jpg".into(),
            images: vec!["a.jpg".into()],
            start_dates: vec![],
            secret_tour: false,
            start_location: GeoPoint {
                kind: "Point".into(),
                coordinates: vec![-115.57, 51.17],
                address: Some("Banff, CAN".into()),
                description: Some("Banff".into()),
            },
            locations: vec![],
            guides: vec![],
        }
        .into_tour()
        .unwrap()
    }

    #[test]
    fn test_tour_card_prefers_location_description() {
        let card = TourCard::from(sample_tour());
        assert_eq!(card.location, "Banff");
        assert_eq!(card.difficulty, "easy");
    }

    #[test]
    fn test_overview_template_renders_tours() {
        let html = OverviewTemplate {
            user: None,
            tours: vec![TourCard::from(sample_tour())],
        }
        .render()
        .unwrap();
        assert!(html.contains("The Forest Hiker"));
        assert!(html.contains("Log in"));
    }

    #[test]
    fn test_nav_shows_account_links_when_logged_in() {
        let user = crate::models::User::new(
            "Alice".into(),
            "alice@example.com".into(),
            "hash".into(),
            crate::models::Role::User,
        );
        let html = OverviewTemplate {
            user: Some(UserResponse::from(user)),
            tours: vec![],
        }
        .render()
        .unwrap();
        assert!(html.contains("Log out"));
        assert!(html.contains("Alice"));
    }

    #[test]
    fn test_tour_template_renders_reviews() {
        let tour = sample_tour();
        let html = TourTemplate {
            user: None,
            description: tour.description.clone().unwrap_or_default(),
            images: tour.images.clone(),
            tour: TourCard::from(tour),
            guides: vec![],
            reviews: vec![ReviewCard {
                text: "Wonderful trip".into(),
                rating: 5.0,
                author_name: "Bob".into(),
                author_photo: "default.jpg".into(),
            }],
        }
        .render()
        .unwrap();
        assert!(html.contains("Wonderful trip"));
        assert!(html.contains("Bob"));
    }
}
