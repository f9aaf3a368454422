//! Router assembly: resource routers, their auth chains, and the global
//! middleware stack.
//!
//! Global layers (outermost first): error-page mapping for browser traffic,
//! security headers, tracing, CORS, compression, body limits. The API
//! subtree additionally gets rate limiting and JSON sanitization. Per-route
//! chains compose protect → restrict_to → handler.

use axum::{
    extract::DefaultBodyLimit,
    http::Uri,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    services::ServeDir, trace::TraceLayer,
};

use crate::error::Error;
use crate::handlers::{auth, bookings, reviews, tours, users, views};
use crate::middleware::rate_limit::RateLimiter;
use crate::middleware::{error_page, protect, restrict_to, sanitize, security_headers};
use crate::models::Role;
use crate::state::AppState;

const STAFF: &[Role] = &[Role::Admin, Role::LeadGuide];
const GUIDES: &[Role] = &[Role::Admin, Role::LeadGuide, Role::Guide];
const REVIEWERS: &[Role] = &[Role::User];
const REVIEW_EDITORS: &[Role] = &[Role::User, Role::Admin];
const ADMIN: &[Role] = &[Role::Admin];

/// Uploads can carry images; everything else is bounded far lower by the
/// JSON sanitizer.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

fn tour_router(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/", get(tours::list_tours))
        .route("/top-5-cheap", get(tours::top_tours))
        .route("/tour-stats", get(tours::tour_stats))
        .route(
            "/tours-within/{distance}/center/{latlng}/unit/{unit}",
            get(tours::tours_within),
        )
        .route("/distances/{latlng}/unit/{unit}", get(tours::distances))
        .route("/{id}", get(tours::get_tour));

    let guide_reads = Router::new()
        .route("/monthly-plan/{year}", get(tours::monthly_plan))
        .route_layer(from_fn(|req, next| restrict_to(req, next, GUIDES)))
        .route_layer(from_fn_with_state(state.clone(), protect));

    let staff_writes = Router::new()
        .route("/", post(tours::create_tour))
        .route(
            "/{id}",
            patch(tours::update_tour).delete(tours::delete_tour),
        )
        .route("/{id}/images", patch(tours::upload_tour_images))
        .route_layer(from_fn(|req, next| restrict_to(req, next, STAFF)))
        .route_layer(from_fn_with_state(state.clone(), protect));

    // Nested review routes: listing needs a session, posting needs the
    // customer role. The segment is named `id` to match the sibling routes;
    // it carries the tour id.
    let nested_review_reads = Router::new()
        .route("/{id}/reviews", get(reviews::list_tour_reviews))
        .route_layer(from_fn_with_state(state.clone(), protect));

    let nested_review_writes = Router::new()
        .route("/{id}/reviews", post(reviews::create_tour_review))
        .route_layer(from_fn(|req, next| restrict_to(req, next, REVIEWERS)))
        .route_layer(from_fn_with_state(state.clone(), protect));

    public
        .merge(guide_reads)
        .merge(staff_writes)
        .merge(nested_review_reads)
        .merge(nested_review_writes)
}

fn user_router(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password/{token}", patch(auth::reset_password));

    let authenticated = Router::new()
        .route("/update-my-password", patch(auth::update_password))
        .route(
            "/me",
            get(users::get_me)
                .patch(users::update_me)
                .delete(users::delete_me),
        )
        .route_layer(from_fn_with_state(state.clone(), protect));

    let admin = Router::new()
        .route("/", get(users::list_users).post(users::create_user))
        .route(
            "/{id}",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route_layer(from_fn(|req, next| restrict_to(req, next, ADMIN)))
        .route_layer(from_fn_with_state(state.clone(), protect));

    public.merge(authenticated).merge(admin)
}

fn review_router(state: &AppState) -> Router<AppState> {
    let reads = Router::new()
        .route("/", get(reviews::list_reviews))
        .route("/{id}", get(reviews::get_review))
        .route_layer(from_fn_with_state(state.clone(), protect));

    let customer_writes = Router::new()
        .route("/", post(reviews::create_review))
        .route_layer(from_fn(|req, next| restrict_to(req, next, REVIEWERS)))
        .route_layer(from_fn_with_state(state.clone(), protect));

    let edits = Router::new()
        .route(
            "/{id}",
            patch(reviews::update_review).delete(reviews::delete_review),
        )
        .route_layer(from_fn(|req, next| restrict_to(req, next, REVIEW_EDITORS)))
        .route_layer(from_fn_with_state(state.clone(), protect));

    reads.merge(customer_writes).merge(edits)
}

fn booking_router(state: &AppState) -> Router<AppState> {
    let checkout = Router::new()
        .route(
            "/checkout-session/{tour_id}",
            get(bookings::get_checkout_session),
        )
        .route_layer(from_fn_with_state(state.clone(), protect));

    let staff = Router::new()
        .route(
            "/",
            get(bookings::list_bookings).post(bookings::create_booking),
        )
        .route(
            "/{id}",
            get(bookings::get_booking)
                .patch(bookings::update_booking)
                .delete(bookings::delete_booking),
        )
        .route_layer(from_fn(|req, next| restrict_to(req, next, STAFF)))
        .route_layer(from_fn_with_state(state.clone(), protect));

    checkout.merge(staff)
}

fn view_router() -> Router<AppState> {
    Router::new()
        .route("/", get(views::overview))
        .route("/tour/{slug}", get(views::tour_page))
        .route("/login", get(views::login_page))
        .route("/signup", get(views::signup_page))
        .route("/me", get(views::account_page))
        .route("/my-tours", get(views::my_tours_page))
}

async fn fallback(uri: Uri) -> Error {
    Error::NotFound(format!("Can't find {uri} on this server!"))
}

/// Assemble the whole application.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .nest("/tours", tour_router(&state))
        .nest("/users", user_router(&state))
        .nest("/reviews", review_router(&state))
        .nest("/bookings", booking_router(&state))
        .layer(from_fn(sanitize::sanitize_json))
        .layer(from_fn_with_state(
            state.rate_limiter.clone(),
            RateLimiter::middleware,
        ));

    let router = Router::new()
        .merge(view_router())
        // The webhook verifies a signature over the raw bytes, so it mounts
        // outside the sanitized API subtree.
        .route("/webhook-checkout", post(bookings::webhook_checkout))
        .nest("/api/v1", api)
        .fallback(fallback)
        .with_state(state.clone());

    let router = router
        .nest_service("/public", ServeDir::new("public"))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(error_page::render_error_pages));

    security_headers::apply_security_headers(router, &state.config.security_headers, false)
}
