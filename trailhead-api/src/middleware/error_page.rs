//! Error translation for browser traffic.
//!
//! API requests get the JSON error body as-is; page requests (anything not
//! under `/api`) get the same failure re-rendered as an HTML error page.
//! Selection is by request path prefix, applied on the response side so all
//! handlers keep returning the one error type.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

#[derive(Template, WebTemplate)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub title: String,
    pub message: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Whether this response should be re-rendered as an error page.
fn wants_error_page(path: &str, status: StatusCode, content_type: Option<&str>) -> bool {
    !path.starts_with("/api")
        && (status.is_client_error() || status.is_server_error())
        && content_type.is_some_and(|ct| ct.starts_with("application/json"))
}

pub async fn render_error_pages(request: Request<Body>, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let response = next.run(request).await;

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if !wants_error_page(&path, response.status(), content_type.as_deref()) {
        return response;
    }

    let status = response.status();
    let bytes = match to_bytes(response.into_body(), 64 * 1024).await {
        Ok(bytes) => bytes,
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };

    let message = serde_json::from_slice::<ErrorBody>(&bytes)
        .map(|body| body.message)
        .unwrap_or_else(|_| "Please try again later.".to_string());

    let page = ErrorTemplate {
        title: "Something went wrong!".to_string(),
        message,
    };

    (status, page).into_response()
}
