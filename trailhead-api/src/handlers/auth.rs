//! Signup, login, logout, and the password lifecycle.

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use bson::doc;
use validator::Validate;

use crate::auth::reset;
use crate::auth::tokens::{logout_cookie, session_cookie};
use crate::error::{Error, Result};
use crate::middleware::CurrentUser;
use crate::models::user::{
    ForgotPasswordRequest, LoginRequest, ResetPasswordRequest, SignupRequest,
    UpdatePasswordRequest,
};
use crate::models::{Role, User, UserResponse};
use crate::state::AppState;

/// Issue a session token: response body plus the http-only cookie.
fn send_token(state: &AppState, user: User, status: StatusCode) -> Result<Response> {
    let token = state.sessions.sign(&user.id)?;
    let cookie = session_cookie(&token, &state.config.auth, &state.config.service);

    let body = serde_json::json!({
        "status": "success",
        "token": token,
        "data": { "user": UserResponse::from(user) },
    });

    let mut response = (status, Json(body)).into_response();
    response.headers_mut().append(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie)
            .map_err(|e| Error::Internal(format!("invalid cookie value: {e}")))?,
    );
    Ok(response)
}

/// Self-service signup. The role is always `user`; privileged roles are
/// assigned by an admin afterwards.
pub async fn signup(
    State(state): State<AppState>,
    Json(body): Json<SignupRequest>,
) -> Result<Response> {
    body.validate()?;

    let hash = state.hasher.hash(&body.password)?;
    let user = state
        .users()
        .create(User::new(body.name, body.email, hash, Role::User))
        .await?;

    let account_url = format!("{}/me", state.config.service.public_url);
    state.email.send_welcome(&user, &account_url).await?;

    send_token(&state, user, StatusCode::CREATED)
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Response> {
    let (email, password) = match (body.email, body.password) {
        (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
            (email, password)
        }
        _ => {
            return Err(Error::BadRequest(
                "Please provide email and password!".to_string(),
            ))
        }
    };

    let user = state
        .db
        .users
        .find_one(doc! { "email": email.to_lowercase(), "active": { "$ne": false } })
        .await?;

    let user = match user {
        Some(user) if state.hasher.verify(&password, &user.password)? => user,
        _ => {
            return Err(Error::Unauthorized(
                "Incorrect email or password".to_string(),
            ))
        }
    };

    send_token(&state, user, StatusCode::OK)
}

pub async fn logout() -> Result<Response> {
    let mut response = Json(serde_json::json!({ "status": "success" })).into_response();
    response.headers_mut().append(
        header::SET_COOKIE,
        HeaderValue::from_str(&logout_cookie())
            .map_err(|e| Error::Internal(format!("invalid cookie value: {e}")))?,
    );
    Ok(response)
}

/// Issue a reset token and email it. Only the digest is stored; a failed
/// send rolls the token back so no orphaned credential lingers.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordRequest>,
) -> Result<Response> {
    body.validate()?;

    let user = state
        .db
        .users
        .find_one(doc! { "email": body.email.to_lowercase(), "active": { "$ne": false } })
        .await?
        .ok_or_else(|| {
            Error::NotFound("There is no user with that email address.".to_string())
        })?;

    let token = reset::generate();
    state
        .db
        .users
        .update_one(
            doc! { "_id": user.id },
            doc! { "$set": {
                "password_reset_token": &token.digest,
                "password_reset_expires": token.expires_at,
            }},
        )
        .await?;

    let reset_url = format!(
        "{}/api/v1/users/reset-password/{}",
        state.config.service.public_url, token.plaintext
    );

    if let Err(err) = state.email.send_password_reset(&user, &reset_url).await {
        state
            .db
            .users
            .update_one(
                doc! { "_id": user.id },
                doc! { "$unset": {
                    "password_reset_token": "",
                    "password_reset_expires": "",
                }},
            )
            .await?;
        tracing::error!(user = %user.id, "password reset email failed: {err}");
        return Err(Error::Internal(
            "There was an error sending the email. Try again later.".to_string(),
        ));
    }

    Ok(Json(serde_json::json!({
        "status": "success",
        "message": "Token sent to email!",
    }))
    .into_response())
}

/// Look up by digest-of-supplied-token, check expiry server-side, set the
/// new password, and log the user in.
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<Response> {
    body.validate()?;

    let digest = reset::digest(&token);
    let user = state
        .db
        .users
        .find_one(doc! {
            "password_reset_token": digest,
            "password_reset_expires": { "$gt": bson::DateTime::now() },
        })
        .await?
        .ok_or_else(|| Error::BadRequest("Token is invalid or expired.".to_string()))?;

    let hash = state.hasher.hash(&body.password)?;
    state
        .db
        .users
        .update_one(
            doc! { "_id": user.id },
            doc! {
                "$set": {
                    "password": hash,
                    "password_changed_at": User::password_changed_stamp(),
                },
                "$unset": {
                    "password_reset_token": "",
                    "password_reset_expires": "",
                },
            },
        )
        .await?;

    send_token(&state, user, StatusCode::OK)
}

/// Authenticated password change; prior tokens are invalidated implicitly by
/// the changed-at comparison.
pub async fn update_password(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(body): Json<UpdatePasswordRequest>,
) -> Result<Response> {
    body.validate()?;

    if !state.hasher.verify(&body.password_current, &user.password)? {
        return Err(Error::Unauthorized(
            "Your current password is wrong.".to_string(),
        ));
    }

    let hash = state.hasher.hash(&body.password)?;
    state
        .db
        .users
        .update_one(
            doc! { "_id": user.id },
            doc! { "$set": {
                "password": hash,
                "password_changed_at": User::password_changed_stamp(),
            }},
        )
        .await?;

    send_token(&state, user, StatusCode::OK)
}
