//! User endpoints: the authenticated `/me` surface plus admin management.

use std::collections::HashMap;

use axum::{
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::header,
    response::{IntoResponse, Response},
    Extension, Json,
};
use bson::{doc, oid::ObjectId, Document};
use validator::Validate;

use super::{crud, item, NoContent};
use crate::error::{Error, Result};
use crate::media;
use crate::middleware::CurrentUser;
use crate::models::user::{AdminUpdateUserRequest, UpdateMeRequest};
use crate::models::UserResponse;
use crate::query::ListParams;
use crate::state::AppState;

/// Soft-deleted users are invisible to every default query.
fn active_scope() -> Document {
    doc! { "active": { "$ne": false } }
}

pub async fn get_me(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Response {
    item(UserResponse::from(user)).into_response()
}

/// Profile update: name, email, and the photo. Role and password fields are
/// filtered out; password changes have their own route.
pub async fn update_me(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    request: Request,
) -> Result<Response> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let (update, photo) = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| Error::BadRequest(format!("Invalid multipart payload: {e}")))?;
        parse_multipart_profile(multipart).await?
    } else {
        let Json(value) = Json::<serde_json::Value>::from_request(request, &state)
            .await
            .map_err(|e| Error::BadRequest(format!("Invalid request body: {e}")))?;
        (parse_json_profile(value)?, None)
    };

    update.validate()?;

    let mut set = Document::new();
    if let Some(name) = update.name {
        set.insert("name", name);
    }
    if let Some(email) = update.email {
        set.insert("email", email.to_lowercase());
    }

    if let Some(bytes) = photo {
        let filename = media::user_photo_filename(&user.id);
        media::store(
            &state.config.uploads.directory,
            media::USER_IMAGE_DIR,
            &filename,
            &bytes,
        )
        .await?;
        media::remove_stale(
            &state.config.uploads.directory,
            media::USER_IMAGE_DIR,
            &user.photo,
        )
        .await;
        set.insert("photo", filename);
    }

    let updated = state
        .users()
        .update_by_id(active_scope(), user.id, set)
        .await?;
    Ok(item(UserResponse::from(updated)).into_response())
}

fn reject_password_fields(keys: impl Iterator<Item = String>) -> Result<()> {
    for key in keys {
        if key == "password" || key == "password_confirm" {
            return Err(Error::BadRequest(
                "This route is not for password updates. Please use /update-my-password."
                    .to_string(),
            ));
        }
    }
    Ok(())
}

fn parse_json_profile(value: serde_json::Value) -> Result<UpdateMeRequest> {
    if let Some(map) = value.as_object() {
        reject_password_fields(map.keys().cloned())?;
    }
    // Deserializing through the DTO is the allow-list: anything beyond
    // name/email is dropped here.
    serde_json::from_value(value)
        .map_err(|e| Error::BadRequest(format!("Invalid request body: {e}")))
}

async fn parse_multipart_profile(
    mut multipart: Multipart,
) -> Result<(UpdateMeRequest, Option<Vec<u8>>)> {
    let mut fields: HashMap<String, String> = HashMap::new();
    let mut photo = None;

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if name == "photo" {
            media::require_image(field.content_type())?;
            photo = Some(field.bytes().await?.to_vec());
        } else {
            fields.insert(name, field.text().await?);
        }
    }

    reject_password_fields(fields.keys().cloned())?;

    let update = UpdateMeRequest {
        name: fields.remove("name"),
        email: fields.remove("email"),
    };
    Ok((update, photo))
}

/// Soft delete: flip `active` off; the record stays.
pub async fn delete_me(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Response> {
    state
        .db
        .users
        .update_one(doc! { "_id": user.id }, doc! { "$set": { "active": false } })
        .await?;
    Ok(NoContent.into_response())
}

// Admin surface below: plain factory instantiations.

pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response> {
    crud::list_resources(&state.users(), active_scope(), ListParams::new(params)).await
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response> {
    crud::get_resource(&state.users(), active_scope(), ObjectId::parse_str(&id)?).await
}

pub async fn create_user() -> Result<Response> {
    Err(Error::BadRequest(
        "This route is not defined! Please use /signup instead.".to_string(),
    ))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AdminUpdateUserRequest>,
) -> Result<Response> {
    body.validate()?;

    let mut set = Document::new();
    if let Some(name) = body.name {
        set.insert("name", name);
    }
    if let Some(email) = body.email {
        set.insert("email", email.to_lowercase());
    }
    if let Some(role) = body.role {
        set.insert(
            "role",
            bson::to_bson(&role).map_err(|e| Error::Internal(e.to_string()))?,
        );
    }
    if let Some(active) = body.active {
        set.insert("active", active);
    }

    crud::update_resource(&state.users(), active_scope(), ObjectId::parse_str(&id)?, set).await
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response> {
    crud::delete_resource(&state.users(), active_scope(), ObjectId::parse_str(&id)?).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_fields_are_rejected() {
        let keys = vec!["name".to_string(), "password".to_string()];
        assert!(reject_password_fields(keys.into_iter()).is_err());

        let keys = vec!["password_confirm".to_string()];
        assert!(reject_password_fields(keys.into_iter()).is_err());

        let keys = vec!["name".to_string(), "email".to_string()];
        assert!(reject_password_fields(keys.into_iter()).is_ok());
    }

    #[test]
    fn test_json_profile_allow_list_drops_role() {
        let update = parse_json_profile(serde_json::json!({
            "name": "Alice",
            "email": "ALICE@example.com",
            "role": "admin"
        }))
        .unwrap();
        assert_eq!(update.name.as_deref(), Some("Alice"));
        assert_eq!(update.email.as_deref(), Some("ALICE@example.com"));
        // No role field exists on the DTO to smuggle a promotion through.
    }

    #[test]
    fn test_json_profile_rejects_password_update() {
        let result = parse_json_profile(serde_json::json!({ "password": "hunter22222" }));
        assert!(matches!(result, Err(Error::BadRequest(_))));
    }
}
