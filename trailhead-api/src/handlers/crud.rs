//! Generic CRUD handler cores, instantiated per resource.
//!
//! Each resource's axum endpoints stay thin: they parse ids/DTOs, choose a
//! scope, then delegate here. The factory is agnostic to the concrete
//! resource; specialization happens at the call sites.

use axum::response::{IntoResponse, Response};
use bson::{oid::ObjectId, Document};
use serde_json::Value;

use super::{created, item, list, NoContent};
use crate::error::Result;
use crate::query::{apply_field_selection, ListParams};
use crate::repository::{Model, Repository};

/// List with filtering, sorting, field selection, and pagination; returns
/// the result count alongside the items.
pub async fn list_resources<M: Model>(
    repo: &Repository<M>,
    scope: Document,
    params: ListParams,
) -> Result<Response> {
    let items = repo.find_all(scope, &params).await?;

    let mut values = Vec::with_capacity(items.len());
    for entity in items {
        values.push(serde_json::to_value(M::Response::from(entity))?);
    }

    if let Some(fields) = params.fields() {
        for value in &mut values {
            apply_field_selection(value, &fields);
        }
    }

    Ok(list::<Value>(values).into_response())
}

pub async fn get_resource<M: Model>(
    repo: &Repository<M>,
    scope: Document,
    id: ObjectId,
) -> Result<Response> {
    let entity = repo.find_by_id(scope, id).await?;
    Ok(item(M::Response::from(entity)).into_response())
}

pub async fn create_resource<M: Model>(repo: &Repository<M>, model: M) -> Result<Response> {
    let entity = repo.create(model).await?;
    Ok(created(M::Response::from(entity)))
}

pub async fn update_resource<M: Model>(
    repo: &Repository<M>,
    scope: Document,
    id: ObjectId,
    set: Document,
) -> Result<Response> {
    let entity = repo.update_by_id(scope, id, set).await?;
    Ok(item(M::Response::from(entity)).into_response())
}

pub async fn delete_resource<M: Model>(
    repo: &Repository<M>,
    scope: Document,
    id: ObjectId,
) -> Result<Response> {
    repo.delete_by_id(scope, id).await?;
    Ok(NoContent.into_response())
}
