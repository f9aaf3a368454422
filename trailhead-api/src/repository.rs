//! Generic id-keyed CRUD over a typed collection.
//!
//! The resource handlers instantiate [`Repository`] per concrete type;
//! resource-specific behavior enters only through scope documents (visibility
//! filters, tour-scoped reviews) and explicit service functions at the call
//! sites, never through hooks hidden in this layer.

use bson::{doc, oid::ObjectId, Document};
use futures::TryStreamExt;
use mongodb::{options::ReturnDocument, Collection};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Error, Result};
use crate::query::ListParams;

/// Capability bound for repository entities.
pub trait Model:
    Serialize + DeserializeOwned + Send + Sync + Unpin + Sized + 'static
{
    /// Client-facing view of this entity.
    type Response: From<Self> + Serialize;

    fn id(&self) -> ObjectId;
}

impl Model for crate::models::User {
    type Response = crate::models::UserResponse;

    fn id(&self) -> ObjectId {
        self.id
    }
}

impl Model for crate::models::Tour {
    type Response = crate::models::TourResponse;

    fn id(&self) -> ObjectId {
        self.id
    }
}

impl Model for crate::models::Review {
    type Response = crate::models::ReviewResponse;

    fn id(&self) -> ObjectId {
        self.id
    }
}

impl Model for crate::models::Booking {
    type Response = crate::models::BookingResponse;

    fn id(&self) -> ObjectId {
        self.id
    }
}

fn not_found() -> Error {
    Error::NotFound("No document found with that ID".to_string())
}

/// Id-keyed CRUD operations over one collection.
#[derive(Clone)]
pub struct Repository<M: Model> {
    collection: Collection<M>,
}

impl<M: Model> Repository<M> {
    pub fn new(collection: Collection<M>) -> Self {
        Self { collection }
    }

    pub fn collection(&self) -> &Collection<M> {
        &self.collection
    }

    fn scoped(scope: Document, id: ObjectId) -> Document {
        let mut filter = doc! { "_id": id };
        filter.extend(scope);
        filter
    }

    /// All entities matching the scope plus the request's filter criteria,
    /// sorted and paginated per the query builder.
    pub async fn find_all(&self, scope: Document, params: &ListParams) -> Result<Vec<M>> {
        let mut filter = params.filter_document();
        // The scope is server-owned; it wins over client criteria.
        filter.extend(scope);

        let (skip, limit) = params.pagination();
        let cursor = self
            .collection
            .find(filter)
            .sort(params.sort_document())
            .skip(skip)
            .limit(limit)
            .await?;

        Ok(cursor.try_collect().await?)
    }

    pub async fn find_one(&self, filter: Document) -> Result<Option<M>> {
        Ok(self.collection.find_one(filter).await?)
    }

    /// Fails `NotFound` when no record matches.
    pub async fn find_by_id(&self, scope: Document, id: ObjectId) -> Result<M> {
        self.collection
            .find_one(Self::scoped(scope, id))
            .await?
            .ok_or_else(not_found)
    }

    /// Insert and hand the entity back for the 201 response.
    pub async fn create(&self, model: M) -> Result<M> {
        self.collection.insert_one(&model).await?;
        Ok(model)
    }

    /// Partial update returning the new document; `NotFound` when absent.
    /// Empty update documents degrade to a plain read so the response shape
    /// stays consistent.
    pub async fn update_by_id(&self, scope: Document, id: ObjectId, set: Document) -> Result<M> {
        if set.is_empty() {
            return self.find_by_id(scope, id).await;
        }

        self.collection
            .find_one_and_update(Self::scoped(scope, id), doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await?
            .ok_or_else(not_found)
    }

    /// Remove and return the deleted document (callers may need it for
    /// follow-up recomputation). Repeated deletes fail `NotFound` again
    /// rather than crashing.
    pub async fn delete_by_id(&self, scope: Document, id: ObjectId) -> Result<M> {
        self.collection
            .find_one_and_delete(Self::scoped(scope, id))
            .await?
            .ok_or_else(not_found)
    }

    pub async fn update_one(&self, filter: Document, update: Document) -> Result<()> {
        self.collection.update_one(filter, update).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_filter_merges_scope_over_id() {
        let id = ObjectId::new();
        let filter =
            Repository::<crate::models::Tour>::scoped(doc! { "secret_tour": { "$ne": true } }, id);
        assert_eq!(filter.get_object_id("_id").unwrap(), id);
        assert!(filter.contains_key("secret_tour"));
    }

    #[test]
    fn test_not_found_is_operational() {
        let err = not_found();
        assert!(err.is_operational());
        assert_eq!(err.status_code(), http::StatusCode::NOT_FOUND);
    }
}
