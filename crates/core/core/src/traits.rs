//! Core traits for the admin console.
//!
//! This module defines the interfaces that backends implement (data access,
//! authentication, object storage) and the record traits that typed models
//! implement to travel through them.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{AdminError, AdminResult};
use crate::query::{Filter, Query, Row, SelectResult};
use crate::types::{Actor, Credentials};

/// A typed model stored in a backend collection.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// Name of the backend collection.
    const COLLECTION: &'static str;

    /// Primary key column.
    const KEY: &'static str = "id";

    /// Returns the primary key value.
    fn id(&self) -> &str;

    /// Converts the record into a backend row.
    fn to_row(&self) -> AdminResult<Row> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(AdminError::Serialization {
                message: format!("{} did not serialize to an object: {}", Self::COLLECTION, other),
            }),
        }
    }

    /// Reads a record from a backend row.
    fn from_row(row: Row) -> AdminResult<Self> {
        Ok(serde_json::from_value(Value::Object(row))?)
    }

    /// Filter that selects exactly this record.
    fn key_filter(&self) -> Filter {
        Filter::eq(Self::KEY, self.id())
    }
}

/// A record whose display position is controlled by `sort_order`.
pub trait Orderable: Record {
    /// Zero-based position.
    fn sort_order(&self) -> u32;
}

/// Generic request/response access to the hosted backend.
///
/// Each call is an independent request. Operations that must apply
/// together are exposed by the backend as procedures and invoked through
/// [`DataAccess::invoke_procedure`].
#[async_trait]
pub trait DataAccess: Send + Sync {
    /// Reads rows with optional filtering, sort and pagination window.
    async fn select(&self, collection: &str, query: &Query) -> AdminResult<SelectResult>;

    /// Creates rows and returns them as stored.
    async fn insert(&self, collection: &str, rows: Vec<Row>) -> AdminResult<Vec<Row>>;

    /// Merges `patch` into every row matching `filters`.
    async fn update(&self, collection: &str, patch: Row, filters: &[Filter])
    -> AdminResult<Vec<Row>>;

    /// Deletes every row matching `filters`, returning how many were removed.
    async fn delete(&self, collection: &str, filters: &[Filter]) -> AdminResult<usize>;

    /// Calls a server-side procedure.
    async fn invoke_procedure(&self, name: &str, args: Value) -> AdminResult<Value>;
}

/// The backend's built-in authentication service.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Returns the actor of the current session, if any.
    async fn current_actor(&self) -> AdminResult<Option<Actor>>;

    /// Signs in and returns the new current actor.
    async fn sign_in(&self, credentials: &Credentials) -> AdminResult<Actor>;

    /// Ends the current session.
    async fn sign_out(&self) -> AdminResult<()>;
}

/// Binary object storage for images.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores `bytes` under `bucket/key`, replacing any previous object.
    async fn upload(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> AdminResult<()>;

    /// Returns the public URL of `bucket/key`.
    fn public_url(&self, bucket: &str, key: &str) -> String;
}

/// Typed helpers over [`DataAccess`].
///
/// Implemented for every `DataAccess`, including `dyn DataAccess`.
#[async_trait]
pub trait DataAccessExt: DataAccess {
    /// Selects and deserializes records.
    async fn fetch<T: Record>(&self, query: &Query) -> AdminResult<(Vec<T>, Option<usize>)> {
        let result = self.select(T::COLLECTION, query).await?;
        let records = result
            .rows
            .into_iter()
            .map(T::from_row)
            .collect::<AdminResult<Vec<_>>>()?;
        Ok((records, result.count))
    }

    /// Fetches every record of a collection in the given order.
    async fn fetch_all<T: Record>(&self, order_by: &str) -> AdminResult<Vec<T>> {
        let query = Query::new().order_by(order_by, true);
        Ok(self.fetch::<T>(&query).await?.0)
    }

    /// Fetches one record by key.
    async fn fetch_one<T: Record>(&self, id: &str) -> AdminResult<T> {
        let query = Query::new().eq(T::KEY, id);
        self.fetch::<T>(&query)
            .await?
            .0
            .into_iter()
            .next()
            .ok_or_else(|| AdminError::not_found(T::COLLECTION, T::KEY, id))
    }

    /// Inserts one record and returns it as stored.
    async fn create<T: Record>(&self, record: &T) -> AdminResult<T> {
        let rows = self.insert(T::COLLECTION, vec![record.to_row()?]).await?;
        rows.into_iter()
            .next()
            .map(T::from_row)
            .transpose()?
            .ok_or_else(|| AdminError::backend(format!("insert into {} returned no rows", T::COLLECTION)))
    }

    /// Replaces one record by key.
    async fn save<T: Record>(&self, record: &T) -> AdminResult<T> {
        let rows = self
            .update(T::COLLECTION, record.to_row()?, &[record.key_filter()])
            .await?;
        rows.into_iter()
            .next()
            .map(T::from_row)
            .transpose()?
            .ok_or_else(|| AdminError::not_found(T::COLLECTION, T::KEY, record.id()))
    }

    /// Deletes one record by key. Missing records are reported as not found.
    async fn remove<T: Record>(&self, id: &str) -> AdminResult<()> {
        let removed = self
            .delete(T::COLLECTION, &[Filter::eq(T::KEY, id)])
            .await?;
        if removed == 0 {
            return Err(AdminError::not_found(T::COLLECTION, T::KEY, id));
        }
        Ok(())
    }

    /// Number of rows matching `query`, as reported by the backend.
    async fn count(&self, collection: &str, query: Query) -> AdminResult<usize> {
        let result = self
            .select(collection, &query.with_count().range(0, 0))
            .await?;
        Ok(result.count.unwrap_or(0))
    }
}

impl<D: DataAccess + ?Sized> DataAccessExt for D {}
