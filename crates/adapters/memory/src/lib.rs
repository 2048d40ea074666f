//! # Novel Admin Memory Backend
//!
//! An in-memory backend for the admin console, intended for testing,
//! development and the command line tool. It implements every backend
//! interface: data access with server-side procedures, the built-in auth
//! service, and object storage.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use novel_admin_adapter_memory::MemoryBackend;
//!
//! let backend = MemoryBackend::new();
//! backend.register_user(Profile::new("u1", "admin@example.com").with_role(Role::Admin), "pw").await?;
//! let console = AdminConsole::builder().backend(backend).build().await?;
//! ```
//!
//! State can be persisted to and restored from a JSON snapshot. Uploaded
//! objects and the signed-in session are not part of the snapshot.

mod credentials;
mod procedures;

pub use credentials::StoredCredential;
pub use procedures::{ADJUST_BALANCE, COUNT_ROWS, PROCESS_WITHDRAWAL, SWAP_SORT_ORDER};

use async_trait::async_trait;
use chrono::Utc;
use novel_admin_core::error::{AdminError, AdminResult};
use novel_admin_core::query::{Filter, Query, Row, SelectResult};
use novel_admin_core::traits::{AuthProvider, DataAccess, ObjectStorage, Record};
use novel_admin_core::types::{
    known_collections, new_id, Actor, Credentials, LoginLog, Profile, Setting,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

/// Everything the backend stores.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct State {
    /// Rows per collection, in insertion order.
    tables: HashMap<String, Vec<Row>>,
    /// Logins keyed by lowercase email.
    credentials: HashMap<String, StoredCredential>,
    #[serde(skip)]
    objects: HashMap<(String, String), Vec<u8>>,
    #[serde(skip)]
    current_user: Option<String>,
}

impl State {
    fn with_collections() -> Self {
        let mut state = Self::default();
        state.ensure_collections();
        state
    }

    fn ensure_collections(&mut self) {
        for name in known_collections() {
            self.tables.entry(name.to_string()).or_default();
        }
    }

    pub(crate) fn table(&self, collection: &str) -> AdminResult<&Vec<Row>> {
        self.tables
            .get(collection)
            .ok_or_else(|| AdminError::UnknownCollection {
                collection: collection.to_string(),
            })
    }

    pub(crate) fn table_mut(&mut self, collection: &str) -> AdminResult<&mut Vec<Row>> {
        self.tables
            .get_mut(collection)
            .ok_or_else(|| AdminError::UnknownCollection {
                collection: collection.to_string(),
            })
    }
}

/// Primary key column of a collection.
fn key_column(collection: &str) -> &'static str {
    if collection == Setting::COLLECTION {
        Setting::KEY
    } else {
        "id"
    }
}

/// In-memory backend.
///
/// Clones share the same state. All writes, including procedures, run
/// under a single write lock.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    state: Arc<RwLock<State>>,
    public_base_url: String,
    injected_failure: Arc<Mutex<Option<String>>>,
}

impl MemoryBackend {
    /// Creates an empty backend with every known collection.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::with_collections())),
            public_base_url: "memory://storage".to_string(),
            injected_failure: Arc::new(Mutex::new(None)),
        }
    }

    /// Sets the base of public object URLs.
    pub fn with_public_base_url(mut self, base: impl Into<String>) -> Self {
        self.public_base_url = base.into().trim_end_matches('/').to_string();
        self
    }

    /// Loads a backend from a JSON snapshot.
    pub async fn load_snapshot(path: impl AsRef<Path>) -> AdminResult<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        let mut state: State = serde_json::from_str(&content)?;
        state.ensure_collections();
        tracing::debug!(path = %path.display(), "snapshot loaded");
        let backend = Self::new();
        *backend.state.write().await = state;
        Ok(backend)
    }

    /// Loads a snapshot if the file exists, otherwise starts empty.
    pub async fn open(path: impl AsRef<Path>) -> AdminResult<Self> {
        if tokio::fs::try_exists(path.as_ref()).await? {
            Self::load_snapshot(path).await
        } else {
            Ok(Self::new())
        }
    }

    /// Writes the current state to a JSON snapshot.
    pub async fn save_snapshot(&self, path: impl AsRef<Path>) -> AdminResult<()> {
        let path = path.as_ref();
        let content = {
            let state = self.state.read().await;
            serde_json::to_string_pretty(&*state)?
        };
        tokio::fs::write(path, content).await?;
        tracing::debug!(path = %path.display(), "snapshot saved");
        Ok(())
    }

    /// Creates a profile with a password login.
    pub async fn register_user(&self, profile: Profile, password: &str) -> AdminResult<Profile> {
        let mut state = self.state.write().await;
        let email = profile.email.to_lowercase();
        if state.credentials.contains_key(&email) {
            return Err(AdminError::conflict(Profile::COLLECTION, "email already registered"));
        }
        let row = profile.to_row()?;
        let table = state.table_mut(Profile::COLLECTION)?;
        if procedures::find(table, "id", &profile.id).is_some() {
            return Err(AdminError::conflict(Profile::COLLECTION, "duplicate id"));
        }
        table.push(row);
        state
            .credentials
            .insert(email, StoredCredential::new(&profile.id, password));
        Ok(profile)
    }

    /// Makes the next data-access call fail with a network error.
    pub fn inject_failure(&self, message: impl Into<String>) {
        if let Ok(mut slot) = self.injected_failure.lock() {
            *slot = Some(message.into());
        }
    }

    /// Returns a stored object.
    pub async fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        let state = self.state.read().await;
        state
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Number of rows in a collection.
    pub async fn row_count(&self, collection: &str) -> usize {
        let state = self.state.read().await;
        state.table(collection).map(Vec::len).unwrap_or(0)
    }

    /// Clears all stored data.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        *state = State::with_collections();
    }

    fn check_failure(&self) -> AdminResult<()> {
        let injected = self
            .injected_failure
            .lock()
            .map_err(|_| AdminError::internal("failure slot poisoned"))?
            .take();
        match injected {
            Some(message) => Err(AdminError::Network { message }),
            None => Ok(()),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataAccess for MemoryBackend {
    async fn select(&self, collection: &str, query: &Query) -> AdminResult<SelectResult> {
        self.check_failure()?;
        let state = self.state.read().await;
        let mut rows: Vec<Row> = state
            .table(collection)?
            .iter()
            .filter(|row| query.matches(row))
            .cloned()
            .collect();
        let count = query.count.then_some(rows.len());
        query.sort(&mut rows);
        Ok(SelectResult {
            rows: query.window(rows),
            count,
        })
    }

    async fn insert(&self, collection: &str, rows: Vec<Row>) -> AdminResult<Vec<Row>> {
        self.check_failure()?;
        let mut state = self.state.write().await;
        let key = key_column(collection);
        let table = state.table_mut(collection)?;

        let mut prepared = Vec::with_capacity(rows.len());
        for mut row in rows {
            let id = match row.get(key).and_then(Value::as_str) {
                Some(id) => id.to_string(),
                None if key == "id" => {
                    let id = new_id();
                    row.insert(key.into(), Value::String(id.clone()));
                    id
                }
                None => return Err(AdminError::validation(key, "missing key")),
            };
            let taken = procedures::find(table, key, &id).is_some()
                || prepared
                    .iter()
                    .any(|r: &Row| r.get(key).and_then(Value::as_str) == Some(id.as_str()));
            if taken {
                return Err(AdminError::conflict(
                    collection,
                    format!("duplicate {}={}", key, id),
                ));
            }
            prepared.push(row);
        }

        table.extend(prepared.iter().cloned());
        Ok(prepared)
    }

    async fn update(
        &self,
        collection: &str,
        patch: Row,
        filters: &[Filter],
    ) -> AdminResult<Vec<Row>> {
        self.check_failure()?;
        let mut state = self.state.write().await;
        let key = key_column(collection);
        let table = state.table_mut(collection)?;

        let key_changed = table
            .iter()
            .filter(|row| filters.iter().all(|f| f.matches(row)))
            .any(|row| patch.get(key).is_some_and(|value| row.get(key) != Some(value)));
        if key_changed {
            return Err(AdminError::validation(key, "primary key is immutable"));
        }

        let mut updated = Vec::new();
        for row in table.iter_mut() {
            if filters.iter().all(|f| f.matches(row)) {
                for (column, value) in &patch {
                    row.insert(column.clone(), value.clone());
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, collection: &str, filters: &[Filter]) -> AdminResult<usize> {
        self.check_failure()?;
        let mut state = self.state.write().await;
        let table = state.table_mut(collection)?;
        let before = table.len();
        table.retain(|row| !filters.iter().all(|f| f.matches(row)));
        Ok(before - table.len())
    }

    async fn invoke_procedure(&self, name: &str, args: Value) -> AdminResult<Value> {
        self.check_failure()?;
        let mut state = self.state.write().await;
        procedures::run(&mut state, name, args)
    }
}

#[async_trait]
impl AuthProvider for MemoryBackend {
    async fn current_actor(&self) -> AdminResult<Option<Actor>> {
        let state = self.state.read().await;
        let Some(user_id) = state.current_user.as_deref() else {
            return Ok(None);
        };
        let profile = state
            .table(Profile::COLLECTION)?
            .iter()
            .find(|row| row.get("id").and_then(Value::as_str) == Some(user_id))
            .cloned()
            .map(Profile::from_row)
            .transpose()?;
        Ok(profile.map(|p| p.actor()))
    }

    async fn sign_in(&self, credentials: &Credentials) -> AdminResult<Actor> {
        let mut state = self.state.write().await;
        let stored = state
            .credentials
            .get(&credentials.email.to_lowercase())
            .filter(|c| c.verify(&credentials.password))
            .cloned()
            .ok_or(AdminError::InvalidCredentials)?;

        let profile = state
            .table(Profile::COLLECTION)?
            .iter()
            .find(|row| row.get("id").and_then(Value::as_str) == Some(stored.user_id.as_str()))
            .cloned()
            .map(Profile::from_row)
            .transpose()?
            .ok_or_else(|| AdminError::not_found(Profile::COLLECTION, "id", &stored.user_id))?;

        let log = LoginLog {
            id: new_id(),
            user_id: profile.id.clone(),
            ip: None,
            created_at: Utc::now(),
        };
        state.table_mut(LoginLog::COLLECTION)?.push(log.to_row()?);
        state.current_user = Some(profile.id.clone());
        Ok(profile.actor())
    }

    async fn sign_out(&self) -> AdminResult<()> {
        self.state.write().await.current_user = None;
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for MemoryBackend {
    async fn upload(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> AdminResult<()> {
        self.check_failure()?;
        let mut state = self.state.write().await;
        state
            .objects
            .insert((bucket.to_string(), key.to_string()), bytes);
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, bucket, key)
    }
}
