//! # Novel Admin
//!
//! Back-office console for a web-novel platform: catalog, storefront,
//! finance, forum moderation and statistics over a hosted backend.
//!
//! Every page is a small service borrowed from [`AdminConsole`]. Services
//! check the session's role, perform their backend calls through the
//! console so failures are logged in one place, and publish a change
//! notification after every successful write.
//!
//! ```ignore
//! let backend = MemoryBackend::new();
//! let console = AdminConsole::builder().backend(backend).build().await?;
//! console.session().sign_in(&Credentials::new("ops@example.com", "pw")).await?;
//! console.positions::<Category>().move_up("fantasy").await?;
//! ```

mod busy;
pub mod catalog;
pub mod config;
pub mod csv;
pub mod finance;
pub mod forum;
pub mod media;
pub mod ordering;
pub mod stats;
pub mod storefront;
pub mod validation;

pub use busy::BusyGuard;
pub use catalog::Catalog;
pub use config::{AdminConfig, BackendConfig, ConfigError, ConsoleConfig, load_config, parse_config};
pub use finance::Finance;
pub use forum::{Forum, PostFilter};
pub use media::Media;
pub use ordering::{Direction, OrderSlot, PlannedSwap, Positions};
pub use stats::{AnalyticsDashboard, ChartData, DailyBucket, DataPoint, Stats, SystemStats, aggregate_daily};
pub use storefront::{NewBanner, Storefront};

use novel_admin_core::changes::{Change, ChangeFeed, ChangeKind, ChangeListener};
use novel_admin_core::context::SessionContext;
use novel_admin_core::error::{AdminError, AdminResult};
use novel_admin_core::query::{Filter, Query, Range, Row};
use novel_admin_core::traits::{AuthProvider, DataAccess, DataAccessExt, ObjectStorage, Orderable, Record};
use novel_admin_core::types::{Actor, Role};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Whether the user confirmed a destructive action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Unconfirmed,
}

impl Confirmation {
    /// Fails with `ConfirmationRequired` unless confirmed.
    pub fn require(self, action: &str) -> AdminResult<()> {
        match self {
            Self::Confirmed => Ok(()),
            Self::Unconfirmed => Err(AdminError::ConfirmationRequired {
                action: action.to_string(),
            }),
        }
    }
}

impl From<bool> for Confirmation {
    fn from(confirmed: bool) -> Self {
        if confirmed { Self::Confirmed } else { Self::Unconfirmed }
    }
}

/// One page of a list view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Matching rows across all pages.
    pub total: usize,
    /// Zero-based page index.
    pub page: usize,
    pub per_page: usize,
}

impl<T> Page<T> {
    /// Number of pages needed for `total` rows.
    pub fn total_pages(&self) -> usize {
        if self.per_page == 0 {
            return 0;
        }
        self.total.div_ceil(self.per_page)
    }

    /// Returns true if a later page exists.
    pub fn has_next(&self) -> bool {
        self.page + 1 < self.total_pages()
    }
}

/// The admin console: shared backend handles plus session state.
pub struct AdminConsole {
    config: AdminConfig,
    data: Arc<dyn DataAccess>,
    storage: Arc<dyn ObjectStorage>,
    session: Arc<SessionContext>,
    changes: ChangeFeed,
    busy: AtomicBool,
}

impl AdminConsole {
    /// Starts building a console.
    pub fn builder() -> AdminConsoleBuilder {
        AdminConsoleBuilder::new()
    }

    pub fn config(&self) -> &AdminConfig {
        &self.config
    }

    /// Raw data access, for callers that need rows rather than records.
    pub fn data(&self) -> &dyn DataAccess {
        self.data.as_ref()
    }

    pub fn storage(&self) -> &dyn ObjectStorage {
        self.storage.as_ref()
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Shared handle to the session, for views that outlive a borrow.
    pub fn session_handle(&self) -> Arc<SessionContext> {
        Arc::clone(&self.session)
    }

    pub fn changes(&self) -> &ChangeFeed {
        &self.changes
    }

    /// A listener that tracks which collections changed since last read.
    pub fn listener(&self) -> ChangeListener {
        self.changes.listener()
    }

    /// Returns the actor if their role meets the configured requirement.
    pub fn authorize(&self) -> AdminResult<Actor> {
        match self.config.console.required_role {
            Role::Admin => self.session.require_admin(),
            Role::Editor | Role::User => self.session.require_staff(),
        }
    }

    /// Returns true while a submission is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> Stats<'_> {
        Stats::new(self)
    }

    pub fn positions<T: Orderable>(&self) -> Positions<'_, T> {
        Positions::new(self)
    }

    pub fn catalog(&self) -> Catalog<'_> {
        Catalog::new(self)
    }

    pub fn storefront(&self) -> Storefront<'_> {
        Storefront::new(self)
    }

    pub fn finance(&self) -> Finance<'_> {
        Finance::new(self)
    }

    pub fn forum(&self) -> Forum<'_> {
        Forum::new(self)
    }

    pub fn media(&self) -> Media<'_> {
        Media::new(self)
    }

    /// Awaits a backend call and logs its failure.
    pub(crate) async fn logged<T>(&self, call: impl Future<Output = AdminResult<T>>) -> AdminResult<T> {
        call.await.inspect_err(|err| {
            if err.is_user_error() {
                tracing::warn!(error = %err, category = ?err.category(), "request rejected");
            } else {
                tracing::error!(error = %err, category = ?err.category(), "request failed");
            }
        })
    }

    /// Runs a write while holding the busy flag.
    ///
    /// Fails with `Busy` without running `work` if another write is in
    /// flight. The flag is released however `work` ends.
    pub(crate) async fn submit<T>(
        &self,
        action: &str,
        work: impl Future<Output = AdminResult<T>>,
    ) -> AdminResult<T> {
        let _guard = BusyGuard::acquire(&self.busy).inspect_err(|_| {
            tracing::debug!(action, "rejected while busy");
        })?;
        tracing::debug!(action, "submitting");
        self.logged(work).await
    }

    /// Publishes a change to every listener.
    pub(crate) fn notify(&self, collection: &str, kind: ChangeKind, ids: Vec<String>) {
        let receivers = self.changes.publish(Change::new(collection, kind, ids));
        tracing::trace!(collection, ?kind, receivers, "change published");
    }

    /// Reads one page of records using the configured page size.
    pub(crate) async fn page<T: Record>(&self, query: Query, page: usize) -> AdminResult<Page<T>> {
        let per_page = self.config.console.page_size;
        let window = Range::page(page, per_page).ok_or_else(|| {
            AdminError::validation("page", format!("page {} is past the last possible page", page))
        })?;
        let query = query.with_count().window_of(window);
        let (items, count) = self.logged(self.data().fetch::<T>(&query)).await?;
        Ok(Page {
            total: count.unwrap_or(items.len()),
            items,
            page,
            per_page,
        })
    }

    /// Applies `patch` to one record by key and returns it as stored.
    pub(crate) async fn patch_one<T: Record>(&self, id: &str, patch: Row) -> AdminResult<T> {
        let rows = self
            .data()
            .update(T::COLLECTION, patch, &[Filter::eq(T::KEY, id)])
            .await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| AdminError::not_found(T::COLLECTION, T::KEY, id))?;
        T::from_row(row)
    }
}

/// Builds a partial row from column/value pairs.
pub(crate) fn patch<const N: usize>(entries: [(&str, serde_json::Value); N]) -> Row {
    entries
        .into_iter()
        .map(|(column, value)| (column.to_string(), value))
        .collect()
}

/// Builder for [`AdminConsole`].
#[derive(Default)]
pub struct AdminConsoleBuilder {
    config: AdminConfig,
    data: Option<Arc<dyn DataAccess>>,
    storage: Option<Arc<dyn ObjectStorage>>,
    auth: Option<Arc<dyn AuthProvider>>,
}

impl AdminConsoleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration.
    pub fn config(mut self, config: AdminConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses one backend for data, auth and storage.
    pub fn backend<B>(self, backend: B) -> Self
    where
        B: DataAccess + AuthProvider + ObjectStorage + 'static,
    {
        let shared = Arc::new(backend);
        self.data(shared.clone()).auth(shared.clone()).storage(shared)
    }

    pub fn data(mut self, data: Arc<dyn DataAccess>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn ObjectStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Validates the configuration and loads the current session.
    pub async fn build(self) -> AdminResult<AdminConsole> {
        self.config
            .validate()
            .map_err(|e| AdminError::validation("config", e.to_string()))?;
        let data = self.data.ok_or_else(|| AdminError::internal("no data access configured"))?;
        let storage = self
            .storage
            .ok_or_else(|| AdminError::internal("no object storage configured"))?;
        let auth = self.auth.ok_or_else(|| AdminError::internal("no auth provider configured"))?;
        let session = SessionContext::load(auth).await?;
        tracing::debug!(authenticated = session.is_authenticated(), "console ready");
        Ok(AdminConsole {
            changes: ChangeFeed::new(self.config.console.change_buffer.max(1)),
            config: self.config,
            data,
            storage,
            session: Arc::new(session),
            busy: AtomicBool::new(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmation() {
        assert!(Confirmation::Confirmed.require("delete book").is_ok());
        assert!(matches!(
            Confirmation::from(false).require("delete book"),
            Err(AdminError::ConfirmationRequired { .. })
        ));
    }

    #[test]
    fn test_page_arithmetic() {
        let page = Page::<u8> { items: vec![], total: 41, page: 1, per_page: 20 };
        assert_eq!(page.total_pages(), 3);
        assert!(page.has_next());
        let last = Page::<u8> { page: 2, ..page };
        assert!(!last.has_next());
    }

    #[tokio::test]
    async fn test_build_without_backend_fails() {
        let result = AdminConsole::builder().build().await;
        assert!(matches!(result, Err(AdminError::Internal { .. })));
    }
}
