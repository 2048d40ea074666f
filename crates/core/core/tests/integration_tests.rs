//! Integration tests for Novel Admin Core
//!
//! This test suite covers:
//! - Record conversion
//! - Typed data-access helpers over a minimal backend
//! - Error classification

use async_trait::async_trait;
use novel_admin_core::{
    AdminError, AdminResult, Category, Chapter, DataAccess, DataAccessExt, ErrorCategory, Filter,
    Query, Record, Row, SelectResult,
    types::{Role, word_count},
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Mutex;

/// Collection store that evaluates queries with the core helpers.
#[derive(Default)]
struct RowStore {
    collections: Mutex<HashMap<String, Vec<Row>>>,
}

#[async_trait]
impl DataAccess for RowStore {
    async fn select(&self, collection: &str, query: &Query) -> AdminResult<SelectResult> {
        let guard = self.collections.lock().unwrap();
        let mut rows: Vec<Row> = guard
            .get(collection)
            .map(|rows| rows.iter().filter(|r| query.matches(r)).cloned().collect())
            .unwrap_or_default();
        query.sort(&mut rows);
        let count = query.count.then_some(rows.len());
        Ok(SelectResult {
            rows: query.window(rows),
            count,
        })
    }

    async fn insert(&self, collection: &str, rows: Vec<Row>) -> AdminResult<Vec<Row>> {
        let mut guard = self.collections.lock().unwrap();
        guard
            .entry(collection.to_string())
            .or_default()
            .extend(rows.iter().cloned());
        Ok(rows)
    }

    async fn update(&self, collection: &str, patch: Row, filters: &[Filter]) -> AdminResult<Vec<Row>> {
        let mut guard = self.collections.lock().unwrap();
        let mut updated = Vec::new();
        for row in guard.entry(collection.to_string()).or_default() {
            if filters.iter().all(|f| f.matches(row)) {
                row.extend(patch.clone());
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, collection: &str, filters: &[Filter]) -> AdminResult<usize> {
        let mut guard = self.collections.lock().unwrap();
        let rows = guard.entry(collection.to_string()).or_default();
        let before = rows.len();
        rows.retain(|row| !filters.iter().all(|f| f.matches(row)));
        Ok(before - rows.len())
    }

    async fn invoke_procedure(&self, name: &str, _args: Value) -> AdminResult<Value> {
        Err(AdminError::UnknownProcedure {
            name: name.to_string(),
        })
    }
}

fn category(id: &str, name: &str, sort_order: u32) -> Category {
    Category {
        id: id.to_string(),
        name: name.to_string(),
        sort_order,
    }
}

mod record_tests {
    use super::*;

    #[test]
    fn test_chapter_nan_order_stored_as_null() {
        let chapter = Chapter::new("b1", f64::NAN, "Prologue", "one two three");
        let row = chapter.to_row().unwrap();
        assert_eq!(row["order"], Value::Null);
        assert_eq!(row["word_count"], json!(3));

        let back = Chapter::from_row(row).unwrap();
        assert!(back.order.is_nan());
    }

    #[test]
    fn test_key_filter_selects_record() {
        let fantasy = category("c1", "Fantasy", 0);
        let filter = fantasy.key_filter();
        assert!(filter.matches(&fantasy.to_row().unwrap()));
        assert!(!filter.matches(&category("c2", "Romance", 1).to_row().unwrap()));
    }

    #[test]
    fn test_word_count_ignores_extra_whitespace() {
        assert_eq!(word_count("  a\tb\n\nc  "), 3);
        assert_eq!(word_count(""), 0);
    }

    #[test]
    fn test_staff_roles() {
        assert!(Role::Admin.is_staff());
        assert!(Role::Editor.is_staff());
        assert!(!Role::User.is_staff());
    }
}

mod data_access_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_fetch_in_order() {
        let store = RowStore::default();
        store.create(&category("c2", "Romance", 1)).await.unwrap();
        store.create(&category("c1", "Fantasy", 0)).await.unwrap();

        let all: Vec<Category> = store.fetch_all("sort_order").await.unwrap();
        let names: Vec<_> = all.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Fantasy", "Romance"]);
    }

    #[tokio::test]
    async fn test_fetch_one_missing_is_not_found() {
        let store = RowStore::default();
        let result = store.fetch_one::<Category>("nope").await;
        assert!(matches!(result, Err(AdminError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_save_and_remove() {
        let store = RowStore::default();
        let mut fantasy = store.create(&category("c1", "Fantasy", 0)).await.unwrap();
        fantasy.name = "High Fantasy".to_string();
        store.save(&fantasy).await.unwrap();
        assert_eq!(
            store.fetch_one::<Category>("c1").await.unwrap().name,
            "High Fantasy"
        );

        store.remove::<Category>("c1").await.unwrap();
        assert!(matches!(
            store.remove::<Category>("c1").await,
            Err(AdminError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_count_and_paging() {
        let store = RowStore::default();
        for i in 0..5 {
            store
                .create(&category(&format!("c{}", i), &format!("Genre {}", i), i))
                .await
                .unwrap();
        }

        let total = store
            .count(Category::COLLECTION, Query::new().gte("sort_order", 2))
            .await
            .unwrap();
        assert_eq!(total, 3);

        let query = Query::new().order_by("sort_order", false).with_count().range(0, 2);
        let (page, count) = store.fetch::<Category>(&query).await.unwrap();
        assert_eq!(count, Some(5));
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].sort_order, 4);
    }

    #[tokio::test]
    async fn test_dyn_data_access_has_helpers() {
        let store: Box<dyn DataAccess> = Box::new(RowStore::default());
        store.create(&category("c1", "Fantasy", 0)).await.unwrap();
        let found = store.fetch_one::<Category>("c1").await.unwrap();
        assert_eq!(found.name, "Fantasy");
    }
}

mod error_tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(AdminError::Timeout.category(), ErrorCategory::Network);
        assert_eq!(
            AdminError::conflict("tags", "duplicate").category(),
            ErrorCategory::Rejected
        );
        assert_eq!(
            AdminError::validation("title", "required").category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            AdminError::internal("broken").category(),
            ErrorCategory::Internal
        );
    }

    #[test]
    fn test_user_errors() {
        assert!(AdminError::Busy.is_user_error());
        assert!(AdminError::InvalidCredentials.is_user_error());
        assert!(!AdminError::backend("down").is_user_error());
    }

    #[test]
    fn test_serde_error_converts() {
        let err: AdminError = serde_json::from_str::<Value>("{").unwrap_err().into();
        assert!(matches!(err, AdminError::Serialization { .. }));
        assert_eq!(err.status_code(), 500);
    }
}
