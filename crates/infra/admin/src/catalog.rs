//! Books, chapters, categories and tags.

use chrono::Utc;
use novel_admin_core::changes::ChangeKind;
use novel_admin_core::error::{AdminError, AdminResult};
use novel_admin_core::query::{Filter, Query};
use novel_admin_core::traits::{DataAccess, DataAccessExt, Record};
use novel_admin_core::types::{Book, BookStatus, Category, Chapter, Tag, new_id, word_count};
use serde_json::json;

use crate::csv::parse_chapter_csv;
use crate::validation::{require_text, validate_book};
use crate::{AdminConsole, Confirmation, Page, patch};

/// Catalog pages.
pub struct Catalog<'a> {
    console: &'a AdminConsole,
}

impl<'a> Catalog<'a> {
    pub(crate) fn new(console: &'a AdminConsole) -> Self {
        Self { console }
    }

    // ==================== Books ====================

    /// Books by most recently updated, optionally filtered by title.
    pub async fn list_books(&self, search: Option<&str>, page: usize) -> AdminResult<Page<Book>> {
        self.console.authorize()?;
        let mut query = Query::new().order_by("updated_at", false);
        if let Some(needle) = search.map(str::trim).filter(|s| !s.is_empty()) {
            query = query.contains("title", needle);
        }
        self.console.page(query, page).await
    }

    pub async fn get_book(&self, id: &str) -> AdminResult<Book> {
        self.console.authorize()?;
        self.console.logged(self.console.data().fetch_one::<Book>(id)).await
    }

    pub async fn create_book(&self, mut book: Book) -> AdminResult<Book> {
        self.console.authorize()?;
        validate_book(&book)?;
        book.title = book.title.trim().to_string();
        book.author = book.author.trim().to_string();
        self.console
            .submit("create book", async {
                let created = self.console.data().create(&book).await?;
                tracing::info!(book = %created.id, title = %created.title, "book created");
                self.console
                    .notify(Book::COLLECTION, ChangeKind::Inserted, vec![created.id.clone()]);
                Ok::<_, AdminError>(created)
            })
            .await
    }

    /// Saves every field of `book` and bumps `updated_at`.
    pub async fn update_book(&self, mut book: Book) -> AdminResult<Book> {
        self.console.authorize()?;
        validate_book(&book)?;
        book.updated_at = Utc::now();
        self.console
            .submit("update book", async {
                let saved = self.console.data().save(&book).await?;
                tracing::info!(book = %saved.id, "book updated");
                self.console
                    .notify(Book::COLLECTION, ChangeKind::Updated, vec![saved.id.clone()]);
                Ok::<_, AdminError>(saved)
            })
            .await
    }

    pub async fn set_book_status(&self, id: &str, status: BookStatus) -> AdminResult<Book> {
        self.console.authorize()?;
        self.console
            .submit("set book status", async {
                let book: Book = self
                    .console
                    .patch_one(id, patch([("status", json!(status)), ("updated_at", json!(Utc::now()))]))
                    .await?;
                tracing::info!(book = id, ?status, "book status changed");
                self.console
                    .notify(Book::COLLECTION, ChangeKind::Updated, vec![id.to_string()]);
                Ok::<_, AdminError>(book)
            })
            .await
    }

    /// Deletes a book and its chapters.
    ///
    /// Chapters go first; if that fails the book is left in place.
    pub async fn delete_book(&self, id: &str, confirm: Confirmation) -> AdminResult<()> {
        self.console.authorize()?;
        confirm.require("delete book")?;
        self.console
            .submit("delete book", async {
                let chapters = self
                    .console
                    .data()
                    .delete(Chapter::COLLECTION, &[Filter::eq("book_id", id)])
                    .await?;
                self.console.data().remove::<Book>(id).await?;
                tracing::info!(book = id, chapters, "book deleted");
                self.console
                    .notify(Book::COLLECTION, ChangeKind::Deleted, vec![id.to_string()]);
                if chapters > 0 {
                    self.console.notify(Chapter::COLLECTION, ChangeKind::Deleted, vec![]);
                }
                Ok::<_, AdminError>(())
            })
            .await
    }

    /// Uploads a cover image and points the book at it.
    pub async fn upload_cover(&self, book_id: &str, file_name: &str, bytes: Vec<u8>) -> AdminResult<Book> {
        self.console.authorize()?;
        let media = self.console.media();
        media.check(file_name, bytes.len())?;
        self.console
            .submit("upload cover", async {
                let url = media.store(file_name, bytes).await?;
                let book: Book = self
                    .console
                    .patch_one(book_id, patch([("cover_url", json!(url)), ("updated_at", json!(Utc::now()))]))
                    .await?;
                tracing::info!(book = book_id, %url, "cover uploaded");
                self.console
                    .notify(Book::COLLECTION, ChangeKind::Updated, vec![book_id.to_string()]);
                Ok::<_, AdminError>(book)
            })
            .await
    }

    /// Replaces a book's tags. Every tag must exist.
    pub async fn set_book_tags(&self, book_id: &str, tag_ids: Vec<String>) -> AdminResult<Book> {
        self.console.authorize()?;
        self.console
            .submit("set book tags", async {
                let query = Query::new().filter(Filter::is_in("id", tag_ids.clone()));
                let (known, _) = self.console.data().fetch::<Tag>(&query).await?;
                if let Some(missing) = tag_ids.iter().find(|id| !known.iter().any(|t| &t.id == *id)) {
                    return Err(AdminError::not_found(Tag::COLLECTION, "id", missing.as_str()));
                }
                let book: Book = self
                    .console
                    .patch_one(book_id, patch([("tags", json!(tag_ids)), ("updated_at", json!(Utc::now()))]))
                    .await?;
                self.console
                    .notify(Book::COLLECTION, ChangeKind::Updated, vec![book_id.to_string()]);
                Ok(book)
            })
            .await
    }

    // ==================== Chapters ====================

    /// Chapters of a book in reading order.
    pub async fn list_chapters(&self, book_id: &str, page: usize) -> AdminResult<Page<Chapter>> {
        self.console.authorize()?;
        let query = Query::new().eq("book_id", book_id).order_by("order", true);
        self.console.page(query, page).await
    }

    pub async fn get_chapter(&self, id: &str) -> AdminResult<Chapter> {
        self.console.authorize()?;
        self.console.logged(self.console.data().fetch_one::<Chapter>(id)).await
    }

    /// Creates a chapter; the word count is recomputed from the content.
    pub async fn create_chapter(&self, mut chapter: Chapter) -> AdminResult<Chapter> {
        self.console.authorize()?;
        chapter.title = require_text("title", &chapter.title)?.to_string();
        chapter.word_count = word_count(&chapter.content);
        self.console
            .submit("create chapter", async {
                self.console.data().fetch_one::<Book>(&chapter.book_id).await?;
                let created = self.console.data().create(&chapter).await?;
                tracing::info!(book = %created.book_id, chapter = %created.id, "chapter created");
                self.console
                    .notify(Chapter::COLLECTION, ChangeKind::Inserted, vec![created.id.clone()]);
                Ok::<_, AdminError>(created)
            })
            .await
    }

    pub async fn update_chapter(&self, mut chapter: Chapter) -> AdminResult<Chapter> {
        self.console.authorize()?;
        chapter.title = require_text("title", &chapter.title)?.to_string();
        chapter.word_count = word_count(&chapter.content);
        self.console
            .submit("update chapter", async {
                let saved = self.console.data().save(&chapter).await?;
                self.console
                    .notify(Chapter::COLLECTION, ChangeKind::Updated, vec![saved.id.clone()]);
                Ok::<_, AdminError>(saved)
            })
            .await
    }

    pub async fn delete_chapter(&self, id: &str, confirm: Confirmation) -> AdminResult<()> {
        self.console.authorize()?;
        confirm.require("delete chapter")?;
        self.console
            .submit("delete chapter", async {
                self.console.data().remove::<Chapter>(id).await?;
                tracing::info!(chapter = id, "chapter deleted");
                self.console
                    .notify(Chapter::COLLECTION, ChangeKind::Deleted, vec![id.to_string()]);
                Ok::<_, AdminError>(())
            })
            .await
    }

    /// Imports chapters from CSV text into `book_id` in one insert.
    ///
    /// Cells are coerced, not validated, so a non-numeric `order` is stored
    /// as NaN. Returns the number of chapters created.
    pub async fn import_chapters(&self, book_id: &str, csv_text: &str) -> AdminResult<usize> {
        self.console.authorize()?;
        let rows = parse_chapter_csv(csv_text)?;
        if rows.is_empty() {
            return Ok(0);
        }
        let nan_orders = rows.iter().filter(|r| r.order.is_nan()).count();
        if nan_orders > 0 {
            tracing::warn!(book = book_id, nan_orders, "importing chapters without a numeric order");
        }
        self.console
            .submit("import chapters", async {
                self.console.data().fetch_one::<Book>(book_id).await?;
                let records = rows
                    .into_iter()
                    .map(|row| row.into_chapter(book_id).to_row())
                    .collect::<AdminResult<Vec<_>>>()?;
                let inserted = self.console.data().insert(Chapter::COLLECTION, records).await?;
                tracing::info!(book = book_id, chapters = inserted.len(), "chapters imported");
                self.console.notify(
                    Chapter::COLLECTION,
                    ChangeKind::Inserted,
                    inserted
                        .iter()
                        .filter_map(|row| row.get("id").and_then(|v| v.as_str()).map(str::to_string))
                        .collect(),
                );
                Ok::<_, AdminError>(inserted.len())
            })
            .await
    }

    // ==================== Categories ====================

    /// Categories in display order.
    pub async fn list_categories(&self) -> AdminResult<Vec<Category>> {
        self.console.authorize()?;
        self.console
            .logged(self.console.data().fetch_all::<Category>("sort_order"))
            .await
    }

    /// Appends a category at the end of the display order.
    pub async fn create_category(&self, name: &str) -> AdminResult<Category> {
        self.console.authorize()?;
        let name = require_text("name", name)?.to_string();
        let sort_order = self.console.positions::<Category>().next_sort_order().await?;
        self.console
            .submit("create category", async {
                let category = Category {
                    id: new_id(),
                    name,
                    sort_order,
                };
                let created = self.console.data().create(&category).await?;
                tracing::info!(category = %created.id, sort_order, "category created");
                self.console
                    .notify(Category::COLLECTION, ChangeKind::Inserted, vec![created.id.clone()]);
                Ok::<_, AdminError>(created)
            })
            .await
    }

    pub async fn rename_category(&self, id: &str, name: &str) -> AdminResult<Category> {
        self.console.authorize()?;
        let name = require_text("name", name)?;
        self.console
            .submit("rename category", async {
                let category: Category = self.console.patch_one(id, patch([("name", json!(name))])).await?;
                self.console
                    .notify(Category::COLLECTION, ChangeKind::Updated, vec![id.to_string()]);
                Ok::<_, AdminError>(category)
            })
            .await
    }

    /// Deletes a category. Remaining positions keep their gap until
    /// compacted.
    pub async fn delete_category(&self, id: &str, confirm: Confirmation) -> AdminResult<()> {
        self.console.authorize()?;
        confirm.require("delete category")?;
        self.console
            .submit("delete category", async {
                self.console.data().remove::<Category>(id).await?;
                tracing::info!(category = id, "category deleted");
                self.console
                    .notify(Category::COLLECTION, ChangeKind::Deleted, vec![id.to_string()]);
                Ok::<_, AdminError>(())
            })
            .await
    }

    // ==================== Tags ====================

    pub async fn list_tags(&self) -> AdminResult<Vec<Tag>> {
        self.console.authorize()?;
        self.console.logged(self.console.data().fetch_all::<Tag>("name")).await
    }

    /// Creates a tag. Names are unique, ignoring case.
    pub async fn create_tag(&self, name: &str) -> AdminResult<Tag> {
        self.console.authorize()?;
        let name = require_text("name", name)?.to_string();
        self.console
            .submit("create tag", async {
                let existing = self.console.data().fetch_all::<Tag>("name").await?;
                if existing.iter().any(|t| t.name.to_lowercase() == name.to_lowercase()) {
                    return Err(AdminError::conflict(
                        Tag::COLLECTION,
                        format!("tag '{}' already exists", name),
                    ));
                }
                let created = self.console.data().create(&Tag { id: new_id(), name }).await?;
                self.console
                    .notify(Tag::COLLECTION, ChangeKind::Inserted, vec![created.id.clone()]);
                Ok(created)
            })
            .await
    }

    pub async fn delete_tag(&self, id: &str, confirm: Confirmation) -> AdminResult<()> {
        self.console.authorize()?;
        confirm.require("delete tag")?;
        self.console
            .submit("delete tag", async {
                self.console.data().remove::<Tag>(id).await?;
                self.console
                    .notify(Tag::COLLECTION, ChangeKind::Deleted, vec![id.to_string()]);
                Ok::<_, AdminError>(())
            })
            .await
    }
}
