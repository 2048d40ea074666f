//! Forum moderation.

use novel_admin_core::changes::ChangeKind;
use novel_admin_core::error::{AdminError, AdminResult};
use novel_admin_core::query::Query;
use novel_admin_core::traits::{DataAccessExt, Record};
use novel_admin_core::types::ForumPost;
use serde_json::json;

use crate::{AdminConsole, Confirmation, Page, patch};

/// Which posts a moderation list shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PostFilter {
    #[default]
    All,
    Visible,
    Hidden,
    Pinned,
}

pub struct Forum<'a> {
    console: &'a AdminConsole,
}

impl<'a> Forum<'a> {
    pub(crate) fn new(console: &'a AdminConsole) -> Self {
        Self { console }
    }

    /// Posts newest first; pinned posts lead.
    pub async fn list_posts(&self, filter: PostFilter, page: usize) -> AdminResult<Page<ForumPost>> {
        self.console.authorize()?;
        let query = Query::new()
            .order_by("is_pinned", false)
            .order_by("created_at", false);
        let query = match filter {
            PostFilter::All => query,
            PostFilter::Visible => query.eq("is_hidden", false),
            PostFilter::Hidden => query.eq("is_hidden", true),
            PostFilter::Pinned => query.eq("is_pinned", true),
        };
        self.console.page(query, page).await
    }

    pub async fn pin(&self, id: &str, pinned: bool) -> AdminResult<ForumPost> {
        self.set_flag(id, "is_pinned", pinned).await
    }

    pub async fn lock(&self, id: &str, locked: bool) -> AdminResult<ForumPost> {
        self.set_flag(id, "is_locked", locked).await
    }

    pub async fn hide(&self, id: &str, hidden: bool) -> AdminResult<ForumPost> {
        self.set_flag(id, "is_hidden", hidden).await
    }

    async fn set_flag(&self, id: &str, column: &str, value: bool) -> AdminResult<ForumPost> {
        self.console.authorize()?;
        self.console
            .submit("moderate post", async {
                let post: ForumPost = self.console.patch_one(id, patch([(column, json!(value))])).await?;
                tracing::info!(post = id, column, value, "post moderated");
                self.console
                    .notify(ForumPost::COLLECTION, ChangeKind::Updated, vec![id.to_string()]);
                Ok::<_, AdminError>(post)
            })
            .await
    }

    pub async fn delete_post(&self, id: &str, confirm: Confirmation) -> AdminResult<()> {
        self.console.authorize()?;
        confirm.require("delete post")?;
        self.console
            .submit("delete post", async {
                self.console.data().remove::<ForumPost>(id).await?;
                tracing::info!(post = id, "post deleted");
                self.console
                    .notify(ForumPost::COLLECTION, ChangeKind::Deleted, vec![id.to_string()]);
                Ok::<_, AdminError>(())
            })
            .await
    }
}
