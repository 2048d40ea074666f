//! Home page banners and platform settings.

use novel_admin_core::changes::ChangeKind;
use novel_admin_core::error::{AdminError, AdminResult};
use novel_admin_core::query::{Filter, Query};
use novel_admin_core::traits::{DataAccessExt, Record};
use novel_admin_core::types::{Banner, Setting, SettingsMap, new_id};
use serde_json::{Value, json};

use crate::validation::{require_text, validate_banner};
use crate::{AdminConsole, Confirmation, patch};

/// Fields of a new banner.
#[derive(Debug, Clone)]
pub struct NewBanner {
    pub title: String,
    pub image_url: String,
    pub link_url: Option<String>,
}

pub struct Storefront<'a> {
    console: &'a AdminConsole,
}

impl<'a> Storefront<'a> {
    pub(crate) fn new(console: &'a AdminConsole) -> Self {
        Self { console }
    }

    // ==================== Banners ====================

    /// Banners in display order.
    pub async fn list_banners(&self) -> AdminResult<Vec<Banner>> {
        self.console.authorize()?;
        self.console
            .logged(self.console.data().fetch_all::<Banner>("sort_order"))
            .await
    }

    /// Appends an active banner after the existing ones.
    pub async fn create_banner(&self, new: NewBanner) -> AdminResult<Banner> {
        self.console.authorize()?;
        let mut banner = Banner {
            id: new_id(),
            title: new.title.trim().to_string(),
            image_url: new.image_url,
            link_url: new.link_url.filter(|l| !l.trim().is_empty()),
            is_active: true,
            sort_order: 0,
        };
        validate_banner(&banner)?;
        banner.sort_order = self.console.positions::<Banner>().next_sort_order().await?;
        self.console
            .submit("create banner", async {
                let created = self.console.data().create(&banner).await?;
                tracing::info!(banner = %created.id, sort_order = created.sort_order, "banner created");
                self.console
                    .notify(Banner::COLLECTION, ChangeKind::Inserted, vec![created.id.clone()]);
                Ok::<_, AdminError>(created)
            })
            .await
    }

    /// Saves title, image and link. Position and visibility have their own
    /// operations and are kept as stored.
    pub async fn update_banner(&self, banner: &Banner) -> AdminResult<Banner> {
        self.console.authorize()?;
        validate_banner(banner)?;
        self.console
            .submit("update banner", async {
                let saved: Banner = self
                    .console
                    .patch_one(
                        &banner.id,
                        patch([
                            ("title", json!(banner.title.trim())),
                            ("image_url", json!(banner.image_url)),
                            ("link_url", json!(banner.link_url)),
                        ]),
                    )
                    .await?;
                self.console
                    .notify(Banner::COLLECTION, ChangeKind::Updated, vec![saved.id.clone()]);
                Ok::<_, AdminError>(saved)
            })
            .await
    }

    pub async fn set_banner_active(&self, id: &str, active: bool) -> AdminResult<Banner> {
        self.console.authorize()?;
        self.console
            .submit("toggle banner", async {
                let banner: Banner = self.console.patch_one(id, patch([("is_active", json!(active))])).await?;
                tracing::info!(banner = id, active, "banner visibility changed");
                self.console
                    .notify(Banner::COLLECTION, ChangeKind::Updated, vec![id.to_string()]);
                Ok::<_, AdminError>(banner)
            })
            .await
    }

    /// Uploads an image and uses it for the banner.
    pub async fn upload_banner_image(&self, id: &str, file_name: &str, bytes: Vec<u8>) -> AdminResult<Banner> {
        self.console.authorize()?;
        let media = self.console.media();
        media.check(file_name, bytes.len())?;
        self.console
            .submit("upload banner image", async {
                let url = media.store(file_name, bytes).await?;
                let banner: Banner = self.console.patch_one(id, patch([("image_url", json!(url))])).await?;
                self.console
                    .notify(Banner::COLLECTION, ChangeKind::Updated, vec![id.to_string()]);
                Ok::<_, AdminError>(banner)
            })
            .await
    }

    /// Deletes a banner. Remaining positions keep their gap until
    /// compacted.
    pub async fn delete_banner(&self, id: &str, confirm: Confirmation) -> AdminResult<()> {
        self.console.authorize()?;
        confirm.require("delete banner")?;
        self.console
            .submit("delete banner", async {
                self.console.data().remove::<Banner>(id).await?;
                tracing::info!(banner = id, "banner deleted");
                self.console
                    .notify(Banner::COLLECTION, ChangeKind::Deleted, vec![id.to_string()]);
                Ok::<_, AdminError>(())
            })
            .await
    }

    // ==================== Settings ====================

    /// Every setting keyed by name.
    pub async fn settings(&self) -> AdminResult<SettingsMap> {
        self.console.authorize()?;
        let (settings, _) = self
            .console
            .logged(self.console.data().fetch::<Setting>(&Query::new()))
            .await?;
        Ok(settings.into_iter().map(|s| (s.key, s.value)).collect())
    }

    /// One setting, or `None` if it was never written.
    pub async fn setting(&self, key: &str) -> AdminResult<Option<Value>> {
        self.console.authorize()?;
        let query = Query::new().eq(Setting::KEY, key);
        let (settings, _) = self
            .console
            .logged(self.console.data().fetch::<Setting>(&query))
            .await?;
        Ok(settings.into_iter().next().map(|s| s.value))
    }

    /// Writes a setting, creating it if needed. Admins only.
    pub async fn put_setting(&self, key: &str, value: Value) -> AdminResult<Setting> {
        self.console.session().require_admin()?;
        let key = require_text("key", key)?;
        self.console
            .submit("save setting", async {
                let updated = self
                    .console
                    .data()
                    .update(
                        Setting::COLLECTION,
                        patch([("value", value.clone())]),
                        &[Filter::eq(Setting::KEY, key)],
                    )
                    .await?;
                let setting = match updated.into_iter().next() {
                    Some(row) => Setting::from_row(row)?,
                    None => {
                        self.console
                            .data()
                            .create(&Setting {
                                key: key.to_string(),
                                value,
                            })
                            .await?
                    }
                };
                tracing::info!(key, "setting saved");
                self.console
                    .notify(Setting::COLLECTION, ChangeKind::Updated, vec![key.to_string()]);
                Ok::<_, AdminError>(setting)
            })
            .await
    }
}
