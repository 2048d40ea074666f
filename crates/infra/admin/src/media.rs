//! Image uploads to object storage.

use novel_admin_core::error::{AdminError, AdminResult};
use novel_admin_core::types::new_id;

use crate::AdminConsole;

/// Image types accepted for covers and banners.
pub const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "webp", "gif"];

/// Lowercased extension of an accepted image file name.
pub fn image_extension(file_name: &str) -> AdminResult<String> {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .ok_or_else(|| AdminError::validation("file", "missing file extension"))?;
    if !IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        return Err(AdminError::validation(
            "file",
            format!("unsupported image type '.{}'", extension),
        ));
    }
    Ok(extension)
}

/// Upload helper shared by the catalog and storefront pages.
pub struct Media<'a> {
    console: &'a AdminConsole,
}

impl<'a> Media<'a> {
    pub(crate) fn new(console: &'a AdminConsole) -> Self {
        Self { console }
    }

    /// Uploads an image under a fresh key and returns its public URL.
    pub async fn upload_image(&self, file_name: &str, bytes: Vec<u8>) -> AdminResult<String> {
        self.console.authorize()?;
        self.check(file_name, bytes.len())?;
        self.console.submit("upload image", self.store(file_name, bytes)).await
    }

    /// Rejects files that are not images or exceed the size limit.
    pub(crate) fn check(&self, file_name: &str, size: usize) -> AdminResult<()> {
        image_extension(file_name)?;
        let limit = self.console.config().console.max_upload_bytes;
        if size == 0 {
            return Err(AdminError::validation("file", "file is empty"));
        }
        if size > limit {
            return Err(AdminError::validation(
                "file",
                format!("{} bytes exceeds the {} byte limit", size, limit),
            ));
        }
        Ok(())
    }

    /// Stores a checked file. Callers hold the busy flag.
    pub(crate) async fn store(&self, file_name: &str, bytes: Vec<u8>) -> AdminResult<String> {
        let bucket = &self.console.config().console.image_bucket;
        let key = format!("{}.{}", new_id(), image_extension(file_name)?);
        let size = bytes.len();
        self.console.storage().upload(bucket, &key, bytes).await?;
        let url = self.console.storage().public_url(bucket, &key);
        tracing::info!(bucket = %bucket, key = %key, size, "image uploaded");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension("Cover.PNG").unwrap(), "png");
        assert_eq!(image_extension("a.b.webp").unwrap(), "webp");
        assert!(image_extension("notes.txt").is_err());
        assert!(image_extension("noext").is_err());
        assert!(image_extension("trailing.").is_err());
    }
}
