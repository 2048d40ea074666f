//! Input checks run before any request is sent.

use novel_admin_core::error::{AdminError, AdminResult};
use novel_admin_core::types::{Banner, Book, CoinPackage};

/// Longest accepted title or name.
pub const MAX_TITLE_CHARS: usize = 200;

/// Returns the trimmed text, or fails if it is blank or too long.
pub fn require_text<'a>(field: &str, value: &'a str) -> AdminResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AdminError::validation(field, "must not be empty"));
    }
    if trimmed.chars().count() > MAX_TITLE_CHARS {
        return Err(AdminError::validation(
            field,
            format!("must be at most {} characters", MAX_TITLE_CHARS),
        ));
    }
    Ok(trimmed)
}

pub fn require_positive(field: &str, value: i64) -> AdminResult<i64> {
    if value <= 0 {
        return Err(AdminError::validation(field, "must be greater than zero"));
    }
    Ok(value)
}

pub fn require_non_negative(field: &str, value: i64) -> AdminResult<i64> {
    if value < 0 {
        return Err(AdminError::validation(field, "must not be negative"));
    }
    Ok(value)
}

/// Accepts absolute URLs of any scheme and site-relative paths.
pub fn require_url(field: &str, value: &str) -> AdminResult<()> {
    let value = value.trim();
    let ok = value.starts_with('/') || value.contains("://");
    if value.is_empty() || value.contains(char::is_whitespace) || !ok {
        return Err(AdminError::validation(field, "must be a URL"));
    }
    Ok(())
}

pub fn validate_book(book: &Book) -> AdminResult<()> {
    require_text("title", &book.title)?;
    require_text("author", &book.author)?;
    Ok(())
}

pub fn validate_coin_package(package: &CoinPackage) -> AdminResult<()> {
    require_text("name", &package.name)?;
    require_positive("coins", package.coins)?;
    require_non_negative("bonus_coins", package.bonus_coins)?;
    require_positive("price_cents", package.price_cents)?;
    Ok(())
}

pub fn validate_banner(banner: &Banner) -> AdminResult<()> {
    require_text("title", &banner.title)?;
    require_url("image_url", &banner.image_url)?;
    if let Some(link) = &banner.link_url {
        require_url("link_url", link)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_text() {
        assert_eq!(require_text("title", "  Dao  ").unwrap(), "Dao");
        assert!(require_text("title", "   ").is_err());
        assert!(require_text("title", &"字".repeat(MAX_TITLE_CHARS + 1)).is_err());
        assert!(require_text("title", &"字".repeat(MAX_TITLE_CHARS)).is_ok());
    }

    #[test]
    fn test_coin_package_rules() {
        let mut package = CoinPackage {
            id: "p1".into(),
            name: "Starter".into(),
            coins: 100,
            bonus_coins: 0,
            price_cents: 99,
            is_active: true,
        };
        assert!(validate_coin_package(&package).is_ok());
        package.price_cents = 0;
        let err = validate_coin_package(&package).unwrap_err();
        assert!(matches!(err, AdminError::Validation { ref field, .. } if field == "price_cents"));
    }

    #[test]
    fn test_banner_urls() {
        let mut banner = Banner {
            id: "b1".into(),
            title: "Summer".into(),
            image_url: "memory://storage/images/a.png".into(),
            link_url: Some("/books/1".into()),
            is_active: true,
            sort_order: 0,
        };
        assert!(validate_banner(&banner).is_ok());
        banner.link_url = Some("not a url".into());
        assert!(validate_banner(&banner).is_err());
    }
}
