//! Core data types for the admin console.
//!
//! One struct per backend collection. Every struct implements [`Record`] so
//! it can travel through the row-based data-access interface, and the two
//! positioned collections (categories and banners) also implement
//! [`Orderable`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::traits::{Orderable, Record};

/// Generates a fresh record identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ==================== Actors ====================

/// Role column of the `profiles` collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Editor,
    User,
}

impl Role {
    /// Returns true if this role may use the admin console.
    pub fn is_staff(&self) -> bool {
        matches!(self, Self::Admin | Self::Editor)
    }

    /// Parses a role name; unknown names are `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "editor" => Some(Self::Editor),
            "user" => Some(Self::User),
            _ => None,
        }
    }
}

/// The authenticated identity performing an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub email: String,
    pub role: Role,
}

/// Email/password credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    /// Creates new credentials.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// A platform member as stored in `profiles`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub role: Role,
    /// Coin balance.
    #[serde(default)]
    pub balance: i64,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// Creates a regular user profile with a zero balance.
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            username: None,
            role: Role::User,
            balance: 0,
            created_at: Utc::now(),
        }
    }

    /// Sets the role.
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Returns the actor view of this profile.
    pub fn actor(&self) -> Actor {
        Actor {
            id: self.id.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }
}

impl Record for Profile {
    const COLLECTION: &'static str = "profiles";

    fn id(&self) -> &str {
        &self.id
    }
}

// ==================== Catalog ====================

/// Publication state of a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    Ongoing,
    Completed,
    Hidden,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    pub status: BookStatus,
    /// Tag ids.
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Creates an ongoing book without cover or category.
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            title: title.into(),
            author: author.into(),
            description: String::new(),
            cover_url: None,
            category_id: None,
            status: BookStatus::Ongoing,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Record for Book {
    const COLLECTION: &'static str = "books";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Serializes NaN as `null` and reads `null` back as NaN.
///
/// Chapter positions imported from CSV are not validated, so a non-numeric
/// cell must survive a round trip through JSON storage.
mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    pub book_id: String,
    /// Reading position inside the book. May be NaN for unvalidated imports.
    #[serde(with = "nan_as_null")]
    pub order: f64,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub is_vip: bool,
    #[serde(default)]
    pub word_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Chapter {
    /// Creates a free chapter; the word count is derived from `content`.
    pub fn new(
        book_id: impl Into<String>,
        order: f64,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let content = content.into();
        Self {
            id: new_id(),
            book_id: book_id.into(),
            order,
            title: title.into(),
            word_count: word_count(&content),
            content,
            is_vip: false,
            publish_at: None,
            created_at: Utc::now(),
        }
    }
}

impl Record for Chapter {
    const COLLECTION: &'static str = "chapters";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Number of whitespace-separated tokens.
pub fn word_count(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

/// A genre shown in the category navigation. Positioned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub sort_order: u32,
}

impl Record for Category {
    const COLLECTION: &'static str = "categories";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Orderable for Category {
    fn sort_order(&self) -> u32 {
        self.sort_order
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
}

impl Record for Tag {
    const COLLECTION: &'static str = "tags";

    fn id(&self) -> &str {
        &self.id
    }
}

// ==================== Storefront ====================

/// Home page banner. Positioned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Banner {
    pub id: String,
    pub title: String,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_url: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub sort_order: u32,
}

impl Record for Banner {
    const COLLECTION: &'static str = "banners";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Orderable for Banner {
    fn sort_order(&self) -> u32 {
        self.sort_order
    }
}

fn default_true() -> bool {
    true
}

/// A purchasable bundle of coins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinPackage {
    pub id: String,
    pub name: String,
    pub coins: i64,
    #[serde(default)]
    pub bonus_coins: i64,
    /// Price in the smallest currency unit.
    pub price_cents: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Record for CoinPackage {
    const COLLECTION: &'static str = "coin_packages";

    fn id(&self) -> &str {
        &self.id
    }
}

/// A platform-wide key/value setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: Value,
}

impl Record for Setting {
    const COLLECTION: &'static str = "settings";
    const KEY: &'static str = "key";

    fn id(&self) -> &str {
        &self.key
    }
}

// ==================== Finance ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Recharge,
    Purchase,
    Adjustment,
    Withdrawal,
    Refund,
}

/// A balance movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    /// Signed coin amount.
    pub amount: i64,
    pub kind: TransactionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Record for Transaction {
    const COLLECTION: &'static str = "transactions";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
    Paid,
}

/// A payout request from an author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub id: String,
    pub user_id: String,
    pub amount: i64,
    /// Payout channel, e.g. `bank` or `alipay`.
    pub method: String,
    pub account: String,
    pub status: WithdrawalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
}

impl Record for Withdrawal {
    const COLLECTION: &'static str = "withdrawals";

    fn id(&self) -> &str {
        &self.id
    }
}

// ==================== Forum ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForumPost {
    pub id: String,
    pub author_id: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default)]
    pub is_hidden: bool,
    pub created_at: DateTime<Utc>,
}

impl Record for ForumPost {
    const COLLECTION: &'static str = "forum_posts";

    fn id(&self) -> &str {
        &self.id
    }
}

// ==================== Activity ====================

/// One sign-in of a platform member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginLog {
    pub id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Record for LoginLog {
    const COLLECTION: &'static str = "login_logs";

    fn id(&self) -> &str {
        &self.id
    }
}

/// A timestamped action by an actor, the input of daily aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitEvent {
    pub occurred_at: DateTime<Utc>,
    pub actor_id: String,
}

impl VisitEvent {
    pub fn new(occurred_at: DateTime<Utc>, actor_id: impl Into<String>) -> Self {
        Self {
            occurred_at,
            actor_id: actor_id.into(),
        }
    }
}

impl From<&LoginLog> for VisitEvent {
    fn from(log: &LoginLog) -> Self {
        Self::new(log.created_at, log.user_id.clone())
    }
}

/// Names of every collection, for adapters that pre-create storage.
pub fn known_collections() -> Vec<&'static str> {
    vec![
        Profile::COLLECTION,
        Book::COLLECTION,
        Chapter::COLLECTION,
        Category::COLLECTION,
        Tag::COLLECTION,
        Banner::COLLECTION,
        CoinPackage::COLLECTION,
        Setting::COLLECTION,
        Transaction::COLLECTION,
        Withdrawal::COLLECTION,
        ForumPost::COLLECTION,
        LoginLog::COLLECTION,
    ]
}

/// Settings keyed by name, as loaded by the settings page.
pub type SettingsMap = HashMap<String, Value>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_count() {
        assert_eq!(word_count("  one two\tthree\nfour "), 4);
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("内容"), 1);
    }

    #[test]
    fn test_chapter_nan_order_survives_rows() {
        let chapter = Chapter::new("b1", f64::NAN, "Title", "Body");
        let row = chapter.to_row().unwrap();
        assert!(row["order"].is_null());
        let back = Chapter::from_row(row).unwrap();
        assert!(back.order.is_nan());
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!(Role::parse("ADMIN"), Some(Role::Admin));
        assert_eq!(Role::parse("guest"), None);
        assert!(Role::Editor.is_staff());
        assert!(!Role::User.is_staff());
    }

    #[test]
    fn test_setting_key_column() {
        assert_eq!(Setting::KEY, "key");
        assert_eq!(Book::KEY, "id");
    }
}
