//! # Novel Admin Core
//!
//! This crate provides the foundational types and traits for the novel
//! platform admin console. It defines the domain records, the error type,
//! the query model, and the backend interfaces (data access, auth, object
//! storage) that adapters must implement.

pub mod changes;
pub mod context;
pub mod error;
pub mod query;
pub mod traits;
pub mod types;

// Re-export commonly used items at the crate root
pub use changes::{Change, ChangeFeed, ChangeKind, ChangeListener};
pub use context::SessionContext;
pub use error::{AdminError, AdminResult, ErrorCategory};
pub use query::{Filter, FilterOp, Ordering, Query, Range, Row, SelectResult};
pub use traits::{AuthProvider, DataAccess, DataAccessExt, ObjectStorage, Orderable, Record};
pub use types::{
    Actor, Banner, Book, BookStatus, Category, Chapter, CoinPackage, Credentials, ForumPost,
    LoginLog, Profile, Role, Setting, Tag, Transaction, TransactionKind, VisitEvent, Withdrawal,
    WithdrawalStatus,
};
