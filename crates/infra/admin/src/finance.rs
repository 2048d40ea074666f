//! Members, balances, coin packages and withdrawals.
//!
//! Balance changes and withdrawal decisions are single procedure calls, so
//! the balance and its transaction row are written together or not at all.

use chrono::Utc;
use novel_admin_core::changes::ChangeKind;
use novel_admin_core::error::{AdminError, AdminResult};
use novel_admin_core::query::{Filter, Query};
use novel_admin_core::traits::{DataAccess, DataAccessExt, Record};
use novel_admin_core::types::{
    CoinPackage, Profile, Role, Transaction, TransactionKind, Withdrawal, WithdrawalStatus,
};
use serde_json::{Value, json};

use crate::csv::rows_to_csv;
use crate::validation::{require_text, validate_coin_package};
use crate::{AdminConsole, Confirmation, Page, patch};

/// Procedure that changes a balance and records the transaction.
pub const ADJUST_BALANCE: &str = "adjust_balance";
/// Procedure that approves or rejects a pending withdrawal.
pub const PROCESS_WITHDRAWAL: &str = "process_withdrawal";

/// Columns of the transaction export.
pub const TRANSACTION_COLUMNS: [&str; 6] = ["id", "user_id", "amount", "kind", "note", "created_at"];

pub struct Finance<'a> {
    console: &'a AdminConsole,
}

impl<'a> Finance<'a> {
    pub(crate) fn new(console: &'a AdminConsole) -> Self {
        Self { console }
    }

    // ==================== Members ====================

    /// Members newest first, optionally filtered by email.
    pub async fn list_users(&self, search: Option<&str>, page: usize) -> AdminResult<Page<Profile>> {
        self.console.authorize()?;
        let mut query = Query::new().order_by("created_at", false);
        if let Some(needle) = search.map(str::trim).filter(|s| !s.is_empty()) {
            query = query.contains("email", needle);
        }
        self.console.page(query, page).await
    }

    /// Changes a member's role. Admins only, and never their own.
    pub async fn set_role(&self, user_id: &str, role: Role) -> AdminResult<Profile> {
        let actor = self.console.session().require_admin()?;
        if actor.id == user_id {
            return Err(AdminError::permission_denied("cannot change your own role"));
        }
        self.console
            .submit("set role", async {
                let profile: Profile = self.console.patch_one(user_id, patch([("role", json!(role))])).await?;
                tracing::info!(user = user_id, ?role, by = %actor.id, "role changed");
                self.console
                    .notify(Profile::COLLECTION, ChangeKind::Updated, vec![user_id.to_string()]);
                Ok::<_, AdminError>(profile)
            })
            .await
    }

    /// Adds `amount` (negative to deduct) to a balance. Returns the new
    /// balance. Admins only.
    pub async fn adjust_balance(&self, user_id: &str, amount: i64, note: &str) -> AdminResult<i64> {
        let actor = self.console.session().require_admin()?;
        if amount == 0 {
            return Err(AdminError::validation("amount", "must not be zero"));
        }
        let note = require_text("note", note)?;
        self.console
            .submit("adjust balance", async {
                let result = self
                    .console
                    .data()
                    .invoke_procedure(
                        ADJUST_BALANCE,
                        json!({
                            "user_id": user_id,
                            "amount": amount,
                            "note": note,
                            "kind": TransactionKind::Adjustment,
                        }),
                    )
                    .await?;
                let balance = result
                    .get("balance")
                    .and_then(Value::as_i64)
                    .ok_or_else(|| AdminError::backend(format!("{} returned {}", ADJUST_BALANCE, result)))?;
                tracing::info!(user = user_id, amount, balance, by = %actor.id, "balance adjusted");
                self.console
                    .notify(Profile::COLLECTION, ChangeKind::Updated, vec![user_id.to_string()]);
                self.console.notify(Transaction::COLLECTION, ChangeKind::Inserted, vec![]);
                Ok::<_, AdminError>(balance)
            })
            .await
    }

    // ==================== Transactions ====================

    /// Transactions newest first, optionally for one member.
    pub async fn list_transactions(&self, user_id: Option<&str>, page: usize) -> AdminResult<Page<Transaction>> {
        self.console.authorize()?;
        self.console.page(transaction_query(user_id), page).await
    }

    /// All matching transactions as CSV text.
    pub async fn export_transactions(&self, user_id: Option<&str>) -> AdminResult<String> {
        self.console.authorize()?;
        let result = self
            .console
            .logged(self.console.data().select(Transaction::COLLECTION, &transaction_query(user_id)))
            .await?;
        tracing::debug!(rows = result.rows.len(), "transactions exported");
        Ok(rows_to_csv(&TRANSACTION_COLUMNS, &result.rows))
    }

    // ==================== Coin packages ====================

    /// Packages by price.
    pub async fn list_packages(&self) -> AdminResult<Vec<CoinPackage>> {
        self.console.authorize()?;
        self.console
            .logged(self.console.data().fetch_all::<CoinPackage>("price_cents"))
            .await
    }

    pub async fn create_package(&self, package: CoinPackage) -> AdminResult<CoinPackage> {
        self.console.authorize()?;
        validate_coin_package(&package)?;
        self.console
            .submit("create package", async {
                let created = self.console.data().create(&package).await?;
                tracing::info!(package = %created.id, coins = created.coins, "coin package created");
                self.console
                    .notify(CoinPackage::COLLECTION, ChangeKind::Inserted, vec![created.id.clone()]);
                Ok::<_, AdminError>(created)
            })
            .await
    }

    pub async fn update_package(&self, package: CoinPackage) -> AdminResult<CoinPackage> {
        self.console.authorize()?;
        validate_coin_package(&package)?;
        self.console
            .submit("update package", async {
                let saved = self.console.data().save(&package).await?;
                self.console
                    .notify(CoinPackage::COLLECTION, ChangeKind::Updated, vec![saved.id.clone()]);
                Ok::<_, AdminError>(saved)
            })
            .await
    }

    pub async fn set_package_active(&self, id: &str, active: bool) -> AdminResult<CoinPackage> {
        self.console.authorize()?;
        self.console
            .submit("toggle package", async {
                let package: CoinPackage = self.console.patch_one(id, patch([("is_active", json!(active))])).await?;
                self.console
                    .notify(CoinPackage::COLLECTION, ChangeKind::Updated, vec![id.to_string()]);
                Ok::<_, AdminError>(package)
            })
            .await
    }

    pub async fn delete_package(&self, id: &str, confirm: Confirmation) -> AdminResult<()> {
        self.console.authorize()?;
        confirm.require("delete coin package")?;
        self.console
            .submit("delete package", async {
                self.console.data().remove::<CoinPackage>(id).await?;
                tracing::info!(package = id, "coin package deleted");
                self.console
                    .notify(CoinPackage::COLLECTION, ChangeKind::Deleted, vec![id.to_string()]);
                Ok::<_, AdminError>(())
            })
            .await
    }

    // ==================== Withdrawals ====================

    /// Withdrawals oldest first, optionally in one status.
    pub async fn list_withdrawals(
        &self,
        status: Option<WithdrawalStatus>,
        page: usize,
    ) -> AdminResult<Page<Withdrawal>> {
        self.console.authorize()?;
        let mut query = Query::new().order_by("created_at", true);
        if let Some(status) = status {
            query = query.eq("status", json!(status));
        }
        self.console.page(query, page).await
    }

    /// Approves a pending withdrawal and debits the member.
    pub async fn approve_withdrawal(&self, id: &str) -> AdminResult<Withdrawal> {
        self.process(id, true, None).await
    }

    /// Rejects a pending withdrawal. A reason is required.
    pub async fn reject_withdrawal(&self, id: &str, reason: &str) -> AdminResult<Withdrawal> {
        let reason = require_text("note", reason)?;
        self.process(id, false, Some(reason)).await
    }

    async fn process(&self, id: &str, approve: bool, note: Option<&str>) -> AdminResult<Withdrawal> {
        let actor = self.console.session().require_admin()?;
        self.console
            .submit("process withdrawal", async {
                let row = self
                    .console
                    .data()
                    .invoke_procedure(
                        PROCESS_WITHDRAWAL,
                        json!({ "withdrawal_id": id, "approve": approve, "note": note }),
                    )
                    .await?;
                let withdrawal: Withdrawal = serde_json::from_value(row)?;
                tracing::info!(
                    withdrawal = id,
                    status = ?withdrawal.status,
                    by = %actor.id,
                    "withdrawal processed"
                );
                self.console
                    .notify(Withdrawal::COLLECTION, ChangeKind::Updated, vec![id.to_string()]);
                if approve {
                    self.console.notify(
                        Profile::COLLECTION,
                        ChangeKind::Updated,
                        vec![withdrawal.user_id.clone()],
                    );
                    self.console.notify(Transaction::COLLECTION, ChangeKind::Inserted, vec![]);
                }
                Ok::<_, AdminError>(withdrawal)
            })
            .await
    }

    /// Marks an approved withdrawal as paid out.
    ///
    /// The update only matches approved rows, so a withdrawal that is still
    /// pending or was rejected is reported as a conflict.
    pub async fn mark_paid(&self, id: &str) -> AdminResult<Withdrawal> {
        self.console.session().require_admin()?;
        self.console
            .submit("mark withdrawal paid", async {
                let filters = [
                    Filter::eq(Withdrawal::KEY, id),
                    Filter::eq("status", json!(WithdrawalStatus::Approved)),
                ];
                let rows = self
                    .console
                    .data()
                    .update(
                        Withdrawal::COLLECTION,
                        patch([
                            ("status", json!(WithdrawalStatus::Paid)),
                            ("processed_at", json!(Utc::now())),
                        ]),
                        &filters,
                    )
                    .await?;
                let Some(row) = rows.into_iter().next() else {
                    let current = self.console.data().fetch_one::<Withdrawal>(id).await?;
                    return Err(AdminError::conflict(
                        Withdrawal::COLLECTION,
                        format!("withdrawal is {:?}, not approved", current.status),
                    ));
                };
                let withdrawal = Withdrawal::from_row(row)?;
                tracing::info!(withdrawal = id, "withdrawal paid");
                self.console
                    .notify(Withdrawal::COLLECTION, ChangeKind::Updated, vec![id.to_string()]);
                Ok(withdrawal)
            })
            .await
    }
}

fn transaction_query(user_id: Option<&str>) -> Query {
    let query = Query::new().order_by("created_at", false);
    match user_id {
        Some(user_id) => query.eq("user_id", user_id),
        None => query,
    }
}
