//! Server-side procedures.
//!
//! Each procedure runs against the whole state while the caller holds the
//! write lock, and validates everything before its first mutation. A
//! procedure therefore either applies all of its writes or none of them.

use chrono::Utc;
use novel_admin_core::error::{AdminError, AdminResult};
use novel_admin_core::query::{Filter, Row};
use novel_admin_core::traits::Record;
use novel_admin_core::types::{
    new_id, Profile, Transaction, TransactionKind, Withdrawal, WithdrawalStatus,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

use crate::State;

/// Exchanges the `sort_order` of two rows.
pub const SWAP_SORT_ORDER: &str = "swap_sort_order";
/// Counts rows matching optional filters.
pub const COUNT_ROWS: &str = "count_rows";
/// Changes a balance and records the transaction.
pub const ADJUST_BALANCE: &str = "adjust_balance";
/// Approves or rejects a pending withdrawal.
pub const PROCESS_WITHDRAWAL: &str = "process_withdrawal";

pub(crate) fn run(state: &mut State, name: &str, args: Value) -> AdminResult<Value> {
    match name {
        SWAP_SORT_ORDER => swap_sort_order(state, parse(args)?),
        COUNT_ROWS => count_rows(state, parse(args)?),
        ADJUST_BALANCE => adjust_balance(state, parse(args)?),
        PROCESS_WITHDRAWAL => process_withdrawal(state, parse(args)?),
        _ => Err(AdminError::UnknownProcedure {
            name: name.to_string(),
        }),
    }
}

fn parse<T: DeserializeOwned>(args: Value) -> AdminResult<T> {
    serde_json::from_value(args).map_err(|e| AdminError::validation("args", e.to_string()))
}

#[derive(Debug, Deserialize)]
struct SwapArgs {
    collection: String,
    first_id: String,
    second_id: String,
}

fn swap_sort_order(state: &mut State, args: SwapArgs) -> AdminResult<Value> {
    let table = state.table_mut(&args.collection)?;
    let first = find(table, "id", &args.first_id)
        .ok_or_else(|| AdminError::not_found(&args.collection, "id", &args.first_id))?;
    let second = find(table, "id", &args.second_id)
        .ok_or_else(|| AdminError::not_found(&args.collection, "id", &args.second_id))?;

    let first_order = table[first].get("sort_order").cloned().unwrap_or(Value::Null);
    let second_order = table[second].get("sort_order").cloned().unwrap_or(Value::Null);
    table[first].insert("sort_order".into(), second_order.clone());
    table[second].insert("sort_order".into(), first_order.clone());

    let mut result = Map::new();
    result.insert(args.first_id, second_order);
    result.insert(args.second_id, first_order);
    Ok(Value::Object(result))
}

#[derive(Debug, Deserialize)]
struct CountArgs {
    collection: String,
    #[serde(default)]
    filters: Vec<Filter>,
}

fn count_rows(state: &mut State, args: CountArgs) -> AdminResult<Value> {
    let table = state.table(&args.collection)?;
    let count = table
        .iter()
        .filter(|row| args.filters.iter().all(|f| f.matches(row)))
        .count();
    Ok(json!(count))
}

fn default_adjustment() -> TransactionKind {
    TransactionKind::Adjustment
}

#[derive(Debug, Deserialize)]
struct AdjustBalanceArgs {
    user_id: String,
    amount: i64,
    #[serde(default)]
    note: Option<String>,
    #[serde(default = "default_adjustment")]
    kind: TransactionKind,
}

fn adjust_balance(state: &mut State, args: AdjustBalanceArgs) -> AdminResult<Value> {
    if args.amount == 0 {
        return Err(AdminError::validation("amount", "must not be zero"));
    }
    let (index, profile) = load::<Profile>(state, &args.user_id)?;
    let balance = apply_delta(profile.balance, args.amount)?;

    let transaction = Transaction {
        id: new_id(),
        user_id: args.user_id.clone(),
        amount: args.amount,
        kind: args.kind,
        note: args.note,
        created_at: Utc::now(),
    };
    let transaction_row = transaction.to_row()?;

    state.table_mut(Profile::COLLECTION)?[index].insert("balance".into(), json!(balance));
    state
        .table_mut(Transaction::COLLECTION)?
        .push(transaction_row);

    Ok(json!({ "balance": balance, "transaction_id": transaction.id }))
}

#[derive(Debug, Deserialize)]
struct ProcessWithdrawalArgs {
    withdrawal_id: String,
    approve: bool,
    #[serde(default)]
    note: Option<String>,
}

fn process_withdrawal(state: &mut State, args: ProcessWithdrawalArgs) -> AdminResult<Value> {
    let (w_index, mut withdrawal) = load::<Withdrawal>(state, &args.withdrawal_id)?;
    if withdrawal.status != WithdrawalStatus::Pending {
        return Err(AdminError::conflict(
            Withdrawal::COLLECTION,
            format!("withdrawal is {:?}, not pending", withdrawal.status),
        ));
    }

    let now = Utc::now();
    let mut debit: Option<(usize, i64, Row)> = None;
    if args.approve {
        let (p_index, profile) = load::<Profile>(state, &withdrawal.user_id)?;
        let balance = apply_delta(profile.balance, -withdrawal.amount)?;
        let transaction = Transaction {
            id: new_id(),
            user_id: withdrawal.user_id.clone(),
            amount: -withdrawal.amount,
            kind: TransactionKind::Withdrawal,
            note: Some(format!("withdrawal {}", withdrawal.id)),
            created_at: now,
        };
        debit = Some((p_index, balance, transaction.to_row()?));
        withdrawal.status = WithdrawalStatus::Approved;
    } else {
        withdrawal.status = WithdrawalStatus::Rejected;
    }
    withdrawal.processed_at = Some(now);
    if args.note.is_some() {
        withdrawal.note = args.note;
    }
    let withdrawal_row = withdrawal.to_row()?;

    if let Some((p_index, balance, transaction_row)) = debit {
        state.table_mut(Profile::COLLECTION)?[p_index].insert("balance".into(), json!(balance));
        state
            .table_mut(Transaction::COLLECTION)?
            .push(transaction_row);
    }
    state.table_mut(Withdrawal::COLLECTION)?[w_index] = withdrawal_row.clone();

    Ok(Value::Object(withdrawal_row))
}

fn apply_delta(balance: i64, delta: i64) -> AdminResult<i64> {
    let next = balance
        .checked_add(delta)
        .ok_or_else(|| AdminError::conflict(Profile::COLLECTION, "balance overflow"))?;
    if next < 0 {
        return Err(AdminError::conflict(
            Profile::COLLECTION,
            format!("insufficient balance: {} + {} < 0", balance, delta),
        ));
    }
    Ok(next)
}

fn load<T: Record>(state: &State, id: &str) -> AdminResult<(usize, T)> {
    let table = state.table(T::COLLECTION)?;
    let index =
        find(table, T::KEY, id).ok_or_else(|| AdminError::not_found(T::COLLECTION, T::KEY, id))?;
    Ok((index, T::from_row(table[index].clone())?))
}

pub(crate) fn find(table: &[Row], key: &str, value: &str) -> Option<usize> {
    table
        .iter()
        .position(|row| row.get(key).and_then(Value::as_str) == Some(value))
}
