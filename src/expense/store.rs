//! Defines the expense store trait.

use serde::Deserialize;
use uuid::Uuid;

use crate::{
    Error,
    expense::{Expense, IdempotencyKey, NewExpense},
};

/// Handles the creation and retrieval of expenses.
///
/// Implementations must report a duplicate idempotency key as
/// [Error::DuplicateIdempotencyKey] and transient storage conditions as
/// [Error::StorageBusy]; the creation protocol branches on both.
pub trait ExpenseStore {
    /// Persist a new expense under `id`, assigning its creation timestamp.
    ///
    /// Each call must be atomic: either the full record is durably stored,
    /// or nothing is.
    fn insert(&self, id: Uuid, expense: &NewExpense) -> Result<Expense, Error>;

    /// Look up the expense created for `key`, if any.
    fn get_by_idempotency_key(&self, key: &IdempotencyKey) -> Result<Option<Expense>, Error>;

    /// Retrieve expenses from the store in the way defined by `query`.
    fn get_query(&self, query: &ExpenseQuery) -> Result<Vec<Expense>, Error>;

    /// The distinct category names in the store, alphabetically ordered.
    fn get_categories(&self) -> Result<Vec<String>, Error>;
}

/// Defines how expenses should be fetched from [ExpenseStore::get_query].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ExpenseQuery {
    /// Only include expenses whose category contains this substring
    /// (case-insensitive).
    pub category: Option<String>,
    /// The order to return expenses in.
    pub sort: SortOrder,
}

/// The order to sort expenses in an [ExpenseQuery].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Most recent date first, ties broken by most recently created.
    #[default]
    NewestFirst,
    /// Oldest date first, ties broken by earliest created.
    OldestFirst,
}
