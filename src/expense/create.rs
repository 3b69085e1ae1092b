//! The idempotent expense creation protocol and its endpoint.
//!
//! Creating an expense must be safe to retry: a client that resubmits after a
//! dropped connection or an ambiguous timeout reuses its idempotency key, and
//! the protocol guarantees at most one persisted record per key no matter how
//! the attempts interleave.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use time::Date;
use uuid::Uuid;

use crate::{
    Error,
    expense::{
        Amount, CategoryName, Expense, IdempotencyKey, NewExpense, retry::execute_with_retry,
        store::ExpenseStore,
    },
    state::AppState,
};

/// The result of running the creation protocol for one submission.
///
/// A replayed submission is not an error: callers branch on the variant and
/// treat both as success.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    /// No expense existed for the key; a new one was persisted.
    Created(Expense),
    /// An expense already existed for the key; no write was performed.
    AlreadyExists(Expense),
}

/// Create an expense, persisting at most one record for its idempotency key.
///
/// The protocol is read-check-write-recheck:
/// 1. If a record already exists for the key, return it without writing. This
///    is the fast path for a retry after the first attempt succeeded.
/// 2. Otherwise insert a new record with a fresh ID, retrying transient
///    storage failures, and rely on the store's uniqueness constraint to
///    arbitrate concurrent submissions.
/// 3. If the insert loses that race, re-query by key and return the winning
///    record.
///
/// Two concurrent submissions with the same key can both pass step 1 before
/// either commits, so step 3 is the correctness backstop, not an edge case.
/// The losing caller observes the winner's record rather than an error.
///
/// # Errors
/// This function will return an [Error::RetriesExhausted] when the store
/// stays unavailable. No record exists for the key in that case, so the
/// caller may resubmit later with the same key.
pub async fn create_expense<E>(store: &E, new_expense: NewExpense) -> Result<CreateOutcome, Error>
where
    E: ExpenseStore,
{
    if let Some(existing) = store.get_by_idempotency_key(&new_expense.idempotency_key)? {
        return Ok(CreateOutcome::AlreadyExists(existing));
    }

    let id = Uuid::new_v4();

    match execute_with_retry(|| store.insert(id, &new_expense)).await {
        Ok(expense) => Ok(CreateOutcome::Created(expense)),
        Err(Error::DuplicateIdempotencyKey) => {
            // Another submission with the same key committed between the
            // pre-check and the insert. The constraint is the source of
            // truth: fetch the winning record and report it.
            store
                .get_by_idempotency_key(&new_expense.idempotency_key)?
                .map(CreateOutcome::AlreadyExists)
                .ok_or(Error::NotFound)
        }
        Err(error) => Err(error),
    }
}

/// The request body for creating an expense.
#[derive(Debug, Deserialize)]
pub struct ExpenseData {
    /// Identifies the logical submission. Omit to have the server generate
    /// one; resubmit with the same key to retry safely.
    #[serde(default)]
    pub idempotency_key: Option<String>,
    /// How much money was spent. Must be positive with at most two decimal
    /// places.
    pub amount: Decimal,
    /// The category the expense belongs to.
    pub category: String,
    /// Optional text describing what the expense was for.
    #[serde(default)]
    pub description: Option<String>,
    /// The date the expense was incurred.
    pub date: Date,
}

impl ExpenseData {
    /// Validate the raw submission into a [NewExpense].
    ///
    /// # Errors
    /// Returns the validation error for the first malformed field.
    fn validate(self) -> Result<NewExpense, Error> {
        let idempotency_key = match self.idempotency_key {
            Some(key) => IdempotencyKey::new(&key)?,
            None => IdempotencyKey::generate(),
        };
        let amount = Amount::new(self.amount)?;
        let category = CategoryName::new(&self.category)?;

        NewExpense::new(idempotency_key, amount, category, self.description, self.date)
    }
}

/// A route handler for creating a new expense.
///
/// Responds 201 when a new record was persisted and 200 when the submission
/// replayed an existing one, so clients can show "saved" either way without
/// implying a duplicate was created.
pub async fn create_expense_endpoint<E>(
    State(state): State<AppState<E>>,
    Json(data): Json<ExpenseData>,
) -> Response
where
    E: ExpenseStore + Send + Sync,
{
    // Malformed input is rejected here, before the protocol or the store is
    // ever touched.
    let new_expense = match data.validate() {
        Ok(new_expense) => new_expense,
        Err(error) => return error.into_response(),
    };

    match create_expense(&state.expense_store, new_expense).await {
        Ok(CreateOutcome::Created(expense)) => {
            (StatusCode::CREATED, Json(expense)).into_response()
        }
        Ok(CreateOutcome::AlreadyExists(expense)) => (StatusCode::OK, Json(expense)).into_response(),
        Err(error) => error.into_response(),
    }
}
