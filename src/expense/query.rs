//! Handlers for listing expenses and their categories.
//!
//! These are plain reads with no concurrency hazard; the interesting part is
//! only that the total is an exact decimal sum, never a float.

use axum::{
    Json,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    expense::{
        Expense,
        store::{ExpenseQuery, ExpenseStore, SortOrder},
    },
    state::AppState,
};

/// The query parameters accepted by the expense list endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    /// Only include expenses whose category contains this substring
    /// (case-insensitive).
    #[serde(default)]
    pub category: Option<String>,
    /// The order to return expenses in. Defaults to newest first.
    #[serde(default)]
    pub sort: SortOrder,
}

/// The response body for the expense list endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExpenseListResponse {
    /// The expenses matching the query, in the requested order.
    pub expenses: Vec<Expense>,
    /// The number of expenses returned.
    pub count: usize,
    /// The exact decimal sum of the returned amounts.
    pub total: Decimal,
}

/// A route handler for listing expenses with an optional category filter.
pub async fn get_expenses_endpoint<E>(
    State(state): State<AppState<E>>,
    Query(params): Query<ListParams>,
) -> Response
where
    E: ExpenseStore + Send + Sync,
{
    let query = ExpenseQuery {
        category: params.category,
        sort: params.sort,
    };

    match state.expense_store.get_query(&query) {
        Ok(expenses) => {
            let total = expenses
                .iter()
                .map(|expense| expense.amount.as_decimal())
                .sum();

            Json(ExpenseListResponse {
                count: expenses.len(),
                expenses,
                total,
            })
            .into_response()
        }
        Err(error) => error.into_response(),
    }
}

/// A route handler for listing the distinct expense categories, for use in
/// filter dropdowns.
pub async fn get_categories_endpoint<E>(State(state): State<AppState<E>>) -> Response
where
    E: ExpenseStore + Send + Sync,
{
    match state.expense_store.get_categories() {
        Ok(categories) => Json(categories).into_response(),
        Err(error) => error.into_response(),
    }
}
