//! Expense management for the expense-tracking service.
//!
//! This module contains everything related to expenses:
//! - The `Expense` model and the validated field types used to create one
//! - The idempotent creation protocol and its retry executor
//! - The `ExpenseStore` trait and its SQLite implementation
//! - HTTP handlers for creating and querying expenses

mod create;
mod models;
mod query;
mod retry;
mod sqlite_store;
mod store;

pub use create::{CreateOutcome, ExpenseData, create_expense, create_expense_endpoint};
pub use models::{Amount, CategoryName, Expense, IdempotencyKey, NewExpense};
pub use query::{
    ExpenseListResponse, ListParams, get_categories_endpoint, get_expenses_endpoint,
};
pub use sqlite_store::{SQLiteExpenseStore, create_expense_table};
pub use store::{ExpenseQuery, ExpenseStore, SortOrder};
