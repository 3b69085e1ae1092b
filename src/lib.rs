//! Outlay is a personal expense-tracking service.
//!
//! This library provides a REST API for recording and querying expenses. The
//! interesting part is the create path: submissions carry an idempotency key,
//! and the creation protocol guarantees that retried or concurrent
//! submissions with the same key converge on a single persisted record, even
//! when the storage layer suffers transient failures along the way.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde::{Deserialize, Serialize};
use tokio::signal;

mod db;
mod endpoints;
mod expense;
mod routing;
mod state;

pub use db::initialize as initialize_db;
pub use expense::{
    Amount, CategoryName, CreateOutcome, Expense, ExpenseQuery, ExpenseStore, IdempotencyKey,
    NewExpense, SQLiteExpenseStore, SortOrder, create_expense,
};
pub use routing::build_router;
pub use state::AppState;

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The amount was zero, negative, or had more than two decimal places.
    ///
    /// Amounts are money, so they must be exact: anything that cannot be
    /// represented in whole cents is rejected rather than rounded.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// An empty or whitespace-only string was used as a category.
    #[error("category cannot be blank")]
    EmptyCategory,

    /// The category exceeded the maximum length.
    #[error("category must be at most 100 characters, got {0}")]
    CategoryTooLong(usize),

    /// The description exceeded the maximum length.
    #[error("description must be at most 1000 characters, got {0}")]
    DescriptionTooLong(usize),

    /// An empty or whitespace-only string was supplied as an idempotency key.
    #[error("idempotency key cannot be blank")]
    EmptyIdempotencyKey,

    /// The client-supplied idempotency key exceeded the maximum length.
    #[error("idempotency key must be at most 100 characters, got {0}")]
    IdempotencyKeyTooLong(usize),

    /// An expense with the same idempotency key already exists in the
    /// database.
    ///
    /// The creation protocol resolves this internally by returning the
    /// existing record; callers outside the protocol should never see it.
    #[error("an expense with this idempotency key already exists")]
    DuplicateIdempotencyKey,

    /// The database reported a transient busy or locked condition.
    ///
    /// This is the retryable error class: the condition is expected to clear
    /// without caller intervention.
    #[error("the database is temporarily busy")]
    StorageBusy,

    /// Every retry attempt failed with a transient storage error.
    ///
    /// No record was persisted for the submission. Resubmitting later with
    /// the same idempotency key is safe and will not create a duplicate.
    #[error("storage failed after {0} attempts")]
    RetriesExhausted(u32),

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    && desc.ends_with("expense.idempotency_key") =>
            {
                Error::DuplicateIdempotencyKey
            }
            rusqlite::Error::SqliteFailure(sql_error, _)
                if sql_error.code == rusqlite::ErrorCode::DatabaseBusy
                    || sql_error.code == rusqlite::ErrorCode::DatabaseLocked =>
            {
                Error::StorageBusy
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

/// The JSON body returned for error responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// A human-readable description of what went wrong.
    pub error: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status_code, message) = match &self {
            Error::InvalidAmount(_)
            | Error::EmptyCategory
            | Error::CategoryTooLong(_)
            | Error::DescriptionTooLong(_)
            | Error::EmptyIdempotencyKey
            | Error::IdempotencyKeyTooLong(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, self.to_string())
            }
            Error::StorageBusy | Error::RetriesExhausted(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "the database is temporarily unavailable, try again later".to_owned(),
            ),
            Error::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            Error::DuplicateIdempotencyKey => (StatusCode::CONFLICT, self.to_string()),
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "an unexpected error occurred, check the server logs for more details"
                        .to_owned(),
                )
            }
        };

        (status_code, Json(ErrorResponse { error: message })).into_response()
    }
}
