//! Application router configuration.

use axum::{Json, Router, response::IntoResponse, routing::get};
use serde_json::json;

use crate::{
    endpoints,
    expense::{
        ExpenseStore, create_expense_endpoint, get_categories_endpoint, get_expenses_endpoint,
    },
    state::AppState,
};

/// Return a router with all the app's routes.
pub fn build_router<E>(state: AppState<E>) -> Router
where
    E: ExpenseStore + Clone + Send + Sync + 'static,
{
    Router::new()
        .route(endpoints::ROOT, get(get_service_status))
        .route(endpoints::HEALTH, get(get_health))
        .route(
            endpoints::EXPENSES,
            get(get_expenses_endpoint::<E>).post(create_expense_endpoint::<E>),
        )
        .route(endpoints::CATEGORIES, get(get_categories_endpoint::<E>))
        .with_state(state)
}

/// A route handler reporting that the service is running.
async fn get_service_status() -> impl IntoResponse {
    Json(json!({ "status": "ok", "message": "Outlay API is running." }))
}

/// A route handler for the liveness probe.
async fn get_health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}
