//! The API endpoint URIs.

/// The root route, reports that the service is running.
pub const ROOT: &str = "/";
/// The liveness probe route.
pub const HEALTH: &str = "/health";
/// The route to create and list expenses.
pub const EXPENSES: &str = "/api/expenses";
/// The route to list the distinct expense categories.
pub const CATEGORIES: &str = "/api/expenses/categories";
