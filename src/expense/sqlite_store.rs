//! Implements a SQLite backed expense store.

use std::{
    str::FromStr,
    sync::{Arc, Mutex},
};

use rusqlite::{Connection, OptionalExtension, Row, types::Type};
use rust_decimal::Decimal;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    Error,
    expense::{
        Amount, CategoryName, Expense, ExpenseQuery, ExpenseStore, IdempotencyKey, NewExpense,
        SortOrder,
    },
};

const EXPENSE_COLUMNS: &str =
    "id, idempotency_key, amount, category, description, date, created_at";

/// Creates and retrieves expenses to/from a SQLite database.
#[derive(Debug, Clone)]
pub struct SQLiteExpenseStore {
    connection: Arc<Mutex<Connection>>,
}

impl SQLiteExpenseStore {
    /// Create a new expense store with a SQLite database.
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }
}

impl ExpenseStore for SQLiteExpenseStore {
    /// Persist a new expense in the database.
    ///
    /// The insert runs in its own transaction. If it fails, the transaction
    /// rolls back when dropped, so a retried attempt starts from a clean
    /// slate.
    ///
    /// # Errors
    /// This function will return an:
    /// - [Error::DuplicateIdempotencyKey] if an expense with the same
    ///   idempotency key already exists,
    /// - [Error::StorageBusy] if the database is temporarily busy or locked,
    /// - or [Error::SqlError] if there is some other SQL error.
    ///
    /// # Panics
    /// Panics if the lock for the database connection is already held by the
    /// same thread.
    fn insert(&self, id: Uuid, expense: &NewExpense) -> Result<Expense, Error> {
        let mut connection = self.connection.lock().unwrap();
        let transaction = connection.transaction()?;
        let created_at = OffsetDateTime::now_utc();

        let expense = transaction
            .prepare(&format!(
                "INSERT INTO expense (id, idempotency_key, amount, category, description, date, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 RETURNING {EXPENSE_COLUMNS}",
            ))?
            .query_row(
                (
                    id.to_string(),
                    expense.idempotency_key.as_ref(),
                    expense.amount.to_string(),
                    expense.category.as_ref(),
                    &expense.description,
                    expense.date,
                    created_at,
                ),
                map_expense_row,
            )?;

        transaction.commit()?;

        Ok(expense)
    }

    /// Look up the expense created for `key`, if any.
    ///
    /// # Errors
    /// This function will return an [Error::SqlError] if there is an SQL
    /// error.
    fn get_by_idempotency_key(&self, key: &IdempotencyKey) -> Result<Option<Expense>, Error> {
        self.connection
            .lock()
            .unwrap()
            .prepare(&format!(
                "SELECT {EXPENSE_COLUMNS} FROM expense WHERE idempotency_key = :key"
            ))?
            .query_row(&[(":key", key.as_ref())], map_expense_row)
            .optional()
            .map_err(|error| error.into())
    }

    /// Retrieve expenses with an optional category filter, sorted by date.
    ///
    /// The filter is a case-insensitive substring match. Ordering is by date,
    /// then creation time, then rowid so that expenses created in the same
    /// instant keep a stable order.
    ///
    /// # Errors
    /// This function will return an [Error::SqlError] if there is an SQL
    /// error.
    fn get_query(&self, query: &ExpenseQuery) -> Result<Vec<Expense>, Error> {
        let order_clause = match query.sort {
            SortOrder::NewestFirst => "ORDER BY date DESC, created_at DESC, rowid DESC",
            SortOrder::OldestFirst => "ORDER BY date ASC, created_at ASC, rowid ASC",
        };

        let connection = self.connection.lock().unwrap();

        match query.category.as_deref().map(str::trim) {
            Some(filter) if !filter.is_empty() => connection
                .prepare(&format!(
                    "SELECT {EXPENSE_COLUMNS} FROM expense
                     WHERE category LIKE '%' || :category || '%' {order_clause}"
                ))?
                .query_map(&[(":category", filter)], map_expense_row)?
                .map(|maybe_expense| maybe_expense.map_err(|error| error.into()))
                .collect(),
            _ => connection
                .prepare(&format!(
                    "SELECT {EXPENSE_COLUMNS} FROM expense {order_clause}"
                ))?
                .query_map([], map_expense_row)?
                .map(|maybe_expense| maybe_expense.map_err(|error| error.into()))
                .collect(),
        }
    }

    /// Retrieve the distinct category names in the database.
    ///
    /// # Errors
    /// This function will return an [Error::SqlError] if there is an SQL
    /// error.
    fn get_categories(&self) -> Result<Vec<String>, Error> {
        self.connection
            .lock()
            .unwrap()
            .prepare("SELECT DISTINCT category FROM expense ORDER BY category ASC")?
            .query_map([], |row| row.get(0))?
            .map(|maybe_name| maybe_name.map_err(|error| error.into()))
            .collect()
    }
}

/// Create the expense table in the database.
///
/// The idempotency key carries a UNIQUE constraint. That constraint, not the
/// creation protocol's pre-check, is what ultimately prevents duplicate
/// records under concurrent submissions.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL
/// error.
pub fn create_expense_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS expense (
                id TEXT PRIMARY KEY,
                idempotency_key TEXT NOT NULL UNIQUE,
                amount TEXT NOT NULL,
                category TEXT NOT NULL,
                description TEXT,
                date TEXT NOT NULL,
                created_at TEXT NOT NULL
                )",
        (),
    )?;

    // Composite index supporting the list ordering.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_expense_date_created_at ON expense(date, created_at);",
        (),
    )?;

    Ok(())
}

/// Map a database row to an [Expense].
fn map_expense_row(row: &Row) -> Result<Expense, rusqlite::Error> {
    let raw_id: String = row.get(0)?;
    let id = Uuid::from_str(&raw_id)
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(error)))?;

    let raw_key: String = row.get(1)?;

    let raw_amount: String = row.get(2)?;
    let amount = Decimal::from_str(&raw_amount)
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(error)))?;

    let raw_category: String = row.get(3)?;

    Ok(Expense {
        id,
        idempotency_key: IdempotencyKey::new_unchecked(&raw_key),
        amount: Amount::new_unchecked(amount),
        category: CategoryName::new_unchecked(&raw_category),
        description: row.get(4)?,
        date: row.get(5)?,
        created_at: row.get(6)?,
    })
}

#[cfg(test)]
mod sqlite_store_tests {
    use std::sync::{Arc, Mutex};

    use rusqlite::Connection;
    use time::macros::date;
    use uuid::Uuid;

    use crate::{
        Error,
        db::initialize,
        expense::{
            Amount, CategoryName, ExpenseQuery, IdempotencyKey, NewExpense, SortOrder,
        },
    };

    use super::{ExpenseStore, SQLiteExpenseStore};

    fn get_test_store() -> SQLiteExpenseStore {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();

        SQLiteExpenseStore::new(Arc::new(Mutex::new(connection)))
    }

    fn new_expense(key: &str, amount: &str, category: &str, date: time::Date) -> NewExpense {
        NewExpense::new(
            IdempotencyKey::new_unchecked(key),
            Amount::new(amount.parse().unwrap()).unwrap(),
            CategoryName::new_unchecked(category),
            None,
            date,
        )
        .unwrap()
    }

    #[test]
    fn insert_expense_succeeds() {
        let store = get_test_store();
        let id = Uuid::new_v4();
        let submission = new_expense("key-1", "499.00", "Food", date!(2025 - 06 - 01));

        let expense = store.insert(id, &submission).unwrap();

        assert_eq!(expense.id, id);
        assert_eq!(expense.idempotency_key, submission.idempotency_key);
        assert_eq!(expense.amount, submission.amount);
        assert_eq!(expense.category, submission.category);
        assert_eq!(expense.description, None);
        assert_eq!(expense.date, date!(2025 - 06 - 01));
    }

    #[test]
    fn insert_with_duplicate_key_returns_duplicate_error() {
        let store = get_test_store();
        let submission = new_expense("key-1", "1.00", "Food", date!(2025 - 06 - 01));
        store.insert(Uuid::new_v4(), &submission).unwrap();

        // Same key, different fields: the constraint must still reject it.
        let duplicate = new_expense("key-1", "2.00", "Transport", date!(2025 - 06 - 02));
        let result = store.insert(Uuid::new_v4(), &duplicate);

        assert_eq!(result, Err(Error::DuplicateIdempotencyKey));
    }

    #[test]
    fn failed_insert_leaves_no_record_behind() {
        let store = get_test_store();
        let submission = new_expense("key-1", "1.00", "Food", date!(2025 - 06 - 01));
        store.insert(Uuid::new_v4(), &submission).unwrap();

        let duplicate = new_expense("key-1", "2.00", "Transport", date!(2025 - 06 - 02));
        store
            .insert(Uuid::new_v4(), &duplicate)
            .expect_err("duplicate insert should fail");

        let expenses = store.get_query(&ExpenseQuery::default()).unwrap();
        assert_eq!(expenses.len(), 1);
    }

    #[test]
    fn get_by_idempotency_key_finds_inserted_expense() {
        let store = get_test_store();
        let submission = new_expense("key-1", "10.00", "Food", date!(2025 - 06 - 01));
        let inserted = store.insert(Uuid::new_v4(), &submission).unwrap();

        let found = store
            .get_by_idempotency_key(&submission.idempotency_key)
            .unwrap();

        assert_eq!(found, Some(inserted));
    }

    #[test]
    fn get_by_idempotency_key_returns_none_for_unknown_key() {
        let store = get_test_store();

        let found = store
            .get_by_idempotency_key(&IdempotencyKey::new_unchecked("no-such-key"))
            .unwrap();

        assert_eq!(found, None);
    }

    #[test]
    fn get_query_filters_by_category_substring_case_insensitively() {
        let store = get_test_store();
        store
            .insert(
                Uuid::new_v4(),
                &new_expense("key-1", "1.00", "Groceries", date!(2025 - 06 - 01)),
            )
            .unwrap();
        store
            .insert(
                Uuid::new_v4(),
                &new_expense("key-2", "2.00", "Transport", date!(2025 - 06 - 01)),
            )
            .unwrap();

        let query = ExpenseQuery {
            category: Some("groc".to_owned()),
            sort: SortOrder::NewestFirst,
        };
        let expenses = store.get_query(&query).unwrap();

        assert_eq!(expenses.len(), 1);
        assert_eq!(expenses[0].category.as_ref(), "Groceries");
    }

    #[test]
    fn get_query_sorts_newest_first_by_default() {
        let store = get_test_store();
        store
            .insert(
                Uuid::new_v4(),
                &new_expense("key-1", "1.00", "Food", date!(2025 - 06 - 01)),
            )
            .unwrap();
        store
            .insert(
                Uuid::new_v4(),
                &new_expense("key-2", "2.00", "Food", date!(2025 - 06 - 03)),
            )
            .unwrap();
        store
            .insert(
                Uuid::new_v4(),
                &new_expense("key-3", "3.00", "Food", date!(2025 - 06 - 02)),
            )
            .unwrap();

        let expenses = store.get_query(&ExpenseQuery::default()).unwrap();

        let dates: Vec<_> = expenses.iter().map(|expense| expense.date).collect();
        assert_eq!(
            dates,
            vec![
                date!(2025 - 06 - 03),
                date!(2025 - 06 - 02),
                date!(2025 - 06 - 01)
            ]
        );
    }

    #[test]
    fn get_query_breaks_date_ties_by_creation_order() {
        let store = get_test_store();
        let today = date!(2025 - 06 - 01);

        for key in ["key-1", "key-2", "key-3"] {
            store
                .insert(Uuid::new_v4(), &new_expense(key, "1.00", "Food", today))
                .unwrap();
        }

        let newest_first = store.get_query(&ExpenseQuery::default()).unwrap();
        let keys: Vec<_> = newest_first
            .iter()
            .map(|expense| expense.idempotency_key.as_ref().to_owned())
            .collect();
        assert_eq!(keys, vec!["key-3", "key-2", "key-1"]);

        let oldest_first = store
            .get_query(&ExpenseQuery {
                category: None,
                sort: SortOrder::OldestFirst,
            })
            .unwrap();
        let keys: Vec<_> = oldest_first
            .iter()
            .map(|expense| expense.idempotency_key.as_ref().to_owned())
            .collect();
        assert_eq!(keys, vec!["key-1", "key-2", "key-3"]);
    }

    #[test]
    fn get_categories_returns_distinct_names_alphabetically() {
        let store = get_test_store();
        for (key, category) in [
            ("key-1", "Transport"),
            ("key-2", "Food"),
            ("key-3", "Food"),
        ] {
            store
                .insert(
                    Uuid::new_v4(),
                    &new_expense(key, "1.00", category, date!(2025 - 06 - 01)),
                )
                .unwrap();
        }

        let categories = store.get_categories().unwrap();

        assert_eq!(categories, vec!["Food".to_owned(), "Transport".to_owned()]);
    }
}
