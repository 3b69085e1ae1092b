//! Defines the expense model and the validated field types used to create one.

use std::fmt::Display;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use unicode_segmentation::UnicodeSegmentation;
use uuid::Uuid;

use crate::Error;

/// The maximum number of grapheme clusters allowed in a category name.
pub const MAX_CATEGORY_LENGTH: usize = 100;
/// The maximum number of grapheme clusters allowed in a description.
pub const MAX_DESCRIPTION_LENGTH: usize = 1000;
/// The maximum number of characters allowed in a client-supplied idempotency key.
pub const MAX_IDEMPOTENCY_KEY_LENGTH: usize = 100;

/// A monetary amount in dollars.
///
/// Amounts are always positive and carry exactly two decimal places. They are
/// exact decimals, never binary floats, so sums do not drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    /// Create an amount from a decimal value.
    ///
    /// Values with fewer than two decimal places are rescaled to two, e.g.
    /// `10.1` becomes `10.10`.
    ///
    /// # Errors
    /// This function will return an [Error::InvalidAmount] if `value` is zero
    /// or negative, or has more than two decimal places.
    pub fn new(value: Decimal) -> Result<Self, Error> {
        if value <= Decimal::ZERO {
            return Err(Error::InvalidAmount(format!(
                "{value} is not greater than zero"
            )));
        }

        if value.normalize().scale() > 2 {
            return Err(Error::InvalidAmount(format!(
                "{value} has more than two decimal places"
            )));
        }

        let mut value = value;
        value.rescale(2);

        Ok(Self(value))
    }

    /// Create an amount without validation.
    ///
    /// The caller should ensure that the value is positive with two decimal
    /// places.
    ///
    /// This function has `_unchecked` in the name but is not `unsafe`, because if the invariant is violated it will cause incorrect behaviour but not affect memory safety.
    pub fn new_unchecked(value: Decimal) -> Self {
        Self(value)
    }

    /// The amount as an exact decimal.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The name of an expense category, e.g., 'Groceries', 'Transport'.
///
/// Category names are stored trimmed of surrounding whitespace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct CategoryName(String);

impl CategoryName {
    /// Create a category name, trimming surrounding whitespace.
    ///
    /// # Errors
    /// This function will return an [Error::EmptyCategory] if `name` is blank
    /// and an [Error::CategoryTooLong] if it exceeds [MAX_CATEGORY_LENGTH].
    pub fn new(name: &str) -> Result<Self, Error> {
        let name = name.trim();

        if name.is_empty() {
            return Err(Error::EmptyCategory);
        }

        let length = name.graphemes(true).count();
        if length > MAX_CATEGORY_LENGTH {
            return Err(Error::CategoryTooLong(length));
        }

        Ok(Self(name.to_string()))
    }

    /// Create a category name without validation.
    ///
    /// The caller should ensure that the string is not blank and already
    /// trimmed.
    pub fn new_unchecked(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl AsRef<str> for CategoryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for CategoryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A token identifying one logical submission.
///
/// Retries of the same submission reuse the same key, which is what lets the
/// creation protocol collapse them into a single persisted record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Create an idempotency key from a client-supplied token.
    ///
    /// # Errors
    /// This function will return an [Error::EmptyIdempotencyKey] if `key` is
    /// blank and an [Error::IdempotencyKeyTooLong] if it exceeds
    /// [MAX_IDEMPOTENCY_KEY_LENGTH].
    pub fn new(key: &str) -> Result<Self, Error> {
        let key = key.trim();

        if key.is_empty() {
            return Err(Error::EmptyIdempotencyKey);
        }

        let length = key.chars().count();
        if length > MAX_IDEMPOTENCY_KEY_LENGTH {
            return Err(Error::IdempotencyKeyTooLong(length));
        }

        Ok(Self(key.to_string()))
    }

    /// Generate a fresh random key for a submission without a client-supplied
    /// one.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create an idempotency key without validation.
    ///
    /// The caller should ensure that the string is not blank.
    pub fn new_unchecked(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl AsRef<str> for IdempotencyKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single recorded expense.
///
/// Expenses are append-only: once persisted they are never updated or
/// deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    /// The unique ID of the expense, assigned once at creation.
    pub id: Uuid,
    /// The token identifying the logical submission that created this
    /// expense.
    pub idempotency_key: IdempotencyKey,
    /// How much money was spent.
    pub amount: Amount,
    /// The category the expense belongs to.
    pub category: CategoryName,
    /// Optional text describing what the expense was for.
    pub description: Option<String>,
    /// The date the expense was incurred.
    pub date: Date,
    /// When the expense was persisted. Assigned by the store.
    pub created_at: OffsetDateTime,
}

/// A validated expense submission that has not been persisted yet.
///
/// Constructing one is the validation boundary: the creation protocol only
/// ever sees well-formed input.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExpense {
    /// The token identifying this logical submission.
    pub idempotency_key: IdempotencyKey,
    /// How much money was spent.
    pub amount: Amount,
    /// The category the expense belongs to.
    pub category: CategoryName,
    /// Optional text describing what the expense was for.
    pub description: Option<String>,
    /// The date the expense was incurred.
    pub date: Date,
}

impl NewExpense {
    /// Create a new expense submission.
    ///
    /// # Errors
    /// This function will return an [Error::DescriptionTooLong] if the
    /// description exceeds [MAX_DESCRIPTION_LENGTH].
    pub fn new(
        idempotency_key: IdempotencyKey,
        amount: Amount,
        category: CategoryName,
        description: Option<String>,
        date: Date,
    ) -> Result<Self, Error> {
        if let Some(ref description) = description {
            let length = description.graphemes(true).count();

            if length > MAX_DESCRIPTION_LENGTH {
                return Err(Error::DescriptionTooLong(length));
            }
        }

        Ok(Self {
            idempotency_key,
            amount,
            category,
            description,
            date,
        })
    }
}
