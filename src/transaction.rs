//! The transaction model.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::account::AccountId;

/// Alias for the integer type used for transaction IDs.
pub type TransactionId = i64;

/// Whether a transaction adds money to its account or removes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Money coming into the account.
    Income,
    /// Money leaving the account.
    Expense,
}

/// A single ledger entry against an account.
///
/// Amounts are non-negative; the sign applied to the balance comes from
/// [kind](Transaction::kind). Transactions are effectively immutable once
/// created — edits only stamp `updated_at` — and disappear when their
/// account is deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The account this transaction belongs to.
    pub account_id: AccountId,
    /// Whether this is income or an expense.
    pub kind: TransactionType,
    /// The unsigned amount of money moved.
    pub amount: Decimal,
    /// The user-assigned category, e.g. `"Groceries"` or `"DPS"`.
    pub category: String,
    /// A text description of what the transaction was for.
    pub description: String,
    /// The logical date the transaction happened on.
    pub date: Date,
    /// When the record was created.
    pub created_at: OffsetDateTime,
    /// When the record was last edited, if ever.
    pub updated_at: Option<OffsetDateTime>,
    /// Free-form tags, e.g. `"dps_deletion"` on synthetic transfers.
    pub tags: BTreeSet<String>,
}

impl Transaction {
    /// The amount this transaction contributes to its account's balance:
    /// positive for income, negative for expenses.
    pub fn signed_amount(&self) -> Decimal {
        match self.kind {
            TransactionType::Income => self.amount,
            TransactionType::Expense => -self.amount,
        }
    }
}

/// The fields needed to create a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    /// The account the transaction belongs to.
    pub account_id: AccountId,
    /// Whether this is income or an expense.
    pub kind: TransactionType,
    /// The unsigned amount of money moved. Must not be negative.
    pub amount: Decimal,
    /// The user-assigned category.
    pub category: String,
    /// A text description of what the transaction was for.
    pub description: String,
    /// The logical date the transaction happened on.
    pub date: Date,
    /// Free-form tags.
    pub tags: BTreeSet<String>,
}

impl NewTransaction {
    /// Convenience constructor with an empty category, description and tag
    /// set.
    pub fn new(account_id: AccountId, kind: TransactionType, amount: Decimal, date: Date) -> Self {
        Self {
            account_id,
            kind,
            amount,
            category: String::new(),
            description: String::new(),
            date,
            tags: BTreeSet::new(),
        }
    }
}
