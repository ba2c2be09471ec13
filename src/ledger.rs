//! The ledger calculator: derives account balances from transaction
//! history.
//!
//! Balances are always recomputable from scratch; the cached
//! `calculated_balance` on [Account] is convenience state refreshed by
//! [recalculate_balances], never the source of truth. All arithmetic is
//! done in [Decimal] with no intermediate rounding — amounts are only
//! rounded by [format_amount] at display time.

use std::collections::HashSet;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::{
    account::{Account, AccountId},
    transaction::{Transaction, TransactionId},
};

/// One row of a running-balance statement.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    /// The transaction this row describes.
    pub transaction_id: TransactionId,
    /// The logical date of the transaction.
    pub date: time::Date,
    /// The account balance after applying the transaction.
    pub balance_after: Decimal,
}

/// The current balance of `account`: its initial balance plus the signed
/// sum of its transactions.
///
/// Transactions belonging to other accounts are ignored, so the full
/// transaction set can be passed in. Summation is commutative, so the
/// result does not depend on the order of `transactions`.
pub fn current_balance(account: &Account, transactions: &[Transaction]) -> Decimal {
    transactions
        .iter()
        .filter(|transaction| transaction.account_id == account.id)
        .fold(account.initial_balance, |balance, transaction| {
            balance + transaction.signed_amount()
        })
}

/// The running-balance ledger for `account`, ordered for statements and
/// exports.
///
/// Transactions are sorted ascending by logical date, with ties broken by
/// `created_at` ascending (the sort is stable, so full ties keep their
/// input order). The last entry's `balance_after` always equals
/// [current_balance] for the same inputs, and rerunning with the same
/// inputs yields an identical ledger.
pub fn running_balances(account: &Account, transactions: &[Transaction]) -> Vec<LedgerEntry> {
    let mut own_transactions: Vec<&Transaction> = transactions
        .iter()
        .filter(|transaction| transaction.account_id == account.id)
        .collect();
    own_transactions.sort_by(|a, b| a.date.cmp(&b.date).then(a.created_at.cmp(&b.created_at)));

    let mut balance = account.initial_balance;
    own_transactions
        .into_iter()
        .map(|transaction| {
            balance += transaction.signed_amount();
            LedgerEntry {
                transaction_id: transaction.id,
                date: transaction.date,
                balance_after: balance,
            }
        })
        .collect()
}

/// Refresh the cached `calculated_balance` of every account from scratch.
///
/// Transactions that reference an unknown account are orphaned data: they
/// are excluded from every ledger and logged as a data-integrity warning
/// rather than raised as an error.
pub fn recalculate_balances(accounts: &mut [Account], transactions: &[Transaction]) {
    let known_ids: HashSet<AccountId> = accounts.iter().map(|account| account.id).collect();

    for transaction in transactions {
        if !known_ids.contains(&transaction.account_id) {
            tracing::warn!(
                transaction_id = transaction.id,
                account_id = transaction.account_id,
                "orphaned transaction references an unknown account, excluding from ledger",
            );
        }
    }

    for account in accounts.iter_mut() {
        account.calculated_balance = current_balance(account, transactions);
    }
}

/// Format an amount with exactly two fractional digits, rounding the
/// midpoint away from zero.
///
/// This is the only place amounts are rounded; intermediate sums keep
/// full precision.
pub fn format_amount(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

    // Rounding only lowers the scale; the format width pads values like
    // `13` or `13.5` out to two digits.
    format!("{rounded:.2}")
}
