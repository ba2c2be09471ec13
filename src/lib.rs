//! Core ledger and savings-plan logic for the Balanze finance tracker.
//!
//! This library implements the parts of the tracker that carry real
//! invariants: deriving account balances from transaction history
//! ([`ledger`]), the multi-step DPS (recurring-deposit) lifecycle that must
//! move funds without losing them ([`dps`]), the pure filter/sort/search
//! pipeline that turns the account list into a display list ([`filter`]),
//! and manual position reordering ([`position`]).
//!
//! Persistence is delegated to a [`store::LedgerStore`] collaborator whose
//! calls are atomic per call only; there are no multi-call transactions,
//! which is why the DPS deletion flow is modelled as an explicit saga with
//! per-step outcomes.

#![warn(missing_docs)]

mod account;
mod transaction;

pub mod dps;
pub mod filter;
pub mod ledger;
pub mod position;
pub mod store;

pub use account::{
    Account, AccountId, AccountType, AccountUpdate, DpsAmountType, DpsType, NewAccount,
};
pub use transaction::{NewTransaction, Transaction, TransactionId, TransactionType};

use rust_decimal::Decimal;

/// The errors that may occur in the library.
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum Error {
    /// The account ID did not match any account in the store.
    #[error("account {0} could not be found")]
    AccountNotFound(AccountId),

    /// A fixed-amount DPS plan was configured without a deposit amount.
    #[error("a fixed-amount DPS plan requires a deposit amount")]
    MissingDpsAmount,

    /// The DPS deposit amount must be strictly positive.
    #[error("DPS deposit amount must be positive, got {0}")]
    NonPositiveDpsAmount(Decimal),

    /// A transaction was created with a negative amount.
    ///
    /// Amounts are unsigned; direction is carried by [TransactionType].
    #[error("transaction amounts cannot be negative, got {0}")]
    NegativeAmount(Decimal),

    /// A DPS operation was requested on an account that has no DPS plan.
    #[error("account {0} does not have DPS enabled")]
    DpsNotEnabled(AccountId),

    /// The DPS savings account in a deletion request is not the one linked
    /// to the parent account.
    ///
    /// The first ID is the parent, the second is the account that was
    /// claimed to be its DPS savings account.
    #[error("account {1} is not the DPS savings account linked to account {0}")]
    DpsNotLinked(AccountId, AccountId),

    /// An account was asked to serve as its own DPS savings account.
    #[error("account {0} cannot be linked to itself as a DPS savings account")]
    SelfLinkedDps(AccountId),

    /// A DPS deletion is already in flight for the same savings account.
    ///
    /// The caller should surface this as a busy condition; requests are
    /// rejected immediately, never queued.
    #[error("a DPS deletion is already in progress for account {0}")]
    DeletionInFlight(AccountId),

    /// The ledger store rejected a call.
    ///
    /// Carries the collaborator's raw message; the library never
    /// reinterprets store errors, it only decides whether to continue.
    #[error("ledger store error: {0}")]
    Store(String),
}
