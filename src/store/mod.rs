//! The ledger store collaborator: persistence for accounts and
//! transactions.
//!
//! Every call is atomic on its own, but there is no way to group calls
//! into one transaction. Callers that need multi-step consistency — the
//! [DPS deletion saga](crate::dps::DpsManager::delete_with_transfer) in
//! particular — have to handle partial failure themselves.

mod memory;

pub use memory::MemoryLedgerStore;

use crate::{
    Error,
    account::{Account, AccountId, AccountUpdate, NewAccount},
    transaction::{NewTransaction, Transaction},
};

/// Handles the persistence of accounts and transactions.
///
/// Implementations are expected to be strongly consistent per call
/// (read-after-write within a single call), to surface their own failure
/// messages verbatim through [Error::Store], and to cascade-delete an
/// account's transactions when the account is deleted.
pub trait LedgerStore {
    /// Retrieve every account.
    fn list_accounts(&self) -> impl Future<Output = Result<Vec<Account>, Error>>;

    /// Retrieve a single account, or `None` if the ID is unknown.
    fn get_account(&self, id: AccountId) -> impl Future<Output = Result<Option<Account>, Error>>;

    /// Create a new account and return it with its assigned ID.
    fn create_account(&self, fields: NewAccount) -> impl Future<Output = Result<Account, Error>>;

    /// Apply a partial update to an account.
    fn update_account(
        &self,
        id: AccountId,
        update: AccountUpdate,
    ) -> impl Future<Output = Result<(), Error>>;

    /// Delete an account.
    ///
    /// The account's transactions are cascade-deleted, and any other
    /// account holding the deleted ID as its DPS savings link has that
    /// link cleared.
    fn delete_account(&self, id: AccountId) -> impl Future<Output = Result<(), Error>>;

    /// Retrieve transactions, optionally restricted to one account.
    fn list_transactions(
        &self,
        account_id: Option<AccountId>,
    ) -> impl Future<Output = Result<Vec<Transaction>, Error>>;

    /// Create a new transaction and return it with its assigned ID.
    ///
    /// Rejects negative amounts with [Error::NegativeAmount] and unknown
    /// accounts with [Error::AccountNotFound].
    fn create_transaction(
        &self,
        fields: NewTransaction,
    ) -> impl Future<Output = Result<Transaction, Error>>;
}
