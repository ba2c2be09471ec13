//! An in-memory ledger store.
//!
//! The reference implementation of [LedgerStore], used by the test suite
//! and small enough to read as documentation of the store contract. Each
//! method takes the inner lock once and releases it before returning, so
//! every call is atomic per call — exactly the guarantee (and the lack of
//! a stronger one) the real remote store provides.

use std::sync::Mutex;

use rust_decimal::Decimal;
use time::OffsetDateTime;

use crate::{
    Error,
    account::{Account, AccountId, AccountUpdate, NewAccount},
    transaction::{NewTransaction, Transaction, TransactionId},
};

use super::LedgerStore;

#[derive(Debug, Default)]
struct Inner {
    accounts: Vec<Account>,
    transactions: Vec<Transaction>,
    next_account_id: AccountId,
    next_transaction_id: TransactionId,
}

/// An in-memory [LedgerStore] backed by a mutex.
#[derive(Debug)]
pub struct MemoryLedgerStore {
    inner: Mutex<Inner>,
}

impl MemoryLedgerStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                accounts: Vec::new(),
                transactions: Vec::new(),
                next_account_id: 1,
                next_transaction_id: 1,
            }),
        }
    }

    /// Seed the store with existing records, continuing ID assignment
    /// after the largest seeded IDs.
    pub fn with_records(accounts: Vec<Account>, transactions: Vec<Transaction>) -> Self {
        let next_account_id = accounts.iter().map(|account| account.id).max().unwrap_or(0) + 1;
        let next_transaction_id = transactions
            .iter()
            .map(|transaction| transaction.id)
            .max()
            .unwrap_or(0)
            + 1;

        Self {
            inner: Mutex::new(Inner {
                accounts,
                transactions,
                next_account_id,
                next_transaction_id,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("ledger store lock poisoned")
    }
}

impl Default for MemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerStore for MemoryLedgerStore {
    async fn list_accounts(&self) -> Result<Vec<Account>, Error> {
        Ok(self.lock().accounts.clone())
    }

    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, Error> {
        Ok(self
            .lock()
            .accounts
            .iter()
            .find(|account| account.id == id)
            .cloned())
    }

    async fn create_account(&self, fields: NewAccount) -> Result<Account, Error> {
        let mut inner = self.lock();
        let id = inner.next_account_id;
        inner.next_account_id += 1;

        let account = Account {
            id,
            name: fields.name,
            account_type: fields.account_type,
            currency: fields.currency,
            description: fields.description,
            initial_balance: fields.initial_balance,
            calculated_balance: fields.initial_balance,
            is_active: fields.is_active,
            position: fields.position,
            has_dps: false,
            dps_type: None,
            dps_amount_type: None,
            dps_fixed_amount: None,
            dps_savings_account_id: None,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.accounts.push(account.clone());

        Ok(account)
    }

    async fn update_account(&self, id: AccountId, update: AccountUpdate) -> Result<(), Error> {
        let mut inner = self.lock();
        let account = inner
            .accounts
            .iter_mut()
            .find(|account| account.id == id)
            .ok_or(Error::AccountNotFound(id))?;

        update.apply(account);

        Ok(())
    }

    async fn delete_account(&self, id: AccountId) -> Result<(), Error> {
        let mut inner = self.lock();
        let before = inner.accounts.len();
        inner.accounts.retain(|account| account.id != id);
        if inner.accounts.len() == before {
            return Err(Error::AccountNotFound(id));
        }

        inner
            .transactions
            .retain(|transaction| transaction.account_id != id);
        for account in inner.accounts.iter_mut() {
            if account.dps_savings_account_id == Some(id) {
                account.dps_savings_account_id = None;
            }
        }

        Ok(())
    }

    async fn list_transactions(
        &self,
        account_id: Option<AccountId>,
    ) -> Result<Vec<Transaction>, Error> {
        let inner = self.lock();

        Ok(match account_id {
            Some(account_id) => inner
                .transactions
                .iter()
                .filter(|transaction| transaction.account_id == account_id)
                .cloned()
                .collect(),
            None => inner.transactions.clone(),
        })
    }

    async fn create_transaction(&self, fields: NewTransaction) -> Result<Transaction, Error> {
        if fields.amount < Decimal::ZERO {
            return Err(Error::NegativeAmount(fields.amount));
        }

        let mut inner = self.lock();
        if !inner
            .accounts
            .iter()
            .any(|account| account.id == fields.account_id)
        {
            return Err(Error::AccountNotFound(fields.account_id));
        }

        let id = inner.next_transaction_id;
        inner.next_transaction_id += 1;

        let transaction = Transaction {
            id,
            account_id: fields.account_id,
            kind: fields.kind,
            amount: fields.amount,
            category: fields.category,
            description: fields.description,
            date: fields.date,
            created_at: OffsetDateTime::now_utc(),
            updated_at: None,
            tags: fields.tags,
        };
        inner.transactions.push(transaction.clone());

        Ok(transaction)
    }
}
