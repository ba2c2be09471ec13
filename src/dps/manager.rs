//! Orchestrates the DPS plan lifecycle against a [LedgerStore].

use std::{
    collections::HashSet,
    sync::{Mutex, MutexGuard},
};

use time::OffsetDateTime;

use crate::{
    Error,
    account::{Account, AccountId, AccountType, AccountUpdate, DpsAmountType, NewAccount},
    ledger,
    store::LedgerStore,
    transaction::{NewTransaction, TransactionType},
};

use super::{
    config::DpsConfig,
    saga::{DpsDeleteError, DpsDeleteRequest, DpsDeletionReport, StepStatus, TransferDestination},
};

/// The tag placed on the synthetic transfer created when a plan is
/// retired.
pub(crate) const DPS_DELETION_TAG: &str = "dps_deletion";

/// Manages DPS plans: enabling, disabling, and the delete-with-transfer
/// saga.
///
/// The manager holds a same-process re-entrancy set keyed by savings
/// account ID so the deletion saga can never run twice concurrently for
/// the same sub-account — deleting an already-deleted account must not
/// trigger a second credit.
#[derive(Debug)]
pub struct DpsManager<S: LedgerStore> {
    store: S,
    deletions_in_flight: Mutex<HashSet<AccountId>>,
}

impl<S: LedgerStore> DpsManager<S> {
    /// Create a manager over `store`.
    pub fn new(store: S) -> Self {
        Self {
            store,
            deletions_in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// The underlying ledger store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create an account with a DPS plan enabled from the start.
    ///
    /// The savings sub-account is created and linked as part of the same
    /// flow, mirroring [enable](Self::enable) on an existing account.
    pub async fn create_with_dps(
        &self,
        fields: NewAccount,
        config: DpsConfig,
    ) -> Result<Account, Error> {
        config.validate()?;
        let parent = self.store.create_account(fields).await?;

        self.enable(parent.id, config).await
    }

    /// Enable a DPS plan on `parent_id`, transitioning it from `NoDPS` to
    /// `DPSEnabled`.
    ///
    /// Creates a savings sub-account in the parent's currency and links
    /// it, or reuses a sub-account that is still linked from an earlier
    /// plan (resetting its starting balance). Returns the parent as
    /// stored after the update.
    pub async fn enable(&self, parent_id: AccountId, config: DpsConfig) -> Result<Account, Error> {
        config.validate()?;
        let parent = self
            .store
            .get_account(parent_id)
            .await?
            .ok_or(Error::AccountNotFound(parent_id))?;

        let savings_id = match parent.dps_savings_account_id {
            Some(existing) if existing == parent.id => {
                return Err(Error::SelfLinkedDps(parent.id));
            }
            Some(existing) => {
                tracing::debug!(
                    parent_id = parent.id,
                    savings_id = existing,
                    "reusing linked DPS savings account",
                );
                self.store
                    .update_account(
                        existing,
                        AccountUpdate {
                            initial_balance: Some(config.initial_balance),
                            ..AccountUpdate::default()
                        },
                    )
                    .await?;
                existing
            }
            None => {
                let savings = self
                    .store
                    .create_account(NewAccount {
                        name: format!("{} (DPS)", parent.name),
                        account_type: AccountType::Savings,
                        currency: parent.currency.clone(),
                        description: format!("DPS account for {}", parent.name),
                        initial_balance: config.initial_balance,
                        is_active: true,
                        position: None,
                    })
                    .await?;
                tracing::debug!(
                    parent_id = parent.id,
                    savings_id = savings.id,
                    "created DPS savings account",
                );
                savings.id
            }
        };

        // The stored amount follows the amount type; monthly plans with a
        // custom amount validate the figure but do not persist it.
        let fixed_amount = match config.amount_type {
            DpsAmountType::Fixed => config.fixed_amount,
            DpsAmountType::Custom => None,
        };

        self.store
            .update_account(
                parent.id,
                AccountUpdate {
                    has_dps: Some(true),
                    dps_type: Some(Some(config.dps_type)),
                    dps_amount_type: Some(Some(config.amount_type)),
                    dps_fixed_amount: Some(fixed_amount),
                    dps_savings_account_id: Some(Some(savings_id)),
                    ..AccountUpdate::default()
                },
            )
            .await?;

        self.store
            .get_account(parent.id)
            .await?
            .ok_or(Error::AccountNotFound(parent.id))
    }

    /// Quick-disable: clear the DPS fields on the parent without deleting
    /// the savings sub-account or moving its funds.
    ///
    /// Destructive in the sense that the plan configuration is lost, so
    /// callers should confirm with the user first. The sub-account and
    /// its balance survive and can be re-linked by a later
    /// [enable](Self::enable) only through a fresh sub-account — the link
    /// itself is cleared here.
    pub async fn disable(&self, parent_id: AccountId) -> Result<(), Error> {
        let parent = self
            .store
            .get_account(parent_id)
            .await?
            .ok_or(Error::AccountNotFound(parent_id))?;
        if !parent.has_dps {
            return Err(Error::DpsNotEnabled(parent_id));
        }

        self.store
            .update_account(parent_id, AccountUpdate::clear_dps())
            .await
    }

    /// Take the dialog-open snapshot for a deletion.
    ///
    /// The returned request captures the sub-account's identity, currency
    /// and balance at this moment;
    /// [delete_with_transfer](Self::delete_with_transfer) transfers exactly
    /// this snapshot. The balance is recomputed from the transaction
    /// history, not read from the cached field.
    pub async fn prepare_delete(&self, parent_id: AccountId) -> Result<DpsDeleteRequest, Error> {
        let parent = self
            .store
            .get_account(parent_id)
            .await?
            .ok_or(Error::AccountNotFound(parent_id))?;
        let dps_account_id = parent
            .dps_savings_account_id
            .ok_or(Error::DpsNotEnabled(parent_id))?;
        if dps_account_id == parent.id {
            return Err(Error::SelfLinkedDps(parent.id));
        }

        let dps_account = self
            .store
            .get_account(dps_account_id)
            .await?
            .ok_or(Error::AccountNotFound(dps_account_id))?;
        let transactions = self.store.list_transactions(Some(dps_account_id)).await?;
        let balance = ledger::current_balance(&dps_account, &transactions);

        Ok(DpsDeleteRequest {
            parent_id,
            dps_account_id,
            dps_account_name: dps_account.name,
            balance,
            currency: dps_account.currency,
        })
    }

    /// Retire a DPS plan, moving the captured balance to `destination`.
    ///
    /// The flow is a saga over independent store calls:
    ///
    /// 1. Resolve the destination account (the parent, or a same-currency
    ///    cash wallet created on demand).
    /// 2. Clear the DPS fields on the parent, and
    /// 3. delete the savings sub-account — issued concurrently, both
    ///    settled before any credit.
    /// 4. Credit the snapshot balance to the destination as a synthetic
    ///    income transaction tagged `dps_deletion`.
    /// 5. Refresh cached balances; runs last on every path that got past
    ///    the preconditions, so callers never display stale state.
    ///
    /// If step 2 or 3 fails the credit is never attempted and no rollback
    /// is issued; the returned [DpsDeleteError] carries the per-step
    /// report needed for manual reconciliation. A second invocation for
    /// the same sub-account while one is in flight is rejected
    /// immediately with [Error::DeletionInFlight].
    pub async fn delete_with_transfer(
        &self,
        request: DpsDeleteRequest,
        destination: TransferDestination,
    ) -> Result<DpsDeletionReport, DpsDeleteError> {
        let mut report = DpsDeletionReport::not_started(&request);

        let _guard = match self.begin_deletion(request.dps_account_id) {
            Ok(guard) => guard,
            Err(source) => return Err(DpsDeleteError { report, source }),
        };

        // Preconditions: the parent must still exist and still be linked
        // to the snapshot's sub-account. Nothing has been written yet, so
        // failures here skip the refresh.
        let parent = match self.store.get_account(request.parent_id).await {
            Ok(Some(parent)) => parent,
            Ok(None) => {
                return Err(DpsDeleteError {
                    report,
                    source: Error::AccountNotFound(request.parent_id),
                });
            }
            Err(source) => return Err(DpsDeleteError { report, source }),
        };
        if parent.dps_savings_account_id != Some(request.dps_account_id) {
            return Err(DpsDeleteError {
                report,
                source: Error::DpsNotLinked(parent.id, request.dps_account_id),
            });
        }

        // Step 1: resolve the destination.
        let destination_account = match self.resolve_destination(&parent, &request, destination).await
        {
            Ok(account) => {
                report.resolve_destination = StepStatus::Ok;
                report.destination_account_id = Some(account.id);
                account
            }
            Err(source) => {
                report.resolve_destination = StepStatus::Failed(source.to_string());
                report.refresh = self.run_refresh().await;
                return Err(DpsDeleteError { report, source });
            }
        };

        // Steps 2 and 3 target independent records, so they are issued
        // together; both must settle before any credit.
        let (clear_result, delete_result) = tokio::join!(
            self.store
                .update_account(parent.id, AccountUpdate::clear_dps()),
            self.store.delete_account(request.dps_account_id),
        );
        report.clear_parent = step_status(&clear_result);
        report.delete_dps_account = step_status(&delete_result);

        if let Err(source) = clear_result.and(delete_result) {
            tracing::warn!(
                parent_id = parent.id,
                dps_account_id = request.dps_account_id,
                clear_parent = ?report.clear_parent,
                delete_dps_account = ?report.delete_dps_account,
                "DPS deletion stopped before the credit; manual reconciliation may be required",
            );
            report.refresh = self.run_refresh().await;
            return Err(DpsDeleteError { report, source });
        }

        // Step 4: credit the snapshot to the destination.
        let description = match destination {
            TransferDestination::MainAccount => {
                "DPS balance returned on DPS account deletion".to_owned()
            }
            TransferDestination::CashWallet => {
                format!("DPS balance transferred from {}", request.dps_account_name)
            }
        };
        let credit = NewTransaction {
            account_id: destination_account.id,
            kind: TransactionType::Income,
            amount: request.balance,
            category: "DPS".to_owned(),
            description,
            date: OffsetDateTime::now_utc().date(),
            tags: [DPS_DELETION_TAG.to_owned()].into(),
        };
        match self.store.create_transaction(credit).await {
            Ok(transaction) => {
                report.credit_destination = StepStatus::Ok;
                report.credited_amount = Some(transaction.amount);
            }
            Err(source) => {
                report.credit_destination = StepStatus::Failed(source.to_string());
                tracing::warn!(
                    destination_account_id = destination_account.id,
                    amount = %request.balance,
                    "DPS balance credit failed after the sub-account was deleted; \
                     manual reconciliation required",
                );
                report.refresh = self.run_refresh().await;
                return Err(DpsDeleteError { report, source });
            }
        }

        // Step 5 runs last, always.
        report.refresh = self.run_refresh().await;
        tracing::info!(
            parent_id = parent.id,
            dps_account_id = request.dps_account_id,
            destination_account_id = destination_account.id,
            amount = %request.balance,
            "DPS plan retired and balance transferred",
        );

        Ok(report)
    }

    /// Recompute every account's cached balance from the transaction
    /// history and persist the ones that drifted.
    ///
    /// Returns the accounts with fresh caches.
    pub async fn refresh_balances(&self) -> Result<Vec<Account>, Error> {
        let stored = self.store.list_accounts().await?;
        let transactions = self.store.list_transactions(None).await?;

        let mut accounts = stored.clone();
        ledger::recalculate_balances(&mut accounts, &transactions);

        for (before, after) in stored.iter().zip(&accounts) {
            if before.calculated_balance != after.calculated_balance {
                self.store
                    .update_account(
                        after.id,
                        AccountUpdate {
                            calculated_balance: Some(after.calculated_balance),
                            ..AccountUpdate::default()
                        },
                    )
                    .await?;
            }
        }

        Ok(accounts)
    }

    async fn resolve_destination(
        &self,
        parent: &Account,
        request: &DpsDeleteRequest,
        destination: TransferDestination,
    ) -> Result<Account, Error> {
        match destination {
            TransferDestination::MainAccount => Ok(parent.clone()),
            TransferDestination::CashWallet => {
                let accounts = self.store.list_accounts().await?;
                let existing = accounts.into_iter().find(|account| {
                    account.account_type == AccountType::Cash
                        && account.currency == request.currency
                        && account.is_active
                        && account.id != request.dps_account_id
                });
                if let Some(wallet) = existing {
                    return Ok(wallet);
                }

                tracing::info!(
                    currency = %request.currency,
                    "no cash wallet in this currency, creating one",
                );
                self.store
                    .create_account(NewAccount {
                        name: "Cash Wallet".to_owned(),
                        account_type: AccountType::Cash,
                        currency: request.currency.clone(),
                        description: "Default cash account for tracking physical money".to_owned(),
                        initial_balance: rust_decimal::Decimal::ZERO,
                        is_active: true,
                        position: None,
                    })
                    .await
            }
        }
    }

    async fn run_refresh(&self) -> StepStatus {
        match self.refresh_balances().await {
            Ok(_) => StepStatus::Ok,
            Err(error) => {
                tracing::warn!(%error, "balance refresh after DPS deletion failed");
                StepStatus::Failed(error.to_string())
            }
        }
    }

    fn begin_deletion(&self, dps_account_id: AccountId) -> Result<DeletionGuard<'_>, Error> {
        let mut in_flight = self.lock_in_flight();
        if !in_flight.insert(dps_account_id) {
            return Err(Error::DeletionInFlight(dps_account_id));
        }

        Ok(DeletionGuard {
            set: &self.deletions_in_flight,
            dps_account_id,
        })
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, HashSet<AccountId>> {
        self.deletions_in_flight
            .lock()
            .expect("DPS in-flight set lock poisoned")
    }
}

fn step_status(result: &Result<(), Error>) -> StepStatus {
    match result {
        Ok(()) => StepStatus::Ok,
        Err(error) => StepStatus::Failed(error.to_string()),
    }
}

/// Releases the in-flight entry on every exit path of the saga.
struct DeletionGuard<'a> {
    set: &'a Mutex<HashSet<AccountId>>,
    dps_account_id: AccountId,
}

impl Drop for DeletionGuard<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .expect("DPS in-flight set lock poisoned")
            .remove(&self.dps_account_id);
    }
}



#[cfg(test)]
mod delete_with_transfer_tests {
    use std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    };

    use rust_decimal::Decimal;
    use time::macros::date;
    use tokio::sync::Notify;

    use crate::{
        Error, ledger,
        account::{Account, AccountId, AccountType, AccountUpdate, NewAccount},
        dps::{DpsConfig, StepStatus, TransferDestination},
        store::{LedgerStore, MemoryLedgerStore},
        transaction::{NewTransaction, Transaction, TransactionType},
    };

    use super::DpsManager;

    /// Sets up the worked example: a USD cash account with balance 130
    /// (100 initial, +50 income, -20 expense) and a monthly DPS plan
    /// whose sub-account holds 90 after three 30.00 deposits.
    async fn worked_example(manager: &DpsManager<impl LedgerStore>) -> (Account, AccountId) {
        let parent = manager
            .store()
            .create_account(NewAccount {
                initial_balance: Decimal::new(10000, 2),
                ..NewAccount::new("Account A", AccountType::Cash, "USD")
            })
            .await
            .unwrap();
        for (kind, amount) in [
            (TransactionType::Income, Decimal::new(5000, 2)),
            (TransactionType::Expense, Decimal::new(2000, 2)),
        ] {
            manager
                .store()
                .create_transaction(NewTransaction::new(
                    parent.id,
                    kind,
                    amount,
                    date!(2024 - 06 - 01),
                ))
                .await
                .unwrap();
        }

        let parent = manager
            .enable(parent.id, DpsConfig::monthly(Decimal::new(3000, 2)))
            .await
            .unwrap();
        let savings_id = parent.dps_savings_account_id.unwrap();
        for day in 1..=3u8 {
            manager
                .store()
                .create_transaction(NewTransaction::new(
                    savings_id,
                    TransactionType::Income,
                    Decimal::new(3000, 2),
                    date!(2024 - 07 - 01).replace_day(day).unwrap(),
                ))
                .await
                .unwrap();
        }

        (parent, savings_id)
    }

    fn credit_of(transactions: &[Transaction]) -> &Transaction {
        transactions
            .iter()
            .find(|transaction| transaction.tags.contains(super::DPS_DELETION_TAG))
            .expect("expected a dps_deletion transfer")
    }

    #[tokio::test]
    async fn transfer_to_main_account_conserves_funds() {
        let manager = DpsManager::new(MemoryLedgerStore::new());
        let (parent, savings_id) = worked_example(&manager).await;

        let request = manager.prepare_delete(parent.id).await.unwrap();
        assert_eq!(request.balance, Decimal::new(9000, 2));

        let report = manager
            .delete_with_transfer(request, TransferDestination::MainAccount)
            .await
            .unwrap();

        assert_eq!(report.destination_account_id, Some(parent.id));
        assert_eq!(report.credited_amount, Some(Decimal::new(9000, 2)));
        assert!(report.resolve_destination.is_ok());
        assert!(report.clear_parent.is_ok());
        assert!(report.delete_dps_account.is_ok());
        assert!(report.credit_destination.is_ok());
        assert!(report.refresh.is_ok());

        // The sub-account is gone and the parent's plan is cleared.
        let accounts = manager.store().list_accounts().await.unwrap();
        assert!(!accounts.iter().any(|account| account.id == savings_id));
        let parent = accounts
            .iter()
            .find(|account| account.id == parent.id)
            .unwrap();
        assert!(!parent.has_dps);
        assert_eq!(parent.dps_savings_account_id, None);

        // Conservation, recomputed independently of the cached field:
        // 130 before plus the captured 90.
        let transactions = manager.store().list_transactions(None).await.unwrap();
        assert_eq!(
            ledger::current_balance(parent, &transactions),
            Decimal::new(22000, 2)
        );
        // The refresh also brought the cache in line.
        assert_eq!(parent.calculated_balance, Decimal::new(22000, 2));

        let credit = credit_of(&transactions);
        assert_eq!(credit.kind, TransactionType::Income);
        assert_eq!(credit.category, "DPS");
        assert_eq!(credit.account_id, parent.id);
    }

    #[tokio::test]
    async fn transfer_to_cash_wallet_finds_an_existing_wallet() {
        let manager = DpsManager::new(MemoryLedgerStore::new());
        let wallet = manager
            .store()
            .create_account(NewAccount::new("Pocket Money", AccountType::Cash, "USD"))
            .await
            .unwrap();
        let parent = manager
            .create_with_dps(
                NewAccount::new("Everyday", AccountType::Bank, "USD"),
                DpsConfig::monthly(Decimal::new(3000, 2)),
            )
            .await
            .unwrap();
        let savings_id = parent.dps_savings_account_id.unwrap();
        manager
            .store()
            .create_transaction(NewTransaction::new(
                savings_id,
                TransactionType::Income,
                Decimal::new(3000, 2),
                date!(2024 - 07 - 01),
            ))
            .await
            .unwrap();

        let request = manager.prepare_delete(parent.id).await.unwrap();
        let report = manager
            .delete_with_transfer(request, TransferDestination::CashWallet)
            .await
            .unwrap();

        assert_eq!(report.destination_account_id, Some(wallet.id));
        let transactions = manager
            .store()
            .list_transactions(Some(wallet.id))
            .await
            .unwrap();
        let credit = credit_of(&transactions);
        assert_eq!(credit.amount, Decimal::new(3000, 2));
        assert!(credit.description.contains("Everyday (DPS)"));
    }

    #[tokio::test]
    async fn transfer_to_cash_wallet_creates_one_when_missing() {
        let manager = DpsManager::new(MemoryLedgerStore::new());
        // A cash account exists, but in the wrong currency.
        manager
            .store()
            .create_account(NewAccount::new("Euros", AccountType::Cash, "EUR"))
            .await
            .unwrap();
        let parent = manager
            .create_with_dps(
                NewAccount::new("Everyday", AccountType::Bank, "USD"),
                DpsConfig::flexible(),
            )
            .await
            .unwrap();

        let request = manager.prepare_delete(parent.id).await.unwrap();
        let report = manager
            .delete_with_transfer(request, TransferDestination::CashWallet)
            .await
            .unwrap();

        let wallet = manager
            .store()
            .get_account(report.destination_account_id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(wallet.name, "Cash Wallet");
        assert_eq!(wallet.account_type, AccountType::Cash);
        assert_eq!(wallet.currency, "USD");
        assert_eq!(wallet.initial_balance, Decimal::ZERO);
    }

    #[tokio::test]
    async fn the_snapshot_is_transferred_despite_balance_drift() {
        let manager = DpsManager::new(MemoryLedgerStore::new());
        let (parent, savings_id) = worked_example(&manager).await;

        let request = manager.prepare_delete(parent.id).await.unwrap();
        // A deposit lands between dialog-open and confirm.
        manager
            .store()
            .create_transaction(NewTransaction::new(
                savings_id,
                TransactionType::Income,
                Decimal::new(1000, 2),
                date!(2024 - 07 - 15),
            ))
            .await
            .unwrap();

        let report = manager
            .delete_with_transfer(request, TransferDestination::MainAccount)
            .await
            .unwrap();

        // The captured 90 is credited, not the live 100.
        assert_eq!(report.credited_amount, Some(Decimal::new(9000, 2)));
    }

    #[tokio::test]
    async fn failed_parent_clear_skips_the_credit() {
        let manager = DpsManager::new(FailingStore::new().failing_update_account());
        manager.store().disarm();
        let (parent, savings_id) = worked_example(&manager).await;
        manager.store().arm();

        let request = manager.prepare_delete(parent.id).await.unwrap();
        let error = manager
            .delete_with_transfer(request, TransferDestination::MainAccount)
            .await
            .unwrap_err();

        assert_eq!(
            error.source,
            Error::Store("injected update failure".to_owned())
        );
        assert!(matches!(error.report.clear_parent, StepStatus::Failed(_)));
        // The concurrently issued delete still went through: partial
        // state, no rollback.
        assert!(error.report.delete_dps_account.is_ok());
        assert_eq!(error.report.credit_destination, StepStatus::Skipped);
        assert_eq!(
            manager.store().get_account(savings_id).await.unwrap(),
            None
        );
        // No synthetic credit exists anywhere.
        let transactions = manager.store().list_transactions(None).await.unwrap();
        assert!(
            !transactions
                .iter()
                .any(|transaction| transaction.tags.contains(super::DPS_DELETION_TAG))
        );
    }

    #[tokio::test]
    async fn failed_sub_account_delete_skips_the_credit_but_still_refreshes() {
        let manager = DpsManager::new(FailingStore::new().failing_delete_account());
        manager.store().disarm();
        let (parent, savings_id) = worked_example(&manager).await;
        manager.store().arm();

        let request = manager.prepare_delete(parent.id).await.unwrap();
        let error = manager
            .delete_with_transfer(request, TransferDestination::MainAccount)
            .await
            .unwrap_err();

        assert!(error.report.clear_parent.is_ok());
        assert!(matches!(
            error.report.delete_dps_account,
            StepStatus::Failed(_)
        ));
        assert_eq!(error.report.credit_destination, StepStatus::Skipped);
        // Step 5 ran anyway, so the caller is not looking at stale state.
        assert!(error.report.refresh.is_ok());
        // The sub-account survived its failed delete.
        assert!(
            manager
                .store()
                .get_account(savings_id)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn failed_credit_is_reported_with_the_store_message() {
        let manager = DpsManager::new(FailingStore::new().failing_create_transaction());
        manager.store().disarm();
        let (parent, _savings_id) = worked_example(&manager).await;
        manager.store().arm();

        let request = manager.prepare_delete(parent.id).await.unwrap();
        let error = manager
            .delete_with_transfer(request, TransferDestination::MainAccount)
            .await
            .unwrap_err();

        assert!(error.report.clear_parent.is_ok());
        assert!(error.report.delete_dps_account.is_ok());
        assert_eq!(
            error.source,
            Error::Store("injected create failure".to_owned())
        );
        assert!(matches!(
            error.report.credit_destination,
            StepStatus::Failed(_)
        ));
        assert!(error.report.refresh.is_ok());
    }

    #[tokio::test]
    async fn stale_links_are_rejected_before_any_write() {
        let manager = DpsManager::new(MemoryLedgerStore::new());
        let (parent, _savings_id) = worked_example(&manager).await;

        let request = manager.prepare_delete(parent.id).await.unwrap();
        // The plan is disabled after the dialog opened.
        manager.disable(parent.id).await.unwrap();

        let error = manager
            .delete_with_transfer(request.clone(), TransferDestination::MainAccount)
            .await
            .unwrap_err();

        assert_eq!(
            error.source,
            Error::DpsNotLinked(parent.id, request.dps_account_id)
        );
        assert_eq!(error.report.resolve_destination, StepStatus::Skipped);
    }

    #[tokio::test]
    async fn concurrent_deletions_of_the_same_sub_account_are_rejected() {
        let store = GatedStore {
            inner: MemoryLedgerStore::new(),
            entered_delete: Notify::new(),
            release_delete: Notify::new(),
        };
        let manager = Arc::new(DpsManager::new(store));
        let parent = manager
            .create_with_dps(
                NewAccount::new("Everyday", AccountType::Bank, "USD"),
                DpsConfig::flexible(),
            )
            .await
            .unwrap();
        let request = manager.prepare_delete(parent.id).await.unwrap();

        let first = {
            let manager = Arc::clone(&manager);
            let request = request.clone();
            tokio::spawn(async move {
                manager
                    .delete_with_transfer(request, TransferDestination::MainAccount)
                    .await
            })
        };
        // Wait until the first saga is parked inside its delete call,
        // then try again while it is still in flight.
        manager.store().entered_delete.notified().await;
        let second = manager
            .delete_with_transfer(request.clone(), TransferDestination::MainAccount)
            .await;
        assert_eq!(
            second.unwrap_err().source,
            Error::DeletionInFlight(request.dps_account_id)
        );

        manager.store().release_delete.notify_one();
        let first = first.await.unwrap();
        assert!(first.is_ok());

        // The guard is released once the saga settles; a rerun now fails
        // on the stale link, not on the busy flag.
        let rerun = manager
            .delete_with_transfer(request.clone(), TransferDestination::MainAccount)
            .await
            .unwrap_err();
        assert_ne!(
            rerun.source,
            Error::DeletionInFlight(request.dps_account_id)
        );
    }

    #[tokio::test]
    async fn zero_balance_plans_still_record_the_transfer() {
        let manager = DpsManager::new(MemoryLedgerStore::new());
        let parent = manager
            .create_with_dps(
                NewAccount::new("Everyday", AccountType::Bank, "USD"),
                DpsConfig::flexible(),
            )
            .await
            .unwrap();

        let request = manager.prepare_delete(parent.id).await.unwrap();
        assert_eq!(request.balance, Decimal::ZERO);
        let report = manager
            .delete_with_transfer(request, TransferDestination::MainAccount)
            .await
            .unwrap();

        assert_eq!(report.credited_amount, Some(Decimal::ZERO));
    }

    /// Wraps a memory store and fails selected calls with a fixed
    /// message while armed, so fixtures can be built through the same
    /// store that later fails.
    struct FailingStore {
        inner: MemoryLedgerStore,
        armed: AtomicBool,
        fail_update_account: bool,
        fail_delete_account: bool,
        fail_create_transaction: bool,
    }

    impl FailingStore {
        fn new() -> Self {
            Self {
                inner: MemoryLedgerStore::new(),
                armed: AtomicBool::new(true),
                fail_update_account: false,
                fail_delete_account: false,
                fail_create_transaction: false,
            }
        }

        fn failing_update_account(mut self) -> Self {
            self.fail_update_account = true;
            self
        }

        fn failing_delete_account(mut self) -> Self {
            self.fail_delete_account = true;
            self
        }

        fn failing_create_transaction(mut self) -> Self {
            self.fail_create_transaction = true;
            self
        }

        fn arm(&self) {
            self.armed.store(true, Ordering::SeqCst);
        }

        fn disarm(&self) {
            self.armed.store(false, Ordering::SeqCst);
        }

        fn should_fail(&self, flag: bool) -> bool {
            flag && self.armed.load(Ordering::SeqCst)
        }
    }

    impl LedgerStore for FailingStore {
        async fn list_accounts(&self) -> Result<Vec<Account>, Error> {
            self.inner.list_accounts().await
        }

        async fn get_account(&self, id: AccountId) -> Result<Option<Account>, Error> {
            self.inner.get_account(id).await
        }

        async fn create_account(&self, fields: NewAccount) -> Result<Account, Error> {
            self.inner.create_account(fields).await
        }

        async fn update_account(&self, id: AccountId, update: AccountUpdate) -> Result<(), Error> {
            if self.should_fail(self.fail_update_account) {
                return Err(Error::Store("injected update failure".to_owned()));
            }
            self.inner.update_account(id, update).await
        }

        async fn delete_account(&self, id: AccountId) -> Result<(), Error> {
            if self.should_fail(self.fail_delete_account) {
                return Err(Error::Store("injected delete failure".to_owned()));
            }
            self.inner.delete_account(id).await
        }

        async fn list_transactions(
            &self,
            account_id: Option<AccountId>,
        ) -> Result<Vec<Transaction>, Error> {
            self.inner.list_transactions(account_id).await
        }

        async fn create_transaction(&self, fields: NewTransaction) -> Result<Transaction, Error> {
            if self.should_fail(self.fail_create_transaction) {
                return Err(Error::Store("injected create failure".to_owned()));
            }
            self.inner.create_transaction(fields).await
        }
    }

    /// A store that parks inside `delete_account` until released, so a
    /// test can observe the saga mid-flight.
    struct GatedStore {
        inner: MemoryLedgerStore,
        entered_delete: Notify,
        release_delete: Notify,
    }

    impl LedgerStore for GatedStore {
        async fn list_accounts(&self) -> Result<Vec<Account>, Error> {
            self.inner.list_accounts().await
        }

        async fn get_account(&self, id: AccountId) -> Result<Option<Account>, Error> {
            self.inner.get_account(id).await
        }

        async fn create_account(&self, fields: NewAccount) -> Result<Account, Error> {
            self.inner.create_account(fields).await
        }

        async fn update_account(&self, id: AccountId, update: AccountUpdate) -> Result<(), Error> {
            self.inner.update_account(id, update).await
        }

        async fn delete_account(&self, id: AccountId) -> Result<(), Error> {
            self.entered_delete.notify_one();
            self.release_delete.notified().await;
            self.inner.delete_account(id).await
        }

        async fn list_transactions(
            &self,
            account_id: Option<AccountId>,
        ) -> Result<Vec<Transaction>, Error> {
            self.inner.list_transactions(account_id).await
        }

        async fn create_transaction(&self, fields: NewTransaction) -> Result<Transaction, Error> {
            self.inner.create_transaction(fields).await
        }
    }
}
