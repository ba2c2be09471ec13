//! Value objects for the DPS deletion saga: the dialog-open snapshot, the
//! per-step report, and the saga error.

use rust_decimal::Decimal;

use crate::{Error, account::AccountId};

/// Where the retired plan's funds should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDestination {
    /// Credit the parent account the plan was attached to.
    MainAccount,
    /// Credit a cash account in the same currency, creating a
    /// `"Cash Wallet"` if none exists.
    CashWallet,
}

/// A snapshot of the DPS savings account taken when the confirmation
/// dialog opens.
///
/// The captured balance is the amount that will be transferred, even if
/// more transactions land on the sub-account between dialog-open and
/// confirm. Capturing once keeps a concurrent mutation from changing the
/// amount mid-flow; the trade-off is that late deposits are not picked up
/// (see DESIGN.md).
#[derive(Debug, Clone, PartialEq)]
pub struct DpsDeleteRequest {
    /// The parent account the plan is attached to.
    pub parent_id: AccountId,
    /// The savings sub-account about to be deleted.
    pub dps_account_id: AccountId,
    /// The sub-account's name, for the synthetic transfer description.
    pub dps_account_name: String,
    /// The sub-account balance at snapshot time, recomputed from its
    /// transaction history rather than read from the cached field.
    pub balance: Decimal,
    /// The sub-account's currency at snapshot time.
    pub currency: String,
}

/// The outcome of one saga step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    /// The step was never attempted because an earlier step failed.
    Skipped,
    /// The step completed.
    Ok,
    /// The step was attempted and the store rejected it; carries the raw
    /// store message.
    Failed(String),
}

impl StepStatus {
    /// Whether the step completed successfully.
    pub fn is_ok(&self) -> bool {
        matches!(self, StepStatus::Ok)
    }
}

/// Per-step outcomes of one run of the deletion saga.
///
/// The saga never rolls back: when a core step fails the system is left
/// in whatever partial state the store calls produced, and this report is
/// the record a caller would need to reconcile it manually.
#[derive(Debug, Clone, PartialEq)]
pub struct DpsDeletionReport {
    /// The savings sub-account the saga targeted.
    pub dps_account_id: AccountId,
    /// The resolved destination account, once step 1 has succeeded.
    pub destination_account_id: Option<AccountId>,
    /// The amount credited to the destination, once step 4 has succeeded.
    pub credited_amount: Option<Decimal>,
    /// Step 1: resolve (or create) the destination account.
    pub resolve_destination: StepStatus,
    /// Step 2: clear the DPS fields on the parent account.
    pub clear_parent: StepStatus,
    /// Step 3: delete the savings sub-account, cascading its transactions.
    pub delete_dps_account: StepStatus,
    /// Step 4: credit the captured balance to the destination.
    pub credit_destination: StepStatus,
    /// Step 5: refresh cached balances; runs last on every path that got
    /// past validation.
    pub refresh: StepStatus,
}

impl DpsDeletionReport {
    pub(crate) fn not_started(request: &DpsDeleteRequest) -> Self {
        Self {
            dps_account_id: request.dps_account_id,
            destination_account_id: None,
            credited_amount: None,
            resolve_destination: StepStatus::Skipped,
            clear_parent: StepStatus::Skipped,
            delete_dps_account: StepStatus::Skipped,
            credit_destination: StepStatus::Skipped,
            refresh: StepStatus::Skipped,
        }
    }
}

/// A failed run of the deletion saga.
///
/// `source` is the error that stopped the saga, always surfaced to the
/// user; `report` records how far the saga got so the partial state can
/// be repaired by hand.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("DPS deletion did not complete: {source}")]
pub struct DpsDeleteError {
    /// How far the saga got before stopping.
    pub report: DpsDeletionReport,
    /// The error that stopped the saga.
    #[source]
    pub source: Error,
}
