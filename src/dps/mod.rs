//! The DPS (recurring-deposit) lifecycle.
//!
//! A DPS plan parks savings in a hidden sub-account linked from the parent
//! account. Enabling, editing and disabling a plan are single-account
//! affairs, but retiring one must move the sub-account's funds back out
//! without losing them — and the ledger store offers no multi-call
//! transaction, so that flow runs as an explicit saga
//! ([DpsManager::delete_with_transfer]) with named steps, documented
//! partial-failure outcomes and a per-step [report](DpsDeletionReport).
//!
//! Lifecycle states per parent account:
//!
//! ```text
//! NoDPS -> DPSEnabled -> (editing) -> DPSEnabled
//! DPSEnabled -> deleting -> NoDPS
//! ```

mod config;
mod manager;
mod saga;

pub use config::DpsConfig;
pub use manager::DpsManager;
pub use saga::{
    DpsDeleteError, DpsDeleteRequest, DpsDeletionReport, StepStatus, TransferDestination,
};
