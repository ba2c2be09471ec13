//! The account model and the field structs used to create and update
//! accounts through a [LedgerStore](crate::store::LedgerStore).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Alias for the integer type used for account IDs.
///
/// The value is opaque to callers; it is assigned by the ledger store.
pub type AccountId = i64;

/// The kind of account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Physical money.
    Cash,
    /// A bank account.
    Bank,
    /// A credit or debit card.
    Card,
    /// A savings account. DPS savings sub-accounts are always this type.
    Savings,
    /// An investment or brokerage account.
    Investment,
    /// Anything that does not fit the other types.
    Other,
}

impl AccountType {
    /// The lowercase name used for display and search.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Cash => "cash",
            AccountType::Bank => "bank",
            AccountType::Card => "card",
            AccountType::Savings => "savings",
            AccountType::Investment => "investment",
            AccountType::Other => "other",
        }
    }
}

/// The deposit schedule of a DPS plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DpsType {
    /// A fixed deposit every month.
    Monthly,
    /// Deposits whenever the user chooses.
    Flexible,
}

/// How the deposit amount of a DPS plan is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DpsAmountType {
    /// The same amount every deposit, taken from the plan configuration.
    Fixed,
    /// The user enters an amount for each deposit.
    Custom,
}

/// A user-facing account, or the internally managed savings sub-account
/// backing a DPS plan.
///
/// An account whose ID appears in another account's
/// `dps_savings_account_id` is a DPS savings sub-account: it belongs to
/// exactly one parent, must never be the parent itself, and is excluded
/// from all top-level listings by the
/// [filter engine](crate::filter::account_table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// The ID of the account.
    pub id: AccountId,
    /// The display name of the account.
    pub name: String,
    /// The kind of account.
    pub account_type: AccountType,
    /// ISO-4217-like currency code, e.g. `"USD"`.
    pub currency: String,
    /// Free-form text describing the account.
    pub description: String,
    /// The balance the account started with, before any transactions.
    pub initial_balance: Decimal,
    /// Cached balance derived from the transaction history.
    ///
    /// This is a read-through cache refreshed by
    /// [ledger::recalculate_balances](crate::ledger::recalculate_balances).
    /// It is never authoritative; conservation checks must recompute from
    /// the transaction history.
    pub calculated_balance: Decimal,
    /// Whether the account is active. Inactive accounts are hidden by the
    /// `active` status filter but keep their history.
    pub is_active: bool,
    /// Manual ordering index. Not required to be unique; missing values
    /// sort as zero.
    pub position: Option<i64>,
    /// Whether a DPS plan is enabled on this account.
    pub has_dps: bool,
    /// The deposit schedule of the DPS plan, when one is enabled.
    pub dps_type: Option<DpsType>,
    /// How deposit amounts are determined, when a DPS plan is enabled.
    pub dps_amount_type: Option<DpsAmountType>,
    /// The fixed deposit amount for fixed-amount plans.
    pub dps_fixed_amount: Option<Decimal>,
    /// The savings sub-account holding this account's DPS funds.
    pub dps_savings_account_id: Option<AccountId>,
    /// When the account was created.
    pub created_at: OffsetDateTime,
}

/// The fields needed to create an account.
///
/// DPS fields are not set at creation time; they are written by the
/// [DPS manager](crate::dps::DpsManager) once the savings sub-account
/// exists and can be linked.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccount {
    /// The display name of the account.
    pub name: String,
    /// The kind of account.
    pub account_type: AccountType,
    /// ISO-4217-like currency code.
    pub currency: String,
    /// Free-form text describing the account.
    pub description: String,
    /// The balance the account starts with.
    pub initial_balance: Decimal,
    /// Whether the account starts active.
    pub is_active: bool,
    /// Manual ordering index, if the caller wants one up front.
    pub position: Option<i64>,
}

impl NewAccount {
    /// Convenience constructor for an active account with a zero starting
    /// balance and no manual position.
    pub fn new(name: impl Into<String>, account_type: AccountType, currency: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            account_type,
            currency: currency.into(),
            description: String::new(),
            initial_balance: Decimal::ZERO,
            is_active: true,
            position: None,
        }
    }
}

/// A partial, field-level update to an account.
///
/// `None` leaves a field untouched. For fields that are themselves
/// optional on [Account], the outer `Option` says whether to write the
/// field and the inner `Option` is the value to write, so `Some(None)`
/// clears the field. Conflicting concurrent updates resolve as last write
/// wins per field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountUpdate {
    /// New display name.
    pub name: Option<String>,
    /// New account kind.
    pub account_type: Option<AccountType>,
    /// New currency code.
    pub currency: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New starting balance.
    pub initial_balance: Option<Decimal>,
    /// New cached balance. Written when a recomputation refreshes the
    /// cache, never trusted as a source of truth.
    pub calculated_balance: Option<Decimal>,
    /// New active flag.
    pub is_active: Option<bool>,
    /// New manual ordering index.
    pub position: Option<Option<i64>>,
    /// New DPS flag.
    pub has_dps: Option<bool>,
    /// New DPS schedule.
    pub dps_type: Option<Option<DpsType>>,
    /// New DPS amount mode.
    pub dps_amount_type: Option<Option<DpsAmountType>>,
    /// New fixed deposit amount.
    pub dps_fixed_amount: Option<Option<Decimal>>,
    /// New savings sub-account link.
    pub dps_savings_account_id: Option<Option<AccountId>>,
}

impl AccountUpdate {
    /// An update that clears every DPS field on an account.
    ///
    /// Used both by the quick-disable path and by the deletion saga; the
    /// savings sub-account itself is not touched.
    pub fn clear_dps() -> Self {
        Self {
            has_dps: Some(false),
            dps_type: Some(None),
            dps_amount_type: Some(None),
            dps_fixed_amount: Some(None),
            dps_savings_account_id: Some(None),
            ..Self::default()
        }
    }

    /// An update that only moves the account to `position`.
    pub fn position(position: Option<i64>) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    /// Apply this update to an account in place.
    pub fn apply(&self, account: &mut Account) {
        if let Some(name) = &self.name {
            account.name = name.clone();
        }
        if let Some(account_type) = self.account_type {
            account.account_type = account_type;
        }
        if let Some(currency) = &self.currency {
            account.currency = currency.clone();
        }
        if let Some(description) = &self.description {
            account.description = description.clone();
        }
        if let Some(initial_balance) = self.initial_balance {
            account.initial_balance = initial_balance;
        }
        if let Some(calculated_balance) = self.calculated_balance {
            account.calculated_balance = calculated_balance;
        }
        if let Some(is_active) = self.is_active {
            account.is_active = is_active;
        }
        if let Some(position) = self.position {
            account.position = position;
        }
        if let Some(has_dps) = self.has_dps {
            account.has_dps = has_dps;
        }
        if let Some(dps_type) = self.dps_type {
            account.dps_type = dps_type;
        }
        if let Some(dps_amount_type) = self.dps_amount_type {
            account.dps_amount_type = dps_amount_type;
        }
        if let Some(dps_fixed_amount) = self.dps_fixed_amount {
            account.dps_fixed_amount = dps_fixed_amount;
        }
        if let Some(dps_savings_account_id) = self.dps_savings_account_id {
            account.dps_savings_account_id = dps_savings_account_id;
        }
    }
}
