//! Configuration for a DPS plan.

use rust_decimal::Decimal;

use crate::{
    Error,
    account::{DpsAmountType, DpsType},
};

/// The user-chosen settings of a DPS plan.
#[derive(Debug, Clone, PartialEq)]
pub struct DpsConfig {
    /// The deposit schedule.
    pub dps_type: DpsType,
    /// How deposit amounts are determined.
    pub amount_type: DpsAmountType,
    /// The per-deposit amount for fixed-amount plans.
    pub fixed_amount: Option<Decimal>,
    /// The balance the savings sub-account starts with.
    pub initial_balance: Decimal,
}

impl DpsConfig {
    /// A monthly plan depositing `fixed_amount` each month into an empty
    /// sub-account.
    pub fn monthly(fixed_amount: Decimal) -> Self {
        Self {
            dps_type: DpsType::Monthly,
            amount_type: DpsAmountType::Fixed,
            fixed_amount: Some(fixed_amount),
            initial_balance: Decimal::ZERO,
        }
    }

    /// A flexible plan where the user enters each deposit amount.
    pub fn flexible() -> Self {
        Self {
            dps_type: DpsType::Flexible,
            amount_type: DpsAmountType::Custom,
            fixed_amount: None,
            initial_balance: Decimal::ZERO,
        }
    }

    /// Check the configuration before any store call is made.
    ///
    /// Monthly plans and fixed amount types both require a strictly
    /// positive deposit amount; the sub-account's starting balance may be
    /// zero but never negative.
    pub fn validate(&self) -> Result<(), Error> {
        if self.dps_type == DpsType::Monthly || self.amount_type == DpsAmountType::Fixed {
            match self.fixed_amount {
                None => return Err(Error::MissingDpsAmount),
                Some(amount) if amount <= Decimal::ZERO => {
                    return Err(Error::NonPositiveDpsAmount(amount));
                }
                Some(_) => {}
            }
        }

        if self.initial_balance < Decimal::ZERO {
            return Err(Error::NegativeAmount(self.initial_balance));
        }

        Ok(())
    }
}
