//! Assembles the displayed account table: filter, order, and group.

use std::collections::{BTreeMap, HashMap, HashSet};

use rust_decimal::Decimal;

use crate::{
    account::{Account, AccountId},
    filter::{
        search::search_accounts,
        state::{FilterState, StatusFilter},
    },
    transaction::Transaction,
};

/// A sortable column of the account table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    /// Account name, compared case-insensitively.
    Name,
    /// Account type, in display-name order.
    Type,
    /// Currency code.
    Currency,
    /// Cached calculated balance.
    Balance,
    /// Number of transactions on the account.
    Transactions,
    /// Whether the account has a DPS plan.
    Dps,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Smallest first.
    Ascending,
    /// Largest first; the exact reverse of ascending.
    Descending,
}

/// An explicit column sort chosen by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortConfig {
    /// The column being sorted.
    pub key: SortKey,
    /// The direction.
    pub order: SortOrder,
}

impl SortConfig {
    /// The sort that results from clicking a column header.
    ///
    /// Clicking a new column sorts it ascending; clicking the current
    /// column flips the direction.
    pub fn toggle(current: Option<SortConfig>, key: SortKey) -> SortConfig {
        let order = match current {
            Some(config) if config.key == key && config.order == SortOrder::Ascending => {
                SortOrder::Descending
            }
            _ => SortOrder::Ascending,
        };

        SortConfig { key, order }
    }
}

/// One currency's slice of the table.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrencyGroup {
    /// The currency code shared by every account in the group.
    pub currency: String,
    /// Sum of the group's cached balances.
    pub subtotal: Decimal,
    /// The member accounts, in table order.
    pub account_ids: Vec<AccountId>,
}

/// The displayed account table: the ordered rows plus, when no single
/// currency is selected, the rows regrouped by currency.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountTable {
    /// The visible accounts in display order.
    pub rows: Vec<Account>,
    /// Currency groups in alphabetical order, or `None` when the view is
    /// already narrowed to one currency.
    pub groups: Option<Vec<CurrencyGroup>>,
}

/// Builds the account table for one view.
///
/// DPS savings sub-accounts never appear as rows: they are reachable only
/// through their parent. Filters narrow the set, the search term (when
/// present) both narrows and ranks it, and `sort` overrides whatever order
/// the search or the default produced.
pub fn account_table(
    accounts: &[Account],
    transactions: &[Transaction],
    state: &FilterState,
    sort: Option<SortConfig>,
) -> AccountTable {
    let mut rows = filter_accounts(accounts, state);

    let searching = !state.search.trim().is_empty();
    if searching {
        rows = search_accounts(&rows, &state.search);
    }
    match sort {
        Some(config) => sort_rows(&mut rows, transactions, config),
        // Relevance order from the search stands until the user picks a
        // column.
        None if searching => {}
        None => default_sort(&mut rows),
    }

    let groups = state.currency.is_none().then(|| group_by_currency(&rows));

    AccountTable { rows, groups }
}

/// Applies every non-search filter, preserving input order.
fn filter_accounts(accounts: &[Account], state: &FilterState) -> Vec<Account> {
    let savings_ids: HashSet<AccountId> = accounts
        .iter()
        .filter_map(|account| account.dps_savings_account_id)
        .collect();

    accounts
        .iter()
        .filter(|account| !savings_ids.contains(&account.id))
        .filter(|account| {
            state.selected_currencies.is_empty()
                || state.selected_currencies.contains(&account.currency)
        })
        .filter(|account| {
            state
                .currency
                .as_ref()
                .is_none_or(|currency| &account.currency == currency)
        })
        .filter(|account| {
            state
                .account_type
                .is_none_or(|account_type| account.account_type == account_type)
        })
        .filter(|account| state.status == StatusFilter::All || account.is_active)
        .cloned()
        .collect()
}

/// The order used when nothing else decides one: position index
/// ascending (unset counts as zero), then newest account first.
fn default_sort(rows: &mut [Account]) {
    rows.sort_by(|a, b| {
        a.position
            .unwrap_or(0)
            .cmp(&b.position.unwrap_or(0))
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}

fn sort_rows(rows: &mut [Account], transactions: &[Transaction], config: SortConfig) {
    let mut counts: HashMap<AccountId, usize> = HashMap::new();
    if config.key == SortKey::Transactions {
        for transaction in transactions {
            *counts.entry(transaction.account_id).or_default() += 1;
        }
    }

    // Always sort ascending and reverse afterwards, so descending is the
    // exact reverse of ascending even across ties.
    match config.key {
        SortKey::Name => rows.sort_by_key(|account| account.name.to_lowercase()),
        SortKey::Type => rows.sort_by_key(|account| account.account_type.as_str()),
        SortKey::Currency => rows.sort_by(|a, b| a.currency.cmp(&b.currency)),
        SortKey::Balance => rows.sort_by_key(|account| account.calculated_balance),
        SortKey::Transactions => {
            rows.sort_by_key(|account| counts.get(&account.id).copied().unwrap_or(0));
        }
        SortKey::Dps => rows.sort_by_key(|account| account.has_dps),
    }

    if config.order == SortOrder::Descending {
        rows.reverse();
    }
}

fn group_by_currency(rows: &[Account]) -> Vec<CurrencyGroup> {
    let mut by_currency: BTreeMap<&str, CurrencyGroup> = BTreeMap::new();
    for account in rows {
        let group = by_currency
            .entry(&account.currency)
            .or_insert_with(|| CurrencyGroup {
                currency: account.currency.clone(),
                subtotal: Decimal::ZERO,
                account_ids: Vec::new(),
            });
        group.subtotal += account.calculated_balance;
        group.account_ids.push(account.id);
    }

    by_currency.into_values().collect()
}
