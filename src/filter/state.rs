//! The per-view filter state value object.

use serde::{Deserialize, Serialize};

use crate::account::AccountType;

/// The current layout version of [FilterState].
///
/// Bumped when the serialized shape changes so a stale blob from client
/// storage can be detected and discarded at the boundary.
pub const FILTER_STATE_VERSION: u32 = 1;

/// Which activation states to show.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    /// Show active and inactive accounts.
    #[default]
    All,
    /// Show only active accounts.
    Active,
}

/// The filters a user has applied to an account view.
///
/// This is ephemeral convenience state, persisted between sessions as a
/// small JSON blob. Every field defaults when missing so blobs written
/// by older layouts still deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterState {
    /// The layout version the blob was written with.
    pub version: u32,
    /// Free-text search term; empty means no search.
    pub search: String,
    /// Show only this currency, or every currency when `None`.
    pub currency: Option<String>,
    /// Show only this account type, or every type when `None`.
    pub account_type: Option<AccountType>,
    /// Which activation states to show.
    pub status: StatusFilter,
    /// The user's currency allow-list from settings. When non-empty,
    /// accounts in other currencies are hidden before any other filter
    /// applies.
    pub selected_currencies: Vec<String>,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            version: FILTER_STATE_VERSION,
            search: String::new(),
            currency: None,
            account_type: None,
            status: StatusFilter::All,
            selected_currencies: Vec::new(),
        }
    }
}
