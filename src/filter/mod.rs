//! The filter/sort/search pipeline for account views.
//!
//! Everything in this module is a pure function from (records, filter
//! state, sort state) to a displayed, ordered subset — no side effects,
//! and byte-for-byte identical output for identical inputs. The filter
//! state is a plain value object; persisting it between sessions is the
//! caller's concern, handled by serializing at the boundary.

mod engine;
mod search;
mod state;

pub use engine::{AccountTable, CurrencyGroup, SortConfig, SortKey, SortOrder, account_table};
pub use search::{search_accounts, suggestions};
pub use state::{FILTER_STATE_VERSION, FilterState, StatusFilter};
