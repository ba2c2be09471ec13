//! Manual account ordering via adjacent swaps.
//!
//! Each swap exchanges the `position` values of two neighbouring rows in
//! the list the user is looking at, so the multiset of stored positions
//! never changes. The two writes are issued concurrently; if one lands
//! and the other does not, the duplicate positions it leaves behind are
//! harmless for display because the default sort tie-breaks on creation
//! time, and the next successful swap repairs the field.

use crate::{
    Error,
    account::{Account, AccountId, AccountUpdate},
    store::LedgerStore,
};

/// Moves the account one row up in `displayed`, swapping positions with
/// the row above it.
///
/// `displayed` is the list as the user currently sees it, already
/// filtered and in position order. Calls on the top row, or with an id
/// that is not displayed, do nothing.
pub async fn move_up(
    store: &impl LedgerStore,
    displayed: &[Account],
    id: AccountId,
) -> Result<(), Error> {
    let Some(index) = displayed.iter().position(|account| account.id == id) else {
        return Ok(());
    };
    if index == 0 {
        return Ok(());
    }

    swap(store, &displayed[index - 1], &displayed[index]).await
}

/// Moves the account one row down in `displayed`, swapping positions with
/// the row below it.
///
/// Calls on the bottom row, or with an id that is not displayed, do
/// nothing.
pub async fn move_down(
    store: &impl LedgerStore,
    displayed: &[Account],
    id: AccountId,
) -> Result<(), Error> {
    let Some(index) = displayed.iter().position(|account| account.id == id) else {
        return Ok(());
    };
    if index + 1 == displayed.len() {
        return Ok(());
    }

    swap(store, &displayed[index], &displayed[index + 1]).await
}

/// Writes each account's position onto the other. One logical swap, two
/// concurrent store calls.
async fn swap(store: &impl LedgerStore, a: &Account, b: &Account) -> Result<(), Error> {
    let (first, second) = tokio::join!(
        store.update_account(a.id, AccountUpdate::position(b.position)),
        store.update_account(b.id, AccountUpdate::position(a.position)),
    );

    first.and(second).map(|_| ())
}
