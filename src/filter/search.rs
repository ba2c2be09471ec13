//! Fuzzy account search with weighted field scoring.
//!
//! Each account is scored per field by where the term matches: a match
//! at the start of a field scores 1.0, falling off linearly towards the
//! end (`1 − index/length`). Field scores are combined as a weighted
//! mean over the fields that matched, results below a fixed threshold
//! are dropped, and active accounts get a small boost. Ranking ties keep
//! the input order, so output is deterministic.

use crate::account::Account;

const NAME_WEIGHT: f64 = 0.6;
const DESCRIPTION_WEIGHT: f64 = 0.3;
const TYPE_WEIGHT: f64 = 0.1;

/// Matches below this relevance are not worth showing.
const SCORE_THRESHOLD: f64 = 0.3;

/// Boost applied to active accounts so they outrank inactive ones with
/// the same textual relevance.
const ACTIVE_BOOST: f64 = 0.1;

struct Field<'a> {
    text: &'a str,
    weight: f64,
}

fn fields(account: &Account) -> [Field<'_>; 3] {
    [
        Field {
            text: &account.name,
            weight: NAME_WEIGHT,
        },
        Field {
            text: &account.description,
            weight: DESCRIPTION_WEIGHT,
        },
        Field {
            text: account.account_type.as_str(),
            weight: TYPE_WEIGHT,
        },
    ]
}

/// Score one field: 1.0 for a match at the start, falling off towards
/// the end, `None` when the term does not occur.
fn field_score(text: &str, term: &str) -> Option<f64> {
    let haystack = text.to_lowercase();
    let index = haystack.find(term)?;
    let length = haystack.chars().count();
    if length == 0 {
        return None;
    }
    // Byte index converted to a character index so multi-byte names are
    // scored by visible position.
    let char_index = haystack[..index].chars().count();

    Some(1.0 - char_index as f64 / length as f64)
}

fn relevance(account: &Account, term: &str) -> Option<f64> {
    let mut total_score = 0.0;
    let mut total_weight = 0.0;
    for field in fields(account) {
        if let Some(score) = field_score(field.text, term) {
            total_score += score * field.weight;
            total_weight += field.weight;
        }
    }
    if total_weight == 0.0 {
        return None;
    }

    let mut score = total_score / total_weight;
    if account.is_active {
        score += ACTIVE_BOOST;
    }
    (score >= SCORE_THRESHOLD).then_some(score)
}

/// Rank `accounts` by relevance to `query`, best match first.
///
/// Intended to run on an already-filtered subset: a search narrows the
/// visible set further, it never resurrects accounts other filters
/// removed. A blank query returns the input unchanged.
pub fn search_accounts(accounts: &[Account], query: &str) -> Vec<Account> {
    let term = query.trim().to_lowercase();
    if term.is_empty() {
        return accounts.to_vec();
    }

    let mut hits: Vec<(f64, &Account)> = accounts
        .iter()
        .filter_map(|account| relevance(account, &term).map(|score| (score, account)))
        .collect();
    // Stable sort: equal scores keep the input order.
    hits.sort_by(|a, b| b.0.total_cmp(&a.0));

    hits.into_iter().map(|(_, account)| account.clone()).collect()
}

/// Up to `limit` distinct field values matching `query`, in relevance
/// order, for a search-suggestion dropdown.
pub fn suggestions(accounts: &[Account], query: &str, limit: usize) -> Vec<String> {
    let term = query.trim().to_lowercase();
    if term.is_empty() {
        return Vec::new();
    }

    let ranked = search_accounts(accounts, &term);
    let mut seen = std::collections::HashSet::new();
    let mut values = Vec::new();
    for account in &ranked {
        for field in fields(account) {
            if values.len() == limit {
                return values;
            }
            if field.text.to_lowercase().contains(&term) && seen.insert(field.text.to_lowercase())
            {
                values.push(field.text.to_owned());
            }
        }
    }

    values
}
