//! Team and quarter filter resolution.
//!
//! User-supplied filter values are matched case-insensitively against the
//! values discovered at build time. Values that match nothing are passed
//! through unchanged so a request for an unknown team yields the
//! unfiltered fallback rather than silently dropping the filter.

use std::collections::BTreeSet;

use crate::models::FilterSet;

/// Normalize a team filter against the known teams.
pub fn normalize_team(input: Option<&str>, known_teams: &BTreeSet<String>) -> Option<String> {
    normalize(input, known_teams)
}

/// Normalize a quarter filter against the known quarters.
pub fn normalize_quarter(
    input: Option<&str>,
    known_quarters: &BTreeSet<String>,
) -> Option<String> {
    normalize(input, known_quarters)
}

fn normalize(input: Option<&str>, known: &BTreeSet<String>) -> Option<String> {
    let value = input?.trim();
    if value.is_empty() {
        return None;
    }
    let lowered = value.to_lowercase();
    let canonical = known.iter().find(|k| k.to_lowercase() == lowered).cloned();
    Some(canonical.unwrap_or_else(|| value.to_string()))
}

/// Infer filters from free text.
///
/// Picks the first known team and the first known quarter (in sorted
/// order) that occur in the query as case-insensitive substrings.
pub fn infer_filters(
    query: &str,
    known_teams: &BTreeSet<String>,
    known_quarters: &BTreeSet<String>,
) -> FilterSet {
    let lowered = query.to_lowercase();
    let first_match = |known: &BTreeSet<String>| {
        known
            .iter()
            .find(|k| lowered.contains(&k.to_lowercase()))
            .cloned()
    };
    FilterSet {
        team: first_match(known_teams),
        quarter: first_match(known_quarters),
    }
}

/// Resolve the filters for one query.
///
/// Explicit values are normalized. When the caller supplied neither
/// filter, both are inferred from the query text instead.
pub fn resolve_filters(
    query: &str,
    team: Option<&str>,
    quarter: Option<&str>,
    known_teams: &BTreeSet<String>,
    known_quarters: &BTreeSet<String>,
) -> FilterSet {
    let explicit = FilterSet {
        team: normalize_team(team, known_teams),
        quarter: normalize_quarter(quarter, known_quarters),
    };
    if explicit.is_empty() {
        infer_filters(query, known_teams, known_quarters)
    } else {
        explicit
    }
}
