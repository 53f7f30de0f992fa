//! Alias variant equivalence
//!
//! An alias may embed [`VARIANT_MARKER`] to declare a minimal prefix plus an
//! optional completion: `backup|s` accepts `backup` and `backups`,
//! `перезагруз|ить` accepts `перезагруз`, `перезагрузи` and `перезагрузить`.
//! [`matches`] is the only place this rule is implemented; the tokenizer and
//! the resolver both call it.

/// Splits an alias into its mandatory head and optional tail
pub const VARIANT_MARKER: char = '|';

/// Split an alias into `(head, tail)`. Aliases without a marker have no tail.
pub fn split(alias: &str) -> (&str, Option<&str>) {
    match alias.split_once(VARIANT_MARKER) {
        Some((head, tail)) => (head, Some(tail)),
        None => (alias, None),
    }
}

/// Longest spelling an alias accepts, lowercased (`backup|s` -> `backups`)
pub fn full_form(alias: &str) -> String {
    let (head, tail) = split(alias);
    let mut full = head.to_lowercase();
    if let Some(tail) = tail {
        full.push_str(&tail.to_lowercase());
    }
    full
}

/// Shortest spelling an alias accepts, lowercased (`backup|s` -> `backup`)
pub fn base_form(alias: &str) -> String {
    split(alias).0.to_lowercase()
}

/// Whether an alias is well formed: non-empty head, at most one marker,
/// no whitespace (input is split on whitespace, so such an alias could never
/// match).
pub fn is_well_formed(alias: &str) -> bool {
    let (head, tail) = split(alias);
    !head.is_empty()
        && !alias.chars().any(char::is_whitespace)
        && tail.map_or(true, |t| !t.contains(VARIANT_MARKER))
}

/// Case-insensitive equivalence between a declared alias and an input token
pub fn matches(alias: &str, token: &str) -> bool {
    let token = token.to_lowercase();
    let (head, tail) = split(alias);
    let head = head.to_lowercase();

    match tail {
        None => head == token,
        Some(tail) => match token.strip_prefix(head.as_str()) {
            Some(rest) => tail.to_lowercase().starts_with(rest),
            None => false,
        },
    }
}

/// Whether some input token is accepted by both aliases
///
/// Every spelling an alias accepts is a prefix of its full form at least as
/// long as its base form, so two aliases share a spelling exactly when their
/// full forms agree on a prefix that covers both bases.
pub fn overlaps(a: &str, b: &str) -> bool {
    let (full_a, full_b) = (full_form(a), full_form(b));
    let common = full_a
        .chars()
        .zip(full_b.chars())
        .take_while(|(x, y)| x == y)
        .count();
    common >= base_form(a).chars().count() && common >= base_form(b).chars().count()
}
