//! Priority-ordered extraction strategies.
//!
//! Every extractor tries a handful of independent lookups in order and keeps
//! the first non-empty value that passes its validation.

/// A single lookup attempt.
pub type Strategy<'a> = &'a dyn Fn() -> Option<String>;

/// Run `strategies` in order, returning the first non-empty result accepted by `accept`.
pub fn first_valid(strategies: &[Strategy<'_>], accept: impl Fn(&str) -> bool) -> Option<String> {
    strategies
        .iter()
        .filter_map(|strategy| strategy())
        .find(|value| !value.trim().is_empty() && accept(value))
}
