//! Reduces recognized package text to a single brand lookup token.
use regex::Regex;
use std::sync::OnceLock;

use crate::models::LookupToken;

/// Packaging and dosage boilerplate that recognizers pick up next to the brand name
pub const GENERIC_WORDS: &[&str] = &[
    "extra", "maximum", "strength", "tablets", "tablet", "capsule", "caplets", "mg", "ml", "iu",
];

static SEPARATORS: OnceLock<Regex> = OnceLock::new();

fn separators() -> &'static Regex {
    SEPARATORS.get_or_init(|| Regex::new(r"[^A-Za-z0-9]+").expect("separator pattern is valid"))
}

fn is_generic(token: &str) -> bool {
    GENERIC_WORDS.iter().any(|word| word.eq_ignore_ascii_case(token))
}

/// Extract the lookup token from raw recognized text.
///
/// Prefers the first non-generic word that starts with a letter, falls back
/// to the first non-generic word of any kind, and is empty when every word
/// is boilerplate.
pub fn extract_token(raw: &str) -> LookupToken {
    let cleaned = separators().replace_all(raw, " ");
    let survivors: Vec<&str> = cleaned
        .split_whitespace()
        .filter(|token| !is_generic(token))
        .collect();

    survivors
        .iter()
        .find(|token| token.starts_with(|c: char| c.is_ascii_alphabetic()))
        .or_else(|| survivors.first())
        .map(|token| LookupToken::new(*token))
        .unwrap_or_default()
}
