//! Static tables for log tokens
//!
//! Display names and intensity keys come from two separate tables on purpose:
//! the catalog keys intensities differently from how parts are shown.

/// (log token, display name)
const INSTRUMENT_NAMES: &[(&str, &str)] = &[
    ("bass", "Bass"),
    ("drum", "Drums"),
    ("guitar", "Lead"),
    ("vocals", "Vocals"),
    ("plasticguitar", "Pro Lead"),
    ("plasticbass", "Pro Bass"),
];

/// (log token, catalog intensity key)
const INTENSITY_KEYS: &[(&str, &str)] = &[
    ("bass", "bass"),
    ("drum", "drums"),
    ("guitar", "guitar"),
    ("vocals", "vocals"),
    ("plasticguitar", "proGuitar"),
    ("plasticbass", "proBass"),
];

/// (log token, display name)
const DIFFICULTY_NAMES: &[(&str, &str)] = &[
    ("DifficultyEasy", "Easy"),
    ("DifficultyMedium", "Medium"),
    ("DifficultyHard", "Hard"),
    ("DifficultyExpert", "Expert"),
];

fn lookup(table: &[(&'static str, &'static str)], token: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(key, _)| *key == token)
        .map(|(_, value)| *value)
}

/// `plasticguitar` -> `Pro Lead`; unknown tokens are capitalized
pub fn instrument_display_name(token: &str) -> String {
    lookup(INSTRUMENT_NAMES, token)
        .map(str::to_string)
        .unwrap_or_else(|| capitalize(token))
}

/// `plasticguitar` -> `proGuitar`; unknown tokens are used as-is
pub fn intensity_key(token: &str) -> String {
    lookup(INTENSITY_KEYS, token)
        .map(str::to_string)
        .unwrap_or_else(|| token.to_string())
}

/// `DifficultyHard` -> `Hard`
pub fn difficulty_display_name(token: &str) -> String {
    lookup(DIFFICULTY_NAMES, token)
        .map(str::to_string)
        .unwrap_or_else(|| {
            let stripped = token.strip_prefix("Difficulty").unwrap_or(token);
            if stripped.is_empty() {
                token.to_string()
            } else {
                stripped.to_string()
            }
        })
}

fn capitalize(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
