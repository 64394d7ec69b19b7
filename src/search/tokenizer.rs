use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Minimum token length; shorter words carry too little signal to index.
const MIN_TOKEN_LEN: usize = 3;

/// Whole ASCII words. A run glued to digits ("2nd", "mp3") never matches.
static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[a-zA-Z]+\b").expect("word pattern is valid"));

fn words(text: &str) -> Vec<String> {
    WORD.find_iter(&text.to_lowercase())
        .map(|m| m.as_str())
        .filter(|word| word.len() >= MIN_TOKEN_LEN)
        .map(str::to_string)
        .collect()
}

/// Every lowercased term of a document field, duplicates kept for
/// term-frequency counts.
pub fn tokenize_text(text: &str) -> Vec<String> {
    words(text)
}

/// Distinct query terms in the order the user typed them.
pub fn tokenize_query(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    words(query)
        .into_iter()
        .filter(|word| seen.insert(word.clone()))
        .collect()
}
