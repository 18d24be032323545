//! Text analysis for the embedded node.
//!
//! Indexed strings and query words go through the same analyzer so that
//! `Douglas` in a query meets `douglas` in the index.

use once_cell::sync::Lazy;
use regex::Regex;

/// A run of letters or digits, optionally joined by inner apostrophes (`hiker's`).
static WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\p{L}\p{N}]+(?:['’][\p{L}\p{N}]+)*").expect("word pattern is valid")
});

/// A token and its position within the analyzed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub term: String,
    pub position: u32,
}

/// Split `text` into lower-cased terms, keeping their positions.
pub fn analyze(text: &str) -> Vec<Token> {
    WORD.find_iter(text)
        .enumerate()
        .map(|(position, m)| Token {
            term: m.as_str().to_lowercase().replace('’', "'"),
            position: position as u32,
        })
        .collect()
}

/// Terms of `text` without positions.
pub fn terms(text: &str) -> Vec<String> {
    analyze(text).into_iter().map(|token| token.term).collect()
}

/// True when `term` matches the `*`/`?` glob `pattern`.
pub fn wildcard_match(pattern: &str, term: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let term: Vec<char> = term.chars().collect();

    let (mut p, mut t) = (0, 0);
    let mut star: Option<usize> = None;
    let mut resume = 0;

    while t < term.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == term[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some(p);
            resume = t;
            p += 1;
        } else if let Some(s) = star {
            p = s + 1;
            resume += 1;
            t = resume;
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyze_lowercases_and_numbers_positions() {
        let tokens = analyze("Douglas Adams");
        assert_eq!(
            tokens,
            vec![
                Token {
                    term: "douglas".to_string(),
                    position: 0
                },
                Token {
                    term: "adams".to_string(),
                    position: 1
                },
            ]
        );
    }

    #[test]
    fn analyze_keeps_inner_apostrophes() {
        assert_eq!(
            terms("Hitch hiker's guide to the galaxy"),
            vec!["hitch", "hiker's", "guide", "to", "the", "galaxy"]
        );
    }

    #[test]
    fn analyze_splits_on_punctuation() {
        assert_eq!(terms("1980-01-01"), vec!["1980", "01", "01"]);
        assert_eq!(terms("  --  "), Vec::<String>::new());
    }

    #[test]
    fn wildcard_patterns() {
        assert!(wildcard_match("doug*", "douglas"));
        assert!(wildcard_match("d?uglas", "douglas"));
        assert!(wildcard_match("*glas", "douglas"));
        assert!(wildcard_match("d*g*s", "douglas"));
        assert!(!wildcard_match("doug?", "douglas"));
        assert!(!wildcard_match("adams*", "adam"));
    }
}
