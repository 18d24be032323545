//! Query-string parsing for the embedded node.
//!
//! Grammar: whitespace separated clauses, each optionally prefixed with `+`
//! (required) or `-` (prohibited) and optionally scoped with `field:`. A
//! clause body is a bare word, a `*`/`?` wildcard or a `"quoted phrase"`.
//! `AND`, `OR` and `NOT` override the default operator for their operands.

use crate::analysis;
use crate::error::SearchError;
use crate::model::{Operator, QueryStringQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occur {
    Must,
    Should,
    MustNot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    Term(String),
    /// Terms that must appear at consecutive positions.
    Phrase(Vec<String>),
    Wildcard(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub occur: Occur,
    /// Field named in the clause itself; `None` falls back to the query's fields.
    pub field: Option<String>,
    pub matcher: Matcher,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuery {
    pub clauses: Vec<Clause>,
}

impl ParsedQuery {
    pub fn has_positive_clause(&self) -> bool {
        self.clauses.iter().any(|c| c.occur != Occur::MustNot)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Lexeme {
    And,
    Or,
    Not,
    Clause {
        prefix: Option<char>,
        field: Option<String>,
        body: Body,
    },
}

#[derive(Debug, PartialEq, Eq)]
enum Body {
    Bare(String),
    Quoted(String),
}

#[derive(Clone, Copy)]
enum Conjunction {
    And,
    Or,
}

/// Parse `query` into clauses, resolving the default operator.
pub fn parse(query: &QueryStringQuery) -> Result<ParsedQuery, SearchError> {
    let lexemes = lex(&query.query)?;

    // `None` marks clauses whose occurrence follows the default operator.
    let mut pending: Vec<(Option<Occur>, Option<String>, Matcher)> = Vec::new();
    let mut conjunction: Option<Conjunction> = None;
    let mut negate = false;

    for lexeme in lexemes {
        match lexeme {
            Lexeme::And => {
                expect_left_operand(query, &pending, conjunction, negate)?;
                conjunction = Some(Conjunction::And);
            }
            Lexeme::Or => {
                expect_left_operand(query, &pending, conjunction, negate)?;
                conjunction = Some(Conjunction::Or);
            }
            Lexeme::Not => negate = true,
            Lexeme::Clause {
                prefix,
                field,
                body,
            } => {
                let matcher = match body {
                    Body::Bare(word) => bare_matcher(query, &word)?,
                    Body::Quoted(text) => terms_matcher(analysis::terms(&text)),
                };

                let mut occur = match prefix {
                    Some('+') => Some(Occur::Must),
                    Some(_) => Some(Occur::MustNot),
                    None if negate => Some(Occur::MustNot),
                    None => None,
                };

                let Some(matcher) = matcher else {
                    if conjunction.is_some() || negate {
                        return Err(SearchError::query_parse(
                            &query.query,
                            "boolean operator is missing its right operand",
                        ));
                    }
                    continue;
                };
                negate = false;

                if let Some(conj) = conjunction.take() {
                    let forced = match conj {
                        Conjunction::And => Occur::Must,
                        Conjunction::Or => Occur::Should,
                    };
                    if let Some(previous) = pending.last_mut() {
                        if previous.0.is_none() {
                            previous.0 = Some(forced);
                        }
                    }
                    if occur.is_none() {
                        occur = Some(forced);
                    }
                }

                pending.push((occur, field, matcher));
            }
        }
    }

    if conjunction.is_some() || negate {
        return Err(SearchError::query_parse(
            &query.query,
            "boolean operator is missing its right operand",
        ));
    }

    let default = match query.default_operator {
        Operator::And => Occur::Must,
        Operator::Or => Occur::Should,
    };

    Ok(ParsedQuery {
        clauses: pending
            .into_iter()
            .map(|(occur, field, matcher)| Clause {
                occur: occur.unwrap_or(default),
                field,
                matcher,
            })
            .collect(),
    })
}

fn expect_left_operand<T>(
    query: &QueryStringQuery,
    pending: &[T],
    conjunction: Option<Conjunction>,
    negate: bool,
) -> Result<(), SearchError> {
    if pending.is_empty() || conjunction.is_some() || negate {
        return Err(SearchError::query_parse(
            &query.query,
            "boolean operator is missing its left operand",
        ));
    }
    Ok(())
}

fn bare_matcher(query: &QueryStringQuery, word: &str) -> Result<Option<Matcher>, SearchError> {
    if word.contains(['*', '?']) {
        if word.starts_with(['*', '?']) && !query.allow_leading_wildcard {
            return Err(SearchError::query_parse(
                &query.query,
                "'*' or '?' not allowed as first character in wildcard query",
            ));
        }
        return Ok(Some(Matcher::Wildcard(word.to_lowercase())));
    }
    // Numbers are indexed as one token in their JSON form, sign and fraction included.
    if let Ok(number) = serde_json::from_str::<serde_json::Number>(word) {
        return Ok(Some(Matcher::Term(number.to_string())));
    }
    Ok(terms_matcher(analysis::terms(word)))
}

fn terms_matcher(mut terms: Vec<String>) -> Option<Matcher> {
    match terms.len() {
        0 => None,
        1 => terms.pop().map(Matcher::Term),
        _ => Some(Matcher::Phrase(terms)),
    }
}

fn lex(input: &str) -> Result<Vec<Lexeme>, SearchError> {
    let mut lexemes = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let Some(&first) = chars.peek() else {
            break;
        };

        let prefix = if first == '+' || first == '-' {
            chars.next();
            Some(first)
        } else {
            None
        };

        let body = if chars.peek() == Some(&'"') {
            chars.next();
            Body::Quoted(read_quoted(&mut chars, input)?)
        } else {
            let word: String = std::iter::from_fn(|| chars.next_if(|c| !c.is_whitespace())).collect();
            Body::Bare(word)
        };

        let lexeme = match body {
            Body::Bare(word) if prefix.is_none() && (word == "AND" || word == "&&") => Lexeme::And,
            Body::Bare(word) if prefix.is_none() && (word == "OR" || word == "||") => Lexeme::Or,
            Body::Bare(word) if prefix.is_none() && (word == "NOT" || word == "!") => Lexeme::Not,
            Body::Bare(word) => match split_field(&word) {
                Some((field, rest)) => {
                    let body = if rest.is_empty() {
                        return Err(SearchError::query_parse(
                            input,
                            format!("expected a value after '{}:'", field),
                        ));
                    } else if let Some(quoted) = rest.strip_prefix('"') {
                        // `field:"one two"` was cut at the first space; finish the phrase.
                        let mut text = quoted.to_string();
                        if let Some(complete) = text.strip_suffix('"') {
                            Body::Quoted(complete.to_string())
                        } else {
                            text.push_str(&read_quoted(&mut chars, input)?);
                            Body::Quoted(text)
                        }
                    } else {
                        Body::Bare(rest.to_string())
                    };
                    Lexeme::Clause {
                        prefix,
                        field: Some(field.to_string()),
                        body,
                    }
                }
                None => Lexeme::Clause {
                    prefix,
                    field: None,
                    body: Body::Bare(word),
                },
            },
            quoted @ Body::Quoted(_) => Lexeme::Clause {
                prefix,
                field: None,
                body: quoted,
            },
        };
        lexemes.push(lexeme);
    }

    Ok(lexemes)
}

/// Read up to the closing quote; the opening quote is already consumed.
fn read_quoted(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    input: &str,
) -> Result<String, SearchError> {
    let mut text = String::new();
    for c in chars.by_ref() {
        if c == '"' {
            return Ok(text);
        }
        text.push(c);
    }
    Err(SearchError::query_parse(input, "unterminated quoted phrase"))
}

fn split_field(word: &str) -> Option<(&str, &str)> {
    let (field, rest) = word.split_once(':')?;
    let mut chars = field.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    valid.then_some((field, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clauses(query: QueryStringQuery) -> Vec<Clause> {
        parse(&query).unwrap().clauses
    }

    fn term(occur: Occur, field: Option<&str>, term: &str) -> Clause {
        Clause {
            occur,
            field: field.map(str::to_string),
            matcher: Matcher::Term(term.to_string()),
        }
    }

    #[test]
    fn default_operator_decides_bare_clauses() {
        let and = clauses(QueryStringQuery::new("Douglas Adams").default_operator(Operator::And));
        assert_eq!(
            and,
            vec![
                term(Occur::Must, None, "douglas"),
                term(Occur::Must, None, "adams")
            ]
        );

        let or = clauses(QueryStringQuery::new("Douglas Adams"));
        assert!(or.iter().all(|c| c.occur == Occur::Should));
    }

    #[test]
    fn prefixes_and_field_scopes() {
        let parsed = clauses(QueryStringQuery::new("+author:douglas -name:restaurant galaxy"));
        assert_eq!(
            parsed,
            vec![
                term(Occur::Must, Some("author"), "douglas"),
                term(Occur::MustNot, Some("name"), "restaurant"),
                term(Occur::Should, None, "galaxy"),
            ]
        );
    }

    #[test]
    fn explicit_operators_override_default() {
        let parsed = clauses(
            QueryStringQuery::new("hitch OR restaurant NOT universe").default_operator(Operator::And),
        );
        assert_eq!(
            parsed,
            vec![
                term(Occur::Should, None, "hitch"),
                term(Occur::Should, None, "restaurant"),
                term(Occur::MustNot, None, "universe"),
            ]
        );
    }

    #[test]
    fn quoted_and_hyphenated_words_become_phrases() {
        let parsed = clauses(QueryStringQuery::new("name:\"end of the universe\" hitch-hiker"));
        assert_eq!(
            parsed[0].matcher,
            Matcher::Phrase(vec![
                "end".to_string(),
                "of".to_string(),
                "the".to_string(),
                "universe".to_string()
            ])
        );
        assert_eq!(parsed[0].field.as_deref(), Some("name"));
        assert_eq!(
            parsed[1].matcher,
            Matcher::Phrase(vec!["hitch".to_string(), "hiker".to_string()])
        );
    }

    #[test]
    fn leading_wildcard_is_rejected_when_disallowed() {
        let err = parse(&QueryStringQuery::new("*glas").allow_leading_wildcard(false)).unwrap_err();
        assert!(matches!(err, SearchError::QueryParse { .. }));

        let allowed = clauses(QueryStringQuery::new("*glas"));
        assert_eq!(allowed[0].matcher, Matcher::Wildcard("*glas".to_string()));
    }

    #[test]
    fn trailing_wildcard_is_always_allowed() {
        let parsed = clauses(QueryStringQuery::new("Doug*").allow_leading_wildcard(false));
        assert_eq!(parsed[0].matcher, Matcher::Wildcard("doug*".to_string()));
    }

    #[test]
    fn malformed_queries_fail() {
        for bad in ["\"open phrase", "author:", "AND douglas", "douglas OR", "NOT"] {
            let result = parse(&QueryStringQuery::new(bad));
            assert!(
                matches!(result, Err(SearchError::QueryParse { .. })),
                "expected parse failure for {bad:?}"
            );
        }
    }

    #[test]
    fn numeric_values_stay_single_terms() {
        let parsed = clauses(QueryStringQuery::new("price:3.5 n:-5 pages:224"));
        assert_eq!(
            parsed,
            vec![
                term(Occur::Should, Some("price"), "3.5"),
                term(Occur::Should, Some("n"), "-5"),
                term(Occur::Should, Some("pages"), "224"),
            ]
        );

        // A leading '-' outside a field scope still prohibits.
        let prohibited = clauses(QueryStringQuery::new("douglas -5"));
        assert_eq!(prohibited[1], term(Occur::MustNot, None, "5"));
    }

    #[test]
    fn operators_need_an_operand_that_analyzes_to_terms() {
        for bad in ["douglas AND -", "douglas OR +", "douglas AND ...", "NOT ..."] {
            let result = parse(&QueryStringQuery::new(bad));
            assert!(
                matches!(result, Err(SearchError::QueryParse { .. })),
                "expected parse failure for {bad:?}"
            );
        }

        // Without an operator, a clause that analyzes to nothing is skipped.
        let parsed = clauses(QueryStringQuery::new("douglas ..."));
        assert_eq!(parsed, vec![term(Occur::Should, None, "douglas")]);
    }

    #[test]
    fn blank_query_has_no_clauses() {
        let parsed = parse(&QueryStringQuery::new("   ")).unwrap();
        assert!(parsed.clauses.is_empty());
        assert!(!parsed.has_positive_clause());
    }
}
