//! In-memory search node backing the embedded session mode.
//!
//! Each index keeps its stored sources plus a positional inverted index:
//! field -> term -> document -> positions. Writes are visible to the next
//! read; there is no refresh cycle.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use parking_lot::RwLock;
use serde_json::Value;

use crate::analysis::{self, Token};
use crate::error::SearchError;
use crate::model::{
    DeleteResponse, GetResponse, IndexResponse, SearchHit, SearchHits, SearchRequest,
    SearchResponse,
};
use crate::query::{self, Clause, Matcher, Occur};

/// Gap inserted between array elements so phrases never span two values.
const POSITION_GAP: u32 = 100;

const INVALID_INDEX_CHARS: &[char] = &['\\', '/', '*', '?', '"', '<', '>', '|', ',', '#'];

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct DocKey {
    doc_type: String,
    id: String,
}

#[derive(Debug)]
struct StoredDoc {
    source: Value,
    version: u64,
    /// Analyzed fields, kept so a replaced document can be unindexed.
    fields: BTreeMap<String, Vec<Token>>,
}

type Postings = HashMap<String, HashMap<String, HashMap<DocKey, Vec<u32>>>>;

#[derive(Debug, Default)]
struct IndexShard {
    docs: BTreeMap<DocKey, StoredDoc>,
    postings: Postings,
}

/// Summary of one index, reported by [`EmbeddedNode::stats`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStats {
    pub index: String,
    pub document_count: usize,
    pub field_count: usize,
}

/// A single in-process search node.
#[derive(Debug)]
pub struct EmbeddedNode {
    cluster_name: String,
    indices: RwLock<HashMap<String, IndexShard>>,
}

impl EmbeddedNode {
    pub fn new(cluster_name: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            indices: RwLock::new(HashMap::new()),
        }
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    /// Store `source` under `index/doc_type/id`, replacing any previous version.
    pub fn index(
        &self,
        index: &str,
        doc_type: &str,
        id: &str,
        source: Value,
    ) -> Result<IndexResponse, SearchError> {
        validate_index_name(index)?;
        validate_key(doc_type, id)?;
        if !source.is_object() {
            return Err(SearchError::MalformedDocument(format!(
                "document must be a JSON object, got {}",
                json_kind(&source)
            )));
        }

        let key = DocKey {
            doc_type: doc_type.to_string(),
            id: id.to_string(),
        };
        let fields = analyze_document(&source);

        let mut indices = self.indices.write();
        let shard = indices.entry(index.to_string()).or_insert_with(|| {
            tracing::info!(cluster = %self.cluster_name, index, "creating index");
            IndexShard::default()
        });

        let previous = shard.remove(&key);
        let version = previous.as_ref().map_or(1, |doc| doc.version + 1);
        shard.insert(key, source, version, fields);

        tracing::debug!(index, doc_type, id, version, "document indexed");

        Ok(IndexResponse {
            index: index.to_string(),
            doc_type: doc_type.to_string(),
            id: id.to_string(),
            version,
            created: previous.is_none(),
        })
    }

    pub fn get(&self, index: &str, doc_type: &str, id: &str) -> Result<GetResponse, SearchError> {
        validate_key(doc_type, id)?;
        let indices = self.indices.read();
        let shard = indices
            .get(index)
            .ok_or_else(|| SearchError::IndexNotFound(index.to_string()))?;

        let stored = shard.docs.get(&DocKey {
            doc_type: doc_type.to_string(),
            id: id.to_string(),
        });

        Ok(GetResponse {
            index: index.to_string(),
            doc_type: doc_type.to_string(),
            id: id.to_string(),
            version: stored.map(|doc| doc.version),
            found: stored.is_some(),
            source: stored.map(|doc| doc.source.clone()),
        })
    }

    pub fn delete(
        &self,
        index: &str,
        doc_type: &str,
        id: &str,
    ) -> Result<DeleteResponse, SearchError> {
        validate_key(doc_type, id)?;
        let mut indices = self.indices.write();
        let removed = indices.get_mut(index).and_then(|shard| {
            shard.remove(&DocKey {
                doc_type: doc_type.to_string(),
                id: id.to_string(),
            })
        });

        tracing::debug!(index, doc_type, id, found = removed.is_some(), "document deleted");

        Ok(DeleteResponse {
            index: index.to_string(),
            doc_type: doc_type.to_string(),
            id: id.to_string(),
            version: removed.as_ref().map(|doc| doc.version + 1),
            found: removed.is_some(),
        })
    }

    pub fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        let started = Instant::now();
        let parsed = query::parse(&request.query)?;

        let indices = self.indices.read();
        let shard = indices
            .get(&request.index)
            .ok_or_else(|| SearchError::IndexNotFound(request.index.clone()))?;

        let mut matches: Vec<(&DocKey, &StoredDoc, f32)> = Vec::new();
        if !parsed.clauses.is_empty() {
            let all_fields: Vec<&str> = shard.postings.keys().map(String::as_str).collect();
            let default_fields: Vec<&str> = if request.query.fields.is_empty() {
                all_fields
            } else {
                request.query.fields.iter().map(String::as_str).collect()
            };

            let has_must = parsed.clauses.iter().any(|c| c.occur == Occur::Must);
            let has_should = parsed.clauses.iter().any(|c| c.occur == Occur::Should);

            'docs: for (key, doc) in &shard.docs {
                if !request.types.is_empty() && !request.types.contains(&key.doc_type) {
                    continue;
                }

                let mut score = 0.0;
                let mut matched_should = false;
                for clause in &parsed.clauses {
                    let clause_score =
                        shard.score_clause(clause, &default_fields, key, request.query.use_dis_max);
                    match (clause.occur, clause_score) {
                        (Occur::Must, None) => continue 'docs,
                        (Occur::MustNot, Some(_)) => continue 'docs,
                        (Occur::Must, Some(s)) => score += s,
                        (Occur::Should, Some(s)) => {
                            score += s;
                            matched_should = true;
                        }
                        _ => {}
                    }
                }

                if !has_must && has_should && !matched_should {
                    continue;
                }
                if !parsed.has_positive_clause() {
                    score = 1.0;
                }
                matches.push((key, doc, score));
            }
        }

        matches.sort_by(|a, b| b.2.total_cmp(&a.2).then_with(|| a.0.cmp(b.0)));

        let total = matches.len() as u64;
        let max_score = matches.first().map(|m| m.2);
        let hits = matches
            .into_iter()
            .skip(request.from)
            .take(request.size)
            .map(|(key, doc, score)| SearchHit {
                index: request.index.clone(),
                doc_type: key.doc_type.clone(),
                id: key.id.clone(),
                score: Some(score),
                source: doc.source.clone(),
            })
            .collect();

        let took = started.elapsed().as_millis() as u64;
        tracing::debug!(index = %request.index, query = %request.query.query, total, took_ms = took, "search executed");

        Ok(SearchResponse {
            took,
            timed_out: false,
            hits: SearchHits {
                total,
                max_score,
                hits,
            },
        })
    }

    /// Per-index document and field counts, ordered by index name.
    pub fn stats(&self) -> Vec<IndexStats> {
        let indices = self.indices.read();
        let mut stats: Vec<IndexStats> = indices
            .iter()
            .map(|(name, shard)| IndexStats {
                index: name.clone(),
                document_count: shard.docs.len(),
                field_count: shard.postings.len(),
            })
            .collect();
        stats.sort_by(|a, b| a.index.cmp(&b.index));
        stats
    }
}

impl Drop for EmbeddedNode {
    fn drop(&mut self) {
        tracing::info!(cluster = %self.cluster_name, "embedded node stopped");
    }
}

impl IndexShard {
    fn insert(
        &mut self,
        key: DocKey,
        source: Value,
        version: u64,
        fields: BTreeMap<String, Vec<Token>>,
    ) {
        for (field, tokens) in &fields {
            let terms = self.postings.entry(field.clone()).or_default();
            for token in tokens {
                terms
                    .entry(token.term.clone())
                    .or_default()
                    .entry(key.clone())
                    .or_default()
                    .push(token.position);
            }
        }
        self.docs.insert(
            key,
            StoredDoc {
                source,
                version,
                fields,
            },
        );
    }

    fn remove(&mut self, key: &DocKey) -> Option<StoredDoc> {
        let doc = self.docs.remove(key)?;
        for (field, tokens) in &doc.fields {
            let Some(terms) = self.postings.get_mut(field) else {
                continue;
            };
            for token in tokens {
                if let Some(docs) = terms.get_mut(&token.term) {
                    docs.remove(key);
                    if docs.is_empty() {
                        terms.remove(&token.term);
                    }
                }
            }
            if terms.is_empty() {
                self.postings.remove(field);
            }
        }
        Some(doc)
    }

    /// Score of `clause` for one document, or `None` when it does not match.
    fn score_clause(
        &self,
        clause: &Clause,
        default_fields: &[&str],
        key: &DocKey,
        use_dis_max: bool,
    ) -> Option<f32> {
        let scoped;
        let fields = match &clause.field {
            Some(field) => {
                scoped = [field.as_str()];
                &scoped[..]
            }
            None => default_fields,
        };

        let scores = fields
            .iter()
            .filter_map(|field| self.score_field(field, &clause.matcher, key));

        if use_dis_max {
            scores.reduce(f32::max)
        } else {
            scores.reduce(|a, b| a + b)
        }
    }

    fn score_field(&self, field: &str, matcher: &Matcher, key: &DocKey) -> Option<f32> {
        let terms = self.postings.get(field)?;
        let doc_count = self.docs.len();

        match matcher {
            Matcher::Term(term) => {
                let docs = terms.get(term)?;
                let positions = docs.get(key)?;
                Some(tf_idf(positions.len(), docs.len(), doc_count))
            }
            Matcher::Wildcard(pattern) => terms
                .iter()
                .any(|(term, docs)| docs.contains_key(key) && analysis::wildcard_match(pattern, term))
                .then_some(1.0),
            Matcher::Phrase(words) => {
                let mut per_term = Vec::with_capacity(words.len());
                for word in words {
                    let docs = terms.get(word)?;
                    per_term.push((docs.get(key)?, docs.len()));
                }

                let (first_positions, _) = per_term[0];
                let occurrences = first_positions
                    .iter()
                    .filter(|&&start| {
                        per_term
                            .iter()
                            .enumerate()
                            .skip(1)
                            .all(|(offset, (positions, _))| positions.contains(&(start + offset as u32)))
                    })
                    .count();

                (occurrences > 0).then(|| {
                    per_term
                        .iter()
                        .map(|&(_, df)| tf_idf(occurrences, df, doc_count))
                        .sum()
                })
            }
        }
    }
}

fn tf_idf(term_freq: usize, doc_freq: usize, doc_count: usize) -> f32 {
    let idf = 1.0 + (doc_count as f32 / (doc_freq as f32 + 1.0)).ln();
    (term_freq as f32).sqrt() * idf.max(0.1)
}

/// Flatten a JSON object into dotted field paths with analyzed tokens.
fn analyze_document(source: &Value) -> BTreeMap<String, Vec<Token>> {
    let mut fields = BTreeMap::new();
    if let Value::Object(map) = source {
        for (name, value) in map {
            flatten(name, value, &mut fields);
        }
    }
    fields
}

fn flatten(path: &str, value: &Value, fields: &mut BTreeMap<String, Vec<Token>>) {
    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (name, nested) in map {
                flatten(&format!("{}.{}", path, name), nested, fields);
            }
        }
        Value::Array(items) => {
            for item in items {
                flatten(path, item, fields);
            }
        }
        Value::String(text) => append(fields, path, analysis::analyze(text)),
        Value::Number(_) | Value::Bool(_) => append(
            fields,
            path,
            vec![Token {
                term: value.to_string(),
                position: 0,
            }],
        ),
    }
}

fn append(fields: &mut BTreeMap<String, Vec<Token>>, path: &str, tokens: Vec<Token>) {
    if tokens.is_empty() {
        return;
    }
    let existing = fields.entry(path.to_string()).or_default();
    let offset = existing
        .last()
        .map_or(0, |token| token.position + POSITION_GAP);
    existing.extend(tokens.into_iter().map(|token| Token {
        term: token.term,
        position: token.position + offset,
    }));
}

fn validate_index_name(name: &str) -> Result<(), SearchError> {
    let reason = if name.is_empty() {
        Some("must not be empty")
    } else if name.chars().any(char::is_uppercase) {
        Some("must be lowercase")
    } else if name.starts_with(['_', '-', '+']) {
        Some("must not start with '_', '-', or '+'")
    } else if name.chars().any(|c| c.is_whitespace() || INVALID_INDEX_CHARS.contains(&c)) {
        Some("must not contain whitespace or any of \\ / * ? \" < > | , #")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(SearchError::InvalidIndexName {
            name: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

fn validate_key(doc_type: &str, id: &str) -> Result<(), SearchError> {
    if doc_type.is_empty() {
        return Err(SearchError::InvalidId { what: "type" });
    }
    if id.is_empty() {
        return Err(SearchError::InvalidId { what: "id" });
    }
    Ok(())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
