//! Request and response types exchanged with a search collaborator.
//!
//! Field names follow the collaborator's JSON wire format (`_index`, `_type`,
//! `_id`, `_source`, ...) so the same types serve the remote client and the
//! HTTP facade that exposes an embedded node.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::SearchError;

/// Page size used when a search request does not set one.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// How bare query clauses combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operator {
    /// At least one clause has to match.
    #[default]
    Or,
    /// Every clause has to match.
    And,
}

fn default_true() -> bool {
    true
}

/// A query-string query scoped to zero or more fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryStringQuery {
    pub query: String,
    /// Fields searched by unqualified clauses; empty means every field.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
    #[serde(default)]
    pub default_operator: Operator,
    #[serde(default = "default_true")]
    pub allow_leading_wildcard: bool,
    /// Score a multi-field clause by its best field instead of the sum.
    #[serde(default = "default_true")]
    pub use_dis_max: bool,
}

impl QueryStringQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            fields: Vec::new(),
            default_operator: Operator::default(),
            allow_leading_wildcard: true,
            use_dis_max: true,
        }
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.fields.push(field.into());
        self
    }

    pub fn default_operator(mut self, operator: Operator) -> Self {
        self.default_operator = operator;
        self
    }

    pub fn allow_leading_wildcard(mut self, allow: bool) -> Self {
        self.allow_leading_wildcard = allow;
        self
    }

    pub fn use_dis_max(mut self, use_dis_max: bool) -> Self {
        self.use_dis_max = use_dis_max;
        self
    }
}

/// A search against one index, optionally narrowed to some document types.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub index: String,
    pub types: Vec<String>,
    pub query: QueryStringQuery,
    pub from: usize,
    pub size: usize,
}

impl SearchRequest {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            types: Vec::new(),
            query: QueryStringQuery::new(""),
            from: 0,
            size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn query(mut self, query: QueryStringQuery) -> Self {
        self.query = query;
        self
    }

    pub fn from(mut self, from: usize) -> Self {
        self.from = from;
        self
    }

    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// Body sent to `/{index}/{types}/_search`.
    pub fn body(&self) -> SearchBody {
        SearchBody {
            from: self.from,
            size: self.size,
            query: QueryClause {
                query_string: self.query.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchBody {
    #[serde(default)]
    pub from: usize,
    #[serde(default = "SearchBody::default_size")]
    pub size: usize,
    pub query: QueryClause,
}

impl SearchBody {
    fn default_size() -> usize {
        DEFAULT_PAGE_SIZE
    }

    pub fn into_request(self, index: impl Into<String>, types: Vec<String>) -> SearchRequest {
        SearchRequest {
            index: index.into(),
            types,
            query: self.query.query_string,
            from: self.from,
            size: self.size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryClause {
    pub query_string: QueryStringQuery,
}

/// Outcome of storing a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexResponse {
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_type")]
    pub doc_type: String,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_version")]
    pub version: u64,
    /// False when an existing document with the same id was replaced.
    pub created: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetResponse {
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_type")]
    pub doc_type: String,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_version", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    pub found: bool,
    #[serde(rename = "_source", default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Value>,
}

impl GetResponse {
    /// Decode the stored document, if one was found.
    pub fn source_as<T: DeserializeOwned>(&self) -> Result<Option<T>, SearchError> {
        match &self.source {
            Some(source) if self.found => Ok(Some(T::deserialize(source)?)),
            _ => Ok(None),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_type")]
    pub doc_type: String,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_version", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    pub found: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Milliseconds the collaborator spent on the search.
    pub took: u64,
    #[serde(default)]
    pub timed_out: bool,
    pub hits: SearchHits,
}

impl SearchResponse {
    pub fn took(&self) -> Duration {
        Duration::from_millis(self.took)
    }

    pub fn total_hits(&self) -> u64 {
        self.hits.total
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHits {
    /// Every matching document, not just the returned page.
    #[serde(deserialize_with = "deserialize_total")]
    pub total: u64,
    #[serde(default)]
    pub max_score: Option<f32>,
    #[serde(default)]
    pub hits: Vec<SearchHit>,
}

impl SearchHits {
    pub fn iter(&self) -> std::slice::Iter<'_, SearchHit> {
        self.hits.iter()
    }
}

impl<'a> IntoIterator for &'a SearchHits {
    type Item = &'a SearchHit;
    type IntoIter = std::slice::Iter<'a, SearchHit>;

    fn into_iter(self) -> Self::IntoIter {
        self.hits.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_type")]
    pub doc_type: String,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_score", default)]
    pub score: Option<f32>,
    #[serde(rename = "_source", default)]
    pub source: Value,
}

impl SearchHit {
    /// Decode the stored document into `T`.
    pub fn source_as<T: DeserializeOwned>(&self) -> Result<T, SearchError> {
        Ok(T::deserialize(&self.source)?)
    }
}

// Newer collaborators report `{"value": n, "relation": "eq"}` instead of a bare count.
fn deserialize_total<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Total {
        Count(u64),
        Object { value: u64 },
    }

    Ok(match Total::deserialize(deserializer)? {
        Total::Count(count) => count,
        Total::Object { value } => value,
    })
}
