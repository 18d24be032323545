//! Error type shared by every session implementation.

use thiserror::Error;

/// Failures reported by a search collaborator or the client talking to it.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("unable to reach search collaborator at {endpoint}: {message}")]
    Connection { endpoint: String, message: String },

    #[error("session is closed")]
    Closed,

    #[error("invalid index name '{name}': {reason}")]
    InvalidIndexName { name: String, reason: String },

    #[error("invalid {what}: must not be empty")]
    InvalidId { what: &'static str },

    #[error("failed to parse document: {0}")]
    MalformedDocument(String),

    #[error("no such index [{0}]")]
    IndexNotFound(String),

    #[error("failed to parse query [{query}]: {reason}")]
    QueryParse { query: String, reason: String },

    #[error("search collaborator answered {status}: {error_type}: {reason}")]
    Remote {
        status: u16,
        error_type: String,
        reason: String,
    },

    #[error("failed to decode payload: {0}")]
    Decode(#[from] serde_json::Error),
}

impl SearchError {
    pub(crate) fn query_parse(query: &str, reason: impl Into<String>) -> Self {
        Self::QueryParse {
            query: query.to_string(),
            reason: reason.into(),
        }
    }

    /// Short machine-readable kind, used as the `type` of wire error bodies.
    pub fn error_type(&self) -> &str {
        match self {
            SearchError::Connection { .. } => "connect_transport_exception",
            SearchError::Closed => "node_closed_exception",
            SearchError::InvalidIndexName { .. } => "invalid_index_name_exception",
            SearchError::InvalidId { .. } => "action_request_validation_exception",
            SearchError::MalformedDocument(_) => "mapper_parsing_exception",
            SearchError::IndexNotFound(_) => "index_not_found_exception",
            SearchError::QueryParse { .. } => "query_parsing_exception",
            SearchError::Remote { error_type, .. } => error_type,
            SearchError::Decode(_) => "parse_exception",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_parse_renders_query_and_reason() {
        let err = SearchError::query_parse("*ouglas", "leading wildcard is not allowed");
        assert_eq!(
            err.to_string(),
            "failed to parse query [*ouglas]: leading wildcard is not allowed"
        );
        assert_eq!(err.error_type(), "query_parsing_exception");
    }

    #[test]
    fn remote_errors_keep_their_reported_type() {
        let err = SearchError::Remote {
            status: 503,
            error_type: "cluster_block_exception".to_string(),
            reason: "blocked".to_string(),
        };
        assert_eq!(err.error_type(), "cluster_block_exception");
    }
}
