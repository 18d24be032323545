//! Document, search and info endpoints served for an embedded node.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use bookindex_search::{
    DeleteResponse, EmbeddedNode, GetResponse, IndexResponse, Operator, QueryStringQuery,
    SearchBody, SearchError, SearchRequest, SearchResponse,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::AppError;

type NodeState = State<Arc<EmbeddedNode>>;

/// URI search parameters, used when a search request carries no body.
#[derive(Debug, Default, Deserialize)]
pub struct UriSearch {
    pub q: Option<String>,
    pub df: Option<String>,
    pub default_operator: Option<Operator>,
    pub from: Option<usize>,
    pub size: Option<usize>,
}

pub fn node_routes(node: Arc<EmbeddedNode>) -> Router {
    Router::new()
        .route("/", get(node_info))
        .route("/{index}/_search", get(search_index).post(search_index))
        .route(
            "/{index}/{doc_type}/_search",
            get(search_types).post(search_types),
        )
        .route(
            "/{index}/{doc_type}/{id}",
            get(get_document)
                .put(index_document)
                .post(index_document)
                .delete(delete_document),
        )
        .with_state(node)
}

async fn node_info(State(node): NodeState) -> Json<Value> {
    Json(json!({
        "name": "bookindex-embedded",
        "cluster_name": node.cluster_name(),
        "version": { "number": env!("CARGO_PKG_VERSION") },
    }))
}

async fn index_document(
    State(node): NodeState,
    Path((index, doc_type, id)): Path<(String, String, String)>,
    body: Bytes,
) -> Result<(StatusCode, Json<IndexResponse>), AppError> {
    let source: Value = serde_json::from_slice(&body)
        .map_err(|err| SearchError::MalformedDocument(err.to_string()))?;
    let response = node.index(&index, &doc_type, &id, source)?;
    let status = if response.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(response)))
}

async fn get_document(
    State(node): NodeState,
    Path((index, doc_type, id)): Path<(String, String, String)>,
) -> Result<(StatusCode, Json<GetResponse>), AppError> {
    let response = node.get(&index, &doc_type, &id)?;
    Ok((found_status(response.found), Json(response)))
}

async fn delete_document(
    State(node): NodeState,
    Path((index, doc_type, id)): Path<(String, String, String)>,
) -> Result<(StatusCode, Json<DeleteResponse>), AppError> {
    let response = node.delete(&index, &doc_type, &id)?;
    Ok((found_status(response.found), Json(response)))
}

async fn search_index(
    State(node): NodeState,
    Path(index): Path<String>,
    Query(params): Query<UriSearch>,
    body: Bytes,
) -> Result<Json<SearchResponse>, AppError> {
    search(&node, index, Vec::new(), params, &body)
}

async fn search_types(
    State(node): NodeState,
    Path((index, doc_types)): Path<(String, String)>,
    Query(params): Query<UriSearch>,
    body: Bytes,
) -> Result<Json<SearchResponse>, AppError> {
    let types = doc_types
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    search(&node, index, types, params, &body)
}

fn search(
    node: &EmbeddedNode,
    index: String,
    types: Vec<String>,
    params: UriSearch,
    body: &[u8],
) -> Result<Json<SearchResponse>, AppError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        uri_request(index, types, params)
    } else {
        let body: SearchBody = serde_json::from_slice(body)
            .map_err(|err| AppError::bad_request("parse_exception", err.to_string()))?;
        body.into_request(index, types)
    };

    Ok(Json(node.search(&request)?))
}

fn uri_request(index: String, types: Vec<String>, params: UriSearch) -> SearchRequest {
    let mut query = QueryStringQuery::new(params.q.unwrap_or_default())
        .default_operator(params.default_operator.unwrap_or_default());
    if let Some(field) = params.df {
        query = query.field(field);
    }

    let mut request = SearchRequest::new(index).types(types).query(query);
    if let Some(from) = params.from {
        request = request.from(from);
    }
    if let Some(size) = params.size {
        request = request.size(size);
    }
    request
}

fn found_status(found: bool) -> StatusCode {
    if found {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}
