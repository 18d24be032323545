//! Session against a search collaborator reachable over HTTP/JSON.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::SearchError;
use crate::model::{DeleteResponse, GetResponse, IndexResponse, SearchRequest, SearchResponse};
use crate::session::Session;

pub struct RemoteSession {
    base_url: Url,
    client: Client,
    refresh_on_write: bool,
    closed: AtomicBool,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Structured {
        #[serde(rename = "type")]
        error_type: String,
        #[serde(default)]
        reason: String,
    },
    Message(String),
}

impl RemoteSession {
    /// Build a client for `host:port` and make sure the collaborator answers.
    pub async fn connect(
        host: &str,
        port: u16,
        request_timeout: Duration,
        refresh_on_write: bool,
    ) -> Result<Self, SearchError> {
        let endpoint = format!("http://{}:{}/", host, port);
        let base_url = Url::parse(&endpoint).map_err(|err| SearchError::Connection {
            endpoint: endpoint.clone(),
            message: err.to_string(),
        })?;
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|err| SearchError::Connection {
                endpoint: endpoint.clone(),
                message: err.to_string(),
            })?;

        let session = Self {
            base_url,
            client,
            refresh_on_write,
            closed: AtomicBool::new(false),
        };

        let info: Value = session
            .send(session.client.get(session.base_url.clone()), "", None)
            .await
            .map_err(|err| match err {
                SearchError::Connection { .. } => err,
                other => SearchError::Connection {
                    endpoint: endpoint.clone(),
                    message: other.to_string(),
                },
            })?;

        let cluster = info
            .get("cluster_name")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unknown");
        tracing::info!(
            endpoint = %endpoint,
            cluster,
            "connected to search collaborator"
        );

        Ok(session)
    }

    fn ensure_open(&self) -> Result<(), SearchError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SearchError::Closed);
        }
        Ok(())
    }

    fn url(&self, segments: &[&str]) -> Result<Url, SearchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| SearchError::Connection {
                endpoint: self.base_url.to_string(),
                message: "base url cannot carry a path".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, SearchError> {
        self.ensure_open()?;
        Ok(self.client.request(method, self.url(segments)?))
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        index: &str,
        query: Option<&str>,
    ) -> Result<T, SearchError> {
        let response = request.send().await.map_err(|err| self.transport_error(err))?;
        self.decode(response, index, query, false).await
    }

    /// Like `send`, but a 404 carrying a regular body (`found: false`) is not an error.
    async fn send_lookup<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        index: &str,
    ) -> Result<T, SearchError> {
        let response = request.send().await.map_err(|err| self.transport_error(err))?;
        self.decode(response, index, None, true).await
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        response: Response,
        index: &str,
        query: Option<&str>,
        accept_not_found: bool,
    ) -> Result<T, SearchError> {
        let status = response.status();
        let body = response.text().await.map_err(|err| self.transport_error(err))?;

        if status.is_success() {
            return Ok(serde_json::from_str(&body)?);
        }
        if accept_not_found && status == StatusCode::NOT_FOUND {
            if let Ok(parsed) = serde_json::from_str(&body) {
                return Ok(parsed);
            }
        }
        Err(error_from_body(status, &body, index, query))
    }

    fn transport_error(&self, err: reqwest::Error) -> SearchError {
        SearchError::Connection {
            endpoint: self.base_url.to_string(),
            message: err.to_string(),
        }
    }
}

#[async_trait]
impl Session for RemoteSession {
    fn endpoint(&self) -> String {
        self.base_url.to_string()
    }

    async fn index(
        &self,
        index: &str,
        doc_type: &str,
        id: &str,
        source: &Value,
    ) -> Result<IndexResponse, SearchError> {
        let mut request = self.request(Method::PUT, &[index, doc_type, id])?.json(source);
        if self.refresh_on_write {
            request = request.query(&[("refresh", "true")]);
        }
        let response: IndexResponse = self.send(request, index, None).await?;
        tracing::debug!(index, doc_type, id = %response.id, version = response.version, "document indexed");
        Ok(response)
    }

    async fn get(&self, index: &str, doc_type: &str, id: &str) -> Result<GetResponse, SearchError> {
        let request = self.request(Method::GET, &[index, doc_type, id])?;
        self.send_lookup(request, index).await
    }

    async fn delete(
        &self,
        index: &str,
        doc_type: &str,
        id: &str,
    ) -> Result<DeleteResponse, SearchError> {
        let request = self.request(Method::DELETE, &[index, doc_type, id])?;
        self.send_lookup(request, index).await
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        let types = request.types.join(",");
        let mut segments = vec![request.index.as_str()];
        if !types.is_empty() {
            segments.push(&types);
        }
        segments.push("_search");

        let http = self.request(Method::POST, &segments)?.json(&request.body());
        let response: SearchResponse = self
            .send(http, &request.index, Some(&request.query.query))
            .await?;
        tracing::debug!(
            index = %request.index,
            total = response.hits.total,
            took_ms = response.took,
            "search executed"
        );
        Ok(response)
    }

    fn close(&self) -> Result<(), SearchError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::info!(endpoint = %self.base_url, "remote session closed");
        }
        Ok(())
    }
}

/// Map an error body back onto the matching `SearchError` variant.
fn error_from_body(status: StatusCode, body: &str, index: &str, query: Option<&str>) -> SearchError {
    let (error_type, reason) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope {
            error: ErrorDetail::Structured { error_type, reason },
        }) => (error_type, reason),
        Ok(ErrorEnvelope {
            error: ErrorDetail::Message(message),
        }) => ("error".to_string(), message),
        Err(_) => (
            status
                .canonical_reason()
                .unwrap_or("unknown")
                .to_lowercase()
                .replace(' ', "_"),
            body.to_string(),
        ),
    };

    match error_type.as_str() {
        "index_not_found_exception" | "index_missing_exception" => {
            SearchError::IndexNotFound(index.to_string())
        }
        "query_parsing_exception" | "query_shard_exception" | "search_phase_execution_exception"
            if query.is_some() =>
        {
            SearchError::QueryParse {
                query: query.unwrap_or_default().to_string(),
                reason,
            }
        }
        "invalid_index_name_exception" => SearchError::InvalidIndexName {
            name: index.to_string(),
            reason,
        },
        "mapper_parsing_exception" => SearchError::MalformedDocument(reason),
        _ => SearchError::Remote {
            status: status.as_u16(),
            error_type,
            reason,
        },
    }
}
