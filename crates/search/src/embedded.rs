//! Embedded sessions and the registry of in-process clusters.
//!
//! Starting a session for a cluster name that is already running joins the
//! existing node, so every embedded session in the process with the same
//! cluster name sees the same documents. A node stops when the last handle
//! to it (session or HTTP facade) is released.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::SearchError;
use crate::model::{DeleteResponse, GetResponse, IndexResponse, SearchRequest, SearchResponse};
use crate::node::EmbeddedNode;
use crate::session::Session;

static CLUSTERS: Lazy<Mutex<HashMap<String, Weak<EmbeddedNode>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Start a node for `cluster_name`, or join the one already running.
pub fn start_node(cluster_name: &str) -> Arc<EmbeddedNode> {
    let mut clusters = CLUSTERS.lock();
    if let Some(node) = clusters.get(cluster_name).and_then(Weak::upgrade) {
        tracing::info!(cluster = cluster_name, "joining running embedded node");
        return node;
    }

    let node = Arc::new(EmbeddedNode::new(cluster_name));
    clusters.insert(cluster_name.to_string(), Arc::downgrade(&node));
    tracing::info!(cluster = cluster_name, "embedded node started");
    node
}

/// True while some handle keeps the cluster's node alive.
pub fn is_running(cluster_name: &str) -> bool {
    CLUSTERS
        .lock()
        .get(cluster_name)
        .is_some_and(|node| node.strong_count() > 0)
}

/// Names of the clusters currently running in this process, sorted.
pub fn running_clusters() -> Vec<String> {
    let mut clusters = CLUSTERS.lock();
    clusters.retain(|_, node| node.strong_count() > 0);
    let mut names: Vec<String> = clusters.keys().cloned().collect();
    names.sort();
    names
}

/// A session served by an in-process node.
pub struct EmbeddedSession {
    cluster_name: String,
    node: Mutex<Option<Arc<EmbeddedNode>>>,
}

impl EmbeddedSession {
    pub fn start(cluster_name: &str) -> Self {
        Self::attach(start_node(cluster_name))
    }

    /// Open a session on a node the caller already holds.
    pub fn attach(node: Arc<EmbeddedNode>) -> Self {
        Self {
            cluster_name: node.cluster_name().to_string(),
            node: Mutex::new(Some(node)),
        }
    }

    fn node(&self) -> Result<Arc<EmbeddedNode>, SearchError> {
        self.node.lock().clone().ok_or(SearchError::Closed)
    }
}

#[async_trait]
impl Session for EmbeddedSession {
    fn endpoint(&self) -> String {
        format!("embedded://{}", self.cluster_name)
    }

    async fn index(
        &self,
        index: &str,
        doc_type: &str,
        id: &str,
        source: &Value,
    ) -> Result<IndexResponse, SearchError> {
        self.node()?.index(index, doc_type, id, source.clone())
    }

    async fn get(&self, index: &str, doc_type: &str, id: &str) -> Result<GetResponse, SearchError> {
        self.node()?.get(index, doc_type, id)
    }

    async fn delete(
        &self,
        index: &str,
        doc_type: &str,
        id: &str,
    ) -> Result<DeleteResponse, SearchError> {
        self.node()?.delete(index, doc_type, id)
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        self.node()?.search(request)
    }

    fn close(&self) -> Result<(), SearchError> {
        if self.node.lock().take().is_some() {
            tracing::info!(cluster = %self.cluster_name, "embedded session closed");
        }
        Ok(())
    }
}
