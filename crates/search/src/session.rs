//! Session abstraction over the two collaborator modes.

use std::ops::Deref;
use std::time::Duration;

use async_trait::async_trait;
use bookindex_kernel::SearchSettings;
use serde_json::Value;

use crate::embedded::EmbeddedSession;
use crate::error::SearchError;
use crate::model::{DeleteResponse, GetResponse, IndexResponse, SearchRequest, SearchResponse};
use crate::remote::RemoteSession;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(15000);

/// An established handle to a search collaborator.
#[async_trait]
pub trait Session: Send + Sync {
    /// Where this session points, for logs.
    fn endpoint(&self) -> String;

    /// Store `source` under `index/doc_type/id`; the response carries the id actually stored.
    async fn index(
        &self,
        index: &str,
        doc_type: &str,
        id: &str,
        source: &Value,
    ) -> Result<IndexResponse, SearchError>;

    async fn get(&self, index: &str, doc_type: &str, id: &str) -> Result<GetResponse, SearchError>;

    async fn delete(
        &self,
        index: &str,
        doc_type: &str,
        id: &str,
    ) -> Result<DeleteResponse, SearchError>;

    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError>;

    /// Release the collaborator. Closing twice is a no-op; other calls fail with `Closed` afterwards.
    fn close(&self) -> Result<(), SearchError>;
}

/// Which collaborator a session talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionConfig {
    Remote {
        host: String,
        port: u16,
        request_timeout: Duration,
        refresh_on_write: bool,
    },
    Embedded {
        cluster_name: String,
    },
}

impl SessionConfig {
    pub fn remote(host: impl Into<String>, port: u16) -> Self {
        Self::Remote {
            host: host.into(),
            port,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            refresh_on_write: true,
        }
    }

    pub fn embedded(cluster_name: impl Into<String>) -> Self {
        Self::Embedded {
            cluster_name: cluster_name.into(),
        }
    }
}

impl From<&SearchSettings> for SessionConfig {
    fn from(settings: &SearchSettings) -> Self {
        if settings.embedded {
            Self::embedded(settings.cluster_name.clone())
        } else {
            Self::Remote {
                host: settings.host.clone(),
                port: settings.port,
                request_timeout: Duration::from_millis(settings.request_timeout_ms),
                refresh_on_write: settings.refresh_on_write,
            }
        }
    }
}

/// Open a session for `config`.
///
/// The returned guard releases the session when dropped, including while
/// unwinding from a panic.
pub async fn connect(config: &SessionConfig) -> Result<ScopedSession, SearchError> {
    let session: Box<dyn Session> = match config {
        SessionConfig::Remote {
            host,
            port,
            request_timeout,
            refresh_on_write,
        } => Box::new(RemoteSession::connect(host, *port, *request_timeout, *refresh_on_write).await?),
        SessionConfig::Embedded { cluster_name } => Box::new(EmbeddedSession::start(cluster_name)),
    };

    tracing::info!(endpoint = %session.endpoint(), "search session established");
    Ok(ScopedSession::new(session))
}

/// Owns a session and closes it exactly once.
pub struct ScopedSession {
    session: Box<dyn Session>,
    released: bool,
}

impl ScopedSession {
    pub fn new(session: Box<dyn Session>) -> Self {
        Self {
            session,
            released: false,
        }
    }

    /// Close now and report the outcome instead of logging it from `Drop`.
    pub fn close(mut self) -> Result<(), SearchError> {
        self.released = true;
        let endpoint = self.session.endpoint();
        self.session.close()?;
        tracing::info!(endpoint = %endpoint, "search session released");
        Ok(())
    }
}

impl Deref for ScopedSession {
    type Target = dyn Session;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref()
    }
}

impl Drop for ScopedSession {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match self.session.close() {
            Ok(()) => tracing::info!(endpoint = %self.session.endpoint(), "search session released"),
            Err(err) => tracing::warn!(
                endpoint = %self.session.endpoint(),
                error = %err,
                "failed to release search session"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedded;
    use bookindex_kernel::Settings;
    use serde_json::json;

    #[test]
    fn settings_select_the_session_mode() {
        let mut settings = Settings::default().search;
        assert_eq!(
            SessionConfig::from(&settings),
            SessionConfig::Remote {
                host: "localhost".to_string(),
                port: 9300,
                request_timeout: Duration::from_millis(15000),
                refresh_on_write: true,
            }
        );

        settings.embedded = true;
        assert_eq!(
            SessionConfig::from(&settings),
            SessionConfig::embedded("test-cluster")
        );
    }

    #[tokio::test]
    async fn explicit_close_releases_the_node() {
        let session = connect(&SessionConfig::embedded("session-explicit-close"))
            .await
            .unwrap();
        assert!(embedded::is_running("session-explicit-close"));

        session.close().unwrap();
        assert!(!embedded::is_running("session-explicit-close"));
    }

    #[tokio::test]
    async fn drop_releases_the_node_after_a_panic() {
        let handle = tokio::spawn(async {
            let session = connect(&SessionConfig::embedded("session-panic"))
                .await
                .unwrap();
            session
                .index("bookindex", "book", "1", &json!({"author": "Douglas Adams"}))
                .await
                .unwrap();
            panic!("simulated failure while the session is open");
        });

        let outcome = handle.await;
        assert!(outcome.unwrap_err().is_panic());
        assert!(!embedded::is_running("session-panic"));
    }

    #[tokio::test]
    async fn unreachable_remote_fails_to_connect() {
        // Port 1 is reserved and nothing listens there.
        let config = SessionConfig::Remote {
            host: "127.0.0.1".to_string(),
            port: 1,
            request_timeout: Duration::from_millis(2000),
            refresh_on_write: true,
        };
        let err = connect(&config).await.err().unwrap();
        assert!(matches!(err, SearchError::Connection { .. }));
    }
}
