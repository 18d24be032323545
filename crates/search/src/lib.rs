//! Client sessions for the search collaborator that stores and queries books.
//!
//! Two interchangeable modes sit behind the [`Session`] trait:
//!
//! - **remote**: HTTP/JSON against a running search service (`host:port`).
//! - **embedded**: an in-process [`EmbeddedNode`], started and stopped with the session.
//!
//! [`connect`] picks the mode from a [`SessionConfig`] and hands back a
//! [`ScopedSession`] that releases the collaborator when it goes out of scope.

pub mod analysis;
pub mod embedded;
pub mod error;
pub mod model;
pub mod node;
pub mod query;
pub mod remote;
pub mod session;

pub use embedded::EmbeddedSession;
pub use error::SearchError;
pub use model::{
    DeleteResponse, GetResponse, IndexResponse, Operator, QueryStringQuery, SearchBody, SearchHit,
    SearchHits, SearchRequest, SearchResponse,
};
pub use node::EmbeddedNode;
pub use remote::RemoteSession;
pub use session::{connect, ScopedSession, Session, SessionConfig};
