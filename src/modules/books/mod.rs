pub mod models;

use std::time::Duration;

use anyhow::{ensure, Context};
use bookindex_search::{
    IndexResponse, Operator, QueryStringQuery, SearchError, SearchRequest, Session,
};
use chrono::NaiveDate;

use crate::utils;
pub use models::Book;

/// Collection the books live in.
pub const INDEX: &str = "bookindex";
/// Category of book documents inside [`INDEX`].
pub const DOC_TYPE: &str = "book";

/// A book returned by a search, with the id it was stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct FoundBook {
    pub id: String,
    pub score: Option<f32>,
    pub book: Book,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookSearch {
    /// Every match, not only the decoded page in `books`.
    pub total: u64,
    pub took: Duration,
    pub books: Vec<FoundBook>,
}

/// Reads and writes books through a search session.
pub struct BookCatalog<'a> {
    session: &'a dyn Session,
}

impl<'a> BookCatalog<'a> {
    pub fn new(session: &'a dyn Session) -> Self {
        Self { session }
    }

    /// Store `book` under `id`, returning the collaborator's acknowledgement.
    pub async fn index_book(&self, id: &str, book: &Book) -> anyhow::Result<IndexResponse> {
        let source = serde_json::to_value(book).context("failed to serialize book")?;
        let response = self
            .session
            .index(INDEX, DOC_TYPE, id, &source)
            .await
            .with_context(|| format!("failed to index book '{}'", id))?;

        tracing::info!(
            prefix = %utils::log_prefix("books"),
            id = %response.id,
            version = response.version,
            "book indexed"
        );
        Ok(response)
    }

    pub async fn get_book(&self, id: &str) -> anyhow::Result<Option<Book>> {
        let response = match self.session.get(INDEX, DOC_TYPE, id).await {
            Ok(response) => response,
            Err(SearchError::IndexNotFound(_)) => return Ok(None),
            Err(err) => return Err(err).with_context(|| format!("failed to fetch book '{}'", id)),
        };
        response
            .source_as()
            .with_context(|| format!("failed to decode book '{}'", id))
    }

    /// Remove the book stored under `id`; `false` when there was none.
    pub async fn remove_book(&self, id: &str) -> anyhow::Result<bool> {
        let response = self
            .session
            .delete(INDEX, DOC_TYPE, id)
            .await
            .with_context(|| format!("failed to delete book '{}'", id))?;
        Ok(response.found)
    }

    /// Books whose author matches every term of `author`.
    pub async fn search_by_author(&self, author: &str) -> anyhow::Result<BookSearch> {
        let request = SearchRequest::new(INDEX)
            .types([DOC_TYPE])
            .query(author_query(author));

        let response = self
            .session
            .search(&request)
            .await
            .with_context(|| format!("failed to search books by author '{}'", author))?;

        let books = response
            .hits
            .iter()
            .map(|hit| {
                let book = hit
                    .source_as::<Book>()
                    .with_context(|| format!("failed to decode book '{}'", hit.id))?;
                Ok(FoundBook {
                    id: hit.id.clone(),
                    score: hit.score,
                    book,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(BookSearch {
            total: response.total_hits(),
            took: response.took(),
            books,
        })
    }
}

/// Query matching `author` against the `author` field only.
pub fn author_query(author: &str) -> QueryStringQuery {
    QueryStringQuery::new(author)
        .field("author")
        .default_operator(Operator::And)
        .allow_leading_wildcard(false)
        .use_dis_max(true)
}

/// What the round trip stored and found.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundTripReport {
    pub indexed_ids: Vec<String>,
    pub search: BookSearch,
}

/// Index two Douglas Adams books under ids "1" and "2", then find both by author.
///
/// Every step must succeed; the first failed check aborts the run.
pub async fn verify_round_trip(session: &dyn Session) -> anyhow::Result<RoundTripReport> {
    let catalog = BookCatalog::new(session);
    let published = NaiveDate::from_ymd_opt(1980, 1, 1).context("invalid publication date")?;

    let mut book = Book::new()
        .with_name("Hitch hiker's guide to the galaxy")
        .with_author("Douglas Adams")
        .with_publication_date(published);

    let first = catalog.index_book("1", &book).await?;
    ensure!(first.id == "1", "expected book to be stored as '1', got '{}'", first.id);

    book.set_name(Some("restaurant at the end of the universe".to_string()));
    let second = catalog.index_book("2", &book).await?;
    ensure!(second.id == "2", "expected book to be stored as '2', got '{}'", second.id);

    let search = catalog.search_by_author("Douglas").await?;
    ensure!(
        search.total == 2,
        "expected 2 books by Douglas, found {}",
        search.total
    );

    tracing::info!(total = search.total, "Search hits");
    tracing::info!(took_ms = search.took.as_millis() as u64, "Search took");
    for found in &search.books {
        tracing::info!(id = %found.id, book = %found.book, "Found book");
    }

    Ok(RoundTripReport {
        indexed_ids: vec![first.id, second.id],
        search,
    })
}
