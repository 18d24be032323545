use std::sync::Arc;

use bookindex_app::books::{self, Book, BookCatalog};
use bookindex_kernel::{SearchSettings, Settings};
use bookindex_search::{connect, embedded, EmbeddedNode, SearchRequest, SessionConfig};
use chrono::NaiveDate;

fn hitchhiker() -> Book {
    Book::new()
        .with_name("Hitch hiker's guide to the galaxy")
        .with_author("Douglas Adams")
        .with_publication_date(NaiveDate::from_ymd_opt(1980, 1, 1).unwrap())
}

#[tokio::test]
async fn embedded_scenario_step_by_step() {
    let session = connect(&SessionConfig::embedded("round-trip-steps")).await.unwrap();
    let catalog = BookCatalog::new(&*session);

    let mut book = hitchhiker();
    let first = catalog.index_book("1", &book).await.unwrap();
    assert_eq!(first.id, "1");
    assert_eq!(first.index, books::INDEX);
    assert_eq!(first.doc_type, books::DOC_TYPE);

    book.set_name(Some("restaurant at the end of the universe".to_string()));
    let second = catalog.index_book("2", &book).await.unwrap();
    assert_eq!(second.id, "2");

    let found = catalog.search_by_author("Douglas").await.unwrap();
    assert_eq!(found.total, 2);
    assert_eq!(found.books.len(), 2);
    for hit in &found.books {
        assert_eq!(hit.book.author(), Some("Douglas Adams"));
    }

    session.close().unwrap();
    assert!(!embedded::is_running("round-trip-steps"));
}

#[tokio::test]
async fn embedded_round_trip_passes() {
    let session = connect(&SessionConfig::embedded("round-trip-embedded")).await.unwrap();

    let report = books::verify_round_trip(&*session).await.unwrap();
    assert_eq!(report.indexed_ids, vec!["1".to_string(), "2".to_string()]);
    assert_eq!(report.search.total, 2);

    let mut names: Vec<_> = report
        .search
        .books
        .iter()
        .filter_map(|found| found.book.name().map(str::to_string))
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "Hitch hiker's guide to the galaxy".to_string(),
            "restaurant at the end of the universe".to_string(),
        ]
    );
}

#[tokio::test]
async fn remote_round_trip_passes_against_http_facade() {
    let mut settings = Settings::default();
    settings.server.port = 0;

    let node = Arc::new(EmbeddedNode::new("round-trip-remote"));
    let server = bookindex_http::spawn_server(node.clone(), &settings).await.unwrap();
    let port = server.local_addr().port();

    let session = connect(&SessionConfig::remote("127.0.0.1", port)).await.unwrap();
    assert_eq!(session.endpoint(), format!("http://127.0.0.1:{}/", port));

    let report = books::verify_round_trip(&*session).await.unwrap();
    assert_eq!(report.search.total, 2);

    let stats = node.stats();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].index, books::INDEX);
    assert_eq!(stats[0].document_count, 2);

    session.close().unwrap();
    server.shutdown().await;
}

#[tokio::test]
async fn unmatched_author_reports_zero_total() {
    let session = connect(&SessionConfig::embedded("round-trip-no-match")).await.unwrap();
    let catalog = BookCatalog::new(&*session);
    catalog.index_book("1", &hitchhiker()).await.unwrap();

    let found = catalog.search_by_author("Tolkien").await.unwrap();
    assert_eq!(found.total, 0);
    assert!(found.books.is_empty());

    // Every term has to match under AND.
    let found = catalog.search_by_author("Douglas Tolkien").await.unwrap();
    assert_eq!(found.total, 0);
}

#[tokio::test]
async fn last_write_wins_per_id() {
    let session = connect(&SessionConfig::embedded("round-trip-overwrite")).await.unwrap();
    let catalog = BookCatalog::new(&*session);

    let first = catalog.index_book("1", &hitchhiker()).await.unwrap();
    assert_eq!(first.version, 1);
    assert!(first.created);

    let renamed = hitchhiker().with_name("life, the universe and everything");
    let second = catalog.index_book("1", &renamed).await.unwrap();
    assert_eq!(second.version, 2);
    assert!(!second.created);

    let stored = catalog.get_book("1").await.unwrap();
    assert_eq!(stored, Some(renamed));

    let found = catalog.search_by_author("Douglas").await.unwrap();
    assert_eq!(found.total, 1);

    assert!(catalog.remove_book("1").await.unwrap());
    assert_eq!(catalog.get_book("1").await.unwrap(), None);
    assert!(!catalog.remove_book("1").await.unwrap());
}

#[tokio::test]
async fn unwritten_collection_reads_as_missing_book() {
    let session = connect(&SessionConfig::embedded("round-trip-empty")).await.unwrap();
    let catalog = BookCatalog::new(&*session);

    assert_eq!(catalog.get_book("1").await.unwrap(), None);
    assert!(catalog.search_by_author("Douglas").await.is_err());
}

#[tokio::test]
async fn failed_assertion_still_releases_embedded_cluster() {
    const CLUSTER: &str = "round-trip-teardown";

    let outcome = tokio::spawn(async {
        let session = connect(&SessionConfig::embedded(CLUSTER)).await.unwrap();
        let catalog = BookCatalog::new(&*session);
        catalog.index_book("1", &hitchhiker()).await.unwrap();
        assert!(embedded::is_running(CLUSTER));

        let found = catalog.search_by_author("Douglas").await.unwrap();
        assert_eq!(found.total, 2, "only one book was indexed");
    })
    .await;

    assert!(outcome.unwrap_err().is_panic());
    assert!(!embedded::is_running(CLUSTER));
    assert!(!embedded::running_clusters().contains(&CLUSTER.to_string()));
}

#[tokio::test]
async fn settings_select_embedded_mode() {
    let settings = SearchSettings {
        embedded: true,
        cluster_name: "round-trip-settings".to_string(),
        ..SearchSettings::default()
    };
    let config = SessionConfig::from(&settings);
    assert_eq!(config, SessionConfig::embedded("round-trip-settings"));

    let session = connect(&config).await.unwrap();
    assert_eq!(session.endpoint(), "embedded://round-trip-settings");

    let report = books::verify_round_trip(&*session).await.unwrap();
    assert_eq!(report.search.total, 2);

    // Paging past the first hit still reports every match.
    let paged = session
        .search(
            &SearchRequest::new(books::INDEX)
                .types([books::DOC_TYPE])
                .query(books::author_query("Douglas"))
                .size(1),
        )
        .await
        .unwrap();
    assert_eq!(paged.total_hits(), 2);
    assert_eq!(paged.hits.hits.len(), 1);
}
