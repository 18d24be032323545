use anyhow::Context;
use bookindex_app::books::{self, BookCatalog};
use bookindex_kernel::Settings;
use bookindex_search::{connect, embedded, SessionConfig};
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "bookindex", version, about = "Index and search books")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start an embedded node and serve it over HTTP
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Index two books and check that both come back from an author search
    Verify {
        /// Run against an in-process node instead of the configured host
        #[arg(long)]
        embedded: bool,
    },
    /// Find books by author
    Search {
        #[arg(long)]
        author: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load().with_context(|| "failed to load bookindex settings")?;
    bookindex_telemetry::init(&settings.telemetry).with_context(|| "failed to initialize logging")?;

    tracing::info!(env = ?settings.environment, "bookindex starting");

    match cli.command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                settings.server.host = host;
            }
            if let Some(port) = port {
                settings.server.port = port;
            }
            let node = embedded::start_node(&settings.search.cluster_name);
            bookindex_http::start_server(node, &settings).await
        }
        Command::Verify { embedded } => {
            if embedded {
                settings.search.embedded = true;
            }
            verify(&settings).await
        }
        Command::Search { author } => search(&settings, &author).await,
    }
}

async fn verify(settings: &Settings) -> anyhow::Result<()> {
    let session = connect(&SessionConfig::from(&settings.search))
        .await
        .with_context(|| "failed to connect to search collaborator")?;

    let report = books::verify_round_trip(&*session).await?;
    session.close()?;

    println!(
        "round trip passed: indexed {} books, found {} by author",
        report.indexed_ids.len(),
        report.search.total
    );
    Ok(())
}

async fn search(settings: &Settings, author: &str) -> anyhow::Result<()> {
    let session = connect(&SessionConfig::from(&settings.search))
        .await
        .with_context(|| "failed to connect to search collaborator")?;

    let found = BookCatalog::new(&*session).search_by_author(author).await?;
    session.close()?;

    println!("{} books by '{}' ({} ms)", found.total, author, found.took.as_millis());
    for hit in &found.books {
        println!("{}\t{}", hit.id, hit.book);
    }
    Ok(())
}
