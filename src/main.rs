use clap::{Args, Parser, Subcommand};
use dropshelf_catalog::{BookEntry, BookId, Library, Page, PageRequest, Sort, Stats};
use dropshelf_config::Config;
use dropshelf_storage::BackendHandle;
use dropshelf_storage::backend::LocalBackend;
use miette::Result;
use serde::Serialize;
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dropshelf", version, about = "Browse and search a directory of ebooks")]
struct Cli {
    /// Configuration file (TOML, YAML or JSON), layered over the defaults.
    #[arg(long, global = true, env = "DROPSHELF_CONFIG")]
    config: Option<PathBuf>,
    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,
    /// More logging; repeat for even more. Ignored when `RUST_LOG` is set.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rescan the library now, regardless of the catalog's age.
    Scan {
        /// Also report how reading every book's metadata went.
        #[arg(long)]
        wait: bool,
    },
    /// List books, by title unless told otherwise.
    List {
        /// Most recently modified first.
        #[arg(long, conflicts_with = "author")]
        recent: bool,
        /// By author.
        #[arg(long)]
        author: bool,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Find books by title or author.
    Search {
        query: String,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Show a single book.
    Show { id: String },
    /// Describe the cached catalog without scanning.
    Stats,
}

#[derive(Args)]
struct PageArgs {
    #[arg(long, default_value_t = 1)]
    page: usize,
    /// Defaults to the configured page size.
    #[arg(long, default_value_t = 0)]
    page_size: usize,
}
impl From<PageArgs> for PageRequest {
    fn from(args: PageArgs) -> Self {
        PageRequest::new(args.page, args.page_size)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load(cli.config.as_deref()).map_err(report)?;
    tracing::debug!(root = %config.root.display(), cache_file = ?config.cache_file, "configuration loaded");
    let settings = config.library_settings();
    let backend: BackendHandle = Arc::new(LocalBackend::new("local", &settings.scan.root).map_err(report)?);
    let library = Library::open(backend, settings).await;

    match cli.command {
        Command::Scan { wait } => {
            let summary = library.refresh().await.map_err(report)?;
            let status = match wait {
                true => Some(library.wait_for_enrichment().await),
                false => None,
            };
            match cli.json {
                true => print_json(&serde_json::json!({ "refresh": summary, "enrichment": status }))?,
                false => {
                    println!("generation {}: {} books", summary.generation, summary.entries);
                    if let Some(status) = status {
                        println!("metadata read for {} books ({} failed)", status.processed, status.failed);
                    }
                },
            }
        },
        Command::List { recent, author, page } => {
            let sort = match (recent, author) {
                (true, _) => Sort::Recent,
                (_, true) => Sort::Author,
                _ => Sort::Title,
            };
            let page = library.list(sort, page.into()).await.map_err(report)?;
            output_page(&page, cli.json)?;
        },
        Command::Search { query, page } => {
            let page = library.search(&query, page.into()).await.map_err(report)?;
            output_page(&page, cli.json)?;
        },
        Command::Show { id } => {
            let entry = library
                .get(&BookId::from(id.as_str()))
                .await
                .map_err(report)?
                .ok_or_else(|| miette::miette!("no book with id {id}"))?;
            match cli.json {
                true => print_json(&entry)?,
                false => print_entry_details(&entry),
            }
        },
        Command::Stats => {
            let stats = library.stats();
            match cli.json {
                true => print_json(&stats)?,
                false => print_stats(&stats),
            }
        },
    }
    // A rescan above may have left enrichment running; dropping the runtime would
    // abort it and leave a filename-only catalog in the cache file.
    if let Some(status) = library.finish_background_work().await {
        tracing::debug!(processed = status.processed, failed = status.failed, "metadata extraction finished");
    }
    Ok(())
}

/// Logs go to stderr so that `--json` output stays clean.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn report(error: impl Debug) -> miette::Report {
    miette::miette!("{error:?}")
}

fn print_json(value: &impl Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(report)?;
    println!("{json}");
    Ok(())
}

fn output_page(page: &Page, json: bool) -> Result<()> {
    if json {
        return print_json(page);
    }
    for entry in &page.entries {
        println!("{}  {} by {} [{}]", entry.id, entry.title, entry.author, entry.format);
    }
    println!("page {} of {} ({} books)", page.page, page.total_pages().max(1), page.total_count);
    Ok(())
}

fn print_entry_details(entry: &BookEntry) {
    println!("id:        {}", entry.id);
    println!("title:     {}", entry.title);
    println!("author:    {}", entry.author);
    println!("format:    {} ({})", entry.format, entry.format.media_type());
    println!("path:      {}", entry.path.display());
    println!("size:      {} bytes", entry.size_bytes);
    println!("modified:  {}", entry.modified_at);
    println!("enriched:  {}", entry.enriched);
}

fn print_stats(stats: &Stats) {
    let Some(generation) = stats.generation else {
        println!("no catalog yet; run `dropshelf scan`");
        return;
    };
    println!("generation:  {generation}");
    println!("books:       {} ({} with metadata read)", stats.total_entries, stats.enriched_count);
    if let Some(age) = stats.cache_age_seconds {
        println!("age:         {age}s");
    }
    for (format, count) in &stats.formats {
        println!("  {format}: {count}");
    }
    if stats.enrichment.running {
        println!("enrichment:  {} of {} read", stats.enrichment.processed, stats.enrichment.total);
    }
}
