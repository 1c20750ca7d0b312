use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use catalog::ListingCatalog;
use clap::{Args, Parser, Subcommand};
use console::style;
use core_types::config::{AppConfig, load_or_create_config};
use core_types::{GalleryEntry, PreferenceQuery, SelectionEvent, SessionKey};
use indicatif::{ProgressBar, ProgressStyle};
use ipc::{EntryWire, Response};
use service::status::make_status_response;
use service::{HomeMatch, catalog_source, init_tracing_with_config};
use tokio::runtime::Runtime;

/// Debug / scripting CLI that runs the HomeMatch engine in-process.
#[derive(Parser, Debug)]
#[command(name = "homematch", version, about = "HomeMatch listing search client")]
struct Cli {
    /// Config file; defaults to $HOMEMATCH_CONFIG or ./homematch.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one search and print the gallery.
    Search {
        #[command(flatten)]
        prefs: PrefArgs,
        /// Also print the description of result N (0-based).
        #[arg(long)]
        select: Option<i64>,
        /// Print the protocol response as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Interactive search/select loop.
    Repl,
    /// Print catalog and index health.
    Status,
    /// Reparse the listing table and rewrite the catalog snapshot.
    Snapshot,
}

#[derive(Args, Debug, Default)]
struct PrefArgs {
    #[arg(long, default_value = "")]
    budget: String,
    #[arg(long, default_value = "")]
    bedrooms: String,
    #[arg(long, default_value = "")]
    neighborhood: String,
    /// Comma-separated, e.g. "garden, garage".
    #[arg(long, default_value = "")]
    features: String,
    #[arg(long, default_value = "")]
    property_type: String,
}

impl PrefArgs {
    fn to_query(&self) -> PreferenceQuery {
        PreferenceQuery::from_raw(
            &self.budget,
            &self.bedrooms,
            &self.neighborhood,
            &self.features,
            &self.property_type,
        )
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let cfg = load_or_create_config(cli.config.as_deref())?;
    let _guard = init_tracing_with_config(&cfg.logging)?;

    match cli.command {
        Commands::Snapshot => rebuild_snapshot(&cfg),
        Commands::Status => {
            let app = bootstrap(&cfg)?;
            let status = make_status_response(&app);
            println!("{}", style("HomeMatch status").bold());
            println!("  listings : {}", status.listings);
            println!("  vectors  : {}", status.vectors);
            println!("  dimension: {}", status.dimension);
            println!("  backend  : {}", status.backend);
            Ok(())
        }
        Commands::Search {
            prefs,
            select,
            json,
        } => {
            let app = bootstrap(&cfg)?;
            let rt = runtime()?;
            let session = SessionKey::generate();
            let entries = rt.block_on(app.search_for_display(session, &prefs.to_query()));
            if json {
                let resp = Response::SearchResults {
                    session,
                    sequence: 1,
                    entries: entries.iter().map(EntryWire::from).collect(),
                };
                println!("{}", serde_json::to_string_pretty(&resp)?);
            } else {
                print_gallery(&entries);
            }
            if let Some(index) = select {
                print_description(&app.select(session, SelectionEvent { index }));
            }
            Ok(())
        }
        Commands::Repl => {
            let app = bootstrap(&cfg)?;
            repl(&app, &runtime()?)
        }
    }
}

fn runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}

fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn bootstrap(cfg: &AppConfig) -> Result<HomeMatch> {
    let pb = spinner("loading listings and embedding index...");
    let app = HomeMatch::from_config(cfg);
    pb.finish_and_clear();
    app.context("failed to initialize catalog or embedding index")
}

fn rebuild_snapshot(cfg: &AppConfig) -> Result<()> {
    let source = catalog_source(cfg);
    let Some(path) = source.snapshot_path.clone() else {
        println!("{}", style("No snapshot path configured; nothing to rebuild.").yellow());
        return Ok(());
    };
    let pb = spinner("parsing listing table...");
    let catalog = ListingCatalog::rebuild_snapshot(&source);
    pb.finish_and_clear();
    let catalog = catalog.context("failed to rebuild catalog snapshot")?;
    println!(
        "{} {} listings -> {}",
        style("snapshot written:").green(),
        catalog.len(),
        path.display()
    );
    Ok(())
}

fn print_gallery(entries: &[GalleryEntry]) {
    for (pos, entry) in entries.iter().enumerate() {
        let (asset, label) = entry.display_pair();
        if entry.is_sentinel() {
            println!("{}  {}", style(asset).yellow(), style(label).dim());
        } else {
            println!("{:>3}. {}  {}", pos, style(label).bold(), style(asset).dim());
        }
    }
}

fn print_description(text: &str) {
    if text.starts_with(service::SELECTION_ERROR_PREFIX) {
        println!("{}", style(text).red());
    } else {
        println!("{}", style("Description").cyan().bold());
        println!("{text}");
    }
}

fn prompt(lines: &mut impl Iterator<Item = io::Result<String>>, label: &str) -> Result<Option<String>> {
    print!("{} ", style(label).cyan());
    io::stdout().flush()?;
    lines.next().transpose().map_err(Into::into)
}

fn repl(app: &HomeMatch, rt: &Runtime) -> Result<()> {
    println!(
        "{}",
        style("Commands: search | <N> to select | status | quit").dim()
    );
    let session = SessionKey::generate();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    while let Some(line) = prompt(&mut lines, "homematch>")? {
        let cmd = line.trim();
        match cmd {
            "" => {}
            "quit" | "exit" => break,
            "status" => {
                let status = make_status_response(app);
                println!(
                    "{} listings, {} vectors ({})",
                    status.listings, status.vectors, status.backend
                );
            }
            "search" => {
                let mut prefs = PrefArgs::default();
                for (label, field) in [
                    ("budget:", &mut prefs.budget),
                    ("bedrooms:", &mut prefs.bedrooms),
                    ("neighborhood:", &mut prefs.neighborhood),
                    ("features (comma separated):", &mut prefs.features),
                    ("property type:", &mut prefs.property_type),
                ] {
                    let Some(value) = prompt(&mut lines, label)? else {
                        return Ok(());
                    };
                    *field = value.trim().to_string();
                }
                let entries = rt.block_on(app.search_for_display(session, &prefs.to_query()));
                print_gallery(&entries);
            }
            other => match other.parse::<i64>() {
                Ok(index) => print_description(&app.select(session, SelectionEvent { index })),
                Err(_) => println!("{}", style(format!("unknown command: {other}")).red()),
            },
        }
    }
    app.end_session(session);
    Ok(())
}
