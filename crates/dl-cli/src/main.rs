//! Domain Lists CLI
//!
//! CLI tool for syncing, editing and querying domain lists.

mod config;

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};

use dl_core::{EntryMetadata, ListEntry, PatternType, Source};
use dl_store::{export_list, import_list, EntryStore, ListQuery};
use dl_sync::{HttpFetcher, SyncEngine};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "dl-cli")]
#[command(about = "Domain list store, matcher and sync tools")]
struct Cli {
    /// Database file (overrides DOMAIN_LISTS_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Public Suffix List data file (overrides DOMAIN_LISTS_PSL)
    #[arg(long, global = true)]
    psl: Option<PathBuf>,

    /// Fetch timeout in milliseconds (overrides DOMAIN_LISTS_FETCH_TIMEOUT_MS)
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge a remote configuration into the store
    Sync {
        /// Configuration URL (overrides DOMAIN_LISTS_CONFIG_URL)
        #[arg(short, long)]
        url: Option<String>,
    },

    /// Print the first entry of a list matching a URL
    Match {
        #[arg(short, long)]
        list: String,
        url: String,
    },

    /// Print the first list (in the given order) matching a URL
    Classify {
        url: String,
        #[arg(short, long = "list", required = true)]
        lists: Vec<String>,
    },

    /// Add an entry
    Add {
        #[arg(short, long)]
        list: String,

        #[arg(short = 't', long = "type", default_value = "domain")]
        pattern_type: PatternType,

        #[arg(short, long, default_value = "user")]
        source: Source,

        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long = "tag")]
        tags: Vec<String>,

        pattern: String,
    },

    /// Remove an entry by pattern
    Remove {
        #[arg(short, long)]
        list: String,
        pattern: String,
    },

    /// Delete every entry of a list, optionally of one source only
    Clear {
        #[arg(short, long)]
        list: String,
        #[arg(short, long)]
        source: Option<Source>,
    },

    /// Print the entries of a list as JSON lines
    Show {
        #[arg(short, long)]
        list: String,
    },

    /// Print the names of all lists
    Lists,

    /// Export a list as JSON
    Export {
        #[arg(short, long)]
        list: String,
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replace a list with the contents of an export file
    Import {
        #[arg(short, long)]
        list: String,
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long, default_value = "user")]
        source: Source,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(psl) = cli.psl {
        config.psl_path = Some(psl);
    }
    if let Some(ms) = cli.timeout_ms {
        config.fetch_timeout = Duration::from_millis(ms);
    }

    if let Err(e) = run(cli.command, &config) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(command: Commands, config: &Config) -> Result<(), String> {
    if let Some(path) = &config.psl_path {
        install_psl(path)?;
    }
    let store = open_store(&config.db_path)?;

    match command {
        Commands::Sync { url } => {
            let url = url
                .or_else(|| config.config_url.clone())
                .ok_or("No configuration URL (pass --url or set DOMAIN_LISTS_CONFIG_URL)")?;
            cmd_sync(store, &url, config.fetch_timeout)
        }
        Commands::Match { list, url } => cmd_match(&store, &list, &url),
        Commands::Classify { url, lists } => cmd_classify(&store, &url, &lists),
        Commands::Add {
            list,
            pattern_type,
            source,
            category,
            description,
            tags,
            pattern,
        } => {
            let metadata = EntryMetadata {
                category,
                description,
                tags: tags.into_iter().collect::<BTreeSet<_>>(),
                ..Default::default()
            };
            let entry = ListEntry::new(list, pattern, pattern_type, source).with_metadata(metadata);
            cmd_add(&store, entry)
        }
        Commands::Remove { list, pattern } => cmd_remove(&store, &list, &pattern),
        Commands::Clear { list, source } => cmd_clear(&store, &list, source),
        Commands::Show { list } => cmd_show(&store, &list),
        Commands::Lists => cmd_lists(&store),
        Commands::Export { list, output } => cmd_export(&store, &list, output.as_deref()),
        Commands::Import { list, input, source } => cmd_import(&store, &list, &input, source),
    }
}

fn install_psl(path: &Path) -> Result<(), String> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read PSL '{}': {}", path.display(), e))?;
    let list = dl_core::load_psl(&text)
        .map_err(|e| format!("Failed to parse PSL '{}': {}", path.display(), e))?;
    if !dl_core::init_psl(list) {
        log::warn!("PSL already initialized; ignoring {}", path.display());
    }
    Ok(())
}

fn open_store(path: &Path) -> Result<EntryStore, String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create '{}': {}", parent.display(), e))?;
    }
    EntryStore::open(path).map_err(|e| format!("Failed to open '{}': {}", path.display(), e))
}

fn cmd_sync(store: EntryStore, url: &str, timeout: Duration) -> Result<(), String> {
    let fetcher = HttpFetcher::new(timeout).map_err(|e| e.to_string())?;
    let engine = SyncEngine::new(store, fetcher);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start runtime: {}", e))?;
    let result = runtime.block_on(engine.sync_from_config(url));

    let json = serde_json::to_string_pretty(&result).map_err(|e| e.to_string())?;
    println!("{}", json);

    if !result.success {
        return Err(format!("Sync from {} failed", url));
    }
    Ok(())
}

fn cmd_match(store: &EntryStore, list: &str, url: &str) -> Result<(), String> {
    let hit = ListQuery::new(store)
        .match_first(url, list)
        .map_err(|e| e.to_string())?;
    match hit {
        Some(entry) => println!("{}", serde_json::to_string(&entry).map_err(|e| e.to_string())?),
        None => println!("no match"),
    }
    Ok(())
}

fn cmd_classify(store: &EntryStore, url: &str, lists: &[String]) -> Result<(), String> {
    let hit = ListQuery::new(store)
        .classify(url, lists)
        .map_err(|e| e.to_string())?;
    match hit {
        Some((list, entry)) => println!("{}\t{} ({})", list, entry.domain, entry.pattern_type),
        None => println!("no match"),
    }
    Ok(())
}

fn cmd_add(store: &EntryStore, entry: ListEntry) -> Result<(), String> {
    let label = format!("{} [{}]", entry.domain, entry.list_name);
    let id = store.create(entry).map_err(|e| e.to_string())?;
    println!("Added {} as entry {}", label, id);
    Ok(())
}

fn cmd_remove(store: &EntryStore, list: &str, pattern: &str) -> Result<(), String> {
    let entry = store
        .find(list, pattern)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("'{}' is not in list '{}'", pattern, list))?;
    let id = entry.id.ok_or("Stored entry has no id")?;
    store.delete(id).map_err(|e| e.to_string())?;
    println!("Removed {} from '{}'", pattern, list);
    Ok(())
}

fn cmd_clear(store: &EntryStore, list: &str, source: Option<Source>) -> Result<(), String> {
    let removed = store.delete_all(list, source).map_err(|e| e.to_string())?;
    match source {
        Some(source) => println!("Removed {} {} entries from '{}'", removed, source, list),
        None => println!("Removed {} entries from '{}'", removed, list),
    }
    Ok(())
}

fn cmd_show(store: &EntryStore, list: &str) -> Result<(), String> {
    for entry in store.get_by_list(list).map_err(|e| e.to_string())? {
        println!("{}", serde_json::to_string(&entry).map_err(|e| e.to_string())?);
    }
    Ok(())
}

fn cmd_lists(store: &EntryStore) -> Result<(), String> {
    for name in store.list_names().map_err(|e| e.to_string())? {
        let count = store.count(&name).map_err(|e| e.to_string())?;
        println!("{}\t{}", name, count);
    }
    Ok(())
}

fn cmd_export(store: &EntryStore, list: &str, output: Option<&Path>) -> Result<(), String> {
    let json = export_list(store, list).map_err(|e| e.to_string())?;
    match output {
        Some(path) => {
            fs::write(path, json)
                .map_err(|e| format!("Failed to write '{}': {}", path.display(), e))?;
            println!("Exported '{}' to '{}'", list, path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn cmd_import(store: &EntryStore, list: &str, input: &Path, source: Source) -> Result<(), String> {
    let json = fs::read_to_string(input)
        .map_err(|e| format!("Failed to read '{}': {}", input.display(), e))?;
    let count = import_list(store, list, &json, source).map_err(|e| e.to_string())?;
    println!("Imported {} entries into '{}'", count, list);
    Ok(())
}
