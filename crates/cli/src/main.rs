use std::{
    fs::{self, OpenOptions},
    sync::{Arc, Mutex},
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

use pyre_core::{
    config::{self, AppConfig},
    models::{keys, today},
    store::SortBy,
    Flag, GameEdit, GameId, GameStore, HttpCatalog, JsonFileStorage, LibraryWatcher, Platform,
    ReconcileOptions, ReconciliationEngine, RunReport, Status,
};

/// Discover, organise and launch installed games.
#[derive(Debug, Parser)]
#[command(name = "pyre", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scan platform directories and add catalog-confirmed games
    Scan,
    /// List visible games grouped into sections
    List {
        /// Only show games whose name contains this text
        query: Option<String>,
        /// Grouping for non-favorite games
        #[arg(long, value_enum, default_value_t = SortArg::Platform)]
        sort: SortArg,
    },
    /// Launch a game and record the play
    Play {
        /// Game name or id
        game: String,
    },
    /// Toggle the favorite flag
    Favorite {
        /// Game name or id
        game: String,
    },
    /// Toggle the hidden flag
    Hide {
        /// Game name or id
        game: String,
    },
    /// Mark a game as deleted, or remove it from the library with --purge
    Delete {
        /// Game name or id
        game: String,
        /// Remove the entry instead of flagging it
        #[arg(long)]
        purge: bool,
    },
    /// Clear the deleted and hidden flags
    Restore {
        /// Game name or id
        game: String,
    },
    /// Edit a library entry
    Edit {
        /// Game name or id
        game: String,
        #[command(flatten)]
        fields: EditArgs,
    },
    /// Rescan whenever a platform directory changes
    Watch,
}

/// Fields accepted by `edit`. An empty metadata value clears that entry.
#[derive(Debug, clap::Args)]
struct EditArgs {
    /// New display name
    #[arg(long)]
    name: Option<String>,
    #[arg(long, value_enum)]
    platform: Option<PlatformArg>,
    #[arg(long, value_enum)]
    status: Option<StatusArg>,
    /// Shell command used by `play`
    #[arg(long)]
    launcher: Option<String>,
    #[arg(long)]
    icon: Option<String>,
    #[arg(long)]
    description: Option<String>,
    /// Header artwork path
    #[arg(long)]
    header_img: Option<String>,
    #[arg(long)]
    rating: Option<String>,
    #[arg(long)]
    genre: Option<String>,
    #[arg(long)]
    developer: Option<String>,
    #[arg(long)]
    publisher: Option<String>,
    #[arg(long)]
    release_date: Option<String>,
}

impl From<EditArgs> for GameEdit {
    fn from(args: EditArgs) -> Self {
        GameEdit {
            name: args.name,
            platform: args.platform.map(Into::into),
            status: args.status.map(Into::into),
            launcher: args.launcher,
            icon: args.icon,
            ..GameEdit::default()
        }
        .with_meta(keys::DESCRIPTION, args.description)
        .with_meta(keys::HEADER_IMG, args.header_img)
        .with_meta(keys::RATING, args.rating)
        .with_meta(keys::GENRE, args.genre)
        .with_meta(keys::DEVELOPER, args.developer)
        .with_meta(keys::PUBLISHER, args.publisher)
        .with_meta(keys::RELEASE_DATE, args.release_date)
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PlatformArg {
    Mac,
    Steam,
    Gog,
    Epic,
    Emul,
    None,
}

impl From<PlatformArg> for Platform {
    fn from(arg: PlatformArg) -> Self {
        match arg {
            PlatformArg::Mac => Platform::Mac,
            PlatformArg::Steam => Platform::Steam,
            PlatformArg::Gog => Platform::Gog,
            PlatformArg::Epic => Platform::Epic,
            PlatformArg::Emul => Platform::Emul,
            PlatformArg::None => Platform::None,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SortArg {
    Platform,
    Status,
    Name,
    Recency,
}

impl From<SortArg> for SortBy {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Platform => SortBy::Platform,
            SortArg::Status => SortBy::Status,
            SortArg::Name => SortBy::Name,
            SortArg::Recency => SortBy::Recency,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StatusArg {
    Playing,
    Beaten,
    Completed,
    Shelved,
    Occasional,
    Backlog,
    Wishlist,
    None,
}

impl From<StatusArg> for Status {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Playing => Status::Playing,
            StatusArg::Beaten => Status::Beaten,
            StatusArg::Completed => Status::Completed,
            StatusArg::Shelved => Status::Shelved,
            StatusArg::Occasional => Status::Occasional,
            StatusArg::Backlog => Status::Backlog,
            StatusArg::Wishlist => Status::Wishlist,
            StatusArg::None => Status::None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging()?;

    config::ensure_default_config()?;
    let config = AppConfig::load()?;
    let store = GameStore::open(JsonFileStorage::new(&config.library_path));
    store.refresh_recency(today());

    match cli.command {
        Command::Scan => {
            let report = engine(&config, &store)?.run().await;
            print_report(&report);
        }
        Command::List { query, sort } => {
            let sections = store.sections(sort.into(), query.as_deref().unwrap_or_default());
            if sections.is_empty() {
                println!("No games.");
            }
            for section in sections {
                println!("{}", section.title);
                for game in section.games {
                    println!("  {}  [{}]  {}", game.name, game.platform, game.id);
                }
            }
        }
        Command::Play { game } => {
            let id = find_game(&store, &game)?;
            let game = pyre_core::play(&store, id).await?;
            println!("Launched {}", game.name);
        }
        Command::Favorite { game } => {
            let id = find_game(&store, &game)?;
            if let Some(game) = store.toggle_flag(id, Flag::Favorite) {
                println!("{} favorite: {}", game.name, game.is_favorite);
            }
        }
        Command::Hide { game } => {
            let id = find_game(&store, &game)?;
            if let Some(game) = store.toggle_flag(id, Flag::Hidden) {
                println!("{} hidden: {}", game.name, game.is_hidden);
            }
        }
        Command::Delete { game, purge } => {
            let id = find_game(&store, &game)?;
            let deleted = if purge {
                store.remove(id)
            } else {
                store.set_flag(id, Flag::Deleted, true)
            };
            if let Some(game) = deleted {
                println!("Deleted {}", game.name);
            }
        }
        Command::Restore { game } => {
            let id = find_game(&store, &game)?;
            let restored = store.update(id, |game| {
                game.is_deleted = false;
                game.is_hidden = false;
            });
            if let Some(game) = restored {
                println!("Restored {}", game.name);
            }
        }
        Command::Edit { game, fields } => {
            let id = find_game(&store, &game)?;
            let edit = GameEdit::from(fields);
            if edit.is_empty() {
                bail!("nothing to edit; pass at least one field");
            }
            if let Some(game) = store.update(id, |game| edit.apply(game)) {
                println!("Updated {}", game.name);
            }
        }
        Command::Watch => watch(&config, &store).await?,
    }

    store.persist().context("failed to save game library")
}

fn engine(config: &AppConfig, store: &GameStore) -> Result<ReconciliationEngine<HttpCatalog>> {
    let catalog = HttpCatalog::new(&config.catalog)?;
    Ok(ReconciliationEngine::new(
        store.clone(),
        Arc::new(catalog),
        config.platforms.clone(),
        ReconcileOptions::from(&config.reconcile),
    ))
}

async fn watch(config: &AppConfig, store: &GameStore) -> Result<()> {
    let engine = engine(config, store)?;
    let (tx, mut rx) = mpsc::channel(1);
    let watcher = LibraryWatcher::watch(&config.platforms, tx)?;
    if watcher.roots().is_empty() {
        bail!("none of the configured platform directories exist");
    }

    print_report(&engine.run().await);
    while let Some(event) = rx.recv().await {
        info!("Rescanning after {event:?}");
        print_report(&engine.run().await);
    }
    warn!("Library watcher stopped");
    Ok(())
}

fn find_game(store: &GameStore, key: &str) -> Result<GameId> {
    if let Ok(id) = key.parse::<GameId>() {
        if store.by_id(id).is_some() {
            return Ok(id);
        }
    }
    match store.by_name(key) {
        Some(game) => Ok(game.id),
        None => bail!("no game named {key}"),
    }
}

fn print_report(report: &RunReport) {
    println!(
        "Scanned {} paths, {} candidates ({} already known, {} unresolved, {} failed lookups)",
        report.scanned,
        report.candidates,
        report.skipped_known,
        report.unresolved,
        report.failed_lookups
    );
    for name in &report.added {
        println!("  + {name}");
    }
}

fn init_logging() -> Result<()> {
    let log_dir = config::app_dir().join("logs");
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("pyre.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .compact()
        .with_ansi(false)
        .with_writer(Mutex::new(log_file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(())
}
