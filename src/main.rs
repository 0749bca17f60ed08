//! Binary entrypoint for the Scriptle CLI.
//!
//! Commands:
//! - `init` - write a starter `scriptle.toml` and create the data directories
//! - `serve` - run the app server over stdin/stdout (one JSON message per line)
//! - `handle [<json>]` - answer a single webview message and exit
//! - `guess --pack <id> --date <d> [--movie <id>] [--character <name>]` - play locally
//! - `stats --pack <id> --date <d> [--community <name>]` - print a distribution
//! - `generate [--pack <id>] [--start <d>] [--days <n>]` - write daily puzzle files
//! - `pack new|coverage|cast` - manage pack definitions
//! - `schedule` - run the daily post job once
//! - `status` - print configuration and data summary
//!
//! See the library crate docs for module-level details: `scriptle::`.
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};
use tokio::io::{AsyncReadExt, BufReader};

use scriptle::app::scheduler::DailyPostScheduler;
use scriptle::app::server::Service;
use scriptle::app::{user_storage_key, AppHandler};
use scriptle::config::Config;
use scriptle::game::store::{FileStorage, GameStore};
use scriptle::game::{GameState, Guess};
use scriptle::puzzle::generator::{default_start, PackLines, PuzzleGenerator};
use scriptle::puzzle::pack::{coverage, create_or_update_pack, refresh_speaking_casts};
use scriptle::puzzle::{list_packs, load_pack, parse_date, DailyPuzzle, PackType};
use scriptle::stats::{percentile, Bucket, StatsAggregator};
use scriptle::storage::KvStore;

#[derive(Parser)]
#[command(name = "scriptle")]
#[command(about = "Daily movie quote guessing game")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "scriptle.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,
    /// Run the app server on stdin/stdout
    Serve {
        /// Do not run the daily post job
        #[arg(long)]
        no_scheduler: bool,
    },
    /// Answer one webview message (argument or stdin) and exit
    Handle {
        /// Message envelope as JSON; read from stdin when absent
        message: Option<String>,
    },
    /// Submit a guess for a puzzle using the local storage file
    Guess {
        #[arg(short, long)]
        pack: Option<String>,
        /// Puzzle date (YYYY-MM-DD); defaults to today (UTC)
        #[arg(short, long)]
        date: Option<String>,
        /// Movie id
        #[arg(short, long)]
        movie: Option<String>,
        /// Character name
        #[arg(long)]
        character: Option<String>,
        /// Record the result and mirror progress for this user
        #[arg(short, long)]
        user: Option<String>,
        /// Clear all saved puzzle progress instead of guessing
        #[arg(long)]
        reset: bool,
    },
    /// Show the result distribution for a puzzle
    Stats {
        #[arg(short, long)]
        pack: Option<String>,
        #[arg(short, long)]
        date: Option<String>,
        #[arg(long)]
        community: Option<String>,
    },
    /// Generate daily puzzle files
    Generate {
        /// Only this pack; all packs plus consolidated files and themes when absent
        #[arg(short, long)]
        pack: Option<String>,
        /// First date; defaults to yesterday (UTC)
        #[arg(short, long)]
        start: Option<String>,
        /// Days after the start date
        #[arg(long)]
        days: Option<u32>,
    },
    /// Pack maintenance
    Pack {
        #[command(subcommand)]
        action: PackAction,
    },
    /// Run the daily post job once
    Schedule,
    /// Show configuration and data status
    Status,
}

#[derive(Subcommand)]
enum PackAction {
    /// Create a pack or replace its movie list
    New {
        id: String,
        name: String,
        #[arg(value_enum)]
        kind: PackKind,
        #[arg(required = true)]
        movies: Vec<String>,
        /// Directory holding `<movie>.json` scripts to copy in
        #[arg(long)]
        source: Option<PathBuf>,
    },
    /// Report which characters never get a playable line
    Coverage {
        id: String,
        #[arg(long)]
        min_words: Option<usize>,
    },
    /// Derive topSpeakingCast from dialogue for scripts that lack one
    Cast {
        id: String,
        /// Replace existing cast lists too
        #[arg(long)]
        overwrite: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PackKind {
    Series,
    Collection,
}

impl From<PackKind> for PackType {
    fn from(kind: PackKind) -> Self {
        match kind {
            PackKind::Series => PackType::Series,
            PackKind::Collection => PackType::Collection,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if matches!(cli.command, Commands::Init) {
        init_logging(&None, cli.verbose);
        return init(&cli.config).await;
    }

    let config = match Config::load(&cli.config).await {
        Ok(config) => config,
        Err(e) if Path::new(&cli.config).exists() => return Err(e),
        Err(_) => Config::default(),
    };
    init_logging(&Some(config.clone()), cli.verbose);

    match cli.command {
        Commands::Init => {}
        Commands::Serve { no_scheduler } => {
            info!("Starting Scriptle v{}", env!("CARGO_PKG_VERSION"));
            let store = KvStore::open(&config.storage.db_path)?;
            let scheduler = if no_scheduler || !config.scheduler.enabled {
                None
            } else {
                Some(DailyPostScheduler::from_config(&config))
            };
            let mut service = Service::new(AppHandler::new(store.clone(), &config.app), scheduler);
            service
                .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
                .await?;
            store.flush()?;
        }
        Commands::Handle { message } => {
            let line = match message {
                Some(m) => m,
                None => {
                    let mut buf = String::new();
                    tokio::io::stdin().read_to_string(&mut buf).await?;
                    buf
                }
            };
            let store = KvStore::open(&config.storage.db_path)?;
            let service = Service::new(AppHandler::new(store, &config.app), None);
            let replies = service
                .process_line(line.trim())
                .ok_or_else(|| anyhow!("message is not a valid envelope"))?;
            for reply in replies {
                println!("{}", reply);
            }
        }
        Commands::Guess {
            pack,
            date,
            movie,
            character,
            user,
            reset,
        } => {
            let mut games = GameStore::new(FileStorage::open(&config.storage.local_storage_file)?);
            if reset {
                let removed = games.clear_all()?;
                println!("Cleared {} saved puzzle(s).", removed);
                return Ok(());
            }
            let pack = pack.unwrap_or_else(|| config.app.default_pack.clone());
            let date = date.unwrap_or_else(today);
            play(&config, &mut games, &pack, &date, movie, character, user)?;
        }
        Commands::Stats {
            pack,
            date,
            community,
        } => {
            let pack = pack.unwrap_or_else(|| config.app.default_pack.clone());
            let date = date.unwrap_or_else(today);
            parse_date(&date)?;
            let stats = StatsAggregator::new(KvStore::open(&config.storage.db_path)?);
            print_scope("Global", &stats, None, &pack, &date)?;
            if let Some(name) = community.or(config.app.default_community.clone()) {
                print_scope(&format!("r/{}", name), &stats, Some(&name), &pack, &date)?;
            }
        }
        Commands::Generate { pack, start, days } => {
            let start = match start {
                Some(s) => parse_date(&s)?,
                None => default_start(),
            };
            let days = days.unwrap_or(config.puzzles.days);
            let generator = PuzzleGenerator::new(&config.puzzles.data_dir);
            match pack {
                Some(id) => {
                    let manifest = generator.generate_for_pack(&id, start, days)?;
                    println!(
                        "{}: {} puzzles ({} to {}), {} candidate lines",
                        manifest.pack_id,
                        manifest.total_puzzles,
                        manifest.date_range.start,
                        manifest.date_range.end,
                        manifest.cycle_length
                    );
                }
                None => {
                    let manifests = generator.generate_all(
                        start,
                        days,
                        Path::new(&config.puzzles.themes_file),
                    )?;
                    for m in &manifests {
                        println!("{}: {} puzzles", m.pack_id, m.total_puzzles);
                    }
                    println!("Generated {} pack(s)", manifests.len());
                }
            }
        }
        Commands::Pack { action } => {
            let data_dir = Path::new(&config.puzzles.data_dir);
            match action {
                PackAction::New {
                    id,
                    name,
                    kind,
                    movies,
                    source,
                } => {
                    let update = create_or_update_pack(
                        data_dir,
                        &id,
                        &name,
                        kind.into(),
                        &movies,
                        source.as_deref(),
                    )?;
                    let verb = if update.created { "Created" } else { "Updated" };
                    println!("{} pack '{}' with {} movie(s)", verb, id, update.pack.movies.len());
                    if !update.copied_scripts.is_empty() {
                        println!("Copied scripts: {}", update.copied_scripts.join(", "));
                    }
                    if !update.missing_scripts.is_empty() {
                        warn!("missing scripts: {}", update.missing_scripts.join(", "));
                        println!("Missing scripts: {}", update.missing_scripts.join(", "));
                    }
                    if !update.derived_casts.is_empty() {
                        println!("Derived speaking cast: {}", update.derived_casts.join(", "));
                    }
                }
                PackAction::Coverage { id, min_words } => {
                    let report =
                        coverage(data_dir, &id, min_words.unwrap_or(config.puzzles.min_words))?;
                    println!("{}", report.summary());
                }
                PackAction::Cast { id, overwrite } => {
                    let updated = refresh_speaking_casts(data_dir, &id, overwrite)?;
                    if updated.is_empty() {
                        println!("All scripts in '{}' already have a cast list", id);
                    }
                    for (movie_id, cast) in updated {
                        println!("{}: {}", movie_id, cast.join(", "));
                    }
                }
            }
        }
        Commands::Schedule => {
            let store = KvStore::open(&config.storage.db_path)?;
            let handler = AppHandler::new(store, &config.app);
            let mut job = DailyPostScheduler::from_config(&config);
            let posts = job.check_and_post(handler.posts(), Utc::now())?;
            if posts.is_empty() {
                println!("Nothing to post yet.");
            }
            for post in posts {
                let state = if post.created { "created" } else { "exists" };
                println!(
                    "{} {} -> {} ({})",
                    post.config.pack_id, post.config.date, post.post_id, state
                );
            }
        }
        Commands::Status => show_status(&config)?,
    }

    Ok(())
}

async fn init(path: &str) -> Result<()> {
    info!("Initializing new Scriptle configuration");
    if Path::new(path).exists() {
        warn!("{} already exists; leaving it unchanged", path);
    } else {
        Config::create_default(path).await?;
        info!("Configuration file created at {}", path);
    }
    let config = Config::load(path).await?;
    let data_dir = Path::new(&config.puzzles.data_dir);
    for sub in ["packs", "scripts", "daily"] {
        tokio::fs::create_dir_all(data_dir.join(sub)).await?;
    }
    if let Some(parent) = Path::new(&config.storage.db_path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    info!("Initialized data directories under {}", data_dir.display());
    Ok(())
}

fn today() -> String {
    Utc::now().date_naive().format("%Y-%m-%d").to_string()
}

fn play(
    config: &Config,
    games: &mut GameStore<FileStorage>,
    pack_id: &str,
    date: &str,
    movie: Option<String>,
    character: Option<String>,
    user: Option<String>,
) -> Result<()> {
    let data_dir = Path::new(&config.puzzles.data_dir);
    let puzzle = DailyPuzzle::load(data_dir, pack_id, date)
        .with_context(|| format!("no puzzle for {} on {}", pack_id, date))?;
    let pack = load_pack(data_dir, pack_id).ok();
    let pack_name = pack.as_ref().map_or(pack_id, |p| p.name.as_str());

    let mut state = games.load(pack_id, date).unwrap_or_else(GameState::new);
    println!("\"{}\"", puzzle.puzzle.target_line.text);

    let guess = Guess::new(movie.as_deref(), character.as_deref());
    let outcome = state.submit_guess(&puzzle.answer(), &guess)?;
    let (key, value) = games.save(pack_id, date, &state)?;

    let mark = |ok: bool| if ok { "correct" } else { "wrong" };
    println!(
        "Movie: {}  Character: {}  ({} attempt(s) left)",
        mark(outcome.movie_correct),
        mark(outcome.character_correct),
        state.attempts_left()
    );

    let store = match user.as_deref() {
        Some(_) => Some(KvStore::open(&config.storage.db_path)?),
        None => None,
    };
    if let (Some(store), Some(user)) = (&store, user.as_deref()) {
        store.hset(&user_storage_key(user), &key, &value)?;
    }

    if let Some(bucket) = state.bucket() {
        let tiers = pack.as_ref().map(|p| p.tier_messages()).unwrap_or_default();
        let target = &puzzle.puzzle.target_line;
        if !state.success {
            println!("It was {} in {}.", target.character, target.movie);
        }
        println!("{}", tiers.for_bucket(bucket));
        println!();
        println!("{}", state.share_text(pack_name, date));
        if let (Some(store), Some(user)) = (store, user.as_deref()) {
            let stats = StatsAggregator::new(store);
            let counted = stats.record_completion(
                user,
                config.app.default_community.as_deref(),
                pack_id,
                date,
                bucket,
                state.attempts,
            )?;
            if counted {
                info!("recorded {} for {}", bucket, user);
            }
        }
    }
    Ok(())
}

fn print_scope(
    label: &str,
    stats: &StatsAggregator,
    community: Option<&str>,
    pack: &str,
    date: &str,
) -> Result<()> {
    let (dist, total) = stats.scope(community, pack, date)?;
    println!("{} ({} players)", label, total);
    for bucket in Bucket::ALL {
        let count = dist.get(bucket);
        let pct = percentile(&dist, total, bucket)
            .map(|p| format!("beats {}%", p))
            .unwrap_or_else(|| "-".to_string());
        println!("  {:>4}: {:>6}  {}", bucket.as_str(), count, pct);
    }
    Ok(())
}

fn show_status(config: &Config) -> Result<()> {
    println!("Scriptle v{}", env!("CARGO_PKG_VERSION"));
    println!("Default pack: {}", config.app.default_pack);
    if let Some(c) = &config.app.default_community {
        println!("Default community: {}", c);
    }
    let data_dir = Path::new(&config.puzzles.data_dir);
    match list_packs(data_dir) {
        Ok(ids) => {
            println!("Packs ({}):", ids.len());
            for id in ids {
                match PackLines::load(data_dir, &id) {
                    Ok(lines) => println!(
                        "  {} - {} movie(s), {} candidate line(s)",
                        id,
                        lines.pack.movies.len(),
                        lines.candidate_count()
                    ),
                    Err(e) => println!("  {} - unreadable: {}", id, e),
                }
            }
        }
        Err(e) => println!("Packs: unavailable ({})", e),
    }

    if !Path::new(&config.storage.db_path).exists() {
        println!("Stats database: not created yet");
        return Ok(());
    }
    let store = KvStore::open(&config.storage.db_path)?;
    let handler = AppHandler::new(store, &config.app);
    let date = today();
    println!(
        "Daily job: {} at {:02}:00 UTC",
        if config.scheduler.enabled { "enabled" } else { "disabled" },
        config.scheduler.post_hour()
    );
    for pack in config.scheduled_packs() {
        match handler.posts().daily_post(&pack, &date)? {
            Some(id) => println!("  {} {}: {}", pack, date, id),
            None => println!("  {} {}: not posted", pack, date),
        }
    }
    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match (verbosity, config) {
        (0, Some(cfg)) => cfg.logging.level_filter(),
        (0, None) => log::LevelFilter::Info,
        (1, _) => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config
        .as_ref()
        .and_then(|cfg| cfg.logging.file.as_ref())
        .and_then(|file| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .ok()
        });

    if let Some(f) = log_file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        // Echo to the console only when someone is watching stderr
        let is_tty = atty::is(atty::Stream::Stderr);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
        });
    }
    let _ = builder.try_init();
}
