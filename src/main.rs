use std::error::Error as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use rapport::RelationshipNetwork;
use rapport::cache::{CacheError, SimilarityCache, SqliteCacheStore};
use rapport::config::{
    ConfigError, EffectiveConfig, ResolverChoice, default_config_yaml, load_effective_config,
    resolve_contacts_path,
};
use rapport::corpus::YamlContactStore;
use rapport::layout::LayoutEngine;
use rapport::network::NetworkError;
use rapport::resolver::{CommandResolver, DisabledResolver, LexicalResolver, SimilarityResolver};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "RAPPORT_LOG";
const CACHE_DB_FILE: &str = "cache.sqlite";
const CONFIG_FILE: &str = "config.yml";

#[derive(Debug)]
struct CliError {
    code: &'static str,
    message: String,
    detail: Option<String>,
}

impl CliError {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            detail: None,
        }
    }

    fn io(code: &'static str, err: io::Error) -> Self {
        Self::new(code, err.to_string())
    }
}

impl From<rusqlite::Error> for CliError {
    fn from(value: rusqlite::Error) -> Self {
        Self::new("sqlite_error", value.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::new("json_error", value.to_string())
    }
}

impl From<ConfigError> for CliError {
    fn from(value: ConfigError) -> Self {
        Self::new("config_error", value.to_string())
    }
}

impl From<CacheError> for CliError {
    fn from(value: CacheError) -> Self {
        Self::new("cache_error", value.to_string())
    }
}

impl From<NetworkError> for CliError {
    fn from(value: NetworkError) -> Self {
        Self {
            code: "store_unavailable",
            message: value.to_string(),
            detail: value.source().map(ToString::to_string),
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "rapport")]
#[command(about = "Relationship network over a personal contact book")]
struct Cli {
    #[arg(long, global = true)]
    global: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Init,
    Build(BuildArgs),
    #[command(subcommand)]
    Cache(CacheCommand),
}

#[derive(Args, Debug)]
struct BuildArgs {
    /// Drop every cached score and rescore all fact values.
    #[arg(long)]
    force: bool,
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
    Stats,
    Purge,
    Clear,
}

#[derive(Debug, Clone)]
struct RapportPaths {
    root: PathBuf,
    cache_db: PathBuf,
    workspace_config: PathBuf,
    user_config: PathBuf,
    home: PathBuf,
    mode: StorageMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StorageMode {
    Workspace,
    Global,
}

fn main() -> ExitCode {
    init_tracing();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let mut error = json!({
                "code": err.code,
                "message": err.message,
            });
            if let Some(detail) = err.detail {
                error["detail"] = Value::String(detail);
            }
            eprintln!("{}", json!({ "error": error }));
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir().map_err(|err| CliError::io("cwd_error", err))?;
    let paths = rapport_paths(&cwd, cli.global)?;
    match cli.command {
        Command::Init => cmd_init(&paths),
        Command::Build(args) => cmd_build(&cwd, &paths, args),
        Command::Cache(command) => cmd_cache(&paths, command),
    }
}

fn cmd_init(paths: &RapportPaths) -> Result<(), CliError> {
    fs::create_dir_all(&paths.root).map_err(|err| CliError::io("mkdir_error", err))?;
    let _ = SqliteCacheStore::open(&path_string(&paths.cache_db))?;
    write_default_config(paths)?;

    print_json(&json!({
        "status": "ok",
        "rapport_dir": path_string(&paths.root),
        "cache": path_string(&paths.cache_db),
        "mode": match paths.mode {
            StorageMode::Workspace => "workspace",
            StorageMode::Global => "global",
        },
    }))
}

fn cmd_build(cwd: &Path, paths: &RapportPaths, args: BuildArgs) -> Result<(), CliError> {
    require_initialized_paths(paths)?;
    let config = load_effective_config(
        cwd,
        Some(&paths.workspace_config),
        Some(&paths.user_config),
    )?;
    let contacts = YamlContactStore::new(resolve_contacts_path(&config, cwd, &paths.home));
    let contacts_path = path_string(contacts.path());
    let network = open_network(contacts, paths, &config)?;

    let build = if args.force {
        network.force_refresh()?
    } else {
        network.refresh()?
    };

    print_json(&json!({
        "status": "ok",
        "forced": args.force,
        "contacts": contacts_path,
        "snapshot": build.snapshot,
        "stats": build.stats,
    }))
}

fn cmd_cache(paths: &RapportPaths, command: CacheCommand) -> Result<(), CliError> {
    require_initialized_paths(paths)?;
    let cache = open_cache(paths)?;
    match command {
        CacheCommand::Stats => {
            let stats = cache.stats()?;
            print_json(&json!({
                "status": "ok",
                "total": stats.total,
                "valid": stats.valid,
                "has_valid_entry": cache.has_any_valid_entry(),
                "ttl_days": cache.ttl().num_days(),
            }))
        }
        CacheCommand::Purge => {
            let removed = cache.purge_expired()?;
            print_json(&json!({ "status": "ok", "removed": removed }))
        }
        CacheCommand::Clear => {
            let removed = cache.clear()?;
            print_json(&json!({ "status": "ok", "removed": removed }))
        }
    }
}

fn open_network(
    contacts: YamlContactStore,
    paths: &RapportPaths,
    config: &EffectiveConfig,
) -> Result<RelationshipNetwork, CliError> {
    let resolver: Box<dyn SimilarityResolver> = match &config.resolver {
        ResolverChoice::Disabled => Box::new(DisabledResolver),
        ResolverChoice::Lexical => Box::new(LexicalResolver::default()),
        ResolverChoice::Command(argv) => Box::new(CommandResolver::new(argv.clone())),
    };

    Ok(RelationshipNetwork::new(
        Box::new(contacts),
        open_cache(paths)?,
        resolver,
        LayoutEngine::new(config.layout),
    ))
}

fn open_cache(paths: &RapportPaths) -> Result<SimilarityCache, CliError> {
    let store = SqliteCacheStore::open(&path_string(&paths.cache_db)).map_err(|err| CliError {
        code: "store_unavailable",
        message: "could not compute the network".to_string(),
        detail: Some(err.to_string()),
    })?;
    Ok(SimilarityCache::new(Box::new(store)))
}

fn rapport_paths(cwd: &Path, global: bool) -> Result<RapportPaths, CliError> {
    let home = home_dir()?;
    let (root, mode) = if global {
        (home.join(".rapport"), StorageMode::Global)
    } else {
        (cwd.join(".rapport"), StorageMode::Workspace)
    };

    Ok(RapportPaths {
        cache_db: root.join(CACHE_DB_FILE),
        workspace_config: cwd.join(".rapport").join(CONFIG_FILE),
        user_config: home.join(".rapport").join(CONFIG_FILE),
        root,
        home,
        mode,
    })
}

fn require_initialized_paths(paths: &RapportPaths) -> Result<(), CliError> {
    if !paths.root.exists() || !paths.cache_db.exists() {
        return Err(CliError::new(
            "not_initialized",
            "rapport is not initialized here; run `rapport init`",
        ));
    }
    Ok(())
}

fn write_default_config(paths: &RapportPaths) -> Result<(), CliError> {
    let config_path = match paths.mode {
        StorageMode::Workspace => &paths.workspace_config,
        StorageMode::Global => &paths.user_config,
    };
    if config_path.exists() {
        return Ok(());
    }
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|err| CliError::io("mkdir_error", err))?;
    }
    fs::write(config_path, default_config_yaml()).map_err(|err| CliError::io("write_error", err))
}

fn home_dir() -> Result<PathBuf, CliError> {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .ok_or_else(|| CliError::new("home_error", "HOME environment variable is not set"))
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string(value)?;
    println!("{rendered}");
    Ok(())
}
