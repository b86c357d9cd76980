//! Main entry point for the episode-renamer CLI application.

use clap::Parser;
use episode_renamer::api::{OpenListClient, RemoteFs};
use episode_renamer::config::{Config, resolve_state_dir};
use episode_renamer::error::{AppError, Result};
use episode_renamer::parser::is_video_file;
use episode_renamer::pattern::NamingPattern;
use episode_renamer::session::{Session, TokenCache};
use episode_renamer::strategy::{PlanOutcome, RenameStrategy, SeasonSource};
use episode_renamer::types::{FileEntry, join_remote_path, parent_remote_path};
use episode_renamer::ui::{self, NavAction, RenameMode, UnparsedAction};
use log::{debug, info, warn};
use std::path::PathBuf;

const MAX_LOGIN_ATTEMPTS: u32 = 3;

/// Command-line arguments for the episode-renamer application.
#[derive(Parser, Debug)]
#[command(
    name = "episode-renamer",
    version,
    about = "Batch rename episode files on an OpenList server",
    long_about = "Browse an OpenList (AList-compatible) server and rename TV episode files in bulk, \
                  by parsed season/episode numbers, a numbered pattern, regex, or by hand."
)]
struct Args {
    /// OpenList server URL, e.g. http://192.168.1.1:5244 (overrides config)
    #[arg(short, long)]
    server: Option<String>,

    /// Account to log in with (overrides config)
    #[arg(short, long)]
    username: Option<String>,

    /// Directory for the token cache and config file
    #[arg(long, env = "EPISODE_PATH")]
    state_dir: Option<PathBuf>,

    /// Remote directory to start in
    #[arg(short, long, default_value = "/")]
    path: String,

    /// Log verbosity level: 0=error, 1=warn, 2=info, 3=debug, 4=trace
    #[arg(short, long, default_value_t = 1)]
    log: u8,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    let log_level = match args.log {
        0 => log::LevelFilter::Error,
        1 => log::LevelFilter::Warn,
        2 => log::LevelFilter::Info,
        3 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .format_target(false)
        .init();

    debug!("Log level set to {:?}", log_level);

    // Load config
    let config_path = Config::get_config_path(args.state_dir.as_deref());
    let mut config = match &config_path {
        Ok(path) => Config::load_from(path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Config::new()
        }),
        Err(e) => {
            warn!("No config location: {}. Using defaults.", e);
            Config::new()
        }
    };

    // Merge config with CLI args
    let base_url = match args.server {
        Some(server) => server,
        None => ui::prompt_with_default("Server URL", &config.base_url)?,
    };
    let username = match (args.username, config.username.clone()) {
        (Some(name), _) => name,
        (None, Some(last)) => ui::prompt_with_default("Username", &last)?,
        (None, None) => ui::prompt("Username: ")?,
    };
    if username.is_empty() {
        eprintln!("Error: a username is required.");
        std::process::exit(1);
    }

    let client = match OpenListClient::new(&base_url, config.request_timeout(), config.batch_timeout()) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    config.base_url = client.base_url().to_string();
    config.username = Some(username.clone());
    if let Ok(path) = &config_path {
        if let Err(e) = config.save_to(path) {
            warn!("Failed to save config: {}", e);
        }
    }

    let default_pattern = config.naming_pattern().unwrap_or_else(|e| {
        warn!("{}. Using the built-in pattern.", e);
        NamingPattern::default()
    });

    let state_dir = resolve_state_dir(args.state_dir);
    info!("State directory: {}", state_dir.display());

    let mut session = Session::new(client, &username, TokenCache::new(&state_dir));
    if session.resume().await {
        println!("Resumed session for {}", username);
    } else {
        login(&mut session).await?;
    }

    run(&mut session, args.path, &default_pattern).await?;
    Ok(())
}

/// Ask for the password until login succeeds or the attempts run out.
async fn login<R: RemoteFs>(session: &mut Session<R>) -> Result<()> {
    for attempt in 1..=MAX_LOGIN_ATTEMPTS {
        let password = ui::prompt_password(session.username())?;
        match session.login(&password).await {
            Ok(()) => {
                println!("Logged in as {}", session.username());
                return Ok(());
            }
            Err(AppError::Auth(msg)) if attempt < MAX_LOGIN_ATTEMPTS => {
                eprintln!("Login failed: {}", msg);
            }
            Err(e) => return Err(e),
        }
    }
    Err(AppError::Auth("too many failed attempts".to_string()))
}

/// The directory browsing loop.
async fn run<R: RemoteFs>(
    session: &mut Session<R>,
    start: String,
    default_pattern: &NamingPattern,
) -> Result<()> {
    let mut cwd = start;
    let mut entries: Vec<FileEntry> = Vec::new();
    let mut stale = true;

    loop {
        if stale {
            match session.list(&cwd).await {
                Ok(listing) => entries = listing,
                Err(AppError::Auth(msg)) => {
                    eprintln!("Session expired: {}", msg);
                    login(session).await?;
                    continue;
                }
                Err(e) => {
                    ui::print_error(&e);
                    if cwd == "/" {
                        return Err(e);
                    }
                    cwd = parent_remote_path(&cwd);
                    continue;
                }
            }
            stale = false;
            ui::print_directory(&cwd, &entries);
        }

        let input = ui::prompt("> ")?;
        let Some(action) = ui::parse_nav_action(&input) else {
            println!("Unknown command '{}'", input);
            continue;
        };

        match action {
            NavAction::Quit => return Ok(()),
            NavAction::Parent => {
                cwd = parent_remote_path(&cwd);
                stale = true;
            }
            NavAction::Refresh => stale = true,
            NavAction::Open(i) => match entries.get(i) {
                Some(entry) if entry.is_dir => {
                    cwd = join_remote_path(&cwd, &entry.name);
                    stale = true;
                }
                Some(entry) => println!("'{}' is not a directory", entry.name),
                None => println!("No entry {}", i + 1),
            },
            NavAction::BatchRename => {
                match batch_rename(session, &cwd, &entries, default_pattern).await {
                    Ok(true) => stale = true,
                    Ok(false) => {}
                    Err(AppError::Auth(msg)) => {
                        eprintln!("Session expired: {}", msg);
                        login(session).await?;
                    }
                    Err(e) => ui::print_error(&e),
                }
            }
            NavAction::RenameOne => match rename_one(session, &cwd, &entries).await {
                Ok(true) => stale = true,
                Ok(false) => {}
                Err(AppError::Auth(msg)) => {
                    eprintln!("Session expired: {}", msg);
                    login(session).await?;
                }
                Err(e) => ui::print_error(&e),
            },
        }
    }
}

/// Select video files, build a plan with the chosen strategy, confirm and
/// send it. Returns whether anything was renamed.
async fn batch_rename<R: RemoteFs>(
    session: &mut Session<R>,
    dir: &str,
    entries: &[FileEntry],
    default_pattern: &NamingPattern,
) -> Result<bool> {
    let videos: Vec<FileEntry> = entries
        .iter()
        .filter(|e| !e.is_dir && is_video_file(&e.name))
        .cloned()
        .collect();
    if videos.is_empty() {
        println!("No video files in {}", dir);
        return Ok(false);
    }

    println!("Video files:");
    for line in ui::format_listing(&videos) {
        println!("{}", line);
    }
    let selection = ui::parse_selection(&ui::prompt("Select files (all, 1,3-5): ")?, videos.len())?;
    let selected: Vec<FileEntry> = selection.iter().map(|&i| videos[i].clone()).collect();

    ui::print_rename_modes();
    let mode = ui::parse_rename_mode(&ui::prompt("Mode [1-4]: ")?)
        .ok_or_else(|| AppError::InvalidInput("unknown rename mode".to_string()))?;

    let outcome = match mode {
        RenameMode::Smart => smart_outcome(&selected, entries, default_pattern)?,
        RenameMode::Manual => {
            println!("New name for each file (empty keeps it, extension added if omitted):");
            let mut names = Vec::with_capacity(selected.len());
            for file in &selected {
                names.push(ui::prompt(&format!("{} -> ", file.name))?);
            }
            RenameStrategy::Manual { names }.compute_plan(&selected, entries)?
        }
        RenameMode::Uniform => uniform_strategy(default_pattern)?.compute_plan(&selected, entries)?,
        RenameMode::Regex => {
            let search = ui::prompt("Search regex: ")?;
            let replacement = ui::prompt("Replacement (\\1 or $1 for groups): ")?;
            RenameStrategy::regex(&search, &replacement)?.compute_plan(&selected, entries)?
        }
    };

    confirm_and_execute(session, dir, &outcome).await
}

fn choose_pattern(default_pattern: &NamingPattern) -> Result<NamingPattern> {
    ui::print_pattern_presets();
    let input = ui::prompt_with_default("Pattern", default_pattern.as_str())?;
    Ok(NamingPattern::parse(&ui::resolve_pattern_choice(&input))?)
}

/// Smart mode. Unparsed files are skipped unless the user supplies a
/// fallback pattern for them.
fn smart_outcome(
    selected: &[FileEntry],
    siblings: &[FileEntry],
    default_pattern: &NamingPattern,
) -> Result<PlanOutcome> {
    let pattern = choose_pattern(default_pattern)?;
    let outcome = RenameStrategy::Smart {
        pattern: pattern.clone(),
        fallback: None,
    }
    .compute_plan(selected, siblings)?;

    if outcome.unparsed.is_empty() {
        return Ok(outcome);
    }

    println!("No episode number found in:");
    for name in &outcome.unparsed {
        println!("  {}", name);
    }
    let action = ui::parse_unparsed_action(&ui::prompt("[s]kip them or use a [f]allback pattern? [s]: ")?)
        .unwrap_or(UnparsedAction::Skip);
    if action == UnparsedAction::Skip {
        return Ok(outcome);
    }

    let fallback = NamingPattern::parse(&ui::prompt("Fallback pattern (e.g. {title} - Special): ")?)?;
    RenameStrategy::Smart {
        pattern,
        fallback: Some(fallback),
    }
    .compute_plan(selected, siblings)
}

fn uniform_strategy(default_pattern: &NamingPattern) -> Result<RenameStrategy> {
    let pattern = choose_pattern(default_pattern)?;

    let title = ui::prompt("Series title (empty: take it from each name): ")?;
    let title = (!title.is_empty()).then_some(title);

    let start_episode = ui::prompt_with_default("First episode number", "1")?
        .parse::<u32>()
        .map_err(|_| AppError::InvalidInput("episode number must be a non-negative integer".to_string()))?;

    let season = match ui::prompt("Season (empty: take it from each name): ")?.as_str() {
        "" => SeasonSource::Parsed,
        s => SeasonSource::Fixed(
            s.parse()
                .map_err(|_| AppError::InvalidInput(format!("'{}' is not a season number", s)))?,
        ),
    };

    Ok(RenameStrategy::Uniform {
        pattern,
        title,
        start_episode,
        season,
    })
}

async fn confirm_and_execute<R: RemoteFs>(
    session: &mut Session<R>,
    dir: &str,
    outcome: &PlanOutcome,
) -> Result<bool> {
    println!();
    println!("Planned renames ({}):", outcome.plan.len());
    for line in ui::format_outcome(outcome) {
        println!("{}", line);
    }

    if outcome.plan.is_empty() {
        println!("Nothing to rename.");
        return Ok(false);
    }
    if !ui::confirm("Apply these renames?")? {
        println!("Cancelled.");
        return Ok(false);
    }

    session.execute_plan(dir, &outcome.plan).await?;
    println!("Renamed {} file(s).", outcome.plan.len());
    Ok(true)
}

async fn rename_one<R: RemoteFs>(session: &mut Session<R>, dir: &str, entries: &[FileEntry]) -> Result<bool> {
    if entries.is_empty() {
        println!("Nothing to rename in {}", dir);
        return Ok(false);
    }

    let input = ui::prompt("Number of the entry to rename: ")?;
    let index = input
        .parse::<usize>()
        .ok()
        .filter(|&n| n > 0 && n <= entries.len())
        .ok_or_else(|| AppError::InvalidInput(format!("no entry '{}'", input)))?;
    let entry = &entries[index - 1];

    let new_name = ui::prompt_with_default("New name", &entry.name)?;
    if new_name == entry.name {
        println!("Name unchanged.");
        return Ok(false);
    }
    if entries.iter().any(|e| e.name == new_name) {
        return Err(AppError::InvalidInput(format!("'{}' already exists", new_name)));
    }
    if !ui::confirm(&format!("Rename '{}' to '{}'?", entry.name, new_name))? {
        println!("Cancelled.");
        return Ok(false);
    }

    session
        .rename_item(&join_remote_path(dir, &entry.name), &new_name)
        .await?;
    println!("Renamed.");
    Ok(true)
}
