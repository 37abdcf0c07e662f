use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use tastematch::config::Config;
use tastematch::db::models::{SessionRecord, UserRecord};
use tastematch::db::{records, DocumentStore};
use tastematch::lastfm::client::LastfmClient;
use tastematch::matching::SessionMatcher;
use tastematch::profile::service::ProfileService;

/// tastematch: Taste-profile matching for listening sessions.
///
/// Builds a taste profile for each participant from their Last.fm history
/// and ranks every pair in a session by musical compatibility.
#[derive(Parser)]
#[command(name = "tastematch", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Manage users
    User {
        #[command(subcommand)]
        action: UserCommand,
    },

    /// Manage sessions
    Session {
        #[command(subcommand)]
        action: SessionCommand,
    },

    /// Show or rebuild a user's taste profile
    Profile {
        /// The user code
        identity: String,

        /// Rebuild from Last.fm even if the cached profile is fresh
        #[arg(long)]
        refresh: bool,
    },

    /// Compare two users directly
    Compare {
        /// First user code
        a: String,
        /// Second user code
        b: String,
    },

    /// Compute matches for every pair in a session
    Match {
        /// The session code
        session: String,

        /// Rebuild every participant's profile
        #[arg(long)]
        refresh: bool,

        /// Number of profiles to fetch in parallel (default: TASTEMATCH_CONCURRENCY or 4)
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Show the stored matches for a session
    Matches {
        /// The session code
        session: String,
    },

    /// Show system status (DB stats, cached profiles, sessions)
    Status,
}

#[derive(Subcommand)]
enum UserCommand {
    /// Add a user
    Add {
        /// Display name
        name: String,

        /// Linked Last.fm username
        #[arg(long)]
        lastfm: Option<String>,

        /// Use this code instead of a generated one
        #[arg(long)]
        code: Option<String>,
    },
}

#[derive(Subcommand)]
enum SessionCommand {
    /// Create a session
    Create {
        /// Session name
        name: String,

        /// Maximum number of participants
        #[arg(long)]
        max_size: Option<u32>,

        /// Use this code instead of a generated one
        #[arg(long)]
        code: Option<String>,
    },

    /// Add a user to a session
    Join {
        /// The session code
        session: String,
        /// The user code
        user: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tastematch=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            info!("Initializing tastematch database...");
            let config = Config::load()?;
            let store = tastematch::db::initialize_sqlite(&config.db_path)?;
            let table_count = store.table_count().await?;
            println!("Database initialized at: {}", config.db_path);
            println!("Tables created: {table_count}");
            println!("\ntastematch is ready. Set LASTFM_API_KEY in your .env file,");
            println!("then add users with: tastematch user add <name> --lastfm <username>");
        }

        Commands::User {
            action: UserCommand::Add { name, lastfm, code },
        } => {
            let config = Config::load()?;
            let store = tastematch::db::open_sqlite(&config.db_path)?;

            let code = code.unwrap_or_else(new_code);
            if records::load_user(store.as_ref(), &code).await?.is_some() {
                anyhow::bail!("User {code} already exists");
            }

            let user = UserRecord::new(&code, &name, lastfm.as_deref());
            records::save_user(store.as_ref(), &user).await?;

            println!("Added user {} ({})", name.bold(), code);
            if user.source_username().is_none() {
                println!(
                    "{}",
                    "No Last.fm account linked; this user can't be profiled yet.".dimmed()
                );
            }
        }

        Commands::Session {
            action: SessionCommand::Create { name, max_size, code },
        } => {
            let config = Config::load()?;
            let store = tastematch::db::open_sqlite(&config.db_path)?;

            let code = code.unwrap_or_else(new_code);
            if records::load_session(store.as_ref(), &code).await?.is_some() {
                anyhow::bail!("Session {code} already exists");
            }

            let session = SessionRecord::new(&code, &name, max_size);
            records::save_session(store.as_ref(), &session).await?;
            println!("Created session {} ({})", name.bold(), code);
        }

        Commands::Session {
            action: SessionCommand::Join { session, user },
        } => {
            let config = Config::load()?;
            let store = tastematch::db::open_sqlite(&config.db_path)?;

            let updated = records::join_session(store.as_ref(), &session, &user).await?;
            println!(
                "{} joined session {} ({} participants)",
                user,
                session,
                updated.participant_identities().len()
            );
        }

        Commands::Profile { identity, refresh } => {
            let config = Config::load()?;
            let store = tastematch::db::open_sqlite(&config.db_path)?;

            let profiles = create_profile_service(&config, &store)?;

            // A fresh cached profile doesn't need the API key
            if !refresh {
                if let Some(profile) = profiles.cached(&identity).await? {
                    println!("Loading cached profile...");
                    profile.display(15);
                    println!(
                        "{}",
                        format!("To rebuild, run: tastematch profile {identity} --refresh").dimmed()
                    );
                    return Ok(());
                }
            }

            config.require_lastfm()?;
            println!("Building taste profile from Last.fm history...");
            let profile = profiles.get_or_build(&identity, refresh).await?;
            profile.display(15);
        }

        Commands::Compare { a, b } => {
            let config = Config::load()?;
            config.require_lastfm()?;
            let store = tastematch::db::open_sqlite(&config.db_path)?;

            let profiles = Arc::new(create_profile_service(&config, &store)?);
            let matcher = SessionMatcher::new(Arc::clone(&store), profiles, &config.matching);

            let record = matcher.compare(&a, &b).await?;
            tastematch::output::terminal::display_compatibility(&record);
        }

        Commands::Match {
            session,
            refresh,
            concurrency,
        } => {
            let mut config = Config::load()?;
            config.require_lastfm()?;
            if let Some(n) = concurrency {
                config.matching.concurrency = n.max(1);
            }
            let store = tastematch::db::open_sqlite(&config.db_path)?;

            let profiles = Arc::new(create_profile_service(&config, &store)?);
            let matcher = SessionMatcher::new(Arc::clone(&store), profiles, &config.matching);

            let spinner = ProgressBar::new_spinner();
            spinner.set_style(
                ProgressStyle::default_spinner()
                    .template("  {spinner} {msg} ({elapsed})")
                    .expect("valid template"),
            );
            spinner.set_message(format!("Matching session {session}"));
            spinner.enable_steady_tick(Duration::from_millis(120));

            let result = matcher.compute_matches(&session, refresh).await;
            spinner.finish_and_clear();

            let match_set = result?;
            tastematch::output::terminal::display_match_set(&match_set);
            println!("{}", "Matches saved.".bold());
        }

        Commands::Matches { session } => {
            let config = Config::load()?;
            let store = tastematch::db::open_sqlite(&config.db_path)?;

            // Reading stored matches never touches Last.fm
            let profiles = Arc::new(create_profile_service(&config, &store)?);
            let matcher = SessionMatcher::new(Arc::clone(&store), profiles, &config.matching);

            let stored = matcher.get_session_matches(&session).await?;
            tastematch::output::terminal::display_stored_matches(&session, &stored);
        }

        Commands::Status => {
            let config = Config::load()?;
            if !tastematch::status::is_initialized(&config.db_path) {
                println!("Database: not initialized");
                println!("\nRun `tastematch init` to set up the database.");
                return Ok(());
            }
            let store = tastematch::db::open_sqlite(&config.db_path)?;
            tastematch::status::show(&store, &config.db_path, config.matching.freshness).await?;
        }
    }

    Ok(())
}

/// Build the Last.fm client from configuration.
fn create_client(config: &Config) -> Result<LastfmClient> {
    LastfmClient::new(
        &config.lastfm_api_url,
        &config.lastfm_api_key,
        config.request_timeout,
        config.requests_per_second,
    )
}

/// Wire the profile service to the store and a Last.fm client.
fn create_profile_service(config: &Config, store: &Arc<dyn DocumentStore>) -> Result<ProfileService> {
    let client = create_client(config)?;
    Ok(ProfileService::new(
        Arc::clone(store),
        Arc::new(client),
        &config.matching,
    ))
}

/// Generate a short record code for a new user or session.
fn new_code() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}
