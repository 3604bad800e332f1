mod commands;
mod config;
mod gemini;
mod remote_client;
mod server;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use crate::commands::{
    SetArgs, TargetArgs, cmd_chat, cmd_coach, cmd_exercises, cmd_history, cmd_report,
    cmd_summary, cmd_supplement, cmd_sync, cmd_target_set, cmd_target_show, cmd_template_list,
    cmd_template_load, cmd_template_save, cmd_water, cmd_weight, cmd_workout_add,
    cmd_workout_add_set, cmd_workout_remove, cmd_workout_set, cmd_workout_show,
};
use crate::config::Config;
use crate::gemini::GeminiClient;
use crate::remote_client::HttpRemoteStore;
use nutrilog_core::coach::COACH_DAYS;
use nutrilog_core::db::Database;
use nutrilog_core::local_cache::LocalCache;
use nutrilog_core::session::Session;
use nutrilog_core::sync::{SyncHandle, SyncStatus};

#[derive(Parser)]
#[command(
    name = "nutrilog",
    version,
    about = "A local-first nutrition, hydration and workout log"
)]
struct Cli {
    /// Work from the local cache only; skip the sync server
    #[arg(long, global = true)]
    offline: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add (or with a negative amount, remove) water in ml
    Water {
        /// Amount in ml, e.g. 250 or -250
        #[arg(allow_negative_numbers = true)]
        amount: i64,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Record body weight
    Weight {
        /// Weight value (number)
        value: f64,
        /// Unit: kg or lbs (default: kg)
        #[arg(short, long, default_value = "kg")]
        unit: String,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Toggle a supplement: creatine or multivitamin
    Supplement {
        /// Supplement name
        kind: String,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one day against the targets (defaults to today)
    Summary {
        /// Date to show (YYYY-MM-DD, default: today)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the last N recorded days
    History {
        /// Number of days to show
        #[arg(short, long, default_value = "7")]
        days: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Averages and training totals over recent recorded days
    Report {
        /// Number of recorded days to cover (default: 30)
        #[arg(short, long)]
        days: Option<usize>,
        /// Ask the AI coach for advice on recent workouts instead
        #[arg(long)]
        coach: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage daily nutrient and water targets
    Target {
        #[command(subcommand)]
        command: TargetCommands,
    },
    /// Log and edit workouts
    Workout {
        #[command(subcommand)]
        command: WorkoutCommands,
    },
    /// Talk to the nutrition assistant about today's food
    Chat {
        /// Message to send; starts an interactive session when omitted
        message: Option<String>,
        /// Photo of a meal (JPEG)
        #[arg(long, value_name = "PATH")]
        image: Option<PathBuf>,
    },
    /// Push the current state to the sync server now
    Sync {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start the sync server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(Subcommand)]
enum TargetCommands {
    /// Show the current targets
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change one or more targets
    Set {
        #[command(flatten)]
        args: TargetArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum WorkoutCommands {
    /// Show a day's workout
    Show {
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the exercise catalog
    Exercises {
        /// Only this muscle group
        #[arg(short, long)]
        muscle: Option<String>,
        /// Filter by name
        #[arg(short, long)]
        search: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add an exercise from the catalog by ID
    Add {
        /// Exercise ID (see `workout exercises`)
        exercise: String,
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit a set (exercise and set numbers start at 1)
    Set {
        exercise: usize,
        set: usize,
        #[command(flatten)]
        args: SetArgs,
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Append a set copying the previous one
    AddSet {
        exercise: usize,
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove an exercise from the workout
    Remove {
        exercise: usize,
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Saved routines
    Template {
        #[command(subcommand)]
        command: TemplateCommands,
    },
}

#[derive(Subcommand)]
enum TemplateCommands {
    /// List saved routines
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Save a day's exercises as a routine
    Save {
        name: String,
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Append a routine's exercises to a day's workout
    Load {
        /// Routine ID or name
        routine: String,
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

/// `sync` is the retry after a failed push, so it must not let the remote
/// copy replace the local edits it is meant to upload.
fn reconciles_on_open(command: &Commands) -> bool {
    !matches!(command, Commands::Sync { .. })
}

async fn open_session(config: &Config, offline: bool, reconcile: bool) -> Result<Session> {
    let cache = LocalCache::open(&config.db_path)?;
    let sync = match &config.remote_url {
        Some(url) if !offline => {
            let store = HttpRemoteStore::new(url, config.api_key.clone())?;
            Some(SyncHandle::spawn(store, config.sync))
        }
        _ => None,
    };
    let mut session = Session::open(cache, sync);
    if reconcile {
        session.reconcile_remote().await;
    }
    Ok(session)
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;

    if let Commands::Serve {
        port,
        bind,
        no_auth,
    } = cli.command
    {
        let api_key = if no_auth {
            None
        } else {
            let (key, created) = config.load_or_create_api_key()?;
            if created {
                log::info!("Created API key in {}", config.data_dir.display());
            }
            Some(key)
        };
        let db = Database::open(&config.server_db_path)?;
        return server::start_server(db, port, &bind, api_key).await;
    }

    let reconcile = reconciles_on_open(&cli.command);
    let mut session = open_session(&config, cli.offline, reconcile).await?;
    let result = dispatch(&mut session, &config, cli.command).await;

    if session.close().await == Some(SyncStatus::Error) {
        eprintln!("Warning: could not reach the sync server. Changes are saved locally.");
    }
    result
}

fn gemini_client(config: &Config) -> Result<GeminiClient> {
    let key = config
        .gemini_api_key
        .clone()
        .context("GEMINI_API_KEY is not set")?;
    GeminiClient::new(key, config.gemini_model.clone())
}

async fn dispatch(session: &mut Session, config: &Config, command: Commands) -> Result<()> {
    match command {
        Commands::Water { amount, date, json } => cmd_water(session, amount, date, json),
        Commands::Weight {
            value,
            unit,
            date,
            json,
        } => cmd_weight(session, value, &unit, date, json),
        Commands::Supplement { kind, date, json } => cmd_supplement(session, &kind, date, json),
        Commands::Summary { date, json } => cmd_summary(session, date, json),
        Commands::History { days, json } => cmd_history(session, days, json),
        Commands::Report {
            days,
            coach: true,
            json,
        } => {
            let client = gemini_client(config)?;
            cmd_coach(session, &client, days.unwrap_or(COACH_DAYS), json).await
        }
        Commands::Report { days, json, .. } => cmd_report(session, days, json),
        Commands::Target { command } => match command {
            TargetCommands::Show { json } => cmd_target_show(session, json),
            TargetCommands::Set { args, json } => cmd_target_set(session, &args, json),
        },
        Commands::Workout { command } => match command {
            WorkoutCommands::Show { date, json } => cmd_workout_show(session, date, json),
            WorkoutCommands::Exercises {
                muscle,
                search,
                json,
            } => cmd_exercises(muscle.as_deref(), search.as_deref(), json),
            WorkoutCommands::Add {
                exercise,
                date,
                json,
            } => cmd_workout_add(session, &exercise, date, json),
            WorkoutCommands::Set {
                exercise,
                set,
                args,
                date,
                json,
            } => cmd_workout_set(session, exercise, set, &args, date, json),
            WorkoutCommands::AddSet {
                exercise,
                date,
                json,
            } => cmd_workout_add_set(session, exercise, date, json),
            WorkoutCommands::Remove {
                exercise,
                date,
                json,
            } => cmd_workout_remove(session, exercise, date, json),
            WorkoutCommands::Template { command } => match command {
                TemplateCommands::List { json } => cmd_template_list(session, json),
                TemplateCommands::Save { name, date, json } => {
                    cmd_template_save(session, &name, date, json)
                }
                TemplateCommands::Load {
                    routine,
                    date,
                    json,
                } => cmd_template_load(session, &routine, date, json),
            },
        },
        Commands::Chat { message, image } => {
            let assistant = gemini_client(config)?;
            cmd_chat(session, &assistant, message, image.as_deref()).await
        }
        Commands::Sync { json } => cmd_sync(session, json).await,
        Commands::Serve { .. } => unreachable!("handled before opening a session"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nutrilog_core::models::{DailyLog, History, Snapshot, Targets};
    use nutrilog_core::remote::RemoteStore;
    use std::path::Path;

    fn config_for(dir: &Path, remote_url: &str) -> Config {
        Config::from_dir(dir, |key| {
            (key == "NUTRILOG_REMOTE_URL").then(|| remote_url.to_string())
        })
        .unwrap()
    }

    async fn unused_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}")
    }

    #[test]
    fn test_only_sync_skips_reconcile() {
        assert!(!reconciles_on_open(&Commands::Sync { json: false }));
        assert!(reconciles_on_open(&Commands::Summary {
            date: None,
            json: false
        }));
    }

    #[tokio::test]
    async fn test_sync_retry_uploads_offline_edit() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let live = format!("http://{}", listener.local_addr().unwrap());
        let app = server::router(Database::open_in_memory().unwrap(), None);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let store = HttpRemoteStore::new(&live, None).unwrap();
        let yesterday = chrono::Local::now().date_naive().pred_opt().unwrap();
        let older = Snapshot {
            history: History::new().with_log(
                yesterday,
                DailyLog {
                    water_intake: 100,
                    ..DailyLog::default()
                },
            ),
            targets: Targets::default(),
        };
        assert!(store.push_remote(&older).await);

        let dir = tempfile::tempdir().unwrap();

        // First run: the server is unreachable, so the push fails.
        let unreachable = config_for(dir.path(), &unused_url().await);
        let water = Commands::Water {
            amount: 750,
            date: None,
            json: false,
        };
        let mut session = open_session(&unreachable, false, reconciles_on_open(&water))
            .await
            .unwrap();
        dispatch(&mut session, &unreachable, water).await.unwrap();
        assert_eq!(session.close().await, Some(SyncStatus::Error));

        // Second run: `nutrilog sync` against the live server.
        let online = config_for(dir.path(), &live);
        let retry = Commands::Sync { json: false };
        let mut session = open_session(&online, false, reconciles_on_open(&retry))
            .await
            .unwrap();
        dispatch(&mut session, &online, retry).await.unwrap();
        let today = session.today();
        assert_eq!(session.log_for(today).water_intake, 750);
        session.close().await;

        let stored = store.fetch_remote().await.unwrap();
        assert_eq!(stored.history.get_log(today).water_intake, 750);
    }
}
