//! LiftLog - Local-first Strength Program Tracker
//!
//! Maintenance entry point: inspect the local store, run a sync round,
//! clear the local cache or seed the default exercises.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use liftlog::auth::{adopt_stored_identity, AuthCoordinator, GoTrueAuth, SessionRestore};
use liftlog::programs::seed_default_exercises;
use liftlog::storage::config::load_config;
use liftlog::storage::Database;
use liftlog::store::Store;
use liftlog::sync::{PostgrestBackend, SyncController};

const USAGE: &str = "usage: liftlog [status|sync|clear-cache|seed]";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting LiftLog v{}", env!("CARGO_PKG_VERSION"));

    let command = std::env::args().nth(1).unwrap_or_else(|| "status".to_string());

    let config = load_config().context("loading configuration")?;
    let db = Database::open(&config.database_path())
        .with_context(|| format!("opening {}", config.database_path().display()))?;
    let store = Store::open(db)?;

    // Offline commands act as the last signed-in user.
    if matches!(command.as_str(), "status" | "seed") {
        adopt_stored_identity(&store).context("reading stored session")?;
    }

    match command.as_str() {
        "status" => print_status(&store),
        "seed" => {
            let ctx = store.context();
            let ids = seed_default_exercises(&store, &ctx)?;
            store.flush()?;
            println!("{} default exercises available", ids.len());
        }
        "clear-cache" => {
            store.clear_local_cache()?;
            println!("Local cache cleared; restart to reload.");
        }
        "sync" => run_sync(&config.sync, store).await?,
        "-h" | "--help" | "help" => println!("{}", USAGE),
        other => bail!("unknown command '{}'\n{}", other, USAGE),
    }

    Ok(())
}

fn print_status(store: &Store) {
    println!("Identity: {}", store.identity().current().user_id());
    println!("Pending pushes: {}", store.pending_len());
    for count in store.counts() {
        let cursor = store
            .cursor(count.collection)
            .map(|c| c.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<22} {:>6} live {:>6} total   cursor {}",
            count.collection.as_str(),
            count.live,
            count.total,
            cursor
        );
    }
}

async fn run_sync(settings: &liftlog::storage::SyncSettings, store: Store) -> Result<()> {
    if !settings.is_configured() {
        bail!("remote sync is not configured (set LIFTLOG_SUPABASE_URL and LIFTLOG_SUPABASE_KEY)");
    }

    let backend = Arc::new(PostgrestBackend::from_settings(settings)?);
    let auth = Arc::new(GoTrueAuth::from_settings(settings, store.clone())?);
    let sync = SyncController::new(store.clone(), backend, settings.clone());
    let coordinator = AuthCoordinator::new(auth, store.clone(), sync);

    match coordinator.restore().await {
        SessionRestore::SignedIn(report) => {
            if let Some(migration) = &report.migration {
                println!("Migrated {} local record(s)", migration.reassigned);
            }
            match report.initial_sync {
                Some(sync) => println!(
                    "Pulled {} ({} merged), pushed {}, {} error(s)",
                    sync.pulled,
                    sync.merged,
                    sync.pushed,
                    sync.errors.len()
                ),
                None => println!("Sync could not be enabled for {}", report.user_id),
            }
        }
        SessionRestore::Anonymous => println!("Not signed in; nothing to sync."),
        SessionRestore::Offline(e) => println!("Offline ({}); local data unchanged.", e),
    }

    coordinator.sync().disable_all();
    store.flush()?;
    Ok(())
}
