mod cli;

use showstash::{
    config,
    enrichment::{self, EnrichmentWorker},
    tmdb::{Credential, ShowMetadataSource, TmdbClient},
};
use showstash_db::pool::{get_conn, init_pool};
use showstash_db::queries::{outbox, shows};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "showstash=trace,showstash_db=debug,showstash_common=debug".to_string()
        } else {
            "showstash=info,showstash_db=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Worker => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_worker(cli.config.as_deref()))
        }
        Commands::Add {
            tmdb_id,
            name,
            force,
        } => add_show(cli.config.as_deref(), tmdb_id, name.as_deref(), force),
        Commands::Search { query } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(search_shows(cli.config.as_deref(), &query))
        }
        Commands::Shows { json } => list_shows(cli.config.as_deref(), json),
        Commands::Version => {
            println!("showstash {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Build the TMDB client from config, failing if no credential is set.
fn build_tmdb_client(config: &config::Config) -> Result<TmdbClient> {
    if config.tmdb.credential.is_empty() {
        anyhow::bail!(
            "No TMDB credential configured. Set [tmdb].credential or the TMDB_API_KEY environment variable."
        );
    }

    let client = TmdbClient::new(
        config.tmdb.base_url.clone(),
        Credential::from_raw(&config.tmdb.credential),
        config.tmdb.language.clone(),
    )
    .with_retries(
        config.worker.fetch_retries,
        Duration::from_millis(config.worker.retry_delay_ms),
    );

    Ok(client)
}

async fn run_worker(config_path: Option<&std::path::Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let client = build_tmdb_client(&config)?;

    tracing::info!("Initializing database at {}", config.database.path);
    let db_pool = init_pool(&config.database.path)?;

    let worker = EnrichmentWorker::new(db_pool, Arc::new(client))
        .with_poll_interval(Duration::from_millis(config.worker.poll_interval_ms));

    // Return jobs orphaned by a previous worker session to the queue
    if let Err(e) = worker.reclaim_stale(chrono::Duration::minutes(config.worker.stale_lease_minutes))
    {
        tracing::warn!("Failed to reclaim stale jobs: {}", e);
    }

    let stop = worker.stop_signal();
    let handle = tokio::spawn(async move { worker.run().await });

    wait_for_shutdown().await?;
    tracing::info!("Shutting down...");
    stop.store(true, std::sync::atomic::Ordering::Relaxed);
    let _ = handle.await;

    Ok(())
}

/// Block until the process receives an interrupt, or SIGTERM on Unix.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = sigterm.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}

fn add_show(
    config_path: Option<&std::path::Path>,
    tmdb_id: i64,
    name: Option<&str>,
    force: bool,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let db_pool = init_pool(&config.database.path)?;
    let mut conn = get_conn(&db_pool)?;

    match enrichment::request_enrichment(&mut conn, tmdb_id, name, force)? {
        enrichment::EnqueueOutcome::Queued { show, job } => {
            println!(
                "Queued enrichment job {} for '{}' (TMDB {})",
                job.id, show.name, tmdb_id
            );
        }
        enrichment::EnqueueOutcome::Skipped { show } => {
            println!(
                "Show '{}' is already {}. Use --force to re-enrich.",
                show.name, show.enrich_state
            );
        }
    }

    Ok(())
}

async fn search_shows(config_path: Option<&std::path::Path>, query: &str) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let client = build_tmdb_client(&config)?;

    let results = client.search_shows(query).await?;

    if results.is_empty() {
        println!("No results for '{}'", query);
        return Ok(());
    }

    for result in results {
        let year = result
            .first_air_date
            .as_deref()
            .and_then(|d| d.get(..4))
            .unwrap_or("????");
        println!("{:>8}  {} ({})", result.tmdb_id, result.name, year);
        if let Some(ref overview) = result.overview {
            if let Some(line) = overview.lines().next() {
                println!("          {}", line);
            }
        }
    }

    Ok(())
}

fn list_shows(config_path: Option<&std::path::Path>, json: bool) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let db_pool = init_pool(&config.database.path)?;
    let conn = get_conn(&db_pool)?;

    let all = shows::list_shows(&conn)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&all)?);
        return Ok(());
    }

    if all.is_empty() {
        println!("No shows in the catalog. Add one with `showstash add <tmdb-id>`.");
        return Ok(());
    }

    for show in all {
        let seasons = shows::seasons_for_show(&conn, show.id)?.len();
        let episodes = shows::count_episodes_for_show(&conn, show.id)?;

        print!(
            "{} (TMDB {}) [{}]",
            show.name, show.tmdb_id, show.enrich_state
        );
        if seasons > 0 {
            print!(" - {} seasons, {} episodes", seasons, episodes);
        }
        println!();

        if let Some(ref error) = show.enrich_error {
            println!("    last error: {}", error);
        }

        for job in outbox::jobs_for_show(&conn, show.id)? {
            if job.status == showstash_common::JobStatus::Pending
                || job.status == showstash_common::JobStatus::Running
            {
                println!("    job {}: {} (attempt {})", job.id, job.status, job.attempts);
            }
        }
    }

    Ok(())
}
