use anyhow::{Context, Result};
use clap::Parser;
use feedgate::config::Config;
use feedgate::gateway::{ContentGateway, HttpGateway};
use feedgate::messages::Messages;
use feedgate::publish::{ArtifactLayout, Publisher};
use feedgate::server::{self, AppState};
use feedgate::storage::{Database, DatabaseError};
use feedgate::sync::{PollContext, PollSettings, Registrar, Supervisor};
use feedgate::util::HostPolicy;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser, Debug)]
#[command(
    name = "feedgate",
    about = "Follow RSS/Atom feeds and publish them through a bundle store"
)]
struct Args {
    /// Path to the TOML config file
    #[arg(long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    /// Reset database (delete and recreate)
    #[arg(long)]
    reset_db: bool,

    /// Do not restart pollers for feeds already in the registry
    #[arg(long)]
    no_resume: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // FEEDGATE_LANG overrides the configured language
    let language = std::env::var("FEEDGATE_LANG").unwrap_or_else(|_| config.language.clone());
    let messages = Arc::new(Messages::load(&config.translations_dir, &language));

    if args.reset_db && config.database_path.exists() {
        std::fs::remove_file(&config.database_path).context("Failed to delete database")?;
        tracing::info!(path = %config.database_path.display(), "Database reset");
    }

    let db_path = config
        .database_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: Another feedgate instance is using {db_path}. Stop it and try again.");
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open database: {}", e));
        }
    };

    std::fs::create_dir_all(&config.items_dir).with_context(|| {
        format!("Failed to create items directory {}", config.items_dir.display())
    })?;
    if let Some(parent) = config.feeds_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let client = reqwest::Client::builder()
        .user_agent(concat!("feedgate/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;
    let gateway: Arc<dyn ContentGateway> = Arc::new(
        HttpGateway::new(
            client.clone(),
            &config.bundle_server,
            &config.bundle_inserter,
            config.request_timeout(),
        )
        .context("Invalid content gateway address")?,
    );

    let mut supervisor = Supervisor::new(PollContext {
        db: db.clone(),
        client,
        gateway: gateway.clone(),
        settings: PollSettings::from_config(&config),
    });
    if args.no_resume {
        tracing::info!("Not resuming pollers for registered feeds");
    } else {
        let feeds = db.all_feeds().await.context("Failed to load feeds")?;
        for feed in &feeds {
            supervisor.start(feed.info()).await;
        }
        tracing::info!(count = feeds.len(), "Resumed pollers");
    }

    let (registrar, worker) = Registrar::spawn(db.clone(), supervisor, config.unfollow_policy);
    let publisher = Arc::new(Publisher::new(
        db,
        gateway,
        ArtifactLayout::new(config.feeds_file.clone(), config.items_dir.clone()),
    ));
    let state = AppState {
        registrar,
        publisher,
        messages,
        host_policy: HostPolicy::from_allow_private(config.allow_private_hosts),
    };

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, language = %state.messages.language(), "Listening");

    server::serve(listener, state, shutdown_signal())
        .await
        .context("HTTP server failed")?;

    // The server owned the last registrar handles; the worker now stops every poller
    worker.await.context("Registration worker panicked")?;
    tracing::info!("Shut down cleanly");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM (Ctrl-C elsewhere).
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    tracing::warn!(error = %e, "Failed to install signal handlers, falling back to Ctrl-C");
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
            _ = sigint.recv() => tracing::info!("Received SIGINT"),
        }
    }

    #[cfg(not(unix))]
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
