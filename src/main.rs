//! wiki-graph binary: request server, queue worker and command-line client.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use wiki_graph::bfs::ShortestPathEngine;
use wiki_graph::cli::client::{ApiClient, render_task};
use wiki_graph::cli::{Cli, Command};
use wiki_graph::config::{Config, ConfigLoader};
use wiki_graph::db::Database;
use wiki_graph::handler::PathTaskHandler;
use wiki_graph::links::WikiClient;
use wiki_graph::logging::{self, LogTarget};
use wiki_graph::queue::{Broker, Consumer, Producer, SqliteBroker};
use wiki_graph::server::start_server;
use wiki_graph::service::PathService;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(&LogTarget::parse(&cli.log), cli.verbose)?;

    let loader = ConfigLoader::load(cli.config.as_ref().map(PathBuf::from))?;
    let mut config = loader.into_config();

    if let Some(db_path) = &cli.database {
        config.database.path = db_path.into();
    }

    match cli.command {
        Command::Serve { addr } => {
            if let Some(addr) = addr {
                config.server.addr = addr;
            }
            run_server(config).await
        }
        Command::Worker => run_worker(config).await,
        Command::Find {
            from,
            to,
            wait,
            server,
        } => {
            let client = ApiClient::new(server.unwrap_or(config.client.server_url.clone()))?;
            let id = client.create_task(&from, &to).await?;
            if !wait {
                println!("{}", id);
                return Ok(());
            }
            let task = client
                .wait_for(
                    &id.to_string(),
                    std::time::Duration::from_millis(config.client.poll_interval_ms),
                    std::time::Duration::from_secs(config.client.wait_timeout_seconds),
                )
                .await?;
            println!("{}", render_task(&task));
            Ok(())
        }
        Command::Status { id, server } => {
            let client = ApiClient::new(server.unwrap_or(config.client.server_url.clone()))?;
            let task = client.get_task(&id).await?;
            println!("{}", render_task(&task));
            Ok(())
        }
    }
}

fn open_database(config: &Config) -> Result<Database> {
    config.ensure_db_dir()?;
    Database::open(&config.database.path)
        .with_context(|| format!("failed to open database {}", config.database.path.display()))
}

fn open_broker(config: &Config, db: Database) -> Arc<dyn Broker> {
    Arc::new(SqliteBroker::new(
        db,
        config.queue.visibility_timeout(),
        config.queue.requeue_delay(),
    ))
}

async fn run_server(config: Config) -> Result<()> {
    let db = open_database(&config)?;
    let producer = Producer::new(open_broker(&config, db.clone()), &config.queue.routing_key);
    let service = PathService::new(db, producer);

    let (shutdown_tx, addr) = start_server(service, config.server.socket_addr()?).await?;
    info!("Serving on http://{}", addr);

    tokio::signal::ctrl_c().await?;
    let _ = shutdown_tx.send(());
    Ok(())
}

async fn run_worker(config: Config) -> Result<()> {
    let db = open_database(&config)?;

    let links = WikiClient::new(
        config.wiki.api_url.clone(),
        config.wiki.max_rps,
        config.wiki.request_timeout(),
    )?;
    let engine = ShortestPathEngine::new(Arc::new(links), config.algorithm.bfs())?;
    let handler = PathTaskHandler::new(db.clone(), Arc::new(engine), config.handler.stale_after());

    let consumer = Consumer::new(
        open_broker(&config, db),
        &config.queue.routing_key,
        config.queue.poll_interval(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested; finishing the current task");
            let _ = shutdown_tx.send(true);
        }
    });

    info!(
        api_url = %config.wiki.api_url,
        max_rps = config.wiki.max_rps,
        distance_threshold = config.algorithm.distance_threshold,
        worker_count = config.algorithm.worker_count,
        "worker started"
    );

    consumer.start_consuming(&handler, shutdown_rx).await?;
    Ok(())
}
