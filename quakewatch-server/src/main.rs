//! quakewatch server
//!
//! Polls the latest earthquake report and alerts registered devices and
//! users that are within its felt radius.

mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::{ConfigLoader, get_database_url};
use quakewatch_core::collaborators::{BmkgFeed, PgDirectory, PgEventStore};
use quakewatch_core::config::ConfigStore;
use quakewatch_core::dispatch::{
    ChannelDispatcher, ChatBotChannel, MessagingAppChannel, MqttDeviceBus,
};
use quakewatch_core::framework::DatabaseProcessor;
use quakewatch_core::processors::{
    ChatBotRegistrar, DeviceRegistrar, ImpactNotifier, IngestionWorker,
};
use quakewatch_sdk::client::{ChatBotClient, FeedClient, MessagingClient};
use server::{build_router, run_server};
use shutdown::spawn_config_reload_handler;
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Device registrations waiting to be stored.
const REGISTRATION_QUEUE: usize = 64;

/// quakewatch - earthquake impact alerts
#[derive(Parser, Debug)]
#[command(name = "quakewatch-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./quakewatch.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();

    tracing::info!("Starting quakewatch-server v{}", env!("CARGO_PKG_VERSION"));

    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.listen));
    let config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!("Configuration loaded from {:?}", args.config);

    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;

    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&db_pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
        tracing::info!("Migrations completed successfully");
    }

    let db = DatabaseProcessor {
        pool: db_pool.clone(),
    };
    let directory = Arc::new(PgDirectory::new(db.clone()));
    // The device bus outlives every task that publishes through it.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (bus_shutdown_tx, bus_shutdown_rx) = watch::channel(false);

    // Outbound channels
    tracing::info!(
        host = %config.mqtt.host,
        port = config.mqtt.port,
        "Connecting device bus"
    );
    let (registration_tx, registration_rx) = mpsc::channel(REGISTRATION_QUEUE);
    let (device_bus, device_bus_handle) = MqttDeviceBus::connect(
        config.mqtt.clone(),
        Some(registration_tx),
        bus_shutdown_rx,
    );
    let device_bus = Arc::new(device_bus);
    let mut dispatcher = ChannelDispatcher::new().with_device_bus(device_bus.clone());

    let chat_bot_client = config
        .chat_bot
        .as_ref()
        .map(|bot| ChatBotClient::new(bot.api_base.clone(), bot.token.clone()));
    match &chat_bot_client {
        Some(client) => {
            dispatcher = dispatcher.with_chat_bot(Arc::new(ChatBotChannel::new(client.clone())));
        }
        None => tracing::warn!("Chat-bot channel not configured"),
    }

    match &config.messaging_app {
        Some(app) => {
            let client = MessagingClient::new(app.endpoint.clone(), app.token.clone());
            dispatcher = dispatcher.with_messaging_app(Arc::new(MessagingAppChannel::new(client)));
        }
        None => tracing::warn!("Messaging-app channel not configured"),
    }

    // Registration
    let mut registrar_handles = Vec::new();
    if config.mqtt.registration.is_some() {
        let registrar = DeviceRegistrar::new(directory.clone(), device_bus.clone());
        registrar_handles.push(registrar.start(registration_rx, shutdown_rx.clone()));
    } else {
        tracing::info!("Device self-registration disabled");
    }
    match (&chat_bot_client, &config.chat_registration) {
        (Some(client), Some(settings)) => {
            let registrar = ChatBotRegistrar::new(
                Arc::new(client.clone()),
                directory.clone(),
                settings.clone(),
            );
            registrar_handles.push(registrar.start(shutdown_rx.clone()));
        }
        _ => tracing::info!("Chat-bot registration disabled"),
    }

    // Processors
    let ingestion_store = ConfigStore::new(config.ingestion.clone());
    let notifier_store = ConfigStore::new(config.notifier.clone());

    let notifier = ImpactNotifier::new(directory, dispatcher, notifier_store.clone());
    let feed = BmkgFeed::new(FeedClient::new(config.feed_url.clone()));
    let worker = IngestionWorker::new(
        Arc::new(feed),
        Arc::new(PgEventStore::new(db)),
        notifier,
        ingestion_store.clone(),
    );
    let worker_handle = worker.start();

    let reload_notify =
        spawn_config_reload_handler(config_loader, ingestion_store, notifier_store);

    let state = AppState::new(db_pool.clone(), worker.state());
    let router = build_router(state);

    tracing::info!("Starting HTTP server on {}", config.listen);
    let result = run_server(router, config.listen).await;

    // Let an in-flight fan-out finish, then flush the device bus.
    reload_notify.notify_one();
    worker.stop();
    if let Err(e) = worker_handle.await {
        tracing::error!("Ingestion worker task failed: {}", e);
    }
    shutdown_tx.send_replace(true);
    for handle in registrar_handles {
        if let Err(e) = handle.await {
            tracing::error!("Registrar task failed: {}", e);
        }
    }
    bus_shutdown_tx.send_replace(true);
    if let Err(e) = device_bus_handle.await {
        tracing::error!("Device bus task failed: {}", e);
    }

    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,rumqttc=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
