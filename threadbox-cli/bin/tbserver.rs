use std::{net::SocketAddr, sync::Arc};

use clap::Parser;
use threadbox_cli::{ThreadboxCliError, ThreadboxCliResult, TbserverArgs};
use threadbox_core::{
    config::RegistryConfig,
    process::{CommandLauncher, IdleReaper, ProcessRegistry},
    provider::ProviderCatalog,
    service::ThreadService,
    target::{
        get_or_create_pool, OrbDirectory, SqliteOrbDirectory, StorageTarget, WalletServices,
        WalletTarget, STORE_DB_MIGRATOR,
    },
};
use threadbox_server::{route, AppState, Config};
use threadbox_utils::{CHECKMARK, CROSS};
use tokio::signal::unix::{signal, SignalKind};
use tracing_subscriber::EnvFilter;

//--------------------------------------------------------------------------------------------------
// Functions: Main
//--------------------------------------------------------------------------------------------------

#[tokio::main]
pub async fn main() -> ThreadboxCliResult<()> {
    // Load .env before anything reads the environment
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = TbserverArgs::parse();

    // Initialize tracing
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&args.log_filter)
            .map_err(|e| ThreadboxCliError::InvalidLogFilter(e.to_string()))?,
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Create configuration from arguments
    let config = Arc::new(Config::new(
        Some(args.port),
        args.home_dir,
        args.providers_dir,
    ));

    // Open the store
    let pool = get_or_create_pool(config.get_db_path(), &STORE_DB_MIGRATOR).await?;

    // Load providers
    let catalog = ProviderCatalog::load_dir(config.get_providers_dir()).await?;
    tracing::info!(
        "loaded {} providers from {}",
        catalog.len(),
        config.get_providers_dir().display()
    );

    // Resolve the sandbox runtime
    let mut registry_config = RegistryConfig::from_env()?.with_server_port(args.port);
    if let Some(runtime_exe) = args.runtime_exe {
        registry_config = registry_config.with_runtime_exe(runtime_exe);
    }
    let runtime_exe = match which::which(registry_config.get_runtime_exe()) {
        Ok(path) => path,
        Err(e) => {
            println!(
                "{} Runtime {} not found",
                &*CROSS,
                console::style(registry_config.get_runtime_exe().display()).yellow()
            );
            return Err(ThreadboxCliError::RuntimeNotFound(format!(
                "{}: {}",
                registry_config.get_runtime_exe().display(),
                e
            )));
        }
    };
    tracing::info!("using runtime {}", runtime_exe.display());
    let registry_config = registry_config.with_runtime_exe(runtime_exe);

    // Create the thread service and its reaper
    let launcher = Arc::new(CommandLauncher::from_config(&registry_config));
    let registry = ProcessRegistry::new(registry_config, Arc::new(catalog), launcher)?;
    let threads = Arc::new(ThreadService::new(registry));
    let reaper = IdleReaper::start_with_config(threads.clone());

    // Create application state
    let directory: Arc<dyn OrbDirectory> = Arc::new(SqliteOrbDirectory::new(pool.clone()));
    let state = AppState::new(
        config.clone(),
        threads.clone(),
        StorageTarget::new(pool, directory.clone()),
        WalletTarget::new(directory, WalletServices::new()),
    );

    // Build application
    let app = route::create_router(state);

    // Start server
    tracing::info!("Starting server on {}", config.get_addr());
    println!(
        "{} Server listening on {}",
        &*CHECKMARK,
        console::style(config.get_addr()).yellow()
    );

    let listener = tokio::net::TcpListener::bind(config.get_addr()).await?;

    // Set up signal handlers for graceful shutdown
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("received SIGTERM signal"),
            _ = sigint.recv() => tracing::info!("received SIGINT signal"),
        }
    })
    .await?;

    // Stop sweeping before tearing the threads down
    reaper.stop().await;
    let stopped = threads.shutdown().await;
    tracing::info!("stopped {} threads", stopped);

    Ok(())
}
