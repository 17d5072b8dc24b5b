pub mod channels;      // inter-component communication channels
pub mod command;       // serial command model and response parsing
pub mod config;        // configuration management
pub mod coordinator;   // remote message dispatch and generator lifecycle
pub mod device_state;  // physical input snapshot
pub mod generator;     // per-channel signal generators
pub mod message;       // remote-link message codec
pub mod options;       // command line options parsing
pub mod prelude;       // common imports and types
pub mod remote;        // remote-link server
pub mod sender;        // protocol engine and channel facades

const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

use crate::prelude::*;
use crate::coordinator::Coordinator;
use crate::remote::Remote;
use crate::sender::Sender;
use std::io::Write as IoWrite;
use std::sync::Arc;

/// Holds the major components so shutdown can run in the correct order:
/// coordinator first (no new submissions), then the remote link, then the
/// protocol engine (which zeroes the outputs before releasing the port).
#[derive(Clone)]
pub struct Components {
    pub coordinator: Arc<Coordinator>,
    pub remote: Arc<Remote>,
    pub sender: Arc<Sender>,
    pub channels: Channels,
}

impl Components {
    pub fn stop(&self) {
        info!("Stopping all components...");

        self.coordinator.stop();
        self.remote.stop();
        self.sender.close();

        info!("Shutdown complete");
    }
}

fn init_logging(level: &str) {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.module_path().unwrap_or(""),
                record.args()
            )
        })
        .write_style(env_logger::WriteStyle::Never)
        .try_init();
}

/// Main application entry point. Initializes all components in dependency
/// order and runs until a shutdown signal arrives.
pub async fn app(mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
    let options = Options::new();

    init_logging("info");
    info!(
        "starting stim-bridge {} with config file: {}",
        CARGO_PKG_VERSION, options.config_file
    );

    let config = Config::new(options.config_file).unwrap_or_else(|err| {
        error!("Failed to load config: {:?}", err);
        std::process::exit(255);
    });
    init_logging(&config.loglevel());

    let channels = Channels::new();

    // engine first: a transport that cannot be opened is fatal
    let sender = Arc::new(Sender::connect(&config, channels.clone())?);

    let coordinator = Coordinator::new(config.clone(), channels.clone(), sender.handle());
    let coordinator_clone = coordinator.clone();
    let coordinator_handle = tokio::spawn(async move {
        if let Err(err) = coordinator_clone.start().await {
            error!("Coordinator task failed: {}", err);
        }
    });

    let remote = Remote::new(config.clone(), channels.clone());
    let remote_clone = remote.clone();
    let remote_handle = tokio::spawn(async move {
        if let Err(err) = remote_clone.start().await {
            error!("Remote link task failed: {}", err);
        }
    });

    if config.standalone() {
        coordinator.set_standalone(true);
    }

    info!("Waiting for shutdown signal...");
    let _ = shutdown_rx.recv().await;
    info!("Shutdown signal received, stopping components...");

    let components = Components {
        coordinator: Arc::new(coordinator),
        remote: Arc::new(remote),
        sender,
        channels,
    };
    components.stop();

    if let Err(err) = coordinator_handle.await {
        error!("Error waiting for coordinator task: {}", err);
    }
    if let Err(err) = remote_handle.await {
        error!("Error waiting for remote link task: {}", err);
    }

    info!("Application shutdown complete");
    Ok(())
}

/// Sets up signal handling and the optional runtime limit, then runs the
/// application until shutdown.
pub async fn run() -> Result<()> {
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let ctrlc_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl+c: {}", err);
        }
        let _ = ctrlc_tx.send(());
    });

    if let Some(runtime) = Options::new().runtime {
        let timer_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(runtime)).await;
            info!("runtime limit of {}s reached", runtime);
            let _ = timer_tx.send(());
        });
    }

    app(shutdown_rx).await
}
