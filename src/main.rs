use floorplan::app_config::AppConfig;
use floorplan::assemble;
use floorplan::notification_listener::notification_listener;
use floorplan::simulation::{load_devices, run_simulation};
use tokio::{signal, task};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    info!("🪵 Starting {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load()?;
    info!("✅  Loaded configuration");

    let directory = load_devices(config.simulation().devices_file()).await?;
    let app = assemble(&config, directory.clone());

    let listener = task::spawn(notification_listener(app.transport.subscribe()));
    info!("✅  Initialized notification listener");

    app.api.restore_widgets().await?;

    let simulation = config.simulation().enabled().then(|| {
        info!("✅  Simulating device changes every {:?}", config.simulation().interval());
        run_simulation(directory, config.simulation().interval())
    });

    info!("🔥 {} is up and running", env!("CARGO_PKG_NAME"));

    signal::ctrl_c().await?;
    info!("🛑 Shutting down...");

    if let Some(simulation) = simulation {
        simulation.abort();
    }
    app.api.shutdown().await;

    drop(app);
    let delivered = listener.await?;
    info!("👋 Delivered {} notification(s), bye", delivered);

    Ok(())
}
