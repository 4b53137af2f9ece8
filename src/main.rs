use std::sync::Arc;
use txledger::{api, config::Config, data::load_path, DataAccessLayer, InMemoryDal};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!(
        path = %config.data_path,
        test_mode = config.test_mode,
        "Loading transactions"
    );

    // Load the dataset off the async workers
    let path = config.data_path.clone();
    let dataset = match tokio::task::spawn_blocking(move || load_path(path)).await {
        Ok(Ok(ds)) => ds,
        Ok(Err(e)) => {
            eprintln!("Failed to load {}: {}", config.data_path, e);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Loader task failed: {}", e);
            std::process::exit(1);
        }
    };

    let dal: Arc<dyn DataAccessLayer> = Arc::new(InMemoryDal::new(dataset, config.test_mode));
    tracing::info!(rows = dal.len(), "Dataset loaded");

    // Create router; statistics are precomputed here
    let addr = config.bind_addr();
    let app = api::create_router(api::AppState::new(dal, config));

    // Bind to address
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on {}", addr);

    // Run server
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
