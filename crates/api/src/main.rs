use api::{build_app, init_auth_engine, AppState};
use config::{AuthConfig, LoggingConfig};

#[tokio::main]
async fn main() {
    // Load configuration first to get logging settings
    let config = AuthConfig::load().unwrap_or_else(|file_error| {
        AuthConfig::from_env().unwrap_or_else(|e| {
            eprintln!("Failed to load configuration: {file_error}");
            eprintln!("Failed to load configuration from environment: {e}");
            std::process::exit(1);
        })
    });

    // Initialize tracing with configuration from config.yaml
    init_tracing(&config.logging);

    let engine = init_auth_engine(&config, None).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to build sign-in engine");
        std::process::exit(1);
    });

    let mut configured: Vec<&str> = config.providers.keys().map(String::as_str).collect();
    configured.sort_unstable();
    for provider in &configured {
        if !engine.registry().contains(provider) {
            tracing::warn!("Credentials configured for unknown provider {}", provider);
        }
    }

    let app = build_app(AppState::new(engine));

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, address = %bind_address, "Failed to bind");
            std::process::exit(1);
        });

    tracing::info!(address = %bind_address, "Server started successfully");
    tracing::info!("Configured providers: {}", configured.join(", "));
    tracing::info!("Endpoints:");
    tracing::info!("  - GET /auth/{{provider}} (Redirect to provider)");
    tracing::info!("  - GET /auth/{{provider}}/callback (Provider callback)");
    tracing::info!("  - GET /profile (Signed-in user)");
    tracing::info!("  - GET /logout (Clear session)");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

fn init_tracing(logging_config: &LoggingConfig) {
    // Build the filter string from the logging configuration
    let mut filter = logging_config.level.clone();

    for (module, level) in &logging_config.modules {
        filter.push_str(&format!(",{module}={level}"));
    }

    // Initialize tracing based on the format specified in config
    match logging_config.format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        }
        "compact" => {
            tracing_subscriber::fmt()
                .compact()
                .with_env_filter(filter)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(filter)
                .init();
        }
    }
}
