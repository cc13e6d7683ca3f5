use opentelemetry::global;
use prefgate::config::Configuration;
use prefgate::{app, initialize_state, telemetry};
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Telemetry settings are read before the subscriber exists, so parsing
    // errors are not logged here. `initialize_state` reads the file again.
    let telemetry = Configuration::default()
        .path(std::env::var("CONFIG_PATH").unwrap_or_default().into())
        .read()?
        .telemetry
        .clone();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter).with(fmt::layer());

    let logger_provider = match telemetry.otlp_endpoint.as_deref() {
        Some(endpoint) => {
            let tracer_provider = telemetry::setup_tracer(endpoint)?;
            global::set_tracer_provider(tracer_provider);

            let (provider, bridge) = telemetry::setup_logging(endpoint)?;
            registry.with(bridge).init();
            Some(provider)
        },
        None => {
            registry.init();
            None
        },
    };

    let metrics = if telemetry.prometheus {
        Some(telemetry::setup_metrics_recorder()?)
    } else {
        None
    };

    let state = initialize_state(metrics).await?;
    let port = state.config.port();

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(%port, "server is listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(provider) = logger_provider {
        if let Err(err) = provider.shutdown() {
            eprintln!("cannot flush logs: {err}");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "cannot install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(err) => {
                tracing::error!(error = %err, "cannot install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutting down");
}
