//! RL verifier HTTP server entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tokio::signal;

use rl_verifier::config::Config;
use rl_verifier::gateway::{HandlerState, create_router_with_state};
use rl_verifier::scoring::RewardEngine;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!(
        r#"
 ___ _    __   __       _  __ _
| _ \ |   \ \ / /__ _ _(_)/ _(_)___ _ _
|   / |__  \ V / -_) '_| |  _| / -_) '_|
|_|_\____|  \_/\___|_| |_|_| |_\___|_|

        SCORE. BLEND. REWARD.
"#
    );

    // A missing .env file is not an error.
    let _ = dotenvy::dotenv();

    if std::env::args().any(|arg| arg == "--health-check") {
        std::process::exit(run_health_check(&health_check_url()).await);
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    config.validate()?;
    let addr: SocketAddr = config.socket_addr().parse()?;

    tracing::info!(
        bind_addr = %config.bind_addr,
        port = config.port,
        format_verifier = config.use_format_verifier,
        "RL verifier starting"
    );
    if config.sandbox_url.is_empty() {
        tracing::warn!("No RLV_SANDBOX_URL configured, code_verifiable requests will fail");
    }
    if config.judge_model.is_empty() {
        tracing::warn!("No RLV_JUDGE_MODEL configured, llm_judge requests will fail");
    }

    let engine = Arc::new(RewardEngine::new(
        config.verifier_settings(),
        config.format_scorer(),
    ));
    let state = HandlerState::new(engine, config.assistant_token.as_str());
    let app = create_router_with_state(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("RL verifier shutdown complete");
    Ok(())
}

fn health_check_url() -> String {
    let port = std::env::var("RLV_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(8000);

    format!("http://127.0.0.1:{}/ping", port)
}

async fn run_health_check(url: &str) -> i32 {
    let Ok(client) = reqwest::Client::builder()
        .timeout(Duration::from_secs(1))
        .build()
    else {
        return 1;
    };

    match client.get(url).send().await {
        Ok(res) if res.status().is_success() => 0,
        _ => 1,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_health_check_passes_inside_runtime() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(run_health_check(&format!("{}/ping", server.uri())).await, 0);
    }

    #[tokio::test]
    async fn test_health_check_fails_on_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        assert_eq!(run_health_check(&format!("{}/ping", server.uri())).await, 1);
    }
}
