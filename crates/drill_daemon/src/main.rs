mod error;
mod routes;
mod state;
mod writer;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use clap::Parser;
use drill_content::load_content;
use state::AppState;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "drill_daemon", about = "Red flag drill HTTP daemon")]
struct Args {
    #[arg(long, default_value = "./content")]
    content_dir: String,
    #[arg(long, default_value_t = 3001)]
    port: u16,
    /// Seed for user and session ids. Random when omitted.
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value = "http://localhost:5173")]
    cors_origin: String,
    /// Sessions with no request for this long are ended and dropped.
    #[arg(long, default_value_t = 1800)]
    session_idle_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("drill_daemon=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();
    let content = load_content(&args.content_dir)?;
    let cors_origin: HeaderValue = args
        .cors_origin
        .parse()
        .with_context(|| format!("invalid --cors-origin: {}", args.cors_origin))?;
    let seed = args.seed.unwrap_or_else(rand::random);

    tracing::info!(
        content_version = %content.content_version,
        tracks = content.tracks.len(),
        seed,
        "content loaded"
    );

    let (app_state, write_rx) = AppState::new(content, seed);
    tokio::spawn(writer::run_progress_writer(app_state.store.clone(), write_rx));
    let idle = Duration::from_secs(args.session_idle_secs);
    tokio::spawn(state::run_session_sweeper(
        app_state.sessions.clone(),
        idle,
        (idle / 10).max(Duration::from_secs(1)),
    ));

    let app = routes::make_router_with_cors(app_state, cors_origin);
    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("listening on http://{addr}");
    axum::serve(listener, app).await.context("serving http")?;
    Ok(())
}
