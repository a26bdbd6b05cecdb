//! Server binary: wires the engine adapters, the session registry and the
//! HTTP layer together.

use segsplit::adapters::ffmpeg::{FfmpegTranscoder, FfprobeProbe};
use segsplit::adapters::fs::LocalStorage;
use segsplit::adapters::http::{router, AppState};
use segsplit::application::session::{SessionDeps, SessionRegistry};
use segsplit::config::AppConfig;
use segsplit::events::{spawn_logger, EventHub};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("segsplit=info,tower_http=info")),
        )
        .init();

    tracing::info!(
        "ffmpeg at {:?}, ffprobe at {:?}, {} threads per segment",
        config.engine.ffmpeg_path,
        config.engine.ffprobe_path,
        config.jobs.thread_budget
    );

    // 1. Adapters
    let storage = Arc::new(LocalStorage::new(&config.upload_dir, &config.public_base_url));
    storage.ensure_root().await?;
    let transcoder = Arc::new(FfmpegTranscoder::new(&config.engine));
    let probe = Arc::new(FfprobeProbe::new(&config.engine));

    // 2. Sessions and job events
    let events = EventHub::new();
    spawn_logger(&events);
    let registry = Arc::new(SessionRegistry::new(
        SessionDeps {
            transcoder,
            storage: storage.clone(),
            settings: config.jobs.clone(),
        },
        events,
    ));

    // 3. HTTP Layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = router(AppState {
        registry,
        storage,
        probe,
    })
    .layer(cors);

    // 4. Start Server
    let listener = tokio::net::TcpListener::bind(format!("{}:{}", config.addr, config.port)).await?;
    tracing::info!("Listening at {}:{}", config.addr, config.port);
    axum::serve(listener, app).await?;

    Ok(())
}
