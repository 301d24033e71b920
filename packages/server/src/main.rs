use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use vidhost::config::AppConfig;
use vidhost::database::init_db;
use vidhost::mail::init_mailer;
use vidhost::media::probe::FfprobeProber;
use vidhost::pipeline::staging::Staging;
use vidhost::seed::{ensure_indexes, seed_admin, seed_role_permissions};
use vidhost::state::AppState;
use vidhost::storage::{init_store, sweep::run_orphan_sweep};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .init();

    let config = AppConfig::load()?;

    let db = init_db(&config.database.url).await?;
    seed_role_permissions(&db).await?;
    if let Some(admin) = &config.auth.admin {
        seed_admin(&db, admin).await?;
    }
    ensure_indexes(&db).await?;

    let store = init_store(&db, &config.storage).await?;
    let staging = Staging::init(&config.upload).await?;
    let mailer = init_mailer(&config.mail)?;
    let prober = Arc::new(FfprobeProber::new(config.media.ffprobe_path.clone()));

    if config.storage.sweep_interval_secs > 0 {
        tokio::spawn(run_orphan_sweep(
            db.clone(),
            store.clone(),
            staging.clone(),
            config.storage.clone(),
        ));
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    let state = AppState {
        db,
        config: Arc::new(config),
        store,
        mailer,
        prober,
        staging,
    };

    let app = vidhost::build_router(state);

    info!("Server running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
