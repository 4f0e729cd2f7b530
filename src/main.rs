use anyhow::Result;
use axum::Router;
use sqlx::sqlite::SqlitePoolOptions;
use std::{fs, io::ErrorKind, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;

use services::items::{HookRegistry, ItemPipeline, SqliteItemStore};
use services::keys::KeyGenerator;
use services::object_store::ObjectStore;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag; storage options are mandatory ---
    let (cfg, migrate) = config::AppConfig::from_env_and_args()?;

    tracing::info!(
        "Starting object-items coordinator (region {}, bucket {})",
        cfg.region,
        cfg.bucket
    );

    // --- Ensure storage directory exists ---
    let bucket_dir = Path::new(&cfg.storage_dir).join(&cfg.bucket);
    if !bucket_dir.exists() {
        fs::create_dir_all(&bucket_dir)?;
        tracing::info!("Created storage directory at {}", bucket_dir.display());
    }

    // --- Initialize SQLite connection ---
    let db_url = &cfg.database_url;
    let db_path = db_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("file:");

    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    // SQLx will not create the database file itself
    match fs::OpenOptions::new().create(true).write(true).open(db_path) {
        Ok(_) => {}
        Err(e) => tracing::warn!("Failed to open database file {}: {}", db_path, e),
    }

    let db: Arc<sqlx::Pool<sqlx::Sqlite>> = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await?,
    );

    // --- Handle migration mode ---
    if migrate {
        run_migrations(&db).await?;
        tracing::info!("Database migration complete.");
        return Ok(());
    }

    // --- Wire services: everything injected, nothing global ---
    let local = Arc::new(services::local_store::LocalStore::new(
        bucket_dir,
        cfg.public_url.clone(),
        cfg.access_key_id.clone(),
        cfg.secret_access_key.clone(),
    ));
    let store: Arc<dyn ObjectStore> = local.clone();
    let keys = KeyGenerator::default();

    let mut hooks = HookRegistry::default();
    services::lifecycle::register_hooks(&mut hooks, store.clone(), keys);

    let item_store = Arc::new(SqliteItemStore::new(db.clone()));
    let pipeline = ItemPipeline::new(item_store.clone(), Arc::new(hooks));
    let backfill = services::backfill::MetadataBackfill::new(store.clone(), item_store);
    let uploads = services::upload_intent::UploadIntentService::new(
        pipeline.clone(),
        store,
        keys,
        cfg.upload_expiry_secs,
    );

    let app_state = state::AppState {
        db,
        pipeline,
        backfill,
        uploads,
        local,
    };

    // --- Build router ---
    let app: Router = routes::routes::routes().with_state(app_state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Run SQLite migrations manually from the SQL file on disk.
async fn run_migrations(db: &Arc<sqlx::Pool<sqlx::Sqlite>>) -> Result<()> {
    let path = "migrations/0001_init.sql";

    if !Path::new(path).exists() {
        anyhow::bail!("Migration file not found: {}", path);
    }

    let sql = fs::read_to_string(path)?;
    let statements = sql
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    tracing::info!("Running {} migration statements...", statements.len());

    for stmt in statements {
        sqlx::query(stmt).execute(&**db).await?;
    }

    Ok(())
}
