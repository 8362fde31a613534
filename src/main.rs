use anyhow::Result;
use axum::Router;
use hostbin::config::AppConfig;
use hostbin::services::cdn_service::CdnService;
use hostbin::services::record_store::{RecordStore, SqliteRecordStore};
use hostbin::services::sweeper::Sweeper;
use std::{fs, io::ErrorKind, path::Path, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;

    tracing::info!("Starting hostbin with config: {:?}", cfg);

    // --- Ensure upload directories exist ---
    for dir in ["uploads", "uploads_admin"] {
        let path = Path::new(&cfg.storage_dir).join(dir);
        if !path.exists() {
            fs::create_dir_all(&path)?;
            tracing::info!("Created storage directory at {}", path.display());
        }
    }

    // --- Initialize the record store ---
    // SQLite needs the parent directory before it can create the file.
    let db_path = cfg
        .database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("file:");
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    let store = Arc::new(SqliteRecordStore::connect(&cfg.database_url).await?);

    // --- Handle migration mode ---
    if migrate {
        run_migrations(store.pool()).await?;
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    // --- Initialize core service ---
    let cfg = Arc::new(cfg);
    let store: Arc<dyn RecordStore> = store;
    let service = CdnService::new(store.clone(), cfg.clone());

    // --- Start the retention sweeper ---
    let sweeper = Sweeper::new(store, cfg.clone());
    tokio::spawn(sweeper.run(Duration::from_secs(cfg.sweep_interval_secs)));

    // --- Build router ---
    let app: Router = hostbin::routes::routes::routes().with_state(service);

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

/// Run SQLite migrations manually from the embedded SQL file.
async fn run_migrations(db: &sqlx::SqlitePool) -> Result<()> {
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
        tracing::debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(db).await?;
    }

    Ok(())
}
