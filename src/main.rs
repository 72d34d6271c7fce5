//! Task tracker service binary.
//!
//! Wires configuration to a storage backend, builds the task server and
//! exposes it over HTTP with prometheus metrics.

use std::sync::Arc;

use actix_web::{App, HttpServer, middleware, web};
use actix_web_prometheus::PrometheusMetricsBuilder;
use task_tracker::config::{Config, StoreBackend};
use task_tracker::error::{TrackerError, TrackerResult};
use task_tracker::handlers::{self, AppState};
use task_tracker::server::TaskServer;
use task_tracker::store::{
    CacheStore, LruMemoryCache, MemoryStore, PgTaskStore, RedbStore, RedisTaskStore, TaskStore,
    build_pool,
};

async fn build_store(config: &Config) -> TrackerResult<Arc<dyn TaskStore>> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new(config.memory.capacity))),
        StoreBackend::Redb => Ok(Arc::new(RedbStore::open(
            &config.redb.path,
            config.redb.retention,
            config.redb.compaction_interval,
        )?)),
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| TrackerError::Invalid("DATABASE_URL not set".to_string()))?;
            let pool = build_pool(url)?;
            Ok(Arc::new(PgTaskStore::new(pool).await?))
        }
        StoreBackend::Redis => {
            let url = config
                .redis
                .url
                .as_deref()
                .ok_or_else(|| TrackerError::Invalid("REDIS_URL not set".to_string()))?;
            Ok(Arc::new(RedisTaskStore::connect(url, &config.redis.bucket)?))
        }
        StoreBackend::Cache => Ok(Arc::new(CacheStore::new(Arc::new(LruMemoryCache::new(
            config.cache.capacity,
        ))))),
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env().unwrap_or_else(|e| {
        log::error!("{e}");
        std::process::exit(1);
    });

    let store = build_store(&config).await.unwrap_or_else(|e| {
        log::error!("Failed to initialize {:?} store: {e}", config.backend);
        std::process::exit(1);
    });

    let server = Arc::new(TaskServer::new(&config.service_name, store));
    let app_data = AppState { server };

    let prometheus = PrometheusMetricsBuilder::new("api")
        .endpoint("/metrics")
        .build()
        .expect("prometheus metrics setup failed");

    log::info!(
        "starting HTTP server at http://0.0.0.0:{} ({:?} backend, owner '{}')",
        config.port,
        config.backend,
        config.service_name
    );

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_data.clone()))
            .wrap(prometheus.clone())
            .wrap(middleware::Logger::default())
            .configure(handlers::configure)
    })
    .bind(("0.0.0.0", config.port))?
    .run()
    .await
}
