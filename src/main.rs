//! Consumer service.
//!
//! Receives dispatch calls from the producer, rate-limits admission with a
//! shared token bucket, simulates processing and persists completed tasks to
//! PostgreSQL. Prometheus metrics are served by the middleware on both the
//! dispatch port and the dedicated metrics port.

use std::sync::Arc;

use actix_web::{App, HttpServer, middleware, web};
use actix_web_prometheus::PrometheusMetricsBuilder;
use task_pipeline::{
    config::Config,
    dispatch::{self, AppState},
    error::PipelineError,
    limiter::AdmissionLimiter,
    metrics::PrometheusMetricsSink,
    processor::TaskProcessor,
    store::{self, PgTaskStore},
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(config.log_level.as_str()));

    let pool = match store::initialize_db_pool(&config.database_url, config.pool_max_size) {
        Ok(pool) => pool,
        Err(e) => {
            log::error!("{}", PipelineError::StoreUnavailable(e));
            std::process::exit(1);
        }
    };
    if let Err(e) = store::ensure_schema(&pool).await {
        log::error!("{}", PipelineError::StoreUnavailable(e));
        std::process::exit(1);
    }
    log::info!("Tasks table created or already exists");

    let prometheus = PrometheusMetricsBuilder::new("consumer")
        .endpoint("/metrics")
        .build()
        .expect("prometheus middleware can be built");
    let sink = match PrometheusMetricsSink::new(&prometheus.registry) {
        Ok(sink) => sink,
        Err(e) => {
            log::error!("Failed to register metrics: {e}");
            std::process::exit(1);
        }
    };

    let limiter = Arc::new(AdmissionLimiter::new(
        config.admission.rate,
        config.admission.burst,
    ));
    let app_state = AppState {
        processor: Arc::new(TaskProcessor::new(
            limiter,
            Arc::new(PgTaskStore::new(pool.clone())),
            Arc::new(sink),
        )),
    };

    log::info!(
        "consumer listening on 0.0.0.0:{} (metrics on :{})",
        config.consumer_port,
        config.prometheus_port
    );
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(prometheus.clone())
            .wrap(middleware::Logger::default())
            .service(dispatch::send_task)
            .service(dispatch::health_check)
    })
    .bind(("0.0.0.0", config.consumer_port))?
    .bind(("0.0.0.0", config.prometheus_port))?
    .run()
    .await
}
