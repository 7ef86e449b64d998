//! Producer service: the source of load.
//!
//! Generates synthetic task descriptors and dispatches them one at a time to
//! the consumer, fire-and-forget with a fixed inter-call delay. Failures are
//! logged, never retried. Its own `/metrics` endpoint stays up while (and
//! after) the backlog drains.

use std::time::Duration;

use actix_web::{App, HttpServer, middleware, rt};
use actix_web_prometheus::PrometheusMetricsBuilder;
use prometheus::{IntCounterVec, Opts};
use rand::Rng;
use task_pipeline::config::Config;
use task_pipeline::dispatch::TaskRequest;

/// Draw a random task descriptor: type in `0..10`, value (simulated work in
/// milliseconds) in `0..100`.
fn produce_task<R: Rng>(rng: &mut R) -> TaskRequest {
    TaskRequest {
        kind: rng.gen_range(0..10),
        value: rng.gen_range(0..100),
    }
}

async fn produce_loop(config: Config, produced: IntCounterVec) {
    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            log::error!("Failed to build HTTP client: {e}");
            return;
        }
    };
    let url = format!("{}/task", config.consumer_address.trim_end_matches('/'));

    for _ in 0..config.max_backlog {
        let request = produce_task(&mut rand::thread_rng());
        produced
            .with_label_values(&[request.kind.to_string().as_str()])
            .inc();
        log::info!(
            "produced task: type={} value={}",
            request.kind,
            request.value
        );

        match client.post(&url).json(&request).send().await {
            Ok(res) if res.status().is_success() => {
                log::info!(
                    "task sent successfully: type={} value={}",
                    request.kind,
                    request.value
                );
            }
            Ok(res) => log::error!("consumer rejected task: {}", res.status()),
            Err(e) => log::error!("failed to send task: {e}"),
        }

        rt::time::sleep(Duration::from_millis(100)).await;
    }
    log::info!("backlog of {} tasks drained", config.max_backlog);
}

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
    log::info!("producer service started");

    let prometheus = PrometheusMetricsBuilder::new("producer")
        .endpoint("/metrics")
        .build()
        .expect("prometheus middleware can be built");
    let produced = IntCounterVec::new(
        Opts::new("tasks_produced_total", "Total number of tasks produced"),
        &["type"],
    )
    .expect("metric can be created");
    prometheus
        .registry
        .register(Box::new(produced.clone()))
        .expect("metric can be registered");

    let producer_port = config.producer_port;
    rt::spawn(produce_loop(config, produced));

    HttpServer::new(move || {
        App::new()
            .wrap(prometheus.clone())
            .wrap(middleware::Logger::default())
    })
    .bind(("0.0.0.0", producer_port))?
    .run()
    .await
}
