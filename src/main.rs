use std::error::Error;
use std::sync::Arc;

use embed_service::EmbeddingService;
use index_augment::{AugmentConfig, AugmentResult, ElasticStore, Pipeline, ServiceEncoder, telemetry};
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Encoder plus one store client for the scanner and one for the workers.
struct Clients {
    encoder: Arc<ServiceEncoder>,
    scan_store: Arc<ElasticStore>,
    write_store: Arc<ElasticStore>,
}

fn connect(cfg: &AugmentConfig) -> AugmentResult<Clients> {
    let service = Arc::new(EmbeddingService::new(cfg.encoder.clone())?);
    Ok(Clients {
        encoder: Arc::new(ServiceEncoder::new(service, cfg.pipeline.dim)),
        scan_store: Arc::new(ElasticStore::new(&cfg.store)?),
        write_store: Arc::new(ElasticStore::new(&cfg.store)?),
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // A missing .env is fine; the variables may come from the environment.
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e.into());
        }
    }

    tracing_subscriber::registry()
        .with(telemetry::env_filter_with_level("info", Level::INFO))
        .with(telemetry::layer())
        .init();

    let cfg = AugmentConfig::from_env()?;
    info!(
        es = %cfg.store.url,
        collection = %cfg.pipeline.collection,
        provider = cfg.encoder.provider.as_str(),
        "semantic-indexer: starting"
    );

    let Clients {
        encoder,
        scan_store,
        write_store,
    } = connect(&cfg)?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received; finishing in-flight documents");
                cancel.cancel();
            }
        }
    });

    let pipeline = Pipeline::new(cfg.pipeline, scan_store, write_store, encoder);
    match pipeline.run_with_cancel(cancel).await {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "semantic-indexer: aborted");
            Err(e.into())
        }
    }
}
