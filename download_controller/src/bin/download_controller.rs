//! Process bootstrap (§10): configuration loading, logging setup, and
//! wiring of every long-lived dependency into a `ServiceState`, the way
//! the teacher's `pageserver.rs` wires its own `PageServerConf` before
//! handing off to the request-serving runtimes.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use download_controller::{build_service_state, cleanup, config::Args, config::Config, events::subscriber::EventSubscriber, http::routes, metrics::Metrics};
use tokio_util::sync::CancellationToken;
use tracing::info;
use utils::auth::JwtAuth;
use utils::logging;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load(&args.config)?;

    logging::init(config.log_format)?;
    let _panic_hook_guard = logging::replace_panic_hook_with_tracing_panic_hook();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(config))
}

async fn run(config: Config) -> anyhow::Result<()> {
    info!(service = %config.service_name, instance = %config.service_instance_id, "starting download controller");

    let jwt_signing_key_pem = std::env::var("DC_JWT_SIGNING_KEY_PEM")
        .context("DC_JWT_SIGNING_KEY_PEM must be set to the work-order token signing public key")?;
    let jwt_auth = JwtAuth::from_ec_pem(jwt_signing_key_pem.as_bytes())?;

    let metrics = Arc::new(Metrics::new()?);

    let listen_addr: SocketAddr = config
        .http_listen_addr
        .parse()
        .context("invalid http_listen_addr")?;

    let kafka_config = config.kafka.clone();
    let aliases: Vec<String> = config.object_storages.keys().cloned().collect();

    let state = build_service_state(config, jwt_auth, metrics.clone()).await?;

    let cancel = CancellationToken::new();

    let subscriber = EventSubscriber::new(&kafka_config)?;
    let subscriber_repository = state.repository.clone();
    let subscriber_cancel = cancel.clone();
    let subscriber_handle = tokio::spawn(async move {
        subscriber.run(subscriber_repository, subscriber_cancel).await;
    });

    let mut cleanup_handles = Vec::new();
    for alias in aliases {
        let repository = state.repository.clone();
        let metrics = metrics.clone();
        let cancel = cancel.clone();
        cleanup_handles.push(tokio::spawn(cleanup::cleanup_loop(
            repository, alias, metrics, cancel,
        )));
    }

    let router = routes::make_router(state).build().map_err(|e| anyhow::anyhow!(e))?;
    let http_service = routerify::RouterService::new(router).map_err(|e| anyhow::anyhow!(e))?;

    let server = hyper::Server::bind(&listen_addr).serve(http_service);
    info!(%listen_addr, "listening");

    tokio::select! {
        result = server => {
            result.context("http server exited")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal");
        }
    }

    cancel.cancel();
    subscriber_handle.await.ok();
    for handle in cleanup_handles {
        handle.await.ok();
    }

    Ok(())
}
