use std::sync::Arc;
use std::time::Duration;

use o2ims_store::ResourceStore;
use o2ims_store::memory::MemoryResourceStore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    action::HttpActionExecutor,
    config::{OperatorConfig, StoreBackend},
    controller::{ControllerContext, run_controller},
};

/// Connect to the configured backend.
pub async fn build_store(
    cfg: &OperatorConfig,
) -> anyhow::Result<Arc<dyn ResourceStore>> {
    match cfg.store_backend() {
        StoreBackend::Memory => {
            warn!("using in-memory store; objects do not survive a restart");
            Ok(Arc::new(MemoryResourceStore::new()))
        }
        #[cfg(feature = "kube")]
        StoreBackend::Kube => {
            let client = kube::Client::try_default().await?;
            info!(namespace = ?cfg.k8s_namespace, "using kubernetes store");
            Ok(Arc::new(o2ims_store::k8s::KubeResourceStore::new(
                client,
                cfg.k8s_namespace.clone(),
            )))
        }
        #[cfg(not(feature = "kube"))]
        StoreBackend::Kube => {
            anyhow::bail!("kube store requested but the `kube` feature is disabled")
        }
    }
}

pub fn build_context(
    cfg: &OperatorConfig,
    store: Arc<dyn ResourceStore>,
) -> anyhow::Result<ControllerContext> {
    let action = HttpActionExecutor::new(cfg.controller.response_log_limit)?;
    Ok(ControllerContext::new(
        store,
        Arc::new(action),
        cfg.controller.clone(),
    ))
}

/// Spawn the controller loop.
pub fn spawn_controller(
    ctx: ControllerContext,
    shutdown: CancellationToken,
) -> JoinHandle<anyhow::Result<()>> {
    tokio::spawn(async move { run_controller(ctx, shutdown).await })
}

/// Run the controller until it fails or a termination signal arrives,
/// then give in-flight attempts `grace` to finish.
pub async fn run_until_signalled(
    ctx: ControllerContext,
    grace: Duration,
) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let mut controller = spawn_controller(ctx, shutdown.clone());

    tokio::select! {
        res = &mut controller => return res?,
        _ = shutdown_signal() => info!("shutdown signal received"),
    }

    shutdown.cancel();
    match tokio::time::timeout(grace, &mut controller).await {
        Ok(res) => res?,
        Err(_) => {
            warn!(grace_secs = grace.as_secs(), "controller did not stop in time; aborting");
            controller.abort();
            Ok(())
        }
    }
}

pub async fn run_all(cfg: OperatorConfig) -> anyhow::Result<()> {
    let store = build_store(&cfg).await?;
    let ctx = build_context(&cfg, store)?;
    run_until_signalled(ctx, cfg.shutdown_grace()).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(
            tokio::signal::unix::SignalKind::terminate(),
        ) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
