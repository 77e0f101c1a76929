use std::sync::Arc;

use o2ims_models::ResourceIdentity;
use o2ims_store::StoreEvent;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{
    ControllerContext, ExponentialBackoff, ReconcileStatus, WorkQueue,
    reconcile,
};

type Queue = Arc<WorkQueue<ResourceIdentity>>;
type Backoff = Arc<ExponentialBackoff<ResourceIdentity>>;

/// Feeds store notifications into the work queue and runs the worker pool.
pub struct Controller {
    ctx: Arc<ControllerContext>,
    queue: Queue,
    backoff: Backoff,
}

impl Controller {
    pub fn new(ctx: ControllerContext) -> Self {
        let backoff = ExponentialBackoff::new(
            ctx.cfg.backoff_base(),
            ctx.cfg.backoff_max(),
        );
        Self {
            ctx: Arc::new(ctx),
            queue: Arc::new(WorkQueue::new()),
            backoff: Arc::new(backoff),
        }
    }

    pub fn queue(&self) -> Queue {
        self.queue.clone()
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff.clone()
    }

    /// Run until `shutdown` fires, then let in-flight attempts finish.
    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let events = self.ctx.store.subscribe().await?;

        // Full resync: the queue is not persisted, the store is the truth.
        let ids = self.ctx.store.list().await?;
        info!(count = ids.len(), "controller: initial resync");
        for id in ids {
            self.queue.add(id).await;
        }

        let pump = tokio::spawn(pump_events(
            events,
            self.queue.clone(),
            self.backoff.clone(),
            shutdown.clone(),
        ));

        let workers = self.ctx.cfg.worker_count();
        info!(workers, "controller: starting workers");
        let handles: Vec<JoinHandle<()>> = (0..workers)
            .map(|worker| {
                tokio::spawn(worker_loop(
                    worker,
                    self.ctx.clone(),
                    self.queue.clone(),
                    self.backoff.clone(),
                ))
            })
            .collect();

        shutdown.cancelled().await;
        let queued = self.queue.len().await;
        let in_flight = self.queue.in_flight().await;
        info!(queued, in_flight, "controller: shutting down");
        self.queue.shut_down().await;

        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = ?e, "controller: worker panicked");
            }
        }
        if let Err(e) = pump.await {
            error!(error = ?e, "controller: event pump panicked");
        }
        info!("controller: stopped");
        Ok(())
    }
}

/// Build and run a controller until `shutdown` fires.
pub async fn run_controller(
    ctx: ControllerContext,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    Controller::new(ctx).run(shutdown).await
}

async fn pump_events(
    events: flume::Receiver<StoreEvent>,
    queue: Queue,
    backoff: Backoff,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            ev = events.recv_async() => {
                let Ok(ev) = ev else {
                    warn!("controller: store notification channel closed");
                    return;
                };
                debug!(id = %ev.identity, kind = ?ev.kind, "controller: change notification");
                // A fresh desired state supersedes any pending retry.
                backoff.forget(&ev.identity).await;
                queue.add(ev.identity).await;
            }
            _ = shutdown.cancelled() => {
                debug!("controller: event pump stopped");
                return;
            }
        }
    }
}

async fn worker_loop(
    worker: usize,
    ctx: Arc<ControllerContext>,
    queue: Queue,
    backoff: Backoff,
) {
    while let Some(id) = queue.get().await {
        process_item(&id, &ctx, &queue, &backoff).await;
        queue.done(&id).await;
    }
    debug!(worker, "controller: worker exited");
}

async fn process_item(
    id: &ResourceIdentity,
    ctx: &ControllerContext,
    queue: &WorkQueue<ResourceIdentity>,
    backoff: &ExponentialBackoff<ResourceIdentity>,
) {
    match reconcile(id, ctx).await {
        Ok(status) => {
            backoff.forget(id).await;
            match status {
                ReconcileStatus::Degraded(ref detail) => {
                    info!(%id, %detail, "reconciled: degraded, not requeued")
                }
                _ => info!(%id, ?status, "reconciled: requeue=None"),
            }
        }
        Err(e) => {
            let delay = backoff.next_delay(id).await;
            let attempt = backoff.retries(id).await;
            warn!(
                %id,
                error = %e,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "reconcile error; requeueing with backoff"
            );
            queue.add_after(id.clone(), delay).await;
        }
    }
}
