use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, instrument, trace, warn};

use o2ims_models::ResourceIdentity;

use super::conditions::{apply_outcome, reconciling};
use super::{ControllerContext, ReconcileErr, ReconcileStatus};
use crate::action::ActionOutcome;

/// One level-triggered pass over the object behind `id`.
///
/// `Ok` means no retry is needed; every `Err` is transient and should be
/// requeued with backoff. Running it again on unchanged state yields the
/// same conditions and performs no status write.
#[instrument(skip_all, fields(id = %id))]
pub async fn reconcile(
    id: &ResourceIdentity,
    ctx: &ControllerContext,
) -> Result<ReconcileStatus, ReconcileErr> {
    let Some(mut obj) = ctx.store.get(id).await.map_err(|e| {
        warn!(error = %e, "reconcile: failed to get o2ims");
        ReconcileErr::Load(e)
    })?
    else {
        info!("reconcile: o2ims not found; object must have been deleted");
        return Ok(ReconcileStatus::Gone);
    };

    // First sighting: publish a "started" signal before anything can fail.
    if obj.conditions.is_empty() {
        obj.conditions.set_condition(reconciling());
        obj = ctx.store.update_status(&obj).await.map_err(|e| {
            warn!(error = %e, "reconcile: failed to persist initial conditions");
            ReconcileErr::Persistence(e)
        })?;
        debug!(rv = %obj.resource_version, "reconcile: initial conditions persisted");
    }

    if obj.deletion_requested {
        info!("reconcile: deletion requested; skipping action");
        return Ok(ReconcileStatus::Deleting);
    }

    let timeout = ctx.cfg.action_timeout();
    let deadline = Instant::now() + timeout;
    info!(url = %obj.spec.url, "reconcile: invoking action");
    let outcome =
        match timeout_at(deadline, ctx.action.execute(&obj.spec, deadline))
            .await
        {
            Ok(outcome) => outcome,
            Err(_) => ActionOutcome::TransientFailure(format!(
                "action timed out after {}ms",
                timeout.as_millis()
            )),
        };
    debug!(%outcome, "reconcile: action finished");

    let mut next = obj.clone();
    if apply_outcome(&mut next.conditions, &outcome) {
        ctx.store.update_status(&next).await.map_err(|e| {
            warn!(error = %e, "reconcile: failed to update o2ims status");
            ReconcileErr::Persistence(e)
        })?;
        trace!("reconcile: status updated");
    } else {
        trace!("reconcile: conditions unchanged; status write skipped");
    }

    match outcome {
        ActionOutcome::Success(_) => Ok(ReconcileStatus::Available),
        ActionOutcome::TransientFailure(detail) => {
            Err(ReconcileErr::ActionFailed(detail))
        }
        ActionOutcome::PermanentFailure(detail) => {
            warn!(%detail, "reconcile: permanent failure; waiting for a spec change");
            Ok(ReconcileStatus::Degraded(detail))
        }
    }
}
