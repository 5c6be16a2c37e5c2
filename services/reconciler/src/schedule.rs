//! Periodic reconciliation runs alongside the admin surface.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error};

use crate::error::ReconcilerError;

/// Run `job` every `period` until `shutdown` flips to `true` (or its sender is dropped).
///
/// The first run happens one full period after start. A failed run is logged and the next
/// one is attempted on schedule; a run in progress is allowed to finish before stopping.
pub fn spawn_schedule<F, Fut>(
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    job: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), ReconcilerError>> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = async { drop(shutdown.wait_for(|stop| *stop).await) } => break,
                _ = ticker.tick() => {
                    if let Err(e) = job().await {
                        error!(error = %e, kind = e.kind(), "scheduled reconciliation failed");
                    }
                }
            }
        }
        debug!("reconciliation schedule stopped");
    })
}
