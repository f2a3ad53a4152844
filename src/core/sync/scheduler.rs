use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use super::reconciler::Reconciler;

/// Run a pass now and then every `period`.
///
/// A tick that lands while a pass or upload still holds the write guard is
/// dropped, not queued.
pub fn spawn_scheduler(reconciler: Arc<Reconciler>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Reconciliation scheduled every {}s", period.as_secs());

        loop {
            ticker.tick().await;
            match reconciler.try_run_pass().await {
                Some(report) => {
                    for failed in report.failed() {
                        warn!(tag = %failed.tag, "mod left at its previous state this pass");
                    }
                }
                None => info!("Scheduled pass skipped"),
            }
        }
    })
}
