use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::classifier;
use crate::db::Store;
use crate::models::Target;
use crate::prober;

/// Background probe loop. Started at most once per process; `start()`
/// enforces that with an atomic flag, mirroring the single
/// global-monitor-lifecycle rule the control plane relies on.
pub struct Scheduler {
    store: Store,
    client: reqwest::Client,
    poll_interval: Duration,
    started: AtomicBool,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(store: Store, poll_seconds: u64) -> Self {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .expect("failed to build probe client");

        Scheduler {
            store,
            client,
            poll_interval: Duration::from_secs(poll_seconds),
            started: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Spawns the tick loop. Returns immediately; the loop runs until
    /// `stop()` is called or the process exits. Calling this a second
    /// time on the same scheduler is a no-op.
    pub fn start(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return tokio::spawn(async {});
        }
        let this = self.clone();
        tokio::spawn(async move { this.run().await })
    }

    async fn run(&self) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(self.poll_interval) => {},
            }

            let due = match self.store.select_due_targets(chrono::Utc::now()).await {
                Ok(targets) => targets,
                Err(e) => {
                    tracing::error!(error = %e, "failed to select due targets");
                    continue;
                }
            };

            for target in due {
                if self.cancel.is_cancelled() {
                    return;
                }
                let _ = self.check_one(&target).await;
            }
        }
    }

    /// Runs one probe → classify → record cycle for a single target.
    /// Shared by the tick loop and the manual-check control-plane route.
    pub async fn check_one(&self, target: &Target) -> crate::db::StoreResult<crate::models::Check> {
        let outcome = prober::probe(&self.client, target).await;
        let classification = classifier::classify(target, &outcome);

        let result = self
            .store
            .record_check(
                target.id,
                outcome.started_at,
                outcome.status_code.map(|c| c as i32),
                Some(outcome.latency_ms as i32),
                classification.is_up,
                classification.reason_code,
                classification.error_message,
            )
            .await;

        if let Err(ref e) = result {
            tracing::warn!(target_id = target.id, error = %e, "failed to record check");
        }
        result
    }
}
