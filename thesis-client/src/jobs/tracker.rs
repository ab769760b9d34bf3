//! Polling tracker for server-side asynchronous jobs.
//!
//! The server is fire-and-forget on the wire: a long-running action is
//! acknowledged with a `process_id` and its outcome is only observable
//! through `GET /progress`. Each subscription owns its poll loop and timer;
//! cancellation tears the loop down synchronously, and an in-flight poll
//! resolving after teardown is dropped, never applied.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::auth::{ApiRequest, AuthTransport};
use crate::config::JobSettings;
use crate::error::ClientError;
use crate::jobs::backoff::PollBackoff;
use crate::jobs::{Job, JobFilter};

pub struct JobTracker {
    transport: Arc<AuthTransport>,
    poll_interval: Duration,
    backoff_cap: Duration,
}

impl JobTracker {
    pub fn new(transport: Arc<AuthTransport>, settings: &JobSettings) -> Self {
        Self {
            transport,
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            backoff_cap: Duration::from_millis(settings.poll_backoff_cap_ms),
        }
    }

    /// One-shot fetch of the job list for a filter.
    pub async fn fetch(&self, filter: &JobFilter) -> Result<Vec<Job>, ClientError> {
        fetch_jobs(&self.transport, filter).await
    }

    /// Start polling the progress endpoint with `filter`, publishing each
    /// full replacement list through the returned subscription.
    ///
    /// The first poll fires immediately, then every poll interval. Dropping
    /// the subscription (or calling `cancel`) stops the loop; no update is
    /// applied after cancellation.
    pub fn track(&self, filter: JobFilter) -> JobSubscription {
        let (tx, rx) = watch::channel(Vec::new());
        let cancel = CancellationToken::new();
        let loop_cancel = cancel.clone();
        let transport = self.transport.clone();
        let mut backoff = PollBackoff::new(self.poll_interval, self.backoff_cap);
        let subscription_id = Uuid::new_v4();

        let handle = tokio::spawn(async move {
            tracing::debug!(%subscription_id, "Job poll loop started");
            let mut delay = Duration::ZERO;
            loop {
                tokio::select! {
                    _ = loop_cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }

                let started = Instant::now();
                let result = tokio::select! {
                    // A poll resolving after teardown is dropped here.
                    _ = loop_cancel.cancelled() => break,
                    result = fetch_jobs(&transport, &filter) => result,
                };

                match result {
                    Ok(jobs) => {
                        metrics::counter!("job_poll_total").increment(1);
                        metrics::histogram!("job_poll_duration")
                            .record(started.elapsed().as_secs_f64());
                        delay = backoff.reset();
                        if tx.send(jobs).is_err() {
                            // Every receiver is gone.
                            break;
                        }
                    }
                    Err(e) if e.is_auth_terminal() => {
                        tracing::error!(error = %e, "Job polling stopped: session torn down");
                        break;
                    }
                    Err(e) => {
                        // Stale list stays published; back off before retrying.
                        metrics::counter!("job_poll_failed").increment(1);
                        delay = backoff.next_delay();
                        tracing::warn!(
                            %subscription_id,
                            error = %e,
                            consecutive_failures = backoff.failure_count(),
                            next_poll_ms = delay.as_millis() as u64,
                            "Job poll failed, keeping previous list"
                        );
                    }
                }
            }
            tracing::debug!(%subscription_id, "Job poll loop stopped");
        });

        JobSubscription { rx, cancel, handle }
    }

    /// Poll until the identified job reaches a terminal state or `cancel`
    /// fires. Resolves exactly once, on the first poll that observes a
    /// terminal status.
    pub async fn await_one(
        &self,
        process_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Job, ClientError> {
        let filter = JobFilter::for_process(process_id);
        let mut backoff = PollBackoff::new(self.poll_interval, self.backoff_cap);
        let mut delay = Duration::ZERO;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                result = fetch_jobs(&self.transport, &filter) => result,
            };

            match result {
                Ok(jobs) => {
                    if let Some(job) = jobs
                        .into_iter()
                        .find(|j| j.process_id == process_id && j.status.is_terminal())
                    {
                        tracing::info!(
                            process_id = %job.process_id,
                            status = ?job.status,
                            "Job reached terminal state"
                        );
                        return Ok(job);
                    }
                    delay = backoff.reset();
                }
                Err(e) if e.is_auth_terminal() => return Err(e),
                Err(e) => {
                    delay = backoff.next_delay();
                    tracing::warn!(
                        process_id,
                        error = %e,
                        "Progress poll failed while awaiting job"
                    );
                }
            }
        }
    }
}

async fn fetch_jobs(
    transport: &AuthTransport,
    filter: &JobFilter,
) -> Result<Vec<Job>, ClientError> {
    let mut request = ApiRequest::get("/progress");
    for (name, value) in filter.to_query() {
        request = request.query(name, value);
    }
    transport.send_json(&request).await
}

/// Handle to one polling loop. The loop stops when this is cancelled or
/// dropped; background polling never outlives its subscriber.
pub struct JobSubscription {
    rx: watch::Receiver<Vec<Job>>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl JobSubscription {
    /// Latest published list (empty until the first successful poll).
    pub fn latest(&self) -> Vec<Job> {
        self.rx.borrow().clone()
    }

    /// Wait for the next published list.
    pub async fn changed(&mut self) -> Result<Vec<Job>, ClientError> {
        self.rx
            .changed()
            .await
            .map_err(|_| ClientError::Cancelled)?;
        Ok(self.rx.borrow_and_update().clone())
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for JobSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}
