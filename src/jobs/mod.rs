pub mod email;
pub mod journal;
pub mod report;

use anyhow::{Context, Result};
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::store::{Booking, HotelStore};
use email::EmailDelivery;
use journal::StepJournal;
use report::{ReportJob, ReportAnalytics, build_insights, compute_analytics, render_report};

/// Bounded retries with exponential backoff. The runner owns retry
/// scheduling; callers only enqueue.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: usize) -> Duration {
        self.base_delay * 2_u32.saturating_pow(attempt as u32)
    }
}

/// Executes report jobs as a sequence of independently memoized steps.
/// A retried job resumes from the first unrecorded step, so side effects of
/// recorded steps (the email send in particular) never repeat.
pub struct JobRunner {
    journal: Arc<StepJournal>,
    store: Arc<dyn HotelStore>,
    mailer: Arc<dyn EmailDelivery>,
    retry: RetryPolicy,
}

impl JobRunner {
    pub fn new(
        journal: Arc<StepJournal>,
        store: Arc<dyn HotelStore>,
        mailer: Arc<dyn EmailDelivery>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            journal,
            store,
            mailer,
            retry,
        }
    }

    /// Fire-and-forget submission. Returns the job-run identifier
    /// immediately; completion is observed only via the delivered email.
    pub fn enqueue(self: &Arc<Self>, job: ReportJob) -> String {
        let job_id = Uuid::new_v4().to_string();
        let runner = Arc::clone(self);
        let id = job_id.clone();
        tokio::spawn(async move {
            if let Err(e) = runner.run(&id, &job).await {
                error!("Report job {} failed permanently: {}", id, e);
            }
        });
        job_id
    }

    /// Runs the job under the retry policy. Each attempt resumes from the
    /// journal, so already-succeeded steps are skipped.
    pub async fn run(&self, job_id: &str, job: &ReportJob) -> Result<()> {
        let mut last_err = None;
        for attempt in 0..self.retry.max_attempts {
            match self.run_once(job_id, job).await {
                Ok(()) => {
                    info!("Report job {} completed on attempt {}", job_id, attempt + 1);
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        "Report job {} attempt {} failed: {}",
                        job_id,
                        attempt + 1,
                        e
                    );
                    last_err = Some(e);
                    if attempt + 1 < self.retry.max_attempts {
                        tokio::time::sleep(self.retry.backoff(attempt)).await;
                    }
                }
            }
        }
        Err(last_err
            .unwrap_or_else(|| anyhow::anyhow!("retry policy allowed zero attempts"))
            .context(format!(
                "report job exhausted {} attempts",
                self.retry.max_attempts
            )))
    }

    async fn run_once(&self, job_id: &str, job: &ReportJob) -> Result<()> {
        let store = Arc::clone(&self.store);
        self.step(job_id, "connect", || async move {
            store.ping().await?;
            Ok(json!({ "connected": true }))
        })
        .await?;

        let store = Arc::clone(&self.store);
        let (start, end) = (job.start_date, job.end_date);
        let gathered = self
            .step(job_id, "gather-data", || async move {
                let bookings = store.bookings_between(start, end).await?;
                Ok(serde_json::to_value(bookings)?)
            })
            .await?;
        let bookings: Vec<Booking> =
            serde_json::from_value(gathered).context("corrupt gather-data step output")?;

        let analytics_value = self
            .step(job_id, "compute-analytics", || async move {
                Ok(serde_json::to_value(compute_analytics(&bookings))?)
            })
            .await?;
        let analytics: ReportAnalytics = serde_json::from_value(analytics_value)
            .context("corrupt compute-analytics step output")?;

        let insight_analytics = analytics.clone();
        let insights_value = self
            .step(job_id, "summarize", || async move {
                Ok(serde_json::to_value(build_insights(&insight_analytics))?)
            })
            .await?;
        let insights: Vec<String> =
            serde_json::from_value(insights_value).context("corrupt summarize step output")?;

        let mailer = Arc::clone(&self.mailer);
        let job_owned = job.clone();
        self.step(job_id, "render-and-deliver", || async move {
            let document = render_report(&job_owned, &analytics, &insights);
            let subject = format!(
                "{} report {} to {}",
                job_owned.report_type, job_owned.start_date, job_owned.end_date
            );
            mailer
                .send(&job_owned.recipient_email, &subject, &document)
                .await?;
            Ok(json!({ "delivered_to": job_owned.recipient_email }))
        })
        .await?;

        Ok(())
    }

    /// Runs one step unless the journal already holds its output.
    async fn step<F, Fut>(&self, job_id: &str, name: &str, f: F) -> Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        if let Some(output) = self.journal.recorded(job_id, name).await? {
            info!("Job {} step {} already recorded, skipping", job_id, name);
            return Ok(output);
        }
        let output = f().await.with_context(|| format!("step {} failed", name))?;
        self.journal.record(job_id, name, &output).await?;
        Ok(output)
    }
}
