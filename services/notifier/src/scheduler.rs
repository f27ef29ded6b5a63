//! Digest scheduler
//!
//! A cron job fires [`DigestScheduler::run_once`]. Each run collects the
//! digest recipients and mails every user whose digest is due, with bounded
//! concurrency. One user's failure is logged and the run moves on.

use anyhow::Result;
use campus::{
    EventQuery, EventQueryError, StoreError, User, UserStore, list_events,
    events::DateRange,
    mail::{MailError, Mailer},
    models::EmailFrequency,
    store::{EventStore, load_user_context},
};
use chrono::{DateTime, Datelike, TimeDelta, Utc, Weekday};
use futures_util::{StreamExt, stream};
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};
use thiserror::Error;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info, warn};

use crate::digest::render_digest;

#[derive(Error, Debug)]
pub enum DigestError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Events(#[from] EventQueryError),

    #[error(transparent)]
    Mail(#[from] MailError),
}

/// What happened for one recipient
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Digest mailed with this many events
    Sent(usize),
    /// Due, but nothing relevant in the window
    Empty,
    /// Weekly digest outside its day
    NotDue,
}

/// Counters of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DigestSummary {
    pub sent: usize,
    pub empty: usize,
    pub not_due: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(DigestSummary),
    /// A previous run was still in progress
    AlreadyRunning,
    /// The recipient list could not be loaded
    RecipientsUnavailable,
}

/// Window covered by a digest fired at `now`, or `None` when the user's
/// digest is not due
pub fn digest_window(frequency: EmailFrequency, now: DateTime<Utc>) -> Option<DateRange> {
    match frequency {
        EmailFrequency::Never => None,
        EmailFrequency::Daily => Some(DateRange::starting_at(now, TimeDelta::hours(24))),
        EmailFrequency::Weekly if now.weekday() == Weekday::Mon => {
            Some(DateRange::starting_at(now, TimeDelta::days(7)))
        }
        EmailFrequency::Weekly => None,
    }
}

/// Clears the running flag when a run ends, however it ends
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct DigestScheduler<S, M> {
    store: S,
    mailer: Arc<M>,
    concurrency: usize,
    running: Arc<AtomicBool>,
}

impl<S: Clone, M> Clone for DigestScheduler<S, M> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            mailer: Arc::clone(&self.mailer),
            concurrency: self.concurrency,
            running: Arc::clone(&self.running),
        }
    }
}

impl<S, M> DigestScheduler<S, M>
where
    S: UserStore + EventStore + Clone + 'static,
    M: Mailer + 'static,
{
    pub fn new(store: S, mailer: M, concurrency: usize) -> Self {
        Self {
            store,
            mailer: Arc::new(mailer),
            concurrency: concurrency.max(1),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run one digest batch as of `now`
    pub async fn run_once(&self, now: DateTime<Utc>) -> RunOutcome {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Digest run still in progress, skipping this fire");
            return RunOutcome::AlreadyRunning;
        }
        let _guard = RunningGuard(&self.running);

        let recipients = match self.store.digest_recipients().await {
            Ok(recipients) => recipients,
            Err(e) => {
                error!("Failed to load digest recipients: {}", e);
                return RunOutcome::RecipientsUnavailable;
            }
        };
        info!(recipients = recipients.len(), "Digest run started");

        let sent = Arc::new(AtomicUsize::new(0));
        let empty = Arc::new(AtomicUsize::new(0));
        let not_due = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicUsize::new(0));

        stream::iter(recipients)
            .for_each_concurrent(self.concurrency, |user| {
                let sent = Arc::clone(&sent);
                let empty = Arc::clone(&empty);
                let not_due = Arc::clone(&not_due);
                let failed = Arc::clone(&failed);
                async move {
                    match self.deliver(&user, now).await {
                        Ok(Delivery::Sent(events)) => {
                            debug!(user = %user.email, events, "Digest sent");
                            sent.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(Delivery::Empty) => {
                            empty.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(Delivery::NotDue) => {
                            not_due.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            error!(user = %user.email, error = %e, "Digest delivery failed");
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
            .await;

        let summary = DigestSummary {
            sent: sent.load(Ordering::Relaxed),
            empty: empty.load(Ordering::Relaxed),
            not_due: not_due.load(Ordering::Relaxed),
            failed: failed.load(Ordering::Relaxed),
        };
        info!(
            sent = summary.sent,
            empty = summary.empty,
            not_due = summary.not_due,
            failed = summary.failed,
            "Digest run finished"
        );
        RunOutcome::Completed(summary)
    }

    /// Build and send the digest of one user
    pub async fn deliver(&self, user: &User, now: DateTime<Utc>) -> Result<Delivery, DigestError> {
        let Some(range) = digest_window(user.email_frequency, now) else {
            return Ok(Delivery::NotDue);
        };

        let context = load_user_context(&self.store, user).await?;
        let query = EventQuery {
            range,
            filter: Some(user.email_event_type),
            approved_only: true,
        };
        let events = list_events(&self.store, &context, &query).await?;
        if events.is_empty() {
            return Ok(Delivery::Empty);
        }

        let message = render_digest(user, &events);
        self.mailer.send(&message).await?;
        Ok(Delivery::Sent(events.len()))
    }

    /// Register the cron job and start the scheduler
    pub async fn start(&self, schedule: &str) -> Result<JobScheduler> {
        let digest = self.clone();

        let scheduler = JobScheduler::new().await?;

        let job = Job::new_async(schedule, move |_, _| {
            let digest = digest.clone();
            Box::pin(async move {
                info!("Digest job fired");
                digest.run_once(Utc::now()).await;
            })
        })?;

        scheduler.add(job).await?;
        scheduler.start().await?;

        info!("Started digest scheduler with schedule: {}", schedule);
        Ok(scheduler)
    }
}
