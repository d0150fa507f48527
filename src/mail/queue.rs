use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::{Email, Mailer};
use crate::config::MailConfig;

#[derive(Debug, Clone)]
pub struct QueueOptions {
    pub capacity: usize,
    pub max_attempts: u32,
    /// Delay before the first retry; doubled after each failure.
    pub base_backoff: Duration,
}

impl QueueOptions {
    pub fn from_config(cfg: &MailConfig) -> Self {
        Self {
            capacity: cfg.queue_capacity,
            max_attempts: cfg.max_attempts,
            base_backoff: Duration::from_millis(500),
        }
    }
}

/// Sending side of the background mail worker. Cheap to clone.
#[derive(Clone)]
pub struct MailQueue {
    tx: mpsc::Sender<Email>,
}

impl MailQueue {
    /// Spawn the worker. It exits once every `MailQueue` clone is dropped and the
    /// buffer is drained.
    pub fn start(mailer: Arc<dyn Mailer>, opts: QueueOptions) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(opts.capacity.max(1));
        let handle = tokio::spawn(run_worker(
            mailer,
            rx,
            opts.max_attempts.max(1),
            opts.base_backoff,
        ));
        (Self { tx }, handle)
    }

    /// Never waits. Returns `false` when the email was dropped.
    pub fn enqueue(&self, email: Email) -> bool {
        match self.tx.try_send(email) {
            Ok(()) => true,
            Err(TrySendError::Full(email)) => {
                warn!(to = %email.to_email, "mail queue full; dropping email");
                false
            }
            Err(TrySendError::Closed(email)) => {
                warn!(to = %email.to_email, "mail queue closed; dropping email");
                false
            }
        }
    }
}

async fn run_worker(
    mailer: Arc<dyn Mailer>,
    mut rx: mpsc::Receiver<Email>,
    max_attempts: u32,
    base_backoff: Duration,
) {
    while let Some(email) = rx.recv().await {
        deliver(mailer.as_ref(), &email, max_attempts, base_backoff).await;
    }
    debug!("mail worker stopped");
}

async fn deliver(mailer: &dyn Mailer, email: &Email, max_attempts: u32, base_backoff: Duration) -> bool {
    let mut delay = base_backoff;
    for attempt in 1..=max_attempts {
        match mailer.send(email).await {
            Ok(()) => return true,
            Err(e) if attempt < max_attempts => {
                let chain = format!("{e:#}");
                warn!(to = %email.to_email, attempt, error = %chain, "email send failed; retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(e) => {
                let chain = format!("{e:#}");
                error!(to = %email.to_email, attempts = max_attempts, error = %chain, "email dropped");
            }
        }
    }
    false
}
