/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! Submission queue and connection dispatch.
//!
//! Submissions are queued in FIFO order and dispatched under a bounded
//! connection cap. Each message is delivered over a brand-new connection;
//! SMTP submission closes after `QUIT`, so connections are never reused.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::config::Configuration;
use crate::email::Email;
use crate::logger::TransmissionLogger;
use crate::smtp::client;

/// Connections opened concurrently unless configured otherwise.
pub const DEFAULT_MAX_CONNECTIONS: usize = 2;

struct ScheduledEmail {
    id: Uuid,
    email: Email,
    completion: oneshot::Sender<crate::Result<()>>,
}

struct Inner {
    config: Configuration,
    queue: Mutex<VecDeque<ScheduledEmail>>,
    connections: Option<Arc<Semaphore>>,
    logger: Option<Arc<dyn TransmissionLogger>>,
}

/// Accepts e-mail submissions and delivers each over its own connection.
pub struct Mailer {
    inner: Arc<Inner>,
}

/// Completion handle for one submission. Resolves once the delivery
/// succeeds or fails; dropping the handle does not cancel the delivery.
pub struct Delivery {
    id: Uuid,
    rx: oneshot::Receiver<crate::Result<()>>,
}

impl Delivery {
    /// Bookkeeping identity of the submission.
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Future for Delivery {
    type Output = crate::Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| match received {
            Ok(outcome) => outcome,
            Err(_) => Err(crate::Error::Abandoned),
        })
    }
}

impl Mailer {
    /// Creates a mailer with the default connection cap and no transmission
    /// logger.
    pub fn new(configuration: Configuration) -> Self {
        Mailer {
            inner: Arc::new(Inner {
                config: configuration,
                queue: Mutex::new(VecDeque::new()),
                connections: Some(Arc::new(Semaphore::new(DEFAULT_MAX_CONNECTIONS))),
                logger: None,
            }),
        }
    }

    /// Creates a mailer with an explicit connection cap (`None` leaves the
    /// concurrency unbounded) and an optional transmission logger.
    pub fn with_options(
        configuration: Configuration,
        max_connections: Option<usize>,
        logger: Option<Arc<dyn TransmissionLogger>>,
    ) -> crate::Result<Self> {
        if max_connections == Some(0) {
            return Err(crate::Error::InvalidConnectionCap);
        }
        Ok(Mailer {
            inner: Arc::new(Inner {
                config: configuration,
                queue: Mutex::new(VecDeque::new()),
                connections: max_connections
                    .map(|permits| Arc::new(Semaphore::new(permits))),
                logger,
            }),
        })
    }

    /// Queues a message and returns its completion handle. Submissions are
    /// dispatched in `send` call order; up to the connection cap may be in
    /// flight at once and may complete out of order.
    pub fn send(&self, email: Email) -> Delivery {
        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        self.inner.queue().push_back(ScheduledEmail {
            id,
            email,
            completion: tx,
        });
        Inner::schedule(&self.inner);
        Delivery { id, rx }
    }

    /// The awaitable spelling of [`send`](Self::send).
    pub async fn deliver(&self, email: Email) -> crate::Result<()> {
        self.send(email).await
    }
}

impl Inner {
    fn queue(&self) -> MutexGuard<'_, VecDeque<ScheduledEmail>> {
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Dispatches the next pending submission, if any. Invoked after every
    /// push and from every delivery's completion hook.
    fn schedule(inner: &Arc<Inner>) {
        let Some(scheduled) = inner.queue().pop_front() else {
            return;
        };
        let ScheduledEmail {
            id,
            email,
            completion,
        } = scheduled;

        let config = inner.config.clone();
        let connections = inner.connections.clone();
        let logger = inner.logger.clone();
        // The completion hook must not keep the mailer alive.
        let mailer = Arc::downgrade(inner);

        tokio::spawn(async move {
            let _permit = match &connections {
                Some(semaphore) => match semaphore.clone().acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => {
                        let _ = completion.send(Err(crate::Error::Abandoned));
                        return;
                    }
                },
                None => None,
            };

            tracing::debug!(submission = %id, "dispatching");
            let outcome = client::submit(&config, email, logger).await;
            match &outcome {
                Ok(()) => tracing::debug!(submission = %id, "delivered"),
                Err(err) => tracing::debug!(submission = %id, error = %err, "failed"),
            }
            let _ = completion.send(outcome);

            drop(_permit);
            if let Some(inner) = mailer.upgrade() {
                Inner::schedule(&inner);
            }
        });
    }
}
