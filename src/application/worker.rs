use crate::domain::payment::{Payment, PaymentStatus};
use crate::domain::ports::{
    IdentityResolverRef, PaymentStoreRef, StatusOracleRef, TransferIssuerRef,
};
use crate::domain::settlement::{ExternalStatus, TransferOutcome};
use crate::queue::PaymentQueue;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Tuning knobs for [`ReconciliationWorker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Longest wait on an empty queue before polling again.
    pub idle_backoff: Duration,
    /// Pause after each re-enqueue. Zero retries back-to-back.
    pub retry_pause: Duration,
    /// Failed attempts after which a payment is dead-lettered instead of
    /// re-enqueued. `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Return from [`ReconciliationWorker::start`] as soon as the queue is found empty.
    pub stop_when_idle: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            idle_backoff: Duration::from_secs(1),
            retry_pause: Duration::ZERO,
            max_attempts: None,
            stop_when_idle: false,
        }
    }
}

impl WorkerConfig {
    pub fn with_idle_backoff(mut self, idle_backoff: Duration) -> Self {
        self.idle_backoff = idle_backoff;
        self
    }

    pub fn with_retry_pause(mut self, retry_pause: Duration) -> Self {
        self.retry_pause = retry_pause;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_stop_when_idle(mut self, stop_when_idle: bool) -> Self {
        self.stop_when_idle = stop_when_idle;
        self
    }
}

/// Why a payment went back to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    OracleUnavailable,
    AwaitingPayment,
    PaymentFailed,
    UnexpectedStatus,
    IdentityUnavailable,
    StoreUnavailable,
    TransferFailed,
}

/// What a single iteration of the worker did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationOutcome {
    /// The queue was empty.
    Idle,
    /// Funds were transferred and the payment left the queue.
    Settled { payment_id: String },
    /// The oracle reported a terminal status; the payment left the queue.
    Finished {
        payment_id: String,
        status: ExternalStatus,
    },
    Requeued {
        payment_id: String,
        reason: RetryReason,
    },
    /// The retry ceiling was reached; the payment moved to the dead-letter queue.
    DeadLettered {
        payment_id: String,
        reason: RetryReason,
    },
}

/// Drives queued payments through the external settlement state machine.
///
/// The worker is the error boundary of reconciliation: collaborator failures
/// are logged and turned into a re-enqueue, never propagated. Only one worker
/// may run against a queue, since nothing stops two workers from settling the
/// same payment concurrently.
pub struct ReconciliationWorker {
    queue: Arc<PaymentQueue>,
    oracle: StatusOracleRef,
    store: PaymentStoreRef,
    identity: IdentityResolverRef,
    issuer: TransferIssuerRef,
    config: WorkerConfig,
    attempts: HashMap<String, u32>,
    dead_letters: Arc<PaymentQueue>,
}

impl ReconciliationWorker {
    /// Creates a worker with the default [`WorkerConfig`].
    ///
    /// # Arguments
    ///
    /// * `queue` - The queue shared with the producers.
    /// * `oracle` - Source of the external payment status.
    /// * `store` - The payment store whose status the worker converges.
    /// * `identity` - Resolves receivers to external accounts.
    /// * `issuer` - Issues the final transfer to the receiver.
    pub fn new(
        queue: Arc<PaymentQueue>,
        oracle: StatusOracleRef,
        store: PaymentStoreRef,
        identity: IdentityResolverRef,
        issuer: TransferIssuerRef,
    ) -> Self {
        Self {
            queue,
            oracle,
            store,
            identity,
            issuer,
            config: WorkerConfig::default(),
            attempts: HashMap::new(),
            dead_letters: Arc::new(PaymentQueue::new()),
        }
    }

    pub fn with_config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Payments that exhausted `max_attempts`, kept for inspection.
    pub fn dead_letters(&self) -> Arc<PaymentQueue> {
        Arc::clone(&self.dead_letters)
    }

    /// Runs until `shutdown` is cancelled (or, in drain mode, until the queue is empty).
    ///
    /// Cancellation is checked before every dequeue and interrupts any wait at
    /// once. An iteration already in progress is finished first, so a dequeued
    /// payment is always either re-enqueued or deliberately dropped.
    pub async fn start(&mut self, shutdown: CancellationToken) {
        info!(
            idle_backoff_ms = self.config.idle_backoff.as_millis() as u64,
            max_attempts = ?self.config.max_attempts,
            "Reconciliation worker started"
        );

        while !shutdown.is_cancelled() {
            match self.run_once().await {
                IterationOutcome::Idle if self.config.stop_when_idle => break,
                IterationOutcome::Idle => {
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => break,
                        _ = self.queue.notified() => {}
                        _ = tokio::time::sleep(self.config.idle_backoff) => {}
                    }
                }
                IterationOutcome::Requeued { .. } if !self.config.retry_pause.is_zero() => {
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.config.retry_pause) => {}
                    }
                }
                // Collaborators may complete without ever suspending.
                _ => tokio::task::yield_now().await,
            }
        }

        info!(remaining = self.queue.len(), "Reconciliation worker stopped");
    }

    /// Dequeues and reconciles at most one payment.
    pub async fn run_once(&mut self) -> IterationOutcome {
        let Some(payment) = self.queue.dequeue() else {
            return IterationOutcome::Idle;
        };

        let status = match self.oracle.check_status(&payment.id).await {
            Ok(status) => status,
            Err(e) => {
                error!(payment_id = %payment.id, error = %e, "Failed to check payment status");
                return self.retry(payment, RetryReason::OracleUnavailable);
            }
        };

        match status {
            ExternalStatus::Success => self.settle(payment).await,
            ExternalStatus::Pending => {
                debug!(payment_id = %payment.id, "Payment still pending, re-enqueued");
                self.retry(payment, RetryReason::AwaitingPayment)
            }
            ExternalStatus::Failed => {
                debug!(payment_id = %payment.id, "Payment failed at gateway, re-enqueued");
                self.retry(payment, RetryReason::PaymentFailed)
            }
            _ if status.is_terminal() => {
                info!(payment_id = %payment.id, status = %status, "Payment reconciled");
                self.finish(payment, status)
            }
            _ => {
                warn!(payment_id = %payment.id, status = %status, "Unexpected payment status");
                self.retry(payment, RetryReason::UnexpectedStatus)
            }
        }
    }

    /// Success path: resolve the receiver, mark the payment complete and move
    /// the funds, rolling the store back to `SUCCESS` if the transfer fails.
    async fn settle(&mut self, payment: Payment) -> IterationOutcome {
        let destination = match self.identity.resolve(&payment.to_user_id).await {
            Ok(destination) => destination,
            Err(e) => {
                error!(user_id = %payment.to_user_id, error = %e, "Failed to get receiver");
                return self.retry(payment, RetryReason::IdentityUnavailable);
            }
        };

        // The store is marked COMPLETE before the transfer. A crash between the
        // two leaves a COMPLETE payment without a confirmed transfer.
        let store_updated = match self
            .store
            .update_status(&payment.id, PaymentStatus::Complete)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                error!(payment_id = %payment.id, error = %e, "Failed to update payment status");
                false
            }
        };

        let failure = match self.issuer.issue(&payment, &destination).await {
            Ok(TransferOutcome::Success) => None,
            Ok(TransferOutcome::Failed { reason }) => Some(reason),
            Err(e) => Some(e.to_string()),
        };

        if let Some(reason) = failure {
            if let Err(e) = self
                .store
                .update_status(&payment.id, PaymentStatus::Success)
                .await
            {
                error!(payment_id = %payment.id, error = %e, "Failed to roll back payment status");
            }
            error!(payment_id = %payment.id, reason = %reason, "Transfer failed");
            return self.retry(payment, RetryReason::TransferFailed);
        }

        info!(payment_id = %payment.id, destination = %destination, "Transfer issued");
        if !store_updated {
            return self.retry(payment, RetryReason::StoreUnavailable);
        }

        self.attempts.remove(&payment.id);
        IterationOutcome::Settled {
            payment_id: payment.id,
        }
    }

    fn finish(&mut self, payment: Payment, status: ExternalStatus) -> IterationOutcome {
        self.attempts.remove(&payment.id);
        IterationOutcome::Finished {
            payment_id: payment.id,
            status,
        }
    }

    fn retry(&mut self, payment: Payment, reason: RetryReason) -> IterationOutcome {
        let counter = self.attempts.entry(payment.id.clone()).or_insert(0);
        *counter = counter.saturating_add(1);
        let attempts = *counter;

        if let Some(max_attempts) = self.config.max_attempts
            && attempts >= max_attempts
        {
            warn!(
                payment_id = %payment.id,
                attempts,
                reason = ?reason,
                "Retry limit reached, payment dead-lettered"
            );
            self.attempts.remove(&payment.id);
            let payment_id = payment.id.clone();
            self.dead_letters.enqueue(payment);
            return IterationOutcome::DeadLettered { payment_id, reason };
        }

        let payment_id = payment.id.clone();
        self.queue.enqueue(payment);
        IterationOutcome::Requeued { payment_id, reason }
    }
}
