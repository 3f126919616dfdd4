use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};

use crate::client::{TelemetryEvent, TelemetrySink};

/// Snapshot of a [`BufferedTelemetrySink`]'s delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TelemetryDispatchMetrics {
    pub enqueued: u64,
    pub dropped_full: u64,
    pub completed: u64,
    pub failed: u64,
    pub panicked: u64,
}

impl TelemetryDispatchMetrics {
    /// Events accepted but not yet handed to the inner sink.
    pub fn pending(&self) -> u64 {
        self.enqueued
            .saturating_sub(self.completed + self.failed + self.panicked)
    }
}

#[derive(Default)]
struct DispatchMetricsInner {
    enqueued: AtomicU64,
    dropped_full: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
}

impl DispatchMetricsInner {
    fn snapshot(&self) -> TelemetryDispatchMetrics {
        TelemetryDispatchMetrics {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped_full: self.dropped_full.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
        }
    }
}

/// Decouples event tracking from delivery.
///
/// Events go into a bounded queue drained by a dedicated worker thread that
/// forwards them to the inner sink. A full queue drops the event instead of
/// blocking the turn. Failures and panics in the inner sink are counted, not
/// propagated.
pub struct BufferedTelemetrySink {
    sender: SyncSender<TelemetryEvent>,
    metrics: Arc<DispatchMetricsInner>,
}

impl BufferedTelemetrySink {
    pub fn spawn(inner: Arc<dyn TelemetrySink>, queue_capacity: usize) -> Self {
        let (sender, receiver) = sync_channel(queue_capacity.max(1));
        let metrics = Arc::new(DispatchMetricsInner::default());
        spawn_dispatch_worker(receiver, inner, Arc::clone(&metrics));
        Self { sender, metrics }
    }

    pub fn metrics(&self) -> TelemetryDispatchMetrics {
        self.metrics.snapshot()
    }

    /// Waits until every accepted event has been handed to the inner sink.
    /// Returns false when `timeout` elapses first.
    pub fn flush(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.metrics().pending() == 0 {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
    }
}

impl TelemetrySink for BufferedTelemetrySink {
    fn track(&self, event: &TelemetryEvent) -> Result<()> {
        match self.sender.try_send(event.clone()) {
            Ok(()) => {
                self.metrics.enqueued.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.metrics.dropped_full.fetch_add(1, Ordering::Relaxed);
                bail!("telemetry queue is full")
            }
            Err(TrySendError::Disconnected(_)) => {
                self.metrics.dropped_full.fetch_add(1, Ordering::Relaxed);
                bail!("telemetry dispatch worker has stopped")
            }
        }
    }
}

impl std::fmt::Debug for BufferedTelemetrySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferedTelemetrySink")
            .field("metrics", &self.metrics())
            .finish_non_exhaustive()
    }
}

fn spawn_dispatch_worker(
    receiver: Receiver<TelemetryEvent>,
    inner: Arc<dyn TelemetrySink>,
    metrics: Arc<DispatchMetricsInner>,
) {
    std::thread::spawn(move || {
        while let Ok(event) = receiver.recv() {
            match catch_unwind(AssertUnwindSafe(|| inner.track(&event))) {
                Ok(Ok(())) => {
                    metrics.completed.fetch_add(1, Ordering::Relaxed);
                }
                Ok(Err(error)) => {
                    tracing::debug!(
                        event = event.name.as_str(),
                        error = %error,
                        "telemetry sink failed"
                    );
                    metrics.failed.fetch_add(1, Ordering::Relaxed);
                }
                Err(_) => {
                    metrics.panicked.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    });
}
