use crate::classifier::Verdict;
use crate::metrics::snapshot::MetricsSnapshot;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use std::time::{Duration, Instant};
use tokio::sync::watch;

#[derive(Clone)]
pub struct MetricsCollector {
    items_dispatched: Arc<AtomicU64>,
    items_submitted: Arc<AtomicU64>,
    items_failed: Arc<AtomicU64>,
    requests_success: Arc<AtomicU64>,
    requests_rate_limited: Arc<AtomicU64>,
    requests_failed: Arc<AtomicU64>,
    accounts_banned: Arc<AtomicU64>,
    leases_acquired: Arc<AtomicU64>,
    leases_released: Arc<AtomicU64>,
    wait_hints: Arc<AtomicU64>,
    active_workers: Arc<AtomicU64>,
    start_time: Arc<Instant>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self {
            items_dispatched: Arc::new(AtomicU64::new(0)),
            items_submitted: Arc::new(AtomicU64::new(0)),
            items_failed: Arc::new(AtomicU64::new(0)),
            requests_success: Arc::new(AtomicU64::new(0)),
            requests_rate_limited: Arc::new(AtomicU64::new(0)),
            requests_failed: Arc::new(AtomicU64::new(0)),
            accounts_banned: Arc::new(AtomicU64::new(0)),
            leases_acquired: Arc::new(AtomicU64::new(0)),
            leases_released: Arc::new(AtomicU64::new(0)),
            wait_hints: Arc::new(AtomicU64::new(0)),
            active_workers: Arc::new(AtomicU64::new(0)),
            start_time: Arc::new(Instant::now()),
        }
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_items_dispatched(&self) {
        self.items_dispatched.fetch_add(1, Ordering::SeqCst);
    }

    pub fn increment_items_submitted(&self) {
        self.items_submitted.fetch_add(1, Ordering::SeqCst);
    }

    pub fn increment_items_failed(&self) {
        self.items_failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_verdict(&self, verdict: Verdict) {
        let counter = match verdict {
            Verdict::Success => &self.requests_success,
            Verdict::RateLimited => &self.requests_rate_limited,
            Verdict::Banned | Verdict::ProtocolError => &self.requests_failed,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_transport_failure(&self) {
        self.requests_failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn increment_accounts_banned(&self) {
        self.accounts_banned.fetch_add(1, Ordering::SeqCst);
    }

    pub fn increment_leases_acquired(&self) {
        self.leases_acquired.fetch_add(1, Ordering::SeqCst);
    }

    pub fn increment_leases_released(&self) {
        self.leases_released.fetch_add(1, Ordering::SeqCst);
    }

    pub fn increment_wait_hints(&self) {
        self.wait_hints.fetch_add(1, Ordering::SeqCst);
    }

    pub fn increment_active_workers(&self) {
        self.active_workers.fetch_add(1, Ordering::SeqCst);
    }

    pub fn decrement_active_workers(&self) {
        self.active_workers.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let success = self.requests_success.load(Ordering::SeqCst);
        let rate_limited = self.requests_rate_limited.load(Ordering::SeqCst);
        let failed = self.requests_failed.load(Ordering::SeqCst);
        let total_requests = success + rate_limited + failed;

        let success_rate = if total_requests > 0 {
            (success as f64 / total_requests as f64) * 100.0
        } else {
            0.0
        };

        let elapsed = self.start_time.elapsed().as_secs_f64();

        MetricsSnapshot {
            items_dispatched: self.items_dispatched.load(Ordering::SeqCst),
            items_submitted: self.items_submitted.load(Ordering::SeqCst),
            items_failed: self.items_failed.load(Ordering::SeqCst),
            requests_total: total_requests,
            requests_success: success,
            requests_rate_limited: rate_limited,
            requests_failed: failed,
            accounts_banned: self.accounts_banned.load(Ordering::SeqCst),
            leases_acquired: self.leases_acquired.load(Ordering::SeqCst),
            leases_released: self.leases_released.load(Ordering::SeqCst),
            wait_hints: self.wait_hints.load(Ordering::SeqCst),
            active_workers: self.active_workers.load(Ordering::SeqCst),
            success_rate,
            requests_per_second: if elapsed > 0.0 {
                total_requests as f64 / elapsed
            } else {
                0.0
            },
            elapsed_seconds: elapsed,
        }
    }

    /// Publishes a fresh snapshot every `period` until all receivers are gone.
    pub fn watch(&self, period: Duration) -> watch::Receiver<MetricsSnapshot> {
        let (tx, rx) = watch::channel(self.snapshot());
        let metrics = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                if tx.send(metrics.snapshot()).is_err() {
                    break;
                }
            }
        });
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdicts_land_in_their_counters() {
        let metrics = MetricsCollector::new();
        metrics.record_verdict(Verdict::Success);
        metrics.record_verdict(Verdict::Success);
        metrics.record_verdict(Verdict::RateLimited);
        metrics.record_verdict(Verdict::Banned);
        metrics.record_transport_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests_total, 5);
        assert_eq!(snapshot.requests_success, 2);
        assert_eq!(snapshot.requests_rate_limited, 1);
        assert_eq!(snapshot.requests_failed, 2);
        assert!((snapshot.success_rate - 40.0).abs() < 1e-9);
    }
}
