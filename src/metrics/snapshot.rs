use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub items_dispatched: u64,
    pub items_submitted: u64,
    pub items_failed: u64,
    pub requests_total: u64,
    pub requests_success: u64,
    pub requests_rate_limited: u64,
    pub requests_failed: u64,
    pub accounts_banned: u64,
    pub leases_acquired: u64,
    pub leases_released: u64,
    pub wait_hints: u64,
    pub active_workers: u64,
    pub success_rate: f64,
    pub requests_per_second: f64,
    pub elapsed_seconds: f64,
}
