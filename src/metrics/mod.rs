/*!
 * # Metrics Module
 *
 * In-process counters for the checkout flow, exposed in Prometheus text
 * format at `/metrics`.
 */

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub const ORDERS_CREATED: &str = "checkout_orders_created_total";
pub const GATEWAY_ERRORS: &str = "checkout_gateway_errors_total";
pub const SIGNATURE_REJECTIONS: &str = "checkout_signature_rejections_total";
pub const ENROLLMENTS_COMMITTED: &str = "checkout_enrollments_committed_total";
pub const ENROLLMENTS_DUPLICATE: &str = "checkout_enrollments_duplicate_total";
pub const ENROLLMENT_FAILURES: &str = "checkout_enrollment_failures_total";
pub const PAYMENT_AUDIT_FAILURES: &str = "checkout_payment_audit_failures_total";
pub const FREE_ENROLLMENTS: &str = "checkout_free_enrollments_total";

const HELP: &[(&str, &str)] = &[
    (ORDERS_CREATED, "Provider orders created"),
    (GATEWAY_ERRORS, "Order creation calls the gateway failed"),
    (SIGNATURE_REJECTIONS, "Payment confirmations with an invalid signature"),
    (ENROLLMENTS_COMMITTED, "Paid enrollments committed"),
    (ENROLLMENTS_DUPLICATE, "Confirmations for an existing enrollment"),
    (ENROLLMENT_FAILURES, "Verified payments whose enrollment could not be written"),
    (PAYMENT_AUDIT_FAILURES, "Payment audit rows that could not be written"),
    (FREE_ENROLLMENTS, "Free enrollments committed"),
];

#[derive(Debug, Clone, Default)]
pub struct Counter {
    value: Arc<AtomicU64>,
}

impl Counter {
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub struct MetricsRegistry {
    counters: Arc<DashMap<&'static str, Counter>>,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    /// Registry with every checkout counter pre-registered at zero.
    pub fn new() -> Self {
        let counters = DashMap::new();
        for (name, _) in HELP {
            counters.insert(*name, Counter::default());
        }
        Self {
            counters: Arc::new(counters),
        }
    }

    pub fn counter(&self, name: &'static str) -> Counter {
        self.counters.entry(name).or_default().clone()
    }

    pub fn incr(&self, name: &'static str) {
        self.counter(name).inc();
    }

    pub fn get(&self, name: &str) -> u64 {
        self.counters.get(name).map(|c| c.get()).unwrap_or(0)
    }

    pub fn render_prometheus(&self) -> String {
        let mut names: Vec<&'static str> = self.counters.iter().map(|e| *e.key()).collect();
        names.sort_unstable();

        let mut output = String::new();
        for name in names {
            if let Some((_, help)) = HELP.iter().find(|(n, _)| *n == name) {
                output.push_str(&format!("# HELP {} {}\n", name, help));
            }
            output.push_str(&format!("# TYPE {} counter\n", name));
            output.push_str(&format!("{} {}\n", name, self.get(name)));
        }
        output
    }
}
