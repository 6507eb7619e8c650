//! Per-host and global connection accounting.
//!
//! Workers lease a slot before opening a transfer so total sockets stay
//! under the global cap and no single host is hammered past its limit.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shared connection budget: a global cap plus a per-host cap. Cloning
/// shares the same counters.
#[derive(Debug, Clone)]
pub struct HostBudget {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    max_total: usize,
    max_per_host: usize,
    counts: Mutex<Counts>,
}

#[derive(Debug, Default)]
struct Counts {
    total: usize,
    per_host: HashMap<String, usize>,
}

/// Slot handle; the slot is released when the lease drops.
pub struct HostLease {
    budget: HostBudget,
    host: String,
}

impl HostBudget {
    pub fn new(max_total: usize, max_per_host: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                max_total: max_total.max(1),
                max_per_host: max_per_host.max(1),
                counts: Mutex::new(Counts::default()),
            }),
        }
    }

    /// Take a slot for `host` if both caps allow it.
    pub fn try_acquire(&self, host: &str) -> Option<HostLease> {
        let mut counts = self.inner.counts.lock().unwrap();
        let used = counts.per_host.get(host).copied().unwrap_or(0);
        if counts.total >= self.inner.max_total || used >= self.inner.max_per_host {
            return None;
        }
        counts.total += 1;
        *counts.per_host.entry(host.to_string()).or_insert(0) += 1;
        Some(HostLease {
            budget: self.clone(),
            host: host.to_string(),
        })
    }

    /// Wait until a slot for `host` is available.
    pub async fn acquire(&self, host: String) -> HostLease {
        loop {
            if let Some(lease) = self.try_acquire(&host) {
                return lease;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    fn release(&self, host: &str) {
        let mut counts = self.inner.counts.lock().unwrap();
        counts.total = counts.total.saturating_sub(1);
        if let Some(n) = counts.per_host.get_mut(host) {
            *n = n.saturating_sub(1);
            if *n == 0 {
                counts.per_host.remove(host);
            }
        }
    }

    /// Slots currently leased across all hosts.
    pub fn in_use(&self) -> usize {
        self.inner.counts.lock().unwrap().total
    }
}

impl Drop for HostLease {
    fn drop(&mut self) {
        self.budget.release(&self.host);
    }
}

/// Host component of `url`, or the whole string when unparseable (still a
/// stable budget key).
pub(super) fn host_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_host_cap_is_enforced() {
        let budget = HostBudget::new(10, 2);
        let a = budget.try_acquire("h1").unwrap();
        let _b = budget.try_acquire("h1").unwrap();
        assert!(budget.try_acquire("h1").is_none());
        // Other hosts are unaffected.
        let _c = budget.try_acquire("h2").unwrap();
        assert_eq!(budget.in_use(), 3);

        drop(a);
        assert!(budget.try_acquire("h1").is_some());
    }

    #[test]
    fn global_cap_is_enforced() {
        let budget = HostBudget::new(2, 2);
        let _a = budget.try_acquire("h1").unwrap();
        let _b = budget.try_acquire("h2").unwrap();
        assert!(budget.try_acquire("h3").is_none());
    }

    #[test]
    fn release_on_drop() {
        let budget = HostBudget::new(1, 1);
        {
            let _lease = budget.try_acquire("h").unwrap();
            assert_eq!(budget.in_use(), 1);
        }
        assert_eq!(budget.in_use(), 0);
    }

    #[test]
    fn host_extraction() {
        assert_eq!(host_of("https://cdn.example.com/a/b.bin"), "cdn.example.com");
        assert_eq!(host_of("not a url"), "not a url");
    }
}
