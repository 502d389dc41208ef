use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Outcome of an admission check. Denial is normal control flow, not an
/// error; it carries the duration until the identity's window resets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdmissionDecision {
    Allowed { remaining: u32 },
    Denied { retry_after: Duration },
}

impl AdmissionDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

#[derive(Clone, Copy, Debug)]
struct WindowState {
    started: Instant,
    count: u32,
}

impl WindowState {
    fn expired(&self, window: Duration, now: Instant) -> bool {
        now.duration_since(self.started) >= window
    }
}

/// Fixed-window request quota, keyed by caller identity.
///
/// The counter for an identity resets exactly one window after the first
/// request that opened it, so up to twice the nominal quota can pass
/// across a window boundary. That is an accepted property of the fixed
/// window strategy, traded for O(identities) memory and a trivial
/// critical section.
///
/// Check-then-record runs as one atomic decision under the map lock, so
/// two concurrent requests for the same identity can never both claim
/// the last slot. The gate never panics across its API: a poisoned lock
/// fails closed (deny).
pub struct AdmissionGate {
    max_requests: u32,
    window: Duration,
    windows: Mutex<HashMap<String, WindowState>>,
}

impl AdmissionGate {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self { max_requests, window, windows: Mutex::new(HashMap::new()) }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Pure check: would a request from this identity be admitted right
    /// now? Does not consume a slot.
    pub fn allow(&self, identity: &str) -> bool {
        self.allow_at(identity, Instant::now())
    }

    pub fn allow_at(&self, identity: &str, now: Instant) -> bool {
        let Ok(windows) = self.windows.lock() else {
            return false;
        };
        match windows.get(identity) {
            Some(state) if !state.expired(self.window, now) => state.count < self.max_requests,
            _ => self.max_requests > 0,
        }
    }

    /// Consumes a slot, opening a fresh window if none exists or the
    /// prior one expired.
    pub fn record(&self, identity: &str) {
        self.record_at(identity, Instant::now());
    }

    pub fn record_at(&self, identity: &str, now: Instant) {
        let Ok(mut windows) = self.windows.lock() else {
            return;
        };
        let state = windows
            .entry(identity.to_string())
            .or_insert(WindowState { started: now, count: 0 });
        if state.expired(self.window, now) {
            *state = WindowState { started: now, count: 0 };
        }
        state.count = state.count.saturating_add(1);
    }

    /// Atomic check-then-record: the decision and the slot consumption
    /// happen under one lock acquisition.
    pub fn check_and_record(&self, identity: &str) -> AdmissionDecision {
        self.check_and_record_at(identity, Instant::now())
    }

    pub fn check_and_record_at(&self, identity: &str, now: Instant) -> AdmissionDecision {
        let Ok(mut windows) = self.windows.lock() else {
            return AdmissionDecision::Denied { retry_after: self.window };
        };
        let state = windows
            .entry(identity.to_string())
            .or_insert(WindowState { started: now, count: 0 });
        if state.expired(self.window, now) {
            *state = WindowState { started: now, count: 0 };
        }
        if state.count >= self.max_requests {
            let elapsed = now.duration_since(state.started);
            return AdmissionDecision::Denied {
                retry_after: self.window.saturating_sub(elapsed),
            };
        }
        state.count += 1;
        AdmissionDecision::Allowed { remaining: self.max_requests - state.count }
    }

    /// Time until the identity's current window resets. Zero when the
    /// identity has no live window.
    pub fn retry_after(&self, identity: &str) -> Duration {
        self.retry_after_at(identity, Instant::now())
    }

    pub fn retry_after_at(&self, identity: &str, now: Instant) -> Duration {
        let Ok(windows) = self.windows.lock() else {
            return self.window;
        };
        match windows.get(identity) {
            Some(state) if !state.expired(self.window, now) => {
                self.window.saturating_sub(now.duration_since(state.started))
            }
            _ => Duration::ZERO,
        }
    }

    /// Drops fully expired windows, bounding memory to currently active
    /// identities. Returns the number of entries removed. Intended to be
    /// driven by a periodic task owned by the caller.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Instant::now())
    }

    pub fn sweep_expired_at(&self, now: Instant) -> usize {
        let Ok(mut windows) = self.windows.lock() else {
            return 0;
        };
        let before = windows.len();
        windows.retain(|_, state| !state.expired(self.window, now));
        before - windows.len()
    }

    /// Number of identities currently tracked.
    pub fn tracked_identities(&self) -> usize {
        self.windows.lock().map(|windows| windows.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use super::{AdmissionDecision, AdmissionGate};

    const WINDOW: Duration = Duration::from_secs(60);

    #[test]
    fn eleventh_request_in_window_is_denied() {
        let gate = AdmissionGate::new(10, WINDOW);
        let start = Instant::now();

        for n in 0..10 {
            let decision = gate.check_and_record_at("customer-1", start);
            assert!(decision.is_allowed(), "request {} should be allowed", n + 1);
        }

        let decision = gate.check_and_record_at("customer-1", start + Duration::from_secs(5));
        assert_eq!(
            decision,
            AdmissionDecision::Denied { retry_after: Duration::from_secs(55) }
        );
    }

    #[test]
    fn window_expiry_re_admits_without_manual_reset() {
        let gate = AdmissionGate::new(2, WINDOW);
        let start = Instant::now();

        assert!(gate.check_and_record_at("customer-1", start).is_allowed());
        assert!(gate.check_and_record_at("customer-1", start).is_allowed());
        assert!(!gate.check_and_record_at("customer-1", start).is_allowed());

        let after_window = start + WINDOW;
        assert!(gate.check_and_record_at("customer-1", after_window).is_allowed());
    }

    #[test]
    fn identities_do_not_share_windows() {
        let gate = AdmissionGate::new(1, WINDOW);
        let start = Instant::now();

        assert!(gate.check_and_record_at("customer-1", start).is_allowed());
        assert!(gate.check_and_record_at("customer-2", start).is_allowed());
        assert!(!gate.check_and_record_at("customer-1", start).is_allowed());
    }

    #[test]
    fn pure_allow_does_not_consume_a_slot() {
        let gate = AdmissionGate::new(1, WINDOW);
        let start = Instant::now();

        assert!(gate.allow_at("customer-1", start));
        assert!(gate.allow_at("customer-1", start));
        gate.record_at("customer-1", start);
        assert!(!gate.allow_at("customer-1", start));
    }

    #[test]
    fn retry_after_counts_down_from_window_start() {
        let gate = AdmissionGate::new(1, WINDOW);
        let start = Instant::now();

        assert_eq!(gate.retry_after_at("customer-1", start), Duration::ZERO);
        gate.record_at("customer-1", start);
        assert_eq!(
            gate.retry_after_at("customer-1", start + Duration::from_secs(20)),
            Duration::from_secs(40)
        );
        assert_eq!(gate.retry_after_at("customer-1", start + WINDOW), Duration::ZERO);
    }

    #[test]
    fn sweep_removes_only_expired_entries() {
        let gate = AdmissionGate::new(5, WINDOW);
        let start = Instant::now();

        gate.record_at("stale", start);
        gate.record_at("fresh", start + Duration::from_secs(45));

        let removed = gate.sweep_expired_at(start + Duration::from_secs(70));
        assert_eq!(removed, 1);
        assert_eq!(gate.tracked_identities(), 1);
    }

    #[test]
    fn concurrent_checks_never_over_admit() {
        let gate = Arc::new(AdmissionGate::new(10, WINDOW));
        let mut handles = Vec::new();

        for _ in 0..40 {
            let gate = Arc::clone(&gate);
            handles.push(std::thread::spawn(move || {
                gate.check_and_record("customer-1").is_allowed()
            }));
        }

        let admitted = handles
            .into_iter()
            .filter_map(|handle| handle.join().ok())
            .filter(|allowed| *allowed)
            .count();
        assert_eq!(admitted, 10);
    }
}
