//! Per-address authentication failure tracking
//!
//! Clients that fail username/password authentication repeatedly are locked
//! out for a fixed window. A locked-out client is dropped before the SOCKS5
//! greeting, so it cannot even start a negotiation. Successful logins do not
//! reset the failure count; once an address has crossed the threshold, every
//! further failure re-arms the lockout window.

use crate::relay::consts::{LOCKOUT_DURATION, MAX_AUTH_FAILURES};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Failure counter and lockout window per client address.
///
/// Entries are retained for the lifetime of the relay. The table is sized
/// by distinct client addresses, which on a point-to-point vehicle link is
/// a handful at most.
#[derive(Debug)]
pub struct LockoutTable {
    max_failures: u32,
    window: Duration,
    entries: Mutex<HashMap<IpAddr, LockoutEntry>>,
}

#[derive(Debug, Clone, Copy)]
struct LockoutEntry {
    failures: u32,
    last_failure: Instant,
}

impl LockoutTable {
    /// Create a table with an explicit threshold and window.
    pub fn new(max_failures: u32, window: Duration) -> Self {
        LockoutTable {
            max_failures,
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Whether `addr` is currently locked out.
    ///
    /// An address is locked out when it has reached the failure threshold
    /// and its most recent failure is still inside the window.
    pub fn is_locked_out(&self, addr: IpAddr) -> bool {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        match entries.get(&addr) {
            Some(entry) => {
                entry.failures >= self.max_failures && entry.last_failure.elapsed() < self.window
            }
            None => false,
        }
    }

    /// Record an authentication failure for `addr`.
    ///
    /// # Returns
    ///
    /// The total number of failures recorded for this address.
    pub fn record_failure(&self, addr: IpAddr) -> u32 {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let entry = entries.entry(addr).or_insert(LockoutEntry {
            failures: 0,
            last_failure: Instant::now(),
        });
        entry.failures += 1;
        entry.last_failure = Instant::now();
        entry.failures
    }

    /// Total failures recorded for `addr`.
    pub fn failures_for(&self, addr: IpAddr) -> u32 {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        entries.get(&addr).map(|e| e.failures).unwrap_or(0)
    }
}

impl Default for LockoutTable {
    fn default() -> Self {
        LockoutTable::new(MAX_AUTH_FAILURES, LOCKOUT_DURATION)
    }
}
