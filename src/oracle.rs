//! Usage-oracle boundary
//!
//! The oracle answers "is this definition currently referenced by any stored
//! content or running process?" against committed repository state. Queries may
//! block on repository-wide scans, so deletion checks wrap them in a timeout;
//! a timed-out query is treated as "in use" (fail-safe).

use std::collections::HashSet;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::namespace::QName;

/// External collaborator reporting live references to a definition.
///
/// Must be safe to call concurrently and must reflect committed state only.
pub trait UsageOracle: Send + Sync {
    fn is_in_use(&self, name: &QName) -> bool;
}

/// Oracle that reports nothing in use
pub struct NoUsageOracle;

impl UsageOracle for NoUsageOracle {
    fn is_in_use(&self, _name: &QName) -> bool {
        false
    }
}

/// Oracle over a fixed set of in-use names; useful for tests and CLI dry runs
pub struct FixedUsageOracle {
    in_use: HashSet<QName>,
}

impl FixedUsageOracle {
    pub fn new(in_use: impl IntoIterator<Item = QName>) -> Self {
        Self {
            in_use: in_use.into_iter().collect(),
        }
    }
}

impl UsageOracle for FixedUsageOracle {
    fn is_in_use(&self, name: &QName) -> bool {
        self.in_use.contains(name)
    }
}

/// Query the oracle with a deadline. On timeout the query is abandoned (it
/// finishes on its helper thread and is discarded) and the answer is "in use".
pub fn is_in_use_within(oracle: &Arc<dyn UsageOracle>, name: &QName, timeout: Duration) -> bool {
    let (tx, rx) = mpsc::channel();
    let oracle = Arc::clone(oracle);
    let name = name.clone();
    let query_name = name.clone();
    thread::spawn(move || {
        let _ = tx.send(oracle.is_in_use(&name));
    });

    match rx.recv_timeout(timeout) {
        Ok(in_use) => in_use,
        Err(_) => {
            tracing::warn!(definition = %query_name, timeout_ms = timeout.as_millis() as u64,
                "usage oracle query timed out; assuming in use");
            true
        }
    }
}
