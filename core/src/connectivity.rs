//! Reachability signal consulted before every `execute`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Answers "is a network currently reachable".
pub trait Connectivity: Send + Sync {
    fn is_connected(&self) -> bool;
}

/// Shared online flag fed by the host's platform reachability callbacks.
///
/// Clones share the same flag, so the host keeps one clone and flips it while
/// the `RequestExecutor` reads another.
#[derive(Debug, Clone)]
pub struct Reachability {
    online: Arc<AtomicBool>,
}

impl Reachability {
    pub fn new(online: bool) -> Self {
        Self {
            online: Arc::new(AtomicBool::new(online)),
        }
    }

    pub fn set_connected(&self, online: bool) {
        let previous = self.online.swap(online, Ordering::AcqRel);
        if previous != online {
            tracing::info!(target: "api_core::connectivity", online, "reachability changed");
        }
    }
}

impl Default for Reachability {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Connectivity for Reachability {
    fn is_connected(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }
}

/// For hosts without a reachability source.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysConnected;

impl Connectivity for AlwaysConnected {
    fn is_connected(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let host = Reachability::default();
        let reader = host.clone();
        assert!(reader.is_connected());
        host.set_connected(false);
        assert!(!reader.is_connected());
        host.set_connected(true);
        assert!(reader.is_connected());
    }
}
