use dashmap::DashMap;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};
use tracing::trace;

pub const DEFAULT_PENDING_WINDOW: Duration = Duration::from_secs(10);

/// Everything needed to route an upstream answer back to its requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub src_ip: Ipv4Addr,
    pub src_port: u16,
    /// Synthetic resolver address the query was sent to; the answer is
    /// framed as coming from here.
    pub dst_ip: Ipv4Addr,
    pub inserted_at: Instant,
    pub was_rewritten: bool,
    pub original_qname: Option<Vec<u8>>,
}

impl PendingRequest {
    pub fn new(src_ip: Ipv4Addr, src_port: u16, dst_ip: Ipv4Addr) -> Self {
        Self {
            src_ip,
            src_port,
            dst_ip,
            inserted_at: Instant::now(),
            was_rewritten: false,
            original_qname: None,
        }
    }

    pub fn rewritten(mut self, original_qname: Vec<u8>) -> Self {
        self.was_rewritten = true;
        self.original_qname = Some(original_qname);
        self
    }

    fn is_expired(&self, window: Duration) -> bool {
        self.inserted_at.elapsed() > window
    }
}

/// In-flight queries keyed by DNS transaction ID.
///
/// The ID is the only correlation key: a new query reusing an ID in flight
/// replaces the older slot.
pub struct PendingRequestTable {
    entries: DashMap<u16, PendingRequest>,
    window: Duration,
}

impl Default for PendingRequestTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingRequestTable {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_PENDING_WINDOW)
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            window,
        }
    }

    /// Stores `request` under `id` and sweeps expired slots. Returns the
    /// request it displaced, if any.
    pub fn insert(&self, id: u16, request: PendingRequest) -> Option<PendingRequest> {
        let displaced = self.entries.insert(id, request);
        if displaced.is_some() {
            trace!(id, "Pending slot overwritten");
        }
        self.sweep_expired();
        displaced
    }

    /// Atomic take. Entries older than the window are never returned.
    pub fn remove(&self, id: u16) -> Option<PendingRequest> {
        let (_, request) = self.entries.remove(&id)?;
        if request.is_expired(self.window) {
            trace!(id, "Pending slot expired before its answer");
            return None;
        }
        Some(request)
    }

    pub fn sweep_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, r| !r.is_expired(self.window));
        let evicted = before.saturating_sub(self.entries.len());
        if evicted > 0 {
            trace!(evicted, "Expired pending requests evicted");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}
