use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

/// Process-wide allocator used when no explicit one is supplied.
static GLOBAL: LazyLock<IdentityAllocator> = LazyLock::new(IdentityAllocator::new);

/// Identity of an instrumented connection, unique per allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

/// Identity of an instrumented statement (plain or parameterized).
///
/// Cursors produced by a statement carry their statement's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StatementId(u64);

impl ConnectionId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl StatementId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for StatementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Default)]
struct Counters {
    connections: AtomicU64,
    statements: AtomicU64,
}

/// Monotonic identity counters for connections and statements.
///
/// Cloning shares the counters. Values start at 1, are never reused, and
/// concurrent callers never observe the same value.
#[derive(Debug, Clone, Default)]
pub struct IdentityAllocator {
    counters: Arc<Counters>,
}

impl IdentityAllocator {
    /// Create an allocator with fresh counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide allocator, created on first use.
    pub fn global() -> Self {
        GLOBAL.clone()
    }

    pub fn next_connection(&self) -> ConnectionId {
        ConnectionId(self.counters.connections.fetch_add(1, Ordering::Relaxed) + 1)
    }

    pub fn next_statement(&self) -> StatementId {
        StatementId(self.counters.statements.fetch_add(1, Ordering::Relaxed) + 1)
    }
}
