//! Session identity

use std::sync::atomic::{AtomicU32, Ordering};

/// Opaque session identifier, unique within an engine instance for the
/// lifetime of the session. Never reused while the session it names exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct SessionId(pub u32);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Monotonically increasing allocator. Wrapping is acceptable only in the
/// sense that a 32-bit counter wrapping after 4 billion sessions is outside
/// any realistic process lifetime; we do not special-case it.
#[derive(Debug, Default)]
pub struct SessionIdAllocator {
    next: AtomicU32,
}

impl SessionIdAllocator {
    pub fn new() -> Self {
        Self {
            next: AtomicU32::new(1),
        }
    }

    pub fn allocate(&self) -> SessionId {
        SessionId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}
