use std::sync::atomic::{AtomicI64, Ordering};

/// Strategy for allocating outbound request ids.
///
/// The endpoint only ever issues integer ids; peers may use strings for
/// their own calls, which never pass through this seam.
pub trait IdGenerator: Send + Sync {
    /// Produce the next id. Must never repeat within one endpoint's
    /// lifetime.
    fn next_id(&self) -> i64;
}

/// Strictly increasing ids starting from 0.
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    counter: AtomicI64,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> i64 {
        self.counter.fetch_add(1, Ordering::SeqCst)
    }
}
