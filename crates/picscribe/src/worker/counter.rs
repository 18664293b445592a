use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic count of images that reached `Succeeded`, shared by all
/// workers for progress lines.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments and returns the new value.
    pub fn inc(&self) -> u64 {
        self.value.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::SeqCst)
    }
}
