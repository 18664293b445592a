//! Bounded waiting on blocking collaborator calls.
//!
//! The call runs on a helper thread; the worker waits on a one-slot
//! channel. When the deadline passes the worker moves on and the helper's
//! eventual result is dropped. Abandoned helpers keep running until the
//! call returns, so each stage caps how many helpers may be alive at once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError};
use log::warn;

use crate::error::ProcessError;

/// Upper bound on live helper threads for one stage, counting both the
/// ones being waited on and the ones abandoned after a timeout.
#[derive(Debug)]
pub struct HelperLimit {
    outstanding: AtomicUsize,
    max: usize,
}

impl HelperLimit {
    pub fn new(max: usize) -> Self {
        Self {
            outstanding: AtomicUsize::new(0),
            max: max.max(1),
        }
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    fn acquire(self: &Arc<Self>) -> Option<HelperSlot> {
        self.outstanding
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.max).then_some(n + 1)
            })
            .ok()
            .map(|_| HelperSlot(Arc::clone(self)))
    }
}

/// Released when the helper thread ends, however it ends.
struct HelperSlot(Arc<HelperLimit>);

impl Drop for HelperSlot {
    fn drop(&mut self) {
        self.0.outstanding.fetch_sub(1, Ordering::SeqCst);
    }
}

pub fn run_bounded<T, F>(
    name: &str,
    timeout: Duration,
    limit: &Arc<HelperLimit>,
    f: F,
) -> Result<T, ProcessError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ProcessError> + Send + 'static,
{
    let slot = limit.acquire().ok_or_else(|| ProcessError::Command {
        program: name.to_string(),
        message: format!(
            "{} earlier calls are still running past their deadline",
            limit.outstanding()
        ),
    })?;
    let (tx, rx) = bounded(1);

    thread::Builder::new()
        .name(format!("picscribe-{}", name))
        .spawn(move || {
            let _slot = slot;
            // Receiver may be gone after a timeout.
            let _ = tx.send(f());
        })
        .map_err(|e| ProcessError::Command {
            program: name.to_string(),
            message: format!("failed to spawn helper thread: {}", e),
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            warn!(
                "Abandoning {} call after {:?}; it keeps running in the background ({} live)",
                name,
                timeout,
                limit.outstanding()
            );
            Err(ProcessError::Timeout(timeout))
        }
        Err(RecvTimeoutError::Disconnected) => Err(ProcessError::Command {
            program: name.to_string(),
            message: "helper thread panicked".to_string(),
        }),
    }
}
