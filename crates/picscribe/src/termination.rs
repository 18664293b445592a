//! Interrupt handling and scratch-space cleanup.
//!
//! A `ctrlc` handler forwards the signal over a channel to a dedicated
//! listener thread. The listener cancels the shared token, waits up to the
//! grace period for in-flight images, removes the scratch directory and
//! exits with status 130.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::bounded;
use log::{debug, info, warn};

use crate::error::PicscribeError;

pub const INTERRUPTED_EXIT_CODE: i32 = 130;

const IDLE_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Default)]
struct TokenState {
    cancelled: AtomicBool,
    in_flight: AtomicUsize,
}

/// Run-wide cancellation flag shared by the pool, the pipeline and the
/// signal listener. Also counts images currently inside the pipeline so the
/// listener knows when the workers are idle.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    state: Arc<TokenState>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Marks one image as in flight until the guard is dropped.
    pub fn track(&self) -> InFlightGuard {
        self.state.in_flight.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            state: Arc::clone(&self.state),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.state.in_flight.load(Ordering::SeqCst)
    }

    /// Blocks until nothing is in flight or `grace` elapses. Returns whether
    /// the workers went idle in time.
    pub fn wait_idle(&self, grace: Duration) -> bool {
        let deadline = Instant::now() + grace;
        loop {
            if self.in_flight() == 0 {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep(IDLE_POLL.min(deadline - now));
        }
    }
}

pub struct InFlightGuard {
    state: Arc<TokenState>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct TerminationController {
    token: CancellationToken,
    scratch_dir: PathBuf,
    grace_period: Duration,
    cleaned: AtomicBool,
}

impl TerminationController {
    pub fn new(scratch_dir: impl AsRef<Path>, grace_period: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            scratch_dir: scratch_dir.as_ref().to_path_buf(),
            grace_period,
            cleaned: AtomicBool::new(false),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Installs the process-wide handler for SIGINT, SIGTERM and SIGHUP
    /// and starts the listener thread. Only one handler may be installed
    /// per process.
    pub fn install(self: &Arc<Self>) -> Result<JoinHandle<()>, PicscribeError> {
        let (signal_tx, signal_rx) = bounded::<()>(1);

        ctrlc::set_handler(move || {
            // A second signal while the first is handled is dropped.
            let _ = signal_tx.try_send(());
        })?;

        let controller = Arc::clone(self);
        thread::Builder::new()
            .name("picscribe-signal".to_string())
            .spawn(move || {
                if signal_rx.recv().is_ok() {
                    controller.interrupt();
                    process::exit(INTERRUPTED_EXIT_CODE);
                }
            })
            .map_err(|source| PicscribeError::Io {
                path: self.scratch_dir.clone(),
                source,
            })
    }

    /// Cancels the run, gives in-flight images the grace period to settle
    /// and removes the scratch directory. Does not exit the process.
    pub fn interrupt(&self) {
        warn!("Interrupt received, stopping workers");
        self.token.cancel();

        if self.token.wait_idle(self.grace_period) {
            debug!("Workers idle");
        } else {
            warn!(
                "{} image(s) still in flight after {:?}, abandoning them",
                self.token.in_flight(),
                self.grace_period
            );
        }

        self.cleanup();
    }

    /// Removes the scratch directory. Safe to call more than once and from
    /// both the listener and the normal completion path; only the first
    /// call does any work.
    pub fn cleanup(&self) {
        if self.cleaned.swap(true, Ordering::SeqCst) {
            return;
        }

        match std::fs::remove_dir_all(&self.scratch_dir) {
            Ok(()) => info!("Removed scratch directory {}", self.scratch_dir.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove scratch directory {}: {}",
                self.scratch_dir.display(),
                e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_token_clones_share_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_in_flight_guard() {
        let token = CancellationToken::new();
        {
            let _a = token.track();
            let _b = token.track();
            assert_eq!(token.in_flight(), 2);
        }
        assert_eq!(token.in_flight(), 0);
        assert!(token.wait_idle(Duration::from_millis(10)));
    }

    #[test]
    fn test_wait_idle_gives_up_after_grace() {
        let token = CancellationToken::new();
        let _guard = token.track();

        let start = Instant::now();
        assert!(!token.wait_idle(Duration::from_millis(100)));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_wait_idle_returns_when_worker_finishes() {
        let token = CancellationToken::new();
        let guard = token.track();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            drop(guard);
        });

        assert!(token.wait_idle(Duration::from_secs(5)));
        handle.join().unwrap();
    }

    #[test]
    fn test_interrupt_cancels_and_cleans_up() {
        let temp_dir = TempDir::new().unwrap();
        let scratch = temp_dir.path().join("temp");
        std::fs::create_dir_all(&scratch).unwrap();
        std::fs::write(scratch.join("a-0123.png"), b"png").unwrap();

        let controller = TerminationController::new(&scratch, Duration::from_millis(100));
        let token = controller.token();

        controller.interrupt();

        assert!(token.is_cancelled());
        assert!(!scratch.exists());
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let scratch = temp_dir.path().join("temp");
        std::fs::create_dir_all(&scratch).unwrap();

        let controller = TerminationController::new(&scratch, Duration::ZERO);
        controller.cleanup();
        assert!(!scratch.exists());

        // Recreated after the first cleanup; the second call must not touch it.
        std::fs::create_dir_all(&scratch).unwrap();
        controller.cleanup();
        assert!(scratch.exists());
    }

    #[test]
    fn test_cleanup_missing_dir_is_fine() {
        let temp_dir = TempDir::new().unwrap();
        let controller = TerminationController::new(temp_dir.path().join("never"), Duration::ZERO);
        controller.cleanup();
    }
}
