use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info};

use crate::pipeline::progress::{ProgressEvent, ProgressReporter};
use crate::pipeline::{Pipeline, PipelineContext};
use crate::termination::CancellationToken;
use crate::worker::job::{ImageTask, ProcessingResult, SkipReason, TaskResult};

/// Fixed set of worker threads pulling images from one shared queue.
///
/// Every submitted task produces exactly one `TaskResult`. Once the run is
/// cancelled, queued tasks are drained as `Skipped(Cancelled)` without
/// touching the pipeline.
pub struct WorkerPool {
    task_sender: Sender<ImageTask>,
    result_receiver: Receiver<TaskResult>,
    workers: Vec<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl WorkerPool {
    /// # Panics
    /// Panics if `worker_count` is 0.
    pub fn new(
        pipeline: Arc<Pipeline>,
        worker_count: usize,
        cancel: CancellationToken,
        progress: Arc<dyn ProgressReporter>,
    ) -> Self {
        assert!(worker_count > 0, "worker_count must be > 0");
        let (task_sender, task_receiver) = bounded::<ImageTask>(worker_count * 2);
        let (result_sender, result_receiver) = bounded::<TaskResult>(worker_count * 2);

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let task_rx = task_receiver.clone();
            let result_tx = result_sender.clone();
            let worker_pipeline = Arc::clone(&pipeline);
            let worker_cancel = cancel.clone();
            let worker_progress = Arc::clone(&progress);

            let handle = thread::Builder::new()
                .name(format!("picscribe-worker-{}", worker_id))
                .spawn(move || {
                    run_worker(
                        worker_id,
                        task_rx,
                        result_tx,
                        worker_pipeline,
                        worker_cancel,
                        worker_progress,
                    );
                });

            match handle {
                Ok(handle) => workers.push(handle),
                Err(e) => error!("Failed to start worker {}: {}", worker_id, e),
            }
        }

        info!("Started {} workers", workers.len());

        Self {
            task_sender,
            result_receiver,
            workers,
            cancel,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Feeds `tasks` to the workers and blocks until each one has reached a
    /// terminal state, then stops the workers.
    pub fn run(self, tasks: Vec<ImageTask>) -> Vec<TaskResult> {
        let total = tasks.len();
        let WorkerPool {
            task_sender,
            result_receiver,
            workers,
            cancel: _,
        } = self;

        let mut results = Vec::with_capacity(total);

        thread::scope(|scope| {
            // Feeding from a separate thread keeps the bounded queues from
            // deadlocking against the result loop below.
            scope.spawn(move || {
                for task in tasks {
                    if task_sender.send(task).is_err() {
                        error!("All workers stopped before the queue was drained");
                        break;
                    }
                }
                // Dropping the sender lets idle workers exit.
            });

            while results.len() < total {
                match result_receiver.recv() {
                    Ok(result) => results.push(result),
                    Err(_) => {
                        error!(
                            "Workers stopped after {} of {} results",
                            results.len(),
                            total
                        );
                        break;
                    }
                }
            }
        });

        for (i, worker) in workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
        results
    }
}

fn run_worker(
    worker_id: usize,
    task_receiver: Receiver<ImageTask>,
    result_sender: Sender<TaskResult>,
    pipeline: Arc<Pipeline>,
    cancel: CancellationToken,
    progress: Arc<dyn ProgressReporter>,
) {
    debug!("Worker {} started", worker_id);

    loop {
        match task_receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(task) => {
                let source_path = task.full_path();
                debug!("Worker {} processing {}", worker_id, source_path.display());
                let start = Instant::now();

                let outcome = if cancel.is_cancelled() {
                    let reason = SkipReason::Cancelled;
                    progress.report(&task, ProgressEvent::Skipped { reason });
                    ProcessingResult::Skipped(reason)
                } else {
                    let _in_flight = cancel.track();
                    let (outcome, _ctx) = pipeline.run(PipelineContext::new(task), progress.as_ref());
                    outcome
                };

                let result = TaskResult {
                    source_path,
                    outcome,
                    elapsed: start.elapsed(),
                };

                if let Err(e) = result_sender.send(result) {
                    error!("Worker {} failed to send result: {}", worker_id, e);
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Worker {} task queue closed", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}
