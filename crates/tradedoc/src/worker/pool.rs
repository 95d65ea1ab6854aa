use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use log::{debug, error, info};

use crate::error::WorkerError;
use crate::pipeline::{Pipeline, PipelineContext};
use crate::worker::job::{Job, JobResult};

/// Fixed set of worker threads draining a bounded job queue.
///
/// Each worker runs one pipeline at a time. Results are delivered on an
/// unbounded channel so a slow consumer never stalls the workers.
pub struct WorkerPool {
    job_sender: Sender<Job>,
    job_receiver: Receiver<Job>,
    result_receiver: Receiver<JobResult>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    capacity: usize,
}

impl WorkerPool {
    /// Spawns `worker_count` workers sharing `pipeline`, with room for
    /// `queue_capacity` pending jobs.
    pub fn new(pipeline: Arc<Pipeline>, worker_count: usize, queue_capacity: usize) -> Result<Self, WorkerError> {
        if worker_count == 0 {
            return Err(WorkerError::SpawnFailed("worker_count must be > 0".to_string()));
        }
        let capacity = queue_capacity.max(1);
        let (job_sender, job_receiver) = bounded::<Job>(capacity);
        let (result_sender, result_receiver) = unbounded::<JobResult>();
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let job_rx = job_receiver.clone();
            let result_tx = result_sender.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_pipeline = Arc::clone(&pipeline);

            let handle = thread::Builder::new()
                .name(format!("tradedoc-worker-{}", worker_id))
                .spawn(move || run_worker(worker_id, job_rx, result_tx, shutdown_flag, worker_pipeline))
                .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

            workers.push(handle);
        }

        info!("Started {} workers (queue capacity {})", worker_count, capacity);

        Ok(Self {
            job_sender,
            job_receiver,
            result_receiver,
            workers,
            shutdown,
            capacity,
        })
    }

    /// Queues a job, blocking while the queue is full.
    pub fn submit(&self, job: Job) -> Result<(), WorkerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ChannelClosed);
        }

        self.job_sender.send(job).map_err(|_| WorkerError::ChannelClosed)
    }

    /// Queues a job, or rejects it immediately when the queue is full.
    pub fn try_submit(&self, job: Job) -> Result<(), WorkerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ChannelClosed);
        }

        self.job_sender.try_send(job).map_err(|e| match e {
            TrySendError::Full(_) => WorkerError::QueueFull {
                capacity: self.capacity,
            },
            TrySendError::Disconnected(_) => WorkerError::ChannelClosed,
        })
    }

    pub fn pending(&self) -> usize {
        self.job_sender.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn try_recv_result(&self) -> Option<JobResult> {
        self.result_receiver.try_recv().ok()
    }

    pub fn recv_result(&self) -> Option<JobResult> {
        self.result_receiver.recv().ok()
    }

    pub fn recv_result_timeout(&self, timeout: Duration) -> Option<JobResult> {
        self.result_receiver.recv_timeout(timeout).ok()
    }

    /// Stops workers after their current job. Queued jobs stay in the queue
    /// until [`drain_pending`](Self::drain_pending) takes them.
    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Removes and returns every job still waiting in the queue.
    pub fn drain_pending(&self) -> Vec<Job> {
        let jobs: Vec<Job> = self.job_receiver.try_iter().collect();
        if !jobs.is_empty() {
            info!("Drained {} undelivered jobs", jobs.len());
        }
        jobs
    }

    /// Waits for the workers to exit. Without a prior shutdown they first
    /// work through the queue. Returns the jobs no worker picked up.
    pub fn wait(self) -> Vec<Job> {
        // Drop sender to signal workers to exit
        drop(self.job_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
        self.job_receiver.try_iter().collect()
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

fn run_worker(
    worker_id: usize,
    job_receiver: Receiver<Job>,
    result_sender: Sender<JobResult>,
    shutdown: Arc<AtomicBool>,
    pipeline: Arc<Pipeline>,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match job_receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(job) => {
                debug!("Worker {} processing job {} for {}", worker_id, job.id, job.document_id);

                let (result, _ctx) = pipeline.run(PipelineContext::new(job));

                if let Err(e) = result_sender.send(result) {
                    error!("Worker {} failed to send result: {}", worker_id, e);
                    break;
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                debug!("Worker {} job channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}
