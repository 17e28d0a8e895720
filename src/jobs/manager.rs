// ABOUTME: Runs detached child processes and tracks them in a bounded, lock-protected store.
// ABOUTME: Output lines stream into each job's log; cancellation races are resolved explicitly.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot, watch};

use super::{CancelOutcome, JobError, JobRecord, JobStatus};
use crate::types::JobId;

type KillReply = oneshot::Sender<io::Result<()>>;

struct JobEntry {
    record: JobRecord,
    kill: mpsc::Sender<KillReply>,
    finished: watch::Receiver<bool>,
}

#[derive(Default)]
struct Store {
    order: VecDeque<JobId>,
    jobs: HashMap<JobId, JobEntry>,
}

impl Store {
    fn update(&mut self, id: &JobId, f: impl FnOnce(&mut JobRecord)) {
        if let Some(entry) = self.jobs.get_mut(id) {
            f(&mut entry.record);
        }
    }

    fn trim(&mut self, max_jobs: usize) {
        while self.order.len() > max_jobs {
            if let Some(oldest) = self.order.pop_front() {
                self.jobs.remove(&oldest);
            }
        }
    }
}

/// Tracks background jobs; keeps the most recent `max_jobs` records.
#[derive(Clone)]
pub struct JobManager {
    store: Arc<Mutex<Store>>,
    max_jobs: usize,
    sequence: Arc<AtomicU64>,
}

impl JobManager {
    pub fn new(max_jobs: usize) -> Self {
        Self {
            store: Arc::new(Mutex::new(Store::default())),
            max_jobs: max_jobs.max(1),
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start `program args...` in the background and return its job id.
    ///
    /// Launch failures do not surface here; they leave the job `failed`
    /// with the reason in its log.
    pub fn spawn(&self, program: &str, args: &[String]) -> Result<JobId, JobError> {
        if program.trim().is_empty() {
            return Err(JobError::EmptyCommand);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| JobError::NoRuntime)?;

        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let id = JobId::new(format!("job-{}-{}", Utc::now().format("%Y%m%d%H%M%S"), seq));
        let (kill_tx, kill_rx) = mpsc::channel(4);
        let (finished_tx, finished_rx) = watch::channel(false);

        {
            let mut store = self.store.lock();
            store.order.push_back(id.clone());
            store.jobs.insert(
                id.clone(),
                JobEntry {
                    record: JobRecord {
                        id: id.clone(),
                        program: program.to_string(),
                        args: args.to_vec(),
                        status: JobStatus::Pending,
                        started_at: Utc::now(),
                        finished_at: None,
                        exit_code: None,
                        pid: None,
                        logs: Vec::new(),
                    },
                    kill: kill_tx,
                    finished: finished_rx,
                },
            );
            store.trim(self.max_jobs);
        }

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        runtime.spawn(run_job(
            Arc::clone(&self.store),
            id.clone(),
            command,
            kill_rx,
            finished_tx,
        ));
        tracing::info!("started job {}: {} {}", id, program, args.join(" "));
        Ok(id)
    }

    pub fn get(&self, id: &JobId) -> Option<JobRecord> {
        self.store.lock().jobs.get(id).map(|e| e.record.clone())
    }

    /// Every tracked job, newest first.
    pub fn list(&self) -> Vec<JobRecord> {
        let store = self.store.lock();
        store
            .order
            .iter()
            .rev()
            .filter_map(|id| store.jobs.get(id).map(|e| e.record.clone()))
            .collect()
    }

    /// Log lines from index `since` onwards.
    pub fn logs(&self, id: &JobId, since: usize) -> Option<Vec<String>> {
        self.store
            .lock()
            .jobs
            .get(id)
            .map(|e| e.record.logs.iter().skip(since).cloned().collect())
    }

    /// Wait until the job's process has been reaped, then return its record.
    pub async fn wait(&self, id: &JobId) -> Option<JobRecord> {
        let mut finished = self.store.lock().jobs.get(id)?.finished.clone();
        // A closed channel also means the runner is gone.
        let _ = finished.wait_for(|done| *done).await;
        self.get(id)
    }

    /// Ask a job to stop.
    ///
    /// A job that already ended is reported as such and left untouched. A job
    /// that looked active is marked cancelled even when its process turned
    /// out to have exited in the meantime.
    pub async fn cancel(&self, id: &JobId) -> CancelOutcome {
        let kill = {
            let store = self.store.lock();
            let Some(entry) = store.jobs.get(id) else {
                return CancelOutcome::Error(format!("job {} not found", id));
            };
            if !entry.record.status.is_active() {
                return CancelOutcome::AlreadyFinished(entry.record.status);
            }
            entry.kill.clone()
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        let signalled = if kill.send(reply_tx).await.is_err() {
            false
        } else {
            match reply_rx.await {
                Ok(Ok(())) => true,
                Ok(Err(e)) if e.kind() == io::ErrorKind::InvalidInput => false,
                Ok(Err(e)) => {
                    tracing::error!("failed to signal job {}: {}", id, e);
                    return CancelOutcome::Error(e.to_string());
                }
                Err(_) => false,
            }
        };

        let mut store = self.store.lock();
        store.update(id, |record| {
            record.status = JobStatus::Cancelled;
            if record.finished_at.is_none() {
                record.finished_at = Some(Utc::now());
            }
            record.logs.push("[regsweep] job cancelled by user".to_string());
        });
        if signalled {
            tracing::info!("cancelled job {}", id);
            CancelOutcome::Cancelled
        } else {
            tracing::info!("job {} had already exited; marked as cancelled", id);
            CancelOutcome::AlreadyFinished(JobStatus::Cancelled)
        }
    }
}

async fn run_job(
    store: Arc<Mutex<Store>>,
    id: JobId,
    mut command: Command,
    mut kill_rx: mpsc::Receiver<KillReply>,
    finished: watch::Sender<bool>,
) {
    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            tracing::error!("failed to launch job {}: {}", id, e);
            store.lock().update(&id, |record| {
                if record.status != JobStatus::Cancelled {
                    record.status = JobStatus::Failed;
                }
                record.logs.push(format!("[regsweep] error launching job: {e}"));
                record.finished_at = Some(Utc::now());
            });
            let _ = finished.send(true);
            return;
        }
    };

    store.lock().update(&id, |record| {
        record.pid = child.id();
        if record.status == JobStatus::Pending {
            record.status = JobStatus::Running;
        }
    });

    let readers = [
        child.stdout.take().map(|out| tokio::spawn(pump_lines(Arc::clone(&store), id.clone(), out))),
        child.stderr.take().map(|err| tokio::spawn(pump_lines(Arc::clone(&store), id.clone(), err))),
    ];

    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            Some(reply) = kill_rx.recv() => {
                let _ = reply.send(child.start_kill());
            }
        }
    };
    // Anyone still waiting on a kill reply learns the process is gone.
    kill_rx.close();
    while let Ok(reply) = kill_rx.try_recv() {
        let _ = reply.send(Err(io::Error::new(io::ErrorKind::InvalidInput, "process exited")));
    }

    for reader in readers.into_iter().flatten() {
        let _ = reader.await;
    }

    store.lock().update(&id, |record| {
        match &status {
            Ok(exit) => {
                record.exit_code = exit.code();
                if record.status != JobStatus::Cancelled {
                    record.status = if exit.success() {
                        JobStatus::Completed
                    } else {
                        JobStatus::Failed
                    };
                }
            }
            Err(e) => {
                record.logs.push(format!("[regsweep] error waiting for job: {e}"));
                if record.status != JobStatus::Cancelled {
                    record.status = JobStatus::Failed;
                }
            }
        }
        if record.finished_at.is_none() {
            record.finished_at = Some(Utc::now());
        }
    });
    tracing::debug!("job {} finished", id);
    let _ = finished.send(true);
}

async fn pump_lines<R>(store: Arc<Mutex<Store>>, id: JobId, stream: R)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        store.lock().update(&id, |record| record.logs.push(line));
    }
}
