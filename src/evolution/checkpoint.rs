//! Background checkpoint writer
//!
//! Checkpoints are captured on the simulation thread (a cheap copy of the
//! weights) and written to disk by a dedicated worker fed through a channel,
//! so file I/O never stalls a tick. A failed write is reported and logged;
//! it never stops training.

use std::{
    path::{Path, PathBuf},
    thread::{self, JoinHandle},
};

use crossbeam_channel::{Receiver, Sender};

use crate::policy::NetworkDocument;

/// Why a checkpoint was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointKind {
    /// Elite of a finished generation
    Elite {
        /// Generation the agent was elite in
        generation: u64,
        /// Position among the elites, best first
        rank: usize,
    },
    /// Periodic full-population snapshot
    AutoSave {
        /// Snapshot number, starting at 1
        sequence: u64,
    },
}

/// One network to write
#[derive(Debug, Clone)]
pub struct CheckpointJob {
    /// Reason for the checkpoint
    pub kind: CheckpointKind,
    /// Agent slot the weights came from
    pub agent_index: usize,
    /// Weights to write
    pub document: NetworkDocument,
}

/// Outcome of one write
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointReport {
    /// Reason for the checkpoint
    pub kind: CheckpointKind,
    /// Agent slot the weights came from
    pub agent_index: usize,
    /// Destination file
    pub path: PathBuf,
    /// Error message when the write failed
    pub error: Option<String>,
}

impl CheckpointReport {
    /// Whether the file was written
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

enum Command {
    Write(CheckpointJob),
    Flush(Sender<()>),
}

/// Handle to the checkpoint worker thread
///
/// Dropping the handle finishes any queued writes and joins the worker.
pub struct Checkpointer {
    dir: PathBuf,
    sender: Option<Sender<Command>>,
    reports: Receiver<CheckpointReport>,
    worker: Option<JoinHandle<()>>,
}

impl Checkpointer {
    /// Start a worker writing under `dir`
    pub fn spawn<P: Into<PathBuf>>(dir: P) -> Self {
        let dir = dir.into();
        let (sender, commands) = crossbeam_channel::unbounded::<Command>();
        let (report_sender, reports) = crossbeam_channel::unbounded();

        let worker_dir = dir.clone();
        let worker = thread::spawn(move || {
            for command in commands {
                match command {
                    Command::Write(job) => {
                        let report = write_checkpoint(&worker_dir, job);
                        // Nobody listening is fine
                        let _ = report_sender.send(report);
                    }
                    Command::Flush(ack) => {
                        let _ = ack.send(());
                    }
                }
            }
        });

        Self { dir, sender: Some(sender), reports, worker: Some(worker) }
    }

    /// Directory checkpoints are written to
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Queue a write; returns immediately
    pub fn submit(&self, job: CheckpointJob) {
        let sent = self.sender.as_ref().map(|s| s.send(Command::Write(job)));
        if !matches!(sent, Some(Ok(()))) {
            tracing::warn!("Checkpoint worker is gone; dropping checkpoint");
        }
    }

    /// Block until every write queued so far has finished
    pub fn flush(&self) {
        let Some(sender) = &self.sender else {
            return;
        };
        let (ack, done) = crossbeam_channel::bounded(1);
        if sender.send(Command::Flush(ack)).is_ok() {
            let _ = done.recv();
        }
    }

    /// Reports of writes finished since the last call
    pub fn drain_reports(&self) -> Vec<CheckpointReport> {
        self.reports.try_iter().collect()
    }
}

impl Drop for Checkpointer {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop once the queue is empty
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("Checkpoint worker panicked");
            }
        }
    }
}

/// File a checkpoint of `kind` for `agent_index` is written to
pub fn checkpoint_path(dir: &Path, kind: CheckpointKind, agent_index: usize) -> PathBuf {
    match kind {
        CheckpointKind::Elite { generation, rank } => dir
            .join(format!("generation_{:04}", generation))
            .join(format!("elite_{:02}_agent_{:02}.json", rank, agent_index)),
        CheckpointKind::AutoSave { sequence } => dir
            .join(format!("autosave_{:04}", sequence))
            .join(format!("agent_{:02}.json", agent_index)),
    }
}

fn write_checkpoint(dir: &Path, job: CheckpointJob) -> CheckpointReport {
    let path = checkpoint_path(dir, job.kind, job.agent_index);
    let error = match job.document.save(&path) {
        Ok(()) => {
            tracing::debug!("Checkpoint written to {}", path.display());
            None
        }
        Err(e) => {
            tracing::warn!("Failed to write checkpoint {}: {}", path.display(), e);
            Some(e.to_string())
        }
    };
    CheckpointReport { kind: job.kind, agent_index: job.agent_index, path, error }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::EngineConfig,
        policy::{Policy, PolicyNetwork},
    };

    fn document() -> NetworkDocument {
        let config = EngineConfig::new().input_size(3).hidden_sizes(4, 4);
        let mut policy = Policy::from_config(&config, 0).unwrap();
        policy.to_document()
    }

    #[test]
    fn test_writes_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        let checkpointer = Checkpointer::spawn(dir.path());

        let kind = CheckpointKind::Elite { generation: 3, rank: 0 };
        checkpointer.submit(CheckpointJob { kind, agent_index: 5, document: document() });
        checkpointer.flush();

        let reports = checkpointer.drain_reports();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].is_ok());
        assert_eq!(reports[0].path, checkpoint_path(dir.path(), kind, 5));

        let loaded = NetworkDocument::load(&reports[0].path).unwrap();
        assert_eq!(loaded, document());
    }

    #[test]
    fn test_failed_write_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        // A file where the checkpoint directory should be
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, b"not a directory").unwrap();

        let checkpointer = Checkpointer::spawn(&blocked);
        let kind = CheckpointKind::AutoSave { sequence: 1 };
        checkpointer.submit(CheckpointJob { kind, agent_index: 0, document: document() });
        checkpointer.flush();

        let reports = checkpointer.drain_reports();
        assert_eq!(reports.len(), 1);
        assert!(!reports[0].is_ok());

        // The worker is still alive after a failure
        checkpointer.submit(CheckpointJob { kind, agent_index: 1, document: document() });
        checkpointer.flush();
        assert_eq!(checkpointer.drain_reports().len(), 1);
    }

    #[test]
    fn test_drop_finishes_queued_writes() {
        let dir = tempfile::tempdir().unwrap();
        let kind = CheckpointKind::AutoSave { sequence: 7 };
        {
            let checkpointer = Checkpointer::spawn(dir.path());
            for agent_index in 0..3 {
                checkpointer.submit(CheckpointJob { kind, agent_index, document: document() });
            }
        }
        for agent_index in 0..3 {
            assert!(checkpoint_path(dir.path(), kind, agent_index).exists());
        }
    }

    #[test]
    fn test_checkpoint_paths() {
        let dir = Path::new("ckpt");
        assert_eq!(
            checkpoint_path(dir, CheckpointKind::Elite { generation: 12, rank: 1 }, 4),
            Path::new("ckpt/generation_0012/elite_01_agent_04.json")
        );
        assert_eq!(
            checkpoint_path(dir, CheckpointKind::AutoSave { sequence: 2 }, 0),
            Path::new("ckpt/autosave_0002/agent_00.json")
        );
    }
}
