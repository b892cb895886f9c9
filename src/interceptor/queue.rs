//! Deferred recording queue.
//!
//! Define edges are recorded one scheduling turn after the observed call
//! so the synchronous define itself is not slowed. A single consumer
//! drains jobs in FIFO order, which keeps edge recording and the
//! trailing initialized notices deterministic.

use tokio::sync::{mpsc, oneshot};

use super::writer::GraphWriter;

/// One unit of deferred recording work.
#[derive(Debug)]
pub(crate) enum Job {
    RecordDefine {
        name: String,
        deps: Vec<String>,
        object_body: bool,
    },
    MarkInitialized {
        name: String,
    },
    /// Test and shutdown aid: acked once every prior job has run.
    Flush(oneshot::Sender<()>),
}

/// Handle to the single-consumer FIFO recording queue.
#[derive(Clone)]
pub(crate) struct WorkQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl WorkQueue {
    /// Spawns the consumer task and returns the submission handle.
    pub fn spawn(writer: GraphWriter) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                match job {
                    Job::RecordDefine {
                        name,
                        deps,
                        object_body,
                    } => writer.record_define(&name, &deps, object_body),
                    Job::MarkInitialized { name } => writer.record_init(&name),
                    Job::Flush(ack) => {
                        let _ = ack.send(());
                    }
                }
            }
        });
        Self { tx }
    }

    /// Enqueues a job. False when the consumer is gone, in which case the
    /// caller logs and drops the observation.
    pub fn push(&self, job: Job) -> bool {
        self.tx.send(job).is_ok()
    }

    /// Resolves once every job enqueued before this call has run.
    pub async fn settle(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(Job::Flush(ack)).is_err() {
            return;
        }
        let _ = done.await;
    }
}
