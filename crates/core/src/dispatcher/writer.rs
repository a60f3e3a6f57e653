//! Single writer task that applies worker status updates to the store.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::job::JobRecord;
use crate::status::{StatusStore, StatusStoreExt};

enum StatusMessage {
    Record(JobRecord),
    Flush(oneshot::Sender<()>),
}

/// Handle for publishing job records to the [`StatusWriter`].
///
/// Cheap to clone; one per worker.
#[derive(Clone)]
pub struct StatusHandle {
    tx: mpsc::Sender<StatusMessage>,
}

impl StatusHandle {
    /// Queues a record for writing. Logs and drops it if the writer is gone.
    pub async fn publish(&self, record: JobRecord) {
        if let Err(e) = self.tx.send(StatusMessage::Record(record)).await {
            tracing::error!("Failed to publish job status: {}", e);
        }
    }

    /// Waits until every record published before this call is written.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(StatusMessage::Flush(done_tx)).await.is_ok() {
            let _ = done_rx.await;
        }
    }
}

/// Background task writing job records until every handle is dropped.
pub struct StatusWriter {
    rx: mpsc::Receiver<StatusMessage>,
    store: Arc<dyn StatusStore>,
    ttl: Duration,
}

impl StatusWriter {
    /// Run the writer, consuming records until the channel is closed
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        tracing::debug!("Status writer started");

        while let Some(message) = self.rx.recv().await {
            match message {
                StatusMessage::Record(record) => {
                    let job_id = record.job_id.clone();
                    if let Err(e) = self.store.put_job(record, self.ttl) {
                        tracing::error!(job_id = %job_id, "Failed to write job status: {}", e);
                    }
                }
                StatusMessage::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }

        tracing::debug!("Status writer shutting down");
    }
}

/// Create a status writer and the handle that feeds it.
///
/// Spawn the writer with `tokio::spawn(writer.run())`.
pub fn create_status_writer(
    store: Arc<dyn StatusStore>,
    ttl: Duration,
    buffer_size: usize,
) -> (StatusHandle, StatusWriter) {
    let (tx, rx) = mpsc::channel(buffer_size.max(1));
    (StatusHandle { tx }, StatusWriter { rx, store, ttl })
}
