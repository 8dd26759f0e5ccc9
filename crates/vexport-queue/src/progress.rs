//! Progress reporting from a running job back to the scheduler.

use tokio::sync::mpsc;

/// One progress update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// 0-100
    pub percent: u8,
    pub message: Option<String>,
}

/// Handle given to a processor for reporting progress.
///
/// Backed by a bounded channel drained by the scheduler. Reporting never
/// fails: once the scheduler stops listening, updates are dropped.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: mpsc::Sender<ProgressUpdate>,
}

impl ProgressReporter {
    /// Create a reporter and the receiver the scheduler drains.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<ProgressUpdate>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }

    /// Report a percentage, waiting for buffer space.
    pub async fn report(&self, percent: u8) {
        self.send(percent, None).await;
    }

    /// Report a percentage with a status message.
    pub async fn report_with_message(&self, percent: u8, message: impl Into<String>) {
        self.send(percent, Some(message.into())).await;
    }

    /// Report without waiting. Returns `false` if the update was dropped
    /// because the buffer is full or the scheduler is gone.
    ///
    /// Suitable for hot loops such as parsing encoder output.
    pub fn try_report(&self, percent: u8) -> bool {
        self.tx
            .try_send(ProgressUpdate {
                percent: percent.min(100),
                message: None,
            })
            .is_ok()
    }

    async fn send(&self, percent: u8, message: Option<String>) {
        let update = ProgressUpdate {
            percent: percent.min(100),
            message,
        };
        if self.tx.send(update).await.is_err() {
            tracing::trace!("Progress receiver closed, dropping update");
        }
    }
}
