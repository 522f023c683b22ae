//! Background thread that runs image operations.
//!
//! One long-lived thread per session, fed over a request channel and
//! answering over a result channel. The session keeps at most one request in
//! flight, so the result channel never holds more than one outcome.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use web_time::Instant;

use super::OperationId;
use crate::constants::WORKER_THREAD_NAME;
use crate::error::OperationError;
use crate::image::Image;
use crate::ops::{ImageOperations, Operation};

/// Request to run one operation, sent to the background thread.
struct OperationRequest {
    id: OperationId,
    operation: Operation,
    image: Image,
}

/// Message sent to the worker thread.
enum ThreadMessage {
    /// Run an operation
    Apply(OperationRequest),
    /// Shutdown the thread
    Shutdown,
}

/// Result of one operation, sent back from the worker thread.
#[derive(Debug)]
pub(crate) struct OperationOutcome {
    pub id: OperationId,
    pub result: Result<Image, OperationError>,
    pub elapsed: Duration,
}

/// Run an operation and time it. Shared by the worker and inline dispatch.
pub(crate) fn run_operation(
    provider: &dyn ImageOperations,
    id: OperationId,
    operation: &Operation,
    image: &Image,
) -> OperationOutcome {
    let start = Instant::now();
    let result = operation.apply(provider, image);
    OperationOutcome {
        id,
        result,
        elapsed: start.elapsed(),
    }
}

/// Manages the background thread for image operations.
///
/// If the thread dies (a provider panicked) the channels disconnect; callers
/// see [`OperationError::WorkerDisconnected`] and should drop this handle and
/// spawn a new one.
pub(crate) struct OperationWorker {
    /// Sender for requests to the background thread
    request_tx: Sender<ThreadMessage>,
    /// Receiver for results from the background thread
    result_rx: Receiver<OperationOutcome>,
    /// Handle to the background thread (for joining on drop)
    thread_handle: Option<JoinHandle<()>>,
}

impl OperationWorker {
    /// Spawn a new worker thread.
    pub fn spawn(provider: Arc<dyn ImageOperations>) -> Result<Self, OperationError> {
        let (request_tx, request_rx) = mpsc::channel::<ThreadMessage>();
        let (result_tx, result_rx) = mpsc::channel::<OperationOutcome>();

        let thread_handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                log::debug!("Operation worker thread started");
                Self::thread_loop(provider.as_ref(), request_rx, result_tx);
                log::debug!("Operation worker thread exiting");
            })
            .map_err(|e| {
                log::error!("Failed to spawn operation worker: {}", e);
                OperationError::WorkerDisconnected
            })?;

        log::info!("Operation worker spawned");

        Ok(Self {
            request_tx,
            result_rx,
            thread_handle: Some(thread_handle),
        })
    }

    /// Background thread main loop.
    fn thread_loop(
        provider: &dyn ImageOperations,
        request_rx: Receiver<ThreadMessage>,
        result_tx: Sender<OperationOutcome>,
    ) {
        loop {
            match request_rx.recv() {
                Ok(ThreadMessage::Apply(request)) => {
                    let outcome =
                        run_operation(provider, request.id, &request.operation, &request.image);
                    if result_tx.send(outcome).is_err() {
                        log::warn!("Result channel closed, worker thread exiting");
                        break;
                    }
                }
                Ok(ThreadMessage::Shutdown) => {
                    log::debug!("Received shutdown signal");
                    break;
                }
                Err(_) => {
                    // Channel closed, exit
                    log::debug!("Request channel closed, worker thread exiting");
                    break;
                }
            }
        }
    }

    /// Queue an operation on the worker thread.
    pub fn request(
        &self,
        id: OperationId,
        operation: Operation,
        image: Image,
    ) -> Result<(), OperationError> {
        let request = OperationRequest {
            id,
            operation,
            image,
        };
        self.request_tx
            .send(ThreadMessage::Apply(request))
            .map_err(|_| {
                log::warn!("Failed to send operation {}: worker channel closed", id);
                OperationError::WorkerDisconnected
            })?;
        log::debug!("Sent operation {} to worker", id);
        Ok(())
    }

    /// Take the finished result, if any. Non-blocking.
    pub fn try_take(&self) -> Option<Result<OperationOutcome, OperationError>> {
        match self.result_rx.try_recv() {
            Ok(outcome) => Some(Ok(outcome)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                log::warn!("Operation worker disconnected");
                Some(Err(OperationError::WorkerDisconnected))
            }
        }
    }

    /// Block until the worker reports a result.
    pub fn wait_for(&self) -> Result<OperationOutcome, OperationError> {
        self.result_rx.recv().map_err(|_| {
            log::warn!("Operation worker disconnected while waiting");
            OperationError::WorkerDisconnected
        })
    }
}

impl Drop for OperationWorker {
    fn drop(&mut self) {
        log::debug!("Shutting down operation worker");

        // Send shutdown signal
        let _ = self.request_tx.send(ThreadMessage::Shutdown);

        // Wait for thread to finish
        if let Some(handle) = self.thread_handle.take() {
            if let Err(e) = handle.join() {
                log::warn!("Operation worker panicked: {:?}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::RasterOperations;

    #[test]
    fn test_worker_runs_operation() {
        let worker = OperationWorker::spawn(Arc::new(RasterOperations::new())).unwrap();
        let image = Image::filled(8, 6, [10, 20, 30]);
        worker
            .request(OperationId(7), Operation::Rotate { degrees: 90.0 }, image)
            .unwrap();
        let outcome = worker.wait_for().unwrap();
        assert_eq!(outcome.id, OperationId(7));
        assert_eq!(outcome.result.unwrap().dimensions(), (6, 8));
        assert!(worker.try_take().is_none());
    }

    #[test]
    fn test_run_operation_reports_errors() {
        let outcome = run_operation(
            &RasterOperations::new(),
            OperationId(1),
            &Operation::Watermark(crate::ops::WatermarkParams::new("x")),
            &Image::filled(4, 4, [0, 0, 0]),
        );
        assert_eq!(outcome.result.unwrap_err(), OperationError::FontUnavailable);
    }
}
