//! Serialized access to the navigation controller.
//!
//! One worker thread owns the controller. Requests arrive over a bounded
//! channel of depth one, so a second caller gets queued and a third is
//! turned away instead of interleaving motor commands. Each request
//! carries its own reply channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::controller::NavigationController;
use crate::planning::CellId;

/// Cooperative cancellation flag for the run in progress.
///
/// Checked at every command boundary, every forward micro-step, and
/// every calibration poll; cleared when the worker picks up the next
/// request.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the active run to stop at its next check.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether a cancellation is pending.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    fn clear(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }
}

/// Requests the worker understands.
pub enum ControlRequest {
    /// Run the timing calibration procedure
    Calibrate { reply: Sender<ControlReply> },
    /// Drive to a cell, or to a random one when no destination is given
    Move {
        destination: Option<CellId>,
        reply: Sender<ControlReply>,
    },
}

/// Outcome of a request, as text for the control surface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlReply {
    Completed(String),
    Failed(String),
}

/// Why a request could not be submitted.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RequestError {
    /// A run is active and another request is already queued
    #[error("navigation service is busy")]
    Busy,
    /// The worker thread has shut down
    #[error("navigation service has stopped")]
    Stopped,
}

/// Client handle to the navigation worker. Cloneable; the worker shuts
/// down once every clone has been dropped.
#[derive(Clone)]
pub struct NavHandle {
    requests: Sender<ControlRequest>,
    cancel: CancelToken,
}

impl NavHandle {
    /// Queue a calibration run.
    pub fn request_calibration(&self) -> std::result::Result<Receiver<ControlReply>, RequestError> {
        let (reply_tx, reply_rx) = bounded(1);
        self.submit(ControlRequest::Calibrate { reply: reply_tx })?;
        Ok(reply_rx)
    }

    /// Queue a move.
    pub fn request_move(
        &self,
        destination: Option<CellId>,
    ) -> std::result::Result<Receiver<ControlReply>, RequestError> {
        let (reply_tx, reply_rx) = bounded(1);
        self.submit(ControlRequest::Move {
            destination,
            reply: reply_tx,
        })?;
        Ok(reply_rx)
    }

    /// Abort whatever the worker is doing right now.
    pub fn cancel_active(&self) {
        self.cancel.cancel();
    }

    /// The cancellation token shared with the worker. Unlike a handle
    /// clone it keeps no request channel alive, so it is safe to park in
    /// a signal handler without blocking worker shutdown.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn submit(&self, request: ControlRequest) -> std::result::Result<(), RequestError> {
        match self.requests.try_send(request) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(RequestError::Busy),
            Err(TrySendError::Disconnected(_)) => Err(RequestError::Stopped),
        }
    }
}

/// Move the controller onto its worker thread.
pub fn spawn(controller: NavigationController) -> (NavHandle, JoinHandle<()>) {
    let (request_tx, request_rx) = bounded(1);
    let cancel = CancelToken::new();
    let worker_cancel = cancel.clone();

    let worker = thread::Builder::new()
        .name("navigation".into())
        .spawn(move || run_worker(controller, request_rx, worker_cancel))
        .expect("Failed to spawn navigation thread");

    (
        NavHandle {
            requests: request_tx,
            cancel,
        },
        worker,
    )
}

fn run_worker(
    mut controller: NavigationController,
    requests: Receiver<ControlRequest>,
    cancel: CancelToken,
) {
    for request in requests.iter() {
        cancel.clear();
        match request {
            ControlRequest::Calibrate { reply } => {
                let outcome = match controller.calibrate(&cancel) {
                    Ok(timing) => ControlReply::Completed(format!(
                        "calibrated: forward {:.4}s right {:.4}s left {:.4}s",
                        timing.forward_secs, timing.turn_right_secs, timing.turn_left_secs
                    )),
                    Err(e) => ControlReply::Failed(e.to_string()),
                };
                let _ = reply.send(outcome);
            }
            ControlRequest::Move { destination, reply } => {
                let outcome = match controller.run_move(destination, &cancel) {
                    Ok(done) => ControlReply::Completed(format!(
                        "reached cell {} after {} replans",
                        done.destination, done.replans
                    )),
                    Err(e) => ControlReply::Failed(e.to_string()),
                };
                let _ = reply.send(outcome);
            }
        }
    }
    tracing::info!("navigation worker stopped");
}
