use faceaccess_hw::{CameraError, CaptureSource};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("capture thread exited")]
    ChannelClosed,
    #[error("failed to spawn capture thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Messages sent to the capture thread.
enum CaptureRequest {
    Still {
        reply: oneshot::Sender<Result<Vec<u8>, CameraError>>,
    },
}

/// Handle to the thread that exclusively owns a capture source.
///
/// Stopping (or dropping) the handle closes the channel and joins the
/// thread; the source is dropped there, which releases the device.
pub struct CaptureHandle {
    tx: Option<mpsc::Sender<CaptureRequest>>,
    thread: Option<std::thread::JoinHandle<()>>,
    description: String,
}

impl CaptureHandle {
    /// Capture one JPEG still.
    pub async fn capture(&self) -> Result<Vec<u8>, CaptureError> {
        let tx = self.tx.as_ref().ok_or(CaptureError::ChannelClosed)?;
        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(CaptureRequest::Still { reply: reply_tx })
            .await
            .map_err(|_| CaptureError::ChannelClosed)?;
        Ok(reply_rx.await.map_err(|_| CaptureError::ChannelClosed)??)
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Release the source and wait for the capture thread to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Closing the channel ends the thread's receive loop.
        self.tx.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!(source = %self.description, "capture thread panicked");
            }
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Spawn a capture source on a dedicated OS thread.
///
/// Warm-up runs before the thread starts so that a missing or broken
/// device fails here rather than on the first attempt.
pub fn spawn_capture<S>(mut source: S, warmup_frames: usize) -> Result<CaptureHandle, CaptureError>
where
    S: CaptureSource + 'static,
{
    source.warm_up(warmup_frames)?;
    let description = source.describe();
    tracing::info!(source = %description, "capture source ready");

    // One slot: a gate never has more than one still outstanding.
    let (tx, mut rx) = mpsc::channel::<CaptureRequest>(1);

    let thread_description = description.clone();
    let thread = std::thread::Builder::new()
        .name("faceaccess-capture".into())
        .spawn(move || {
            tracing::debug!(source = %thread_description, "capture thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    CaptureRequest::Still { reply } => {
                        let result = source.capture_still();
                        if let Err(e) = &result {
                            tracing::warn!(error = %e, "still capture failed");
                        }
                        let _ = reply.send(result);
                    }
                }
            }
            drop(source);
            tracing::info!(source = %thread_description, "capture source released");
        })
        .map_err(CaptureError::Spawn)?;

    Ok(CaptureHandle {
        tx: Some(tx),
        thread: Some(thread),
        description,
    })
}
