//! Test doubles for the capture controller's collaborators.

use crate::camera::{AcquiredStream, CameraError, MediaDevices, ResolutionHint, VideoEvent, VideoStream};
use crate::enhance::BackgroundRemover;
use crate::notify::{Notification, Notifier};
use crate::photo::{ImagePayload, PhotoError};
use crate::session::FacingMode;
use async_trait::async_trait;
use image::RgbImage;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, mpsc};

#[derive(Default)]
struct FakeState {
    outstanding: AtomicUsize,
    max_outstanding: AtomicUsize,
    frames: AtomicU8,
    silent: AtomicBool,
    requests: Mutex<Vec<FacingMode>>,
    fail_with: Mutex<Option<CameraError>>,
    gate: Mutex<Option<Arc<Notify>>>,
    requested: Notify,
    event_tx: Mutex<Option<mpsc::Sender<VideoEvent>>>,
}

/// Camera that counts open handles and can be scripted to fail, stall, or
/// stay silent about readiness.
#[derive(Clone, Default)]
pub struct FakeCamera {
    state: Arc<FakeState>,
}

impl FakeCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Never emits lifecycle events on its own
    pub fn silent(self) -> Self {
        self.state.silent.store(true, Ordering::SeqCst);
        self
    }

    pub fn fail_with(&self, error: Option<CameraError>) {
        *self.state.fail_with.lock().unwrap() = error;
    }

    /// Hold every acquisition until the returned gate is notified
    pub fn gated(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.state.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Resolves once an acquisition request has reached the device
    pub async fn requested(&self) {
        self.state.requested.notified().await;
    }

    pub fn outstanding(&self) -> usize {
        self.state.outstanding.load(Ordering::SeqCst)
    }

    pub fn max_outstanding(&self) -> usize {
        self.state.max_outstanding.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<FacingMode> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Emit a lifecycle event on the most recently opened stream
    pub fn emit(&self, event: VideoEvent) {
        if let Some(tx) = self.state.event_tx.lock().unwrap().as_ref() {
            let _ = tx.try_send(event);
        }
    }
}

#[async_trait]
impl MediaDevices for FakeCamera {
    async fn request_video_stream(
        &self,
        facing: FacingMode,
        _hint: ResolutionHint,
    ) -> Result<AcquiredStream, CameraError> {
        self.state.requests.lock().unwrap().push(facing);
        self.state.requested.notify_one();

        let gate = self.state.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if let Some(err) = self.state.fail_with.lock().unwrap().clone() {
            return Err(err);
        }

        let open = self.state.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_outstanding.fetch_max(open, Ordering::SeqCst);

        let (tx, events) = mpsc::channel(8);
        if !self.state.silent.load(Ordering::SeqCst) {
            let _ = tx.try_send(VideoEvent::MetadataLoaded);
            let _ = tx.try_send(VideoEvent::Playing);
        }
        *self.state.event_tx.lock().unwrap() = Some(tx);

        Ok(AcquiredStream {
            stream: Box::new(FakeStream {
                state: self.state.clone(),
                released: false,
            }),
            events,
        })
    }
}

struct FakeStream {
    state: Arc<FakeState>,
    released: bool,
}

#[async_trait]
impl VideoStream for FakeStream {
    async fn grab_frame(&mut self) -> anyhow::Result<RgbImage> {
        let shade = self.state.frames.fetch_add(40, Ordering::SeqCst);
        Ok(RgbImage::from_pixel(8, 6, image::Rgb([shade, 255 - shade, 7])))
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.state.outstanding.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for FakeStream {
    fn drop(&mut self) {
        self.release();
    }
}

/// Background remover that always fails
pub struct BrokenRemover;

#[async_trait]
impl BackgroundRemover for BrokenRemover {
    async fn remove_background(&self, _image: &ImagePayload) -> Result<ImagePayload, PhotoError> {
        Err(PhotoError::Enhancement("model not loaded".into()))
    }
}

/// Background remover that returns a fixed PNG-tagged payload
pub struct CutoutRemover;

#[async_trait]
impl BackgroundRemover for CutoutRemover {
    async fn remove_background(&self, image: &ImagePayload) -> Result<ImagePayload, PhotoError> {
        let mut bytes = b"cutout:".to_vec();
        bytes.extend_from_slice(&image.bytes);
        Ok(ImagePayload::new("image/png", bytes))
    }
}

/// Background remover that takes `delay` before returning the input unchanged
pub struct SlowRemover {
    pub delay: Duration,
}

#[async_trait]
impl BackgroundRemover for SlowRemover {
    async fn remove_background(&self, image: &ImagePayload) -> Result<ImagePayload, PhotoError> {
        tokio::time::sleep(self.delay).await;
        Ok(image.clone())
    }
}

/// Notifier that remembers everything it was told
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    seen: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn seen(&self) -> Vec<Notification> {
        self.seen.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen.lock().unwrap().push(notification);
    }
}
