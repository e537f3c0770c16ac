use crate::camera::{AcquiredStream, CameraError, ReadyLatch, ReadySource, VideoEvent, VideoStream};
use crate::photo::PhotoRecord;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    Idle,
    Live,
    Preview,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    #[default]
    User,
    Environment,
}

impl FacingMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::User => Self::Environment,
            Self::Environment => Self::User,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Environment => "environment",
        }
    }
}

/// The open stream plus everything whose lifetime is tied to it
pub struct ActiveStream {
    handle: Box<dyn VideoStream>,
    events: Option<mpsc::Receiver<VideoEvent>>,
    latch: ReadyLatch,
}

/// Read-only view of a capture session (published via watch channel)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub mode: CaptureMode,
    pub facing_mode: FacingMode,
    pub photos: Vec<PhotoRecord>,
    pub selected: Option<PhotoRecord>,
    pub is_stream_loading: bool,
    pub is_stream_ready: bool,
    pub ready_via: Option<ReadySource>,
    pub is_uploading: bool,
    pub last_error: Option<CameraError>,
}

/// State of one photo-acquisition flow.
///
/// Invariants kept by the methods below:
/// - `Live` holds a stream, `Idle` and `Preview` hold none
/// - `Preview` always has a selection, and the selection is in `photos`
/// - `is_stream_ready` implies `!is_stream_loading`
pub struct CaptureSession {
    mode: CaptureMode,
    facing_mode: FacingMode,
    photos: Vec<PhotoRecord>,
    selected: Option<PhotoRecord>,
    stream: Option<ActiveStream>,
    is_stream_loading: bool,
    is_stream_ready: bool,
    is_uploading: bool,
    last_error: Option<CameraError>,
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSession {
    pub fn new() -> Self {
        Self {
            mode: CaptureMode::Idle,
            facing_mode: FacingMode::default(),
            photos: Vec::new(),
            selected: None,
            stream: None,
            is_stream_loading: false,
            is_stream_ready: false,
            is_uploading: false,
            last_error: None,
        }
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn facing_mode(&self) -> FacingMode {
        self.facing_mode
    }

    pub fn photos(&self) -> &[PhotoRecord] {
        &self.photos
    }

    pub fn selected(&self) -> Option<&PhotoRecord> {
        self.selected.as_ref()
    }

    pub fn is_stream_ready(&self) -> bool {
        self.is_stream_ready
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            mode: self.mode,
            facing_mode: self.facing_mode,
            photos: self.photos.clone(),
            selected: self.selected.clone(),
            is_stream_loading: self.is_stream_loading,
            is_stream_ready: self.is_stream_ready,
            ready_via: self.stream.as_ref().and_then(|s| s.latch.fired()),
            is_uploading: self.is_uploading,
            last_error: self.last_error.clone(),
        }
    }

    pub fn toggle_facing(&mut self) {
        self.facing_mode = self.facing_mode.toggled();
    }

    pub fn set_uploading(&mut self, uploading: bool) {
        self.is_uploading = uploading;
    }

    /// An acquisition is about to start
    pub fn begin_loading(&mut self) {
        self.is_stream_loading = true;
        self.is_stream_ready = false;
        self.last_error = None;
    }

    /// Drop the loading flag if nothing is left to wait for
    pub fn settle_loading(&mut self) {
        if self.stream.is_none() {
            self.is_stream_loading = false;
        }
    }

    pub fn go_live(&mut self, acquired: AcquiredStream, ready_timeout: Duration) {
        self.release_stream();
        self.stream = Some(ActiveStream {
            handle: acquired.stream,
            events: Some(acquired.events),
            latch: ReadyLatch::arm(ready_timeout),
        });
        self.mode = CaptureMode::Live;
        self.is_stream_loading = true;
        self.is_stream_ready = false;
        self.last_error = None;
    }

    pub fn acquisition_failed(&mut self, error: CameraError) {
        self.is_stream_loading = false;
        self.is_stream_ready = false;
        self.last_error = Some(error);
    }

    /// Release the stream if any and leave `Live`.
    ///
    /// Idempotent; also drops the readiness latch so a pending deadline can
    /// no longer fire for this stream.
    pub fn release_stream(&mut self) {
        if let Some(mut active) = self.stream.take() {
            active.handle.release();
        }
        if self.mode == CaptureMode::Live {
            self.mode = CaptureMode::Idle;
        }
        self.is_stream_loading = false;
        self.is_stream_ready = false;
    }

    /// Explicit stop: release and clear every stream flag, errors included
    pub fn stop(&mut self) {
        self.release_stream();
        self.last_error = None;
    }

    /// The live feed died after it was acquired
    pub fn stream_failed(&mut self, error: CameraError) {
        self.release_stream();
        self.last_error = Some(error);
    }

    /// Latch readiness for the current stream. Returns false if there is no
    /// stream or the latch was already set.
    pub fn mark_ready(&mut self, source: ReadySource) -> bool {
        let Some(active) = self.stream.as_mut() else {
            return false;
        };
        if !active.latch.signal(source) {
            return false;
        }
        self.is_stream_ready = true;
        self.is_stream_loading = false;
        true
    }

    pub fn ready_deadline(&self) -> Option<Instant> {
        self.stream.as_ref().and_then(|s| s.latch.pending_deadline())
    }

    /// Wait for the next lifecycle event of the current stream.
    ///
    /// Pends forever when there is no stream or its event feed has closed.
    pub async fn next_event(stream: &mut Option<ActiveStream>) -> Option<VideoEvent> {
        match stream.as_mut().and_then(|s| s.events.as_mut()) {
            Some(events) => events.recv().await,
            None => std::future::pending().await,
        }
    }

    pub fn stream_slot(&mut self) -> &mut Option<ActiveStream> {
        &mut self.stream
    }

    pub fn close_events(&mut self) {
        if let Some(active) = self.stream.as_mut() {
            active.events = None;
        }
    }

    pub fn stream_handle(&mut self) -> Option<&mut Box<dyn VideoStream>> {
        self.stream.as_mut().map(|s| &mut s.handle)
    }

    /// Append a fresh capture and show it
    pub fn record_capture(&mut self, photo: PhotoRecord) {
        self.release_stream();
        self.photos.push(photo.clone());
        self.selected = Some(photo);
        self.mode = CaptureMode::Preview;
    }

    /// An upload replaces the whole history with a single entry
    pub fn replace_with_upload(&mut self, photo: PhotoRecord) {
        self.photos = vec![photo.clone()];
        self.selected = Some(photo);
        self.is_uploading = false;
        self.mode = CaptureMode::Preview;
    }

    /// Back to `Idle`, keeping the history
    pub fn retake(&mut self) -> bool {
        if self.mode != CaptureMode::Preview {
            return false;
        }
        self.selected = None;
        self.mode = CaptureMode::Idle;
        true
    }

    /// Choose among prior captures while previewing
    pub fn select_photo(&mut self, photo: &PhotoRecord) -> bool {
        if self.mode != CaptureMode::Preview || !self.photos.contains(photo) {
            return false;
        }
        self.selected = Some(photo.clone());
        true
    }

    /// Remove every entry equal to `photo`.
    ///
    /// Removing the current selection falls back to `Idle` with the remaining
    /// history intact. Returns whether anything was removed.
    pub fn delete_photo(&mut self, photo: &PhotoRecord) -> bool {
        let before = self.photos.len();
        self.photos.retain(|p| p != photo);
        if self.photos.len() == before {
            return false;
        }

        if self.selected.as_ref() == Some(photo) {
            self.selected = None;
            if self.mode == CaptureMode::Preview {
                self.mode = CaptureMode::Idle;
            }
        }
        true
    }
}
