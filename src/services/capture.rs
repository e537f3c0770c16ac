use crate::camera::{
    AcquiredStream, CameraError, FrameEncoder, MediaDevices, ReadySource, ResolutionHint,
    VideoEvent,
};
use crate::config::Config;
use crate::enhance::{self, BackgroundRemover};
use crate::messages::CaptureCommand;
use crate::notify::{Notification, Notifier, Severity};
use crate::photo::{PhotoRecord, UploadedFile};
use crate::session::{CaptureMode, CaptureSession, SessionSnapshot};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

/// Timing and sizing knobs for the controller
#[derive(Debug, Clone, Copy)]
pub struct ControllerSettings {
    pub resolution: ResolutionHint,
    pub ready_timeout: Duration,
    pub switch_settle: Duration,
}

impl ControllerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            resolution: ResolutionHint::for_viewport(
                config.viewport_width,
                config.mobile_breakpoint,
            ),
            ready_timeout: Duration::from_millis(config.ready_timeout_ms),
            switch_settle: Duration::from_millis(config.switch_settle_ms),
        }
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            resolution: ResolutionHint::for_viewport(1280, 768),
            ready_timeout: Duration::from_millis(4000),
            switch_settle: Duration::from_millis(100),
        }
    }
}

/// External collaborators the controller drives
#[derive(Clone)]
pub struct CaptureDeps {
    pub devices: Arc<dyn MediaDevices>,
    pub encoder: Arc<dyn FrameEncoder>,
    pub remover: Option<Arc<dyn BackgroundRemover>>,
    pub notifier: Arc<dyn Notifier>,
}

type Acquisition = (u64, Result<AcquiredStream, CameraError>);

/// Owns one capture session: camera permission, stream lifecycle, capture,
/// photo history, and hand-off of the confirmed photo.
///
/// Every mutation happens on this task, one message at a time. Work that
/// suspends (device acquisition, upload enhancement) runs in spawned tasks
/// whose results are tagged with the epoch they started in; a result from
/// an older epoch is stale and is discarded (streams are released at once).
pub struct CaptureController {
    settings: ControllerSettings,
    deps: CaptureDeps,
    session: CaptureSession,
    epoch: u64,
    acquiring: Option<u64>,
    start_after_inflight: bool,
    restart_at: Option<Instant>,
    start_waiters: Vec<oneshot::Sender<()>>,
    upload_waiters: Vec<(u64, oneshot::Sender<()>)>,
    cmd_rx: mpsc::Receiver<CaptureCommand>,
    acquired_tx: mpsc::Sender<Acquisition>,
    acquired_rx: mpsc::Receiver<Acquisition>,
    upload_tx: mpsc::Sender<(u64, PhotoRecord)>,
    upload_rx: mpsc::Receiver<(u64, PhotoRecord)>,
    state_tx: watch::Sender<SessionSnapshot>,
    confirmed_tx: mpsc::Sender<PhotoRecord>,
}

impl CaptureController {
    pub fn new(
        settings: ControllerSettings,
        deps: CaptureDeps,
        cmd_rx: mpsc::Receiver<CaptureCommand>,
        state_tx: watch::Sender<SessionSnapshot>,
        confirmed_tx: mpsc::Sender<PhotoRecord>,
    ) -> Self {
        let (acquired_tx, acquired_rx) = mpsc::channel(4);
        let (upload_tx, upload_rx) = mpsc::channel(4);

        Self {
            settings,
            deps,
            session: CaptureSession::new(),
            epoch: 0,
            acquiring: None,
            start_after_inflight: false,
            restart_at: None,
            start_waiters: Vec::new(),
            upload_waiters: Vec::new(),
            cmd_rx,
            acquired_tx,
            acquired_rx,
            upload_tx,
            upload_rx,
            state_tx,
            confirmed_tx,
        }
    }

    pub async fn run(mut self) {
        loop {
            let ready_deadline = self.session.ready_deadline();
            let restart_at = self.restart_at;

            tokio::select! {
                biased;

                Some((epoch, result)) = self.acquired_rx.recv() => {
                    self.on_acquired(epoch, result);
                }

                Some((epoch, photo)) = self.upload_rx.recv() => {
                    self.on_upload_processed(epoch, photo);
                }

                event = CaptureSession::next_event(self.session.stream_slot()) => {
                    self.on_video_event(event);
                }

                _ = sleep_until_opt(ready_deadline) => {
                    tracing::info!("Readiness timeout reached, forcing stream ready");
                    self.session.mark_ready(ReadySource::Forced);
                }

                _ = sleep_until_opt(restart_at) => {
                    self.restart_at = None;
                    tracing::debug!("Switch settle delay elapsed, reacquiring camera");
                    self.begin_acquire();
                }

                cmd = self.cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                }
            }

            self.publish();
        }

        self.session.stop();
        self.publish();
        tracing::info!("Capture controller stopped");
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.session.snapshot());
    }

    fn reply<T>(&self, reply: oneshot::Sender<T>, value: T) {
        self.publish();
        let _ = reply.send(value);
    }

    fn flush_start_waiters(&mut self) {
        self.publish();
        for waiter in self.start_waiters.drain(..) {
            let _ = waiter.send(());
        }
    }

    /// Everything in flight now belongs to a superseded intent
    fn invalidate_pending(&mut self) {
        self.epoch += 1;
        self.restart_at = None;
        self.start_after_inflight = false;
        self.session.set_uploading(false);
        self.session.settle_loading();
        self.flush_start_waiters();
    }

    async fn handle_command(&mut self, cmd: CaptureCommand) {
        tracing::debug!(
            "Handling {} in {:?} mode",
            cmd.name(),
            self.session.mode()
        );

        match cmd {
            CaptureCommand::StartCamera(reply) => self.start_camera(reply),
            CaptureCommand::SwitchCamera(reply) => self.switch_camera(reply),
            CaptureCommand::StopCamera(reply) => {
                self.invalidate_pending();
                self.session.stop();
                self.reply(reply, ());
            }
            CaptureCommand::CapturePhoto(reply) => {
                let photo = self.capture_photo().await;
                self.reply(reply, photo);
            }
            CaptureCommand::RetakePhoto(reply) => {
                if self.session.mode() == CaptureMode::Preview {
                    self.invalidate_pending();
                    self.session.retake();
                }
                self.reply(reply, ());
            }
            CaptureCommand::SelectPhoto(photo, reply) => {
                let selected = self.session.select_photo(&photo);
                self.reply(reply, selected);
            }
            CaptureCommand::DeletePhoto(photo, reply) => {
                let was_selected = self.session.selected() == Some(&photo);
                let removed = self.session.delete_photo(&photo);
                if removed && was_selected {
                    self.invalidate_pending();
                }
                self.reply(reply, removed);
            }
            CaptureCommand::UploadFile(file, reply) => self.upload_file(file, reply),
            CaptureCommand::Confirm(reply) => {
                let photo = self.confirm().await;
                self.reply(reply, photo);
            }
        }
    }

    fn start_camera(&mut self, reply: oneshot::Sender<()>) {
        if self.session.mode() != CaptureMode::Idle {
            tracing::debug!("Camera already started or previewing, ignoring start");
            self.reply(reply, ());
            return;
        }

        self.start_waiters.push(reply);

        // An acquisition (or a switch restart) for the current intent is
        // already underway; just wait for it.
        if self.acquiring == Some(self.epoch) || self.restart_at.is_some() {
            return;
        }

        self.invalidate_pending_keeping_waiters();
        self.session.begin_loading();
        self.begin_acquire();
    }

    fn invalidate_pending_keeping_waiters(&mut self) {
        let waiters = std::mem::take(&mut self.start_waiters);
        self.invalidate_pending();
        self.start_waiters = waiters;
    }

    fn begin_acquire(&mut self) {
        if let Some(inflight) = self.acquiring {
            if inflight != self.epoch {
                // Never open a second handle while the stale one is unresolved
                self.start_after_inflight = true;
            }
            return;
        }

        let epoch = self.epoch;
        let facing = self.session.facing_mode();
        let hint = self.settings.resolution;
        let devices = self.deps.devices.clone();
        let tx = self.acquired_tx.clone();

        self.acquiring = Some(epoch);
        tracing::info!("Starting camera with facing mode {}", facing.as_str());

        tokio::spawn(async move {
            let result = devices.request_video_stream(facing, hint).await;
            let _ = tx.send((epoch, result)).await;
        });
    }

    fn on_acquired(&mut self, epoch: u64, result: Result<AcquiredStream, CameraError>) {
        if self.acquiring == Some(epoch) {
            self.acquiring = None;
        }

        let stale = epoch != self.epoch || self.session.mode() != CaptureMode::Idle;

        match result {
            Ok(mut acquired) if stale => {
                tracing::debug!("Releasing stream from superseded request (epoch {})", epoch);
                acquired.stream.release();
            }
            Ok(acquired) => {
                tracing::info!("Camera stream obtained");
                self.session.go_live(acquired, self.settings.ready_timeout);
                self.flush_start_waiters();
            }
            Err(e) if stale => {
                tracing::debug!("Ignoring failure from superseded request: {}", e);
            }
            Err(e) => {
                tracing::error!("Camera error: {}", e);
                self.deps.notifier.notify(Notification::new(
                    e.title(),
                    e.description(),
                    Severity::Destructive,
                ));
                self.session.acquisition_failed(e);
                self.flush_start_waiters();
            }
        }

        if self.start_after_inflight && self.acquiring.is_none() {
            self.start_after_inflight = false;
            self.begin_acquire();
        }
    }

    fn on_video_event(&mut self, event: Option<VideoEvent>) {
        match event {
            None => {
                tracing::debug!("Stream event feed closed");
                self.session.close_events();
            }
            Some(VideoEvent::Error(message)) => {
                tracing::error!("Video error: {}", message);
                let error = CameraError::StreamFailed(message);
                self.deps.notifier.notify(Notification::new(
                    error.title(),
                    error.description(),
                    Severity::Destructive,
                ));
                self.invalidate_pending();
                self.session.stream_failed(error);
            }
            Some(event) => {
                let Some(source) = ReadySource::from_event(&event) else {
                    return;
                };
                if self.session.mark_ready(source) {
                    tracing::info!("Video is ready ({:?})", source);
                } else {
                    tracing::debug!("Ignoring {:?}, stream already ready", source);
                }
            }
        }
    }

    fn switch_camera(&mut self, reply: oneshot::Sender<()>) {
        if self.session.mode() != CaptureMode::Live {
            tracing::debug!("No active stream, ignoring camera switch");
            self.reply(reply, ());
            return;
        }

        self.invalidate_pending();
        self.session.toggle_facing();
        self.session.release_stream();
        self.session.begin_loading();
        self.restart_at = Some(Instant::now() + self.settings.switch_settle);
        self.start_waiters.push(reply);

        tracing::info!(
            "Switching camera to {}",
            self.session.facing_mode().as_str()
        );
    }

    async fn capture_photo(&mut self) -> Option<PhotoRecord> {
        if self.session.mode() != CaptureMode::Live || !self.session.is_stream_ready() {
            tracing::debug!("Stream not ready, ignoring capture");
            return None;
        }

        let handle = self.session.stream_handle()?;
        let frame = match handle.grab_frame().await {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Failed to grab frame: {}", e);
                return None;
            }
        };

        let encoder = self.deps.encoder.clone();
        let encoded = tokio::task::spawn_blocking(move || encoder.encode(&frame)).await;
        let payload = match encoded {
            Ok(Ok(payload)) => payload,
            Ok(Err(e)) => {
                tracing::warn!("Failed to encode frame: {}", e);
                return None;
            }
            Err(e) => {
                tracing::warn!("Frame encoder task failed: {}", e);
                return None;
            }
        };

        let photo = PhotoRecord::from_payload(&payload);
        self.invalidate_pending();
        self.session.record_capture(photo.clone());

        tracing::info!(
            "Captured photo {} of this session ({} bytes)",
            self.session.photos().len(),
            payload.bytes.len()
        );
        Some(photo)
    }

    fn upload_file(&mut self, file: UploadedFile, reply: oneshot::Sender<()>) {
        if self.session.mode() != CaptureMode::Idle {
            tracing::debug!("Upload only accepted while idle, ignoring");
            self.reply(reply, ());
            return;
        }

        let name = file.name.clone();
        let payload = match file.into_payload() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::debug!("Ignoring upload {:?}: {}", name, e);
                self.reply(reply, ());
                return;
            }
        };

        self.invalidate_pending();
        self.session.set_uploading(true);

        let epoch = self.epoch;
        let remover = self.deps.remover.clone();
        let tx = self.upload_tx.clone();
        self.upload_waiters.push((epoch, reply));

        tracing::info!("Processing upload {:?} ({} bytes)", name, payload.bytes.len());

        tokio::spawn(async move {
            let photo = enhance::enhance_or_original(remover.as_deref(), payload).await;
            let _ = tx.send((epoch, photo)).await;
        });
    }

    fn on_upload_processed(&mut self, epoch: u64, photo: PhotoRecord) {
        if epoch == self.epoch && self.session.mode() == CaptureMode::Idle {
            self.session.replace_with_upload(photo);
            tracing::info!("Upload ready for preview");
        } else {
            tracing::debug!("Discarding superseded upload (epoch {})", epoch);
        }

        self.publish();
        let (done, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.upload_waiters)
            .into_iter()
            .partition(|(e, _)| *e == epoch);
        self.upload_waiters = pending;
        for (_, waiter) in done {
            let _ = waiter.send(());
        }
    }

    async fn confirm(&mut self) -> Option<PhotoRecord> {
        let photo = self.session.selected()?.clone();
        if let Err(e) = self.confirmed_tx.send(photo.clone()).await {
            tracing::error!("Photo consumer is gone: {}", e);
            return None;
        }
        tracing::info!("Photo confirmed");
        Some(photo)
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Handle for communicating with the CaptureController
#[derive(Clone)]
pub struct CaptureHandle {
    tx: mpsc::Sender<CaptureCommand>,
    state_rx: watch::Receiver<SessionSnapshot>,
}

impl CaptureHandle {
    pub fn new(tx: mpsc::Sender<CaptureCommand>, state_rx: watch::Receiver<SessionSnapshot>) -> Self {
        Self { tx, state_rx }
    }

    /// Spawn a controller on the current runtime and return its handle.
    ///
    /// Confirmed photos are delivered on `confirmed_tx`.
    pub fn spawn(
        settings: ControllerSettings,
        deps: CaptureDeps,
        confirmed_tx: mpsc::Sender<PhotoRecord>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (state_tx, state_rx) = watch::channel(CaptureSession::new().snapshot());
        let controller = CaptureController::new(settings, deps, cmd_rx, state_tx, confirmed_tx);
        tokio::spawn(controller.run());
        Self::new(cmd_tx, state_rx)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state_rx.clone()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> CaptureCommand,
    ) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        let cmd = make(reply);
        let name = cmd.name();
        self.tx
            .send(cmd)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send {} command: {}", name, e))?;

        rx.await
            .map_err(|e| anyhow::anyhow!("Failed to receive {} response: {}", name, e))
    }

    /// Resolves once the acquisition has gone live, failed, or been superseded
    pub async fn start_camera(&self) -> Result<()> {
        self.request(CaptureCommand::StartCamera).await
    }

    /// Resolves once the camera has been reacquired (or the switch cancelled)
    pub async fn switch_camera(&self) -> Result<()> {
        self.request(CaptureCommand::SwitchCamera).await
    }

    pub async fn stop_camera(&self) -> Result<()> {
        self.request(CaptureCommand::StopCamera).await
    }

    pub async fn capture_photo(&self) -> Result<Option<PhotoRecord>> {
        self.request(CaptureCommand::CapturePhoto).await
    }

    pub async fn retake_photo(&self) -> Result<()> {
        self.request(CaptureCommand::RetakePhoto).await
    }

    pub async fn select_photo(&self, photo: PhotoRecord) -> Result<bool> {
        self.request(|reply| CaptureCommand::SelectPhoto(photo, reply))
            .await
    }

    pub async fn delete_photo(&self, photo: PhotoRecord) -> Result<bool> {
        self.request(|reply| CaptureCommand::DeletePhoto(photo, reply))
            .await
    }

    /// Resolves once the upload has been applied or discarded
    pub async fn upload_file(&self, file: UploadedFile) -> Result<()> {
        self.request(|reply| CaptureCommand::UploadFile(file, reply))
            .await
    }

    pub async fn confirm(&self) -> Result<Option<PhotoRecord>> {
        self.request(CaptureCommand::Confirm).await
    }
}
