use super::device::{AcquiredStream, MediaDevices, ResolutionHint, VideoEvent, VideoStream};
use super::error::CameraError;
use crate::session::FacingMode;
use anyhow::{Context, Result};
use async_trait::async_trait;
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// Camera backed by still images on disk.
///
/// Each facing mode maps to a subdirectory (`user/`, `environment/`) and
/// every grabbed frame is the next image in that directory, in name order.
/// Only one stream may be open at a time; a second request reports the
/// device as busy, like a webcam held by another process.
pub struct DirectoryCamera {
    root: PathBuf,
    in_use: Arc<AtomicBool>,
}

impl DirectoryCamera {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            in_use: Arc::new(AtomicBool::new(false)),
        }
    }

    async fn list_frames(dir: &Path) -> Result<Vec<PathBuf>, CameraError> {
        let meta = tokio::fs::metadata(dir).await?;
        if !meta.is_dir() {
            return Err(CameraError::DeviceNotFound);
        }

        let mut frames = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if image::ImageFormat::from_path(&path).is_ok() {
                frames.push(path);
            }
        }
        frames.sort();

        if frames.is_empty() {
            return Err(CameraError::DeviceNotFound);
        }
        Ok(frames)
    }
}

#[async_trait]
impl MediaDevices for DirectoryCamera {
    async fn request_video_stream(
        &self,
        facing: FacingMode,
        hint: ResolutionHint,
    ) -> Result<AcquiredStream, CameraError> {
        let dir = self.root.join(facing.as_str());
        tracing::debug!(
            "Opening directory camera {:?} ({}x{} @ {}fps requested)",
            dir,
            hint.width,
            hint.height,
            hint.frame_rate
        );

        let frames = Self::list_frames(&dir).await?;

        if self.in_use.swap(true, Ordering::SeqCst) {
            return Err(CameraError::DeviceBusy);
        }

        // Stills are "playing" as soon as they are listed
        let (tx, events) = mpsc::channel(4);
        for event in [
            VideoEvent::MetadataLoaded,
            VideoEvent::CanPlay,
            VideoEvent::Playing,
        ] {
            let _ = tx.try_send(event);
        }

        tracing::info!("Directory camera opened with {} frames", frames.len());

        Ok(AcquiredStream {
            stream: Box::new(DirectoryStream {
                frames,
                next: 0,
                in_use: self.in_use.clone(),
                released: false,
            }),
            events,
        })
    }
}

struct DirectoryStream {
    frames: Vec<PathBuf>,
    next: usize,
    in_use: Arc<AtomicBool>,
    released: bool,
}

#[async_trait]
impl VideoStream for DirectoryStream {
    async fn grab_frame(&mut self) -> Result<RgbImage> {
        if self.released {
            anyhow::bail!("Stream already released");
        }

        let path = self.frames[self.next % self.frames.len()].clone();
        self.next += 1;

        tokio::task::spawn_blocking(move || {
            image::open(&path)
                .map(|img| img.to_rgb8())
                .with_context(|| format!("Failed to read frame {:?}", path))
        })
        .await
        .context("spawn_blocking failed")?
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.in_use.store(false, Ordering::SeqCst);
            tracing::debug!("Directory camera released");
        }
    }
}

impl Drop for DirectoryStream {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hint() -> ResolutionHint {
        ResolutionHint::for_viewport(1280, 768)
    }

    fn write_frame(dir: &Path, name: &str, shade: u8) {
        std::fs::create_dir_all(dir).unwrap();
        RgbImage::from_pixel(4, 3, image::Rgb([shade, shade, shade]))
            .save(dir.join(name))
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_camera_is_not_found() {
        let root = tempfile::tempdir().unwrap();
        let camera = DirectoryCamera::new(root.path());

        let err = camera
            .request_video_stream(FacingMode::Environment, hint())
            .await
            .err()
            .unwrap();
        assert_eq!(err, CameraError::DeviceNotFound);
    }

    #[tokio::test]
    async fn test_second_stream_is_busy_until_release() {
        let root = tempfile::tempdir().unwrap();
        write_frame(&root.path().join("user"), "a.png", 10);
        let camera = DirectoryCamera::new(root.path());

        let mut first = camera
            .request_video_stream(FacingMode::User, hint())
            .await
            .unwrap();

        let busy = camera
            .request_video_stream(FacingMode::User, hint())
            .await
            .err()
            .unwrap();
        assert_eq!(busy, CameraError::DeviceBusy);

        first.stream.release();
        first.stream.release();

        assert!(
            camera
                .request_video_stream(FacingMode::User, hint())
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_frames_cycle_in_name_order() {
        let root = tempfile::tempdir().unwrap();
        let user = root.path().join("user");
        write_frame(&user, "b.png", 200);
        write_frame(&user, "a.png", 50);
        std::fs::write(user.join("README"), "ignored").unwrap();
        let camera = DirectoryCamera::new(root.path());

        let mut acquired = camera
            .request_video_stream(FacingMode::User, hint())
            .await
            .unwrap();

        assert_eq!(acquired.events.recv().await, Some(VideoEvent::MetadataLoaded));

        let first = acquired.stream.grab_frame().await.unwrap();
        let second = acquired.stream.grab_frame().await.unwrap();
        let third = acquired.stream.grab_frame().await.unwrap();

        assert_eq!(first.get_pixel(0, 0).0, [50, 50, 50]);
        assert_eq!(second.get_pixel(0, 0).0, [200, 200, 200]);
        assert_eq!(third.get_pixel(0, 0).0, [50, 50, 50]);
        assert_eq!(first.dimensions(), (4, 3));
    }
}
