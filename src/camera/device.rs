use super::error::CameraError;
use crate::session::FacingMode;
use anyhow::Result;
use async_trait::async_trait;
use image::RgbImage;
use serde::Serialize;
use tokio::sync::mpsc;

/// Requested capture size, tuned to the viewport the feed is shown in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolutionHint {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
}

impl ResolutionHint {
    /// Narrow (mobile) viewports get a taller, higher resolution portrait feed.
    pub fn for_viewport(viewport_width: u32, mobile_breakpoint: u32) -> Self {
        if viewport_width <= mobile_breakpoint {
            Self {
                width: 720,
                height: 960,
                frame_rate: 30,
            }
        } else {
            Self {
                width: 640,
                height: 480,
                frame_rate: 30,
            }
        }
    }
}

/// Lifecycle notifications emitted by the surface rendering a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoEvent {
    MetadataLoaded,
    CanPlay,
    Playing,
    Error(String),
}

/// A freshly opened stream together with its lifecycle event feed
pub struct AcquiredStream {
    pub stream: Box<dyn VideoStream>,
    pub events: mpsc::Receiver<VideoEvent>,
}

/// Platform camera provider
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Open a video stream for the requested camera.
    ///
    /// May suspend for a long time (e.g. while a permission prompt is shown).
    async fn request_video_stream(
        &self,
        facing: FacingMode,
        hint: ResolutionHint,
    ) -> Result<AcquiredStream, CameraError>;
}

/// An open camera stream owned exclusively by the capture controller
#[async_trait]
pub trait VideoStream: Send {
    /// Grab the current frame at the stream's native resolution
    async fn grab_frame(&mut self) -> Result<RgbImage>;

    /// Stop all tracks and give the device back. Calling it twice is a no-op.
    fn release(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_hint_prefers_portrait_on_mobile() {
        let mobile = ResolutionHint::for_viewport(375, 768);
        assert_eq!((mobile.width, mobile.height), (720, 960));

        let edge = ResolutionHint::for_viewport(768, 768);
        assert_eq!((edge.width, edge.height), (720, 960));

        let desktop = ResolutionHint::for_viewport(1280, 768);
        assert_eq!((desktop.width, desktop.height), (640, 480));
        assert_eq!(desktop.frame_rate, 30);
    }
}
