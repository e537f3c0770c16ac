use serde::Serialize;

/// Why a camera could not be acquired or kept running.
///
/// Every variant is recoverable: the controller returns to `Idle` and the
/// user may retry or fall back to uploading a photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum CameraError {
    #[error("camera permission denied")]
    PermissionDenied,

    #[error("no camera device found")]
    DeviceNotFound,

    #[error("camera is in use by another application")]
    DeviceBusy,

    #[error("camera feed failed: {0}")]
    StreamFailed(String),

    #[error("camera access failed: {0}")]
    Unknown(String),
}

impl CameraError {
    pub fn title(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "Camera Access Denied",
            Self::DeviceNotFound => "No Camera Found",
            Self::DeviceBusy => "Camera In Use",
            Self::StreamFailed(_) => "Failed to display camera feed",
            Self::Unknown(_) => "Camera access failed",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "Please allow camera access in your browser settings.",
            Self::DeviceNotFound => "No camera device was found on your device.",
            Self::DeviceBusy => "Camera is being used by another application.",
            Self::StreamFailed(_) | Self::Unknown(_) => "Please try uploading a photo instead.",
        }
    }
}

impl From<std::io::Error> for CameraError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            std::io::ErrorKind::NotFound => Self::DeviceNotFound,
            std::io::ErrorKind::ResourceBusy | std::io::ErrorKind::WouldBlock => Self::DeviceBusy,
            _ => Self::Unknown(err.to_string()),
        }
    }
}
