use crate::photo::{PhotoRecord, UploadedFile};
use tokio::sync::oneshot;

/// Commands for the capture controller
pub enum CaptureCommand {
    StartCamera(oneshot::Sender<()>),
    SwitchCamera(oneshot::Sender<()>),
    StopCamera(oneshot::Sender<()>),
    CapturePhoto(oneshot::Sender<Option<PhotoRecord>>),
    RetakePhoto(oneshot::Sender<()>),
    SelectPhoto(PhotoRecord, oneshot::Sender<bool>),
    DeletePhoto(PhotoRecord, oneshot::Sender<bool>),
    UploadFile(UploadedFile, oneshot::Sender<()>),
    Confirm(oneshot::Sender<Option<PhotoRecord>>),
}

impl CaptureCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartCamera(_) => "start_camera",
            Self::SwitchCamera(_) => "switch_camera",
            Self::StopCamera(_) => "stop_camera",
            Self::CapturePhoto(_) => "capture_photo",
            Self::RetakePhoto(_) => "retake_photo",
            Self::SelectPhoto(..) => "select_photo",
            Self::DeletePhoto(..) => "delete_photo",
            Self::UploadFile(..) => "upload_file",
            Self::Confirm(_) => "confirm",
        }
    }
}
