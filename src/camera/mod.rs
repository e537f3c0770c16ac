pub mod device;
pub mod dir_device;
pub mod error;
pub mod frame;
pub mod readiness;

pub use device::{AcquiredStream, MediaDevices, ResolutionHint, VideoEvent, VideoStream};
pub use dir_device::DirectoryCamera;
pub use error::CameraError;
pub use frame::{FrameEncoder, JpegFrameEncoder};
pub use readiness::{ReadyLatch, ReadySource};
