pub mod capture;

pub use capture::{CaptureDeps, CaptureHandle, ControllerSettings};
