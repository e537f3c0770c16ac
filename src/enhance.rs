use crate::photo::{ImagePayload, PhotoError, PhotoRecord};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Optional post-processing that cuts the person out of an uploaded photo
#[async_trait]
pub trait BackgroundRemover: Send + Sync {
    async fn remove_background(&self, image: &ImagePayload) -> Result<ImagePayload, PhotoError>;
}

/// Pipes the image through an external tool (e.g. `rembg i`) on stdin/stdout
pub struct CommandRemover {
    command: String,
    timeout: Duration,
}

impl CommandRemover {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }

    async fn run(&self, image: &ImagePayload) -> Result<ImagePayload, PhotoError> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // Feed stdin from its own task so a chatty tool cannot fill its
        // stdout pipe while we are still writing.
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| PhotoError::Enhancement("stdin unavailable".into()))?;
        let bytes = image.bytes.clone();
        let writer = tokio::spawn(async move {
            let result = stdin.write_all(&bytes).await;
            drop(stdin);
            result
        });

        let output = child.wait_with_output().await?;
        writer
            .await
            .map_err(|e| PhotoError::Enhancement(e.to_string()))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PhotoError::Enhancement(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        if output.stdout.is_empty() {
            return Err(PhotoError::Enhancement("tool produced no output".into()));
        }

        let mime = image::guess_format(&output.stdout)
            .map(|f| f.to_mime_type())
            .unwrap_or("image/png");

        Ok(ImagePayload::new(mime, output.stdout))
    }
}

#[async_trait]
impl BackgroundRemover for CommandRemover {
    async fn remove_background(&self, image: &ImagePayload) -> Result<ImagePayload, PhotoError> {
        tokio::time::timeout(self.timeout, self.run(image))
            .await
            .map_err(|_| PhotoError::Enhancement(format!("timed out after {:?}", self.timeout)))?
    }
}

/// Try to enhance an upload, falling back to the untouched original.
///
/// Enhancement never fails an upload; errors are logged and swallowed.
pub async fn enhance_or_original(
    remover: Option<&dyn BackgroundRemover>,
    original: ImagePayload,
) -> PhotoRecord {
    let Some(remover) = remover else {
        return PhotoRecord::from_payload(&original);
    };

    match remover.remove_background(&original).await {
        Ok(enhanced) => {
            tracing::info!(
                "Background removed ({} -> {} bytes)",
                original.bytes.len(),
                enhanced.bytes.len()
            );
            PhotoRecord::from_payload(&enhanced)
        }
        Err(e) => {
            tracing::warn!("Background removal failed, using original image: {}", e);
            PhotoRecord::from_payload(&original)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn original() -> ImagePayload {
        ImagePayload::new("image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3])
    }

    #[tokio::test]
    async fn test_no_remover_keeps_original() {
        let record = enhance_or_original(None, original()).await;
        assert_eq!(record.to_payload().unwrap(), original());
    }

    #[tokio::test]
    async fn test_failing_command_falls_back() {
        let remover = CommandRemover::new("cat >/dev/null; exit 3", Duration::from_secs(5));
        let record = enhance_or_original(Some(&remover), original()).await;
        assert_eq!(record.to_payload().unwrap(), original());
    }

    #[tokio::test]
    async fn test_empty_output_falls_back() {
        let remover = CommandRemover::new("cat >/dev/null", Duration::from_secs(5));
        assert!(matches!(
            remover.remove_background(&original()).await,
            Err(PhotoError::Enhancement(_))
        ));
    }

    #[tokio::test]
    async fn test_slow_command_times_out() {
        let remover = CommandRemover::new("sleep 5", Duration::from_millis(50));
        let record = enhance_or_original(Some(&remover), original()).await;
        assert_eq!(record.to_payload().unwrap(), original());
    }

    #[tokio::test]
    async fn test_successful_command_replaces_image() {
        let dir = tempfile::tempdir().unwrap();
        let cutout = dir.path().join("cutout.png");
        image::RgbaImage::from_pixel(2, 2, image::Rgba([0, 0, 0, 0]))
            .save(&cutout)
            .unwrap();

        let remover = CommandRemover::new(
            format!("cat >/dev/null; cat '{}'", cutout.display()),
            Duration::from_secs(5),
        );
        let record = enhance_or_original(Some(&remover), original()).await;

        assert_eq!(record.mime(), "image/png");
        assert_eq!(
            record.to_payload().unwrap().bytes,
            std::fs::read(&cutout).unwrap()
        );
    }
}
