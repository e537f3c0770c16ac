use crate::camera::{DirectoryCamera, JpegFrameEncoder, ReadySource};
use crate::config::Config;
use crate::enhance::{BackgroundRemover, CommandRemover};
use crate::notify::{HookNotifier, Notification, Notifier, Severity, TracingNotifier};
use crate::photo::{PhotoRecord, UploadedFile};
use crate::recommend::{Dataset, RecommendationKind, RecommendationRequest, Recommender};
use crate::services::{CaptureDeps, CaptureHandle, ControllerSettings};
use crate::session::{CaptureMode, FacingMode, SessionSnapshot};

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// One line typed at the prompt
#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    Start,
    Switch,
    Stop,
    Capture,
    Retake,
    Select(usize),
    Delete(usize),
    Upload(PathBuf),
    Confirm,
    Status,
    Recommend {
        dataset: PathBuf,
        user_id: String,
        kind: RecommendationKind,
        limit: usize,
    },
    Help,
    Quit,
}

impl ShellCommand {
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };

        let cmd = match verb {
            "start" => Self::Start,
            "switch" => Self::Switch,
            "stop" => Self::Stop,
            "capture" | "snap" => Self::Capture,
            "retake" => Self::Retake,
            "select" => Self::Select(parse_index(words.next())?),
            "delete" => Self::Delete(parse_index(words.next())?),
            "upload" => {
                let path = words.next().context("usage: upload <path>")?;
                Self::Upload(PathBuf::from(path))
            }
            "confirm" => Self::Confirm,
            "status" => Self::Status,
            "recommend" => {
                let usage = "usage: recommend <dataset.json> <user> [kind] [limit]";
                let dataset = PathBuf::from(words.next().context(usage)?);
                let user_id = words.next().context(usage)?.to_string();
                let kind = match words.next() {
                    Some(kind) => kind.parse()?,
                    None => RecommendationKind::Hybrid,
                };
                let limit = match words.next() {
                    Some(limit) => limit
                        .parse()
                        .with_context(|| format!("invalid limit {:?}", limit))?,
                    None => 10,
                };
                Self::Recommend {
                    dataset,
                    user_id,
                    kind,
                    limit,
                }
            }
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(anyhow::anyhow!("unknown command {:?} (try help)", other)),
        };

        Ok(Some(cmd))
    }
}

/// Photos are numbered from 1 at the prompt
fn parse_index(word: Option<&str>) -> Result<usize> {
    let word = word.context("missing photo number")?;
    match word.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(anyhow::anyhow!("invalid photo number {:?}", word)),
    }
}

const HELP: &str = "\
commands:
  start | switch | stop        camera control
  capture | retake             take or discard a preview
  select <n> | delete <n>      pick or remove photo n from the history
  upload <path>                use an image file instead of the camera
  confirm                      save the selected photo
  status                       print the session state
  recommend <dataset> <user> [similar_users|style_based|emotion_based|hybrid] [limit]
  quit";

/// Printable summary of a snapshot (photos shown by size, not content)
#[derive(Debug, Serialize)]
struct Status {
    mode: CaptureMode,
    facing_mode: FacingMode,
    photos: Vec<String>,
    selected: Option<usize>,
    is_stream_loading: bool,
    is_stream_ready: bool,
    ready_via: Option<ReadySource>,
    is_uploading: bool,
    last_error: Option<String>,
}

impl From<&SessionSnapshot> for Status {
    fn from(snapshot: &SessionSnapshot) -> Self {
        Self {
            mode: snapshot.mode,
            facing_mode: snapshot.facing_mode,
            photos: snapshot
                .photos
                .iter()
                .map(|p| format!("{} ({} chars)", p.mime(), p.as_str().len()))
                .collect(),
            selected: snapshot
                .selected
                .as_ref()
                .and_then(|s| snapshot.photos.iter().position(|p| p == s))
                .map(|i| i + 1),
            is_stream_loading: snapshot.is_stream_loading,
            is_stream_ready: snapshot.is_stream_ready,
            ready_via: snapshot.ready_via,
            is_uploading: snapshot.is_uploading,
            last_error: snapshot.last_error.as_ref().map(|e| e.to_string()),
        }
    }
}

pub struct App {
    capture: CaptureHandle,
}

impl App {
    pub fn new(config: &Config) -> Result<Self> {
        let deps = Self::build_deps(config);
        let notifier = deps.notifier.clone();
        let settings = ControllerSettings::from_config(config);

        let (confirmed_tx, confirmed_rx) = mpsc::channel(8);
        let capture = CaptureHandle::spawn(settings, deps, confirmed_tx);
        tokio::spawn(save_confirmed(
            config.output_dir.clone(),
            confirmed_rx,
            notifier,
        ));

        tracing::info!(
            "Ready! Reading frames from {:?}, confirmed photos go to {:?}",
            config.camera_dir,
            config.output_dir
        );

        Ok(Self { capture })
    }

    fn build_deps(config: &Config) -> CaptureDeps {
        let remover = config.background_removal_command.as_ref().map(|command| {
            tracing::info!("Background removal enabled: {}", command);
            Arc::new(CommandRemover::new(
                command.clone(),
                Duration::from_secs(config.background_removal_timeout),
            )) as Arc<dyn BackgroundRemover>
        });

        let notifier: Arc<dyn Notifier> = match &config.notify_command {
            Some(command) => Arc::new(HookNotifier::new(command.clone())),
            None => Arc::new(TracingNotifier),
        };

        CaptureDeps {
            devices: Arc::new(DirectoryCamera::new(config.camera_dir.clone())),
            encoder: Arc::new(JpegFrameEncoder::new(config.jpeg_quality)),
            remover,
            notifier,
        }
    }

    /// Handle one input line. Returns false once the user asked to quit.
    pub async fn handle_line(&self, line: &str) -> Result<bool> {
        let Some(cmd) = ShellCommand::parse(line)? else {
            return Ok(true);
        };
        tracing::debug!("handle_line: {:?}", cmd);

        match cmd {
            ShellCommand::Start => {
                self.capture.start_camera().await?;
                self.print_status()?;
            }
            ShellCommand::Switch => {
                self.capture.switch_camera().await?;
                self.print_status()?;
            }
            ShellCommand::Stop => self.capture.stop_camera().await?,
            ShellCommand::Capture => match self.capture.capture_photo().await? {
                Some(photo) => println!("captured {} ({} chars)", photo.mime(), photo.as_str().len()),
                None => println!("nothing captured (camera not ready)"),
            },
            ShellCommand::Retake => self.capture.retake_photo().await?,
            ShellCommand::Select(n) => {
                let photo = self.photo_at(n)?;
                if !self.capture.select_photo(photo).await? {
                    println!("photo {} is no longer in the history", n);
                }
            }
            ShellCommand::Delete(n) => {
                let photo = self.photo_at(n)?;
                self.capture.delete_photo(photo).await?;
            }
            ShellCommand::Upload(path) => {
                let file = UploadedFile::from_path(&path)
                    .await
                    .with_context(|| format!("Failed to read upload: {:?}", path))?;
                self.capture.upload_file(file).await?;
                self.print_status()?;
            }
            ShellCommand::Confirm => match self.capture.confirm().await? {
                Some(_) => println!("confirmed"),
                None => println!("no photo selected"),
            },
            ShellCommand::Status => self.print_status()?,
            ShellCommand::Recommend {
                dataset,
                user_id,
                kind,
                limit,
            } => self.recommend(&dataset, user_id, kind, limit).await?,
            ShellCommand::Help => println!("{}", HELP),
            ShellCommand::Quit => return Ok(false),
        }

        Ok(true)
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.capture.stop_camera().await
    }

    fn photo_at(&self, n: usize) -> Result<PhotoRecord> {
        self.capture
            .snapshot()
            .photos
            .get(n - 1)
            .cloned()
            .with_context(|| format!("no photo {} in the history", n))
    }

    fn print_status(&self) -> Result<()> {
        let snapshot = self.capture.snapshot();
        println!("{}", serde_json::to_string_pretty(&Status::from(&snapshot))?);
        Ok(())
    }

    async fn recommend(
        &self,
        dataset: &Path,
        user_id: String,
        kind: RecommendationKind,
        limit: usize,
    ) -> Result<()> {
        let path = dataset.to_path_buf();
        let data = tokio::task::spawn_blocking(move || Dataset::load(&path)).await??;

        let request = RecommendationRequest {
            user_id,
            recommendation_type: kind,
            limit,
        };
        let result = Recommender::new(&data).recommend(&request);
        tracing::info!(
            "Generated {} recommendations for {}",
            result.recommendations.len(),
            request.user_id
        );
        println!("{}", serde_json::to_string_pretty(&result)?);
        Ok(())
    }
}

/// Persist every confirmed photo into `dir` under a unique name
async fn save_confirmed(
    dir: PathBuf,
    mut confirmed_rx: mpsc::Receiver<PhotoRecord>,
    notifier: Arc<dyn Notifier>,
) {
    while let Some(photo) = confirmed_rx.recv().await {
        let dir = dir.clone();
        let result = tokio::task::spawn_blocking(move || write_photo(&dir, &photo)).await;
        match result {
            Ok(Ok(path)) => {
                tracing::info!("Saved confirmed photo to {:?}", path);
                notifier.notify(Notification::new(
                    "Photo saved",
                    path.display().to_string(),
                    Severity::Info,
                ));
            }
            Ok(Err(e)) => {
                tracing::error!("Failed to save confirmed photo: {:#}", e);
                notifier.notify(Notification::new(
                    "Could not save photo",
                    format!("{:#}", e),
                    Severity::Destructive,
                ));
            }
            Err(e) => tracing::error!("Photo writer task failed: {}", e),
        }
    }
    tracing::debug!("Confirmed photo channel closed");
}

fn write_photo(dir: &Path, photo: &PhotoRecord) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {:?}", dir))?;

    let payload = photo.to_payload()?;
    let suffix = format!(".{}", photo.extension());
    let mut file = tempfile::Builder::new()
        .prefix("styleshot-")
        .suffix(&suffix)
        .tempfile_in(dir)?;

    std::io::Write::write_all(&mut file, &payload.bytes)?;
    let (_, path) = file.keep()?;
    Ok(path)
}
