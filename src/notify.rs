use crate::hooks;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Destructive,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Destructive => "destructive",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub severity: Severity,
}

impl Notification {
    pub fn new(title: impl Into<String>, description: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity,
        }
    }
}

/// User-facing notification sink. Fire-and-forget.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, n: Notification) {
        match n.severity {
            Severity::Info => tracing::info!("{}: {}", n.title, n.description),
            Severity::Destructive => tracing::warn!("{}: {}", n.title, n.description),
        }
    }
}

/// Hands notifications to a desktop command such as `notify-send`.
///
/// The command receives the title and description as arguments and the
/// severity in `STYLESHOT_SEVERITY`.
pub struct HookNotifier {
    command: String,
}

impl HookNotifier {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Notifier for HookNotifier {
    fn notify(&self, n: Notification) {
        TracingNotifier.notify(n.clone());
        hooks::run_hook(
            "notify",
            &self.command,
            vec![n.title, n.description],
            vec![("STYLESHOT_SEVERITY", n.severity.as_str().to_string())],
        );
    }
}
