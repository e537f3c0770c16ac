use super::device::VideoEvent;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

/// Which signal declared a stream ready
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadySource {
    MetadataLoaded,
    CanPlay,
    Playing,
    Forced,
}

impl ReadySource {
    pub fn from_event(event: &VideoEvent) -> Option<Self> {
        match event {
            VideoEvent::MetadataLoaded => Some(Self::MetadataLoaded),
            VideoEvent::CanPlay => Some(Self::CanPlay),
            VideoEvent::Playing => Some(Self::Playing),
            VideoEvent::Error(_) => None,
        }
    }
}

/// One-shot readiness latch for a single stream.
///
/// The first of any lifecycle signal or the deadline wins; every later
/// signal observes the latch already set and is ignored. Once set, the
/// deadline is no longer reported so the timer is effectively cleared.
#[derive(Debug)]
pub struct ReadyLatch {
    deadline: Instant,
    fired: Option<ReadySource>,
}

impl ReadyLatch {
    pub fn arm(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            fired: None,
        }
    }

    /// Returns true only for the signal that sets the latch
    pub fn signal(&mut self, source: ReadySource) -> bool {
        if self.fired.is_some() {
            return false;
        }
        self.fired = Some(source);
        true
    }

    pub fn pending_deadline(&self) -> Option<Instant> {
        match self.fired {
            Some(_) => None,
            None => Some(self.deadline),
        }
    }

    pub fn fired(&self) -> Option<ReadySource> {
        self.fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_signal_wins() {
        let mut latch = ReadyLatch::arm(Duration::from_secs(4));
        assert!(latch.pending_deadline().is_some());

        assert!(latch.signal(ReadySource::CanPlay));
        assert!(!latch.signal(ReadySource::Playing));
        assert!(!latch.signal(ReadySource::Forced));

        assert_eq!(latch.fired(), Some(ReadySource::CanPlay));
        assert_eq!(latch.pending_deadline(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_is_relative_to_arming() {
        let before = Instant::now();
        let latch = ReadyLatch::arm(Duration::from_millis(4000));
        assert_eq!(
            latch.pending_deadline(),
            Some(before + Duration::from_millis(4000))
        );
    }

    #[test]
    fn test_error_event_is_not_a_ready_signal() {
        assert_eq!(ReadySource::from_event(&VideoEvent::Error("x".into())), None);
        assert_eq!(
            ReadySource::from_event(&VideoEvent::Playing),
            Some(ReadySource::Playing)
        );
    }
}
