use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::rtp::{Bitrate, DataSize};

const DEFAULT_BITRATE_WINDOW: Duration = Duration::from_secs(5);

/// Tracks the receive bitrate of one RTP layer over a sliding window.
///
/// Feeding happens on the packet path via [`BitrateTracker::update`], which is
/// also where entries older than the window are evicted. Reading via
/// [`BitrateTracker::rate`] is a pure function of the accumulated state and
/// `now`, so a stats/forwarding path can evaluate it without mutation.
#[derive(Debug, Clone)]
pub struct BitrateTracker {
    history: VecDeque<(Instant, DataSize)>,
    window: Duration,
}

impl Default for BitrateTracker {
    fn default() -> Self {
        Self::with_window(DEFAULT_BITRATE_WINDOW)
    }
}

impl BitrateTracker {
    pub fn with_window(window: Duration) -> Self {
        BitrateTracker {
            history: VecDeque::new(),
            window,
        }
    }

    /// Account one packet.
    ///
    /// Note: time should always monotonically increase in subsequent calls to update().
    pub fn update(&mut self, size: DataSize, now: Instant) {
        self.history.push_back((now, size));
        self.purge_old(now);
    }

    /// The windowed rate as of `now`.
    pub fn rate(&self, now: Instant) -> Bitrate {
        let total: DataSize = self
            .history
            .iter()
            .filter(|(t, _)| now.saturating_duration_since(*t) <= self.window)
            .map(|(_, s)| *s)
            .sum();

        total / self.window
    }

    fn purge_old(&mut self, now: Instant) {
        while let Some((t, _)) = self.history.front() {
            if now.saturating_duration_since(*t) > self.window {
                self.history.pop_front();
            } else {
                break;
            }
        }
    }
}
