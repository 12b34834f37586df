mod bitrate_tracker;
mod state_change;

pub use bitrate_tracker::BitrateTracker;
pub(crate) use state_change::StateChange;
