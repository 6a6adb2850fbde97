//! Registry configuration

use std::time::Duration;

/// Configuration for the source registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Frames buffered per room for slow subscribers before they start skipping
    pub broadcast_capacity: usize,

    /// Duration of each frame the pump publishes
    pub frame_duration: Duration,

    /// Restart the origin when it runs out instead of going silent
    pub loop_playback: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: 256, // ~5s at 20ms frames
            frame_duration: Duration::from_millis(20),
            loop_playback: true,
        }
    }
}

impl RegistryConfig {
    /// Set the per-room broadcast capacity
    pub fn broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity.max(1);
        self
    }

    /// Set the frame duration
    pub fn frame_duration(mut self, duration: Duration) -> Self {
        self.frame_duration = duration;
        self
    }

    /// Enable or disable looping playback
    pub fn loop_playback(mut self, enabled: bool) -> Self {
        self.loop_playback = enabled;
        self
    }
}
