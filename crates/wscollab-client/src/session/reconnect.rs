use std::time::Duration;

use crate::config::ReconnectSection;

/// Exponential backoff: `delay(attempt) = 2^attempt * base_delay`, bounded by
/// `max_retries`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl ReconnectPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Delay before attempt `attempt` (0-based), or `None` once the cap is reached.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_retries {
            return None;
        }
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        Some(self.base_delay.saturating_mul(factor))
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from(&ReconnectSection::default())
    }
}

impl From<&ReconnectSection> for ReconnectPolicy {
    fn from(cfg: &ReconnectSection) -> Self {
        Self::new(cfg.max_retries, cfg.base_delay())
    }
}
