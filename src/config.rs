//! Tuning knobs for the lock-free structures.

use crate::error::ConfigError;

/// Largest back-off window, in spins, a queue will accept.
pub const MAX_BACKOFF_LIMIT: u32 = 1 << 16;

const DEFAULT_RETIRE_THRESHOLD: usize = 100;
const DEFAULT_MAX_BACKOFF: u32 = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// How many nodes a thread may retire before it scans the hazard pointers and frees them.
    pub retire_threshold: usize,
    /// Upper bound of the randomised exponential back-off after a failed CAS, in spins.
    /// `0` disables back-off entirely.
    pub max_backoff: u32,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retire_threshold == 0 {
            return Err(ConfigError::ZeroRetireThreshold);
        }
        if self.max_backoff > MAX_BACKOFF_LIMIT {
            return Err(ConfigError::BackoffTooLarge {
                requested: self.max_backoff,
                limit: MAX_BACKOFF_LIMIT,
            });
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            retire_threshold: DEFAULT_RETIRE_THRESHOLD,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}
