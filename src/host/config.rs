//! Host configuration.

use serde::{Deserialize, Serialize};

use crate::error::{LoopViewError, Result};

/// Default number of view signals buffered while no observer is attached.
pub const DEFAULT_MAX_QUEUED: usize = 100;

/// Tunables of a [`LoopHost`](super::LoopHost).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Signal buffer capacity while the view is detached
    #[serde(rename = "max-queued")]
    pub max_queued: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            max_queued: DEFAULT_MAX_QUEUED,
        }
    }
}

impl HostConfig {
    /// Set the signal buffer capacity
    pub fn with_max_queued(mut self, max_queued: usize) -> Self {
        self.max_queued = max_queued;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.max_queued == 0 {
            return Err(LoopViewError::InvalidState("max-queued must be > 0".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_max_queued() {
        assert_eq!(HostConfig::default().max_queued, 100);
        assert!(HostConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_max_queued_invalid() {
        let config = HostConfig::default().with_max_queued(0);
        assert!(matches!(config.validate(), Err(LoopViewError::InvalidState(_))));
    }

    #[test]
    fn test_parse_yaml() {
        let config: HostConfig = serde_yaml::from_str("max-queued: 8").unwrap();
        assert_eq!(config.max_queued, 8);

        let config: HostConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.max_queued, DEFAULT_MAX_QUEUED);
    }
}
