//! Webhook event processing states.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Processing status of a stored webhook event.
///
/// Every event is written as `Received` before any business logic runs and
/// then moves to exactly one terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WebhookStatus {
    Received,
    Processed,
    /// Deliberately ignored: not actionable, not completed, or no matching
    /// connection.
    Skipped,
    /// Processing raised an error; provider redelivery may retry.
    Failed,
}

impl WebhookStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "RECEIVED",
            Self::Processed => "PROCESSED",
            Self::Skipped => "SKIPPED",
            Self::Failed => "FAILED",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Received)
    }
}

impl fmt::Display for WebhookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WebhookStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RECEIVED" => Ok(Self::Received),
            "PROCESSED" => Ok(Self::Processed),
            "SKIPPED" => Ok(Self::Skipped),
            "FAILED" => Ok(Self::Failed),
            other => Err(CoreError::Validation(format!(
                "Unknown webhook status: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_received_is_non_terminal() {
        assert!(!WebhookStatus::Received.is_terminal());
        assert!(WebhookStatus::Processed.is_terminal());
        assert!(WebhookStatus::Skipped.is_terminal());
        assert!(WebhookStatus::Failed.is_terminal());
    }

    #[test]
    fn parses_stored_text() {
        assert_eq!("SKIPPED".parse::<WebhookStatus>().unwrap(), WebhookStatus::Skipped);
        assert!("skipped".parse::<WebhookStatus>().is_err());
    }
}
