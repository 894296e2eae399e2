//! Point-of-sale provider identifiers.
//!
//! Stored as upper-case text in the database (`SQUARE`, `SHOPIFY`,
//! `LIGHTSPEED`) and accepted case-insensitively from URL path segments.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A supported POS platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PosProvider {
    Square,
    Shopify,
    Lightspeed,
}

impl PosProvider {
    /// Every known provider, in display order.
    pub const ALL: [PosProvider; 3] = [Self::Square, Self::Shopify, Self::Lightspeed];

    /// Canonical upper-case identifier used for persistence and JSON.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Square => "SQUARE",
            Self::Shopify => "SHOPIFY",
            Self::Lightspeed => "LIGHTSPEED",
        }
    }
}

impl fmt::Display for PosProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PosProvider {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::Validation(format!("Unknown POS provider: {s}")))
    }
}
