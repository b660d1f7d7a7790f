//! Units attached to quantitative parameter values.
use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Unit of a relaxation time (or none, for unitless parameters).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    #[default]
    Seconds,
    Milliseconds,
    None,
}

impl Unit {
    /// Short symbol used in axis labels; empty for [Unit::None].
    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::Seconds => "s",
            Unit::Milliseconds => "ms",
            Unit::None => "",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Seconds => "seconds",
            Unit::Milliseconds => "milliseconds",
            Unit::None => "none",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Unit {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "seconds" => Ok(Unit::Seconds),
            "milliseconds" => Ok(Unit::Milliseconds),
            "none" => Ok(Unit::None),
            other => Err(crate::Error::general(format!("unknown unit '{other}'"))),
        }
    }
}
