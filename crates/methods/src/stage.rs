use std::{fmt, str::FromStr};

use crate::error::Error;

/// Which half of the offline/online split an operation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Expensive, one-time precomputation: operators are projected and saved.
    Offline,
    /// Cheap per-query evaluation: operators are loaded from storage.
    Online,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Offline => f.write_str("offline"),
            Self::Online => f.write_str("online"),
        }
    }
}

impl FromStr for Stage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "offline" => Ok(Self::Offline),
            "online" => Ok(Self::Online),
            other => Err(Error::Stage(other.to_owned())),
        }
    }
}
