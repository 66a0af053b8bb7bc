use serde::Deserialize;
use std::{fmt, str::FromStr};

///
/// Consistency
///
/// Per-statement replica acknowledgement level.
/// A statement without one runs at the store's client default.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Consistency {
    /// Writes only; a hint on any node is enough.
    Any,
    One,
    Two,
    Three,
    Quorum,
    All,
    LocalQuorum,
    EachQuorum,
    Serial,
    LocalSerial,
    LocalOne,
}

impl Consistency {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Any => "ANY",
            Self::One => "ONE",
            Self::Two => "TWO",
            Self::Three => "THREE",
            Self::Quorum => "QUORUM",
            Self::All => "ALL",
            Self::LocalQuorum => "LOCAL_QUORUM",
            Self::EachQuorum => "EACH_QUORUM",
            Self::Serial => "SERIAL",
            Self::LocalSerial => "LOCAL_SERIAL",
            Self::LocalOne => "LOCAL_ONE",
        }
    }

    /// Replicas that must acknowledge under a given replication factor.
    #[must_use]
    pub const fn required_replicas(self, replication_factor: u32) -> u32 {
        let quorum = replication_factor / 2 + 1;

        match self {
            Self::Any => 0,
            Self::One | Self::LocalOne => 1,
            Self::Two => 2,
            Self::Three => 3,
            Self::Quorum
            | Self::LocalQuorum
            | Self::EachQuorum
            | Self::Serial
            | Self::LocalSerial => quorum,
            Self::All => replication_factor,
        }
    }

    /// Levels the store accepts for reads.
    #[must_use]
    pub const fn is_readable(self) -> bool {
        !matches!(self, Self::Any)
    }
}

impl fmt::Display for Consistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Consistency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level = match s.to_ascii_uppercase().as_str() {
            "ANY" => Self::Any,
            "ONE" => Self::One,
            "TWO" => Self::Two,
            "THREE" => Self::Three,
            "QUORUM" => Self::Quorum,
            "ALL" => Self::All,
            "LOCAL_QUORUM" => Self::LocalQuorum,
            "EACH_QUORUM" => Self::EachQuorum,
            "SERIAL" => Self::Serial,
            "LOCAL_SERIAL" => Self::LocalSerial,
            "LOCAL_ONE" => Self::LocalOne,
            other => return Err(format!("unknown consistency level '{other}'")),
        };

        Ok(level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quorum_is_majority_of_replication_factor() {
        assert_eq!(Consistency::Quorum.required_replicas(3), 2);
        assert_eq!(Consistency::Quorum.required_replicas(5), 3);
        assert_eq!(Consistency::All.required_replicas(3), 3);
        assert_eq!(Consistency::Any.required_replicas(3), 0);
    }

    #[test]
    fn parse_accepts_any_case() {
        assert_eq!("local_quorum".parse(), Ok(Consistency::LocalQuorum));
        assert!("most".parse::<Consistency>().is_err());
    }
}
