//! Order lifecycle stages
//!
//! Stages carry an explicit integer code (-1..4) on the wire and in the
//! store; the enum exists so transition logic never touches raw integers.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Position in the order lifecycle.
///
/// `Cancelled` and `Delivered` are terminal; `Placed` is the initial stage
/// of every order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Cancelled,
    Placed,
    Preparing,
    Baking,
    OutForDelivery,
    Delivered,
}

impl Stage {
    /// Integer code as stored and broadcast: -1 cancelled, 0..4 placed
    /// through delivered.
    pub fn code(&self) -> i8 {
        match self {
            Stage::Cancelled => -1,
            Stage::Placed => 0,
            Stage::Preparing => 1,
            Stage::Baking => 2,
            Stage::OutForDelivery => 3,
            Stage::Delivered => 4,
        }
    }

    pub fn from_code(code: i8) -> Option<Self> {
        match code {
            -1 => Some(Stage::Cancelled),
            0 => Some(Stage::Placed),
            1 => Some(Stage::Preparing),
            2 => Some(Stage::Baking),
            3 => Some(Stage::OutForDelivery),
            4 => Some(Stage::Delivered),
            _ => None,
        }
    }

    /// Human label, denormalized onto the order record.
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Cancelled => "Cancelled",
            Stage::Placed => "Placed",
            Stage::Preparing => "Preparing",
            Stage::Baking => "Baking",
            Stage::OutForDelivery => "Out for Delivery",
            Stage::Delivered => "Delivered",
        }
    }

    /// Strict successor in the forward chain, None at the ends.
    pub fn next(&self) -> Option<Stage> {
        match self {
            Stage::Placed => Some(Stage::Preparing),
            Stage::Preparing => Some(Stage::Baking),
            Stage::Baking => Some(Stage::OutForDelivery),
            Stage::OutForDelivery => Some(Stage::Delivered),
            Stage::Cancelled | Stage::Delivered => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Cancelled | Stage::Delivered)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Stage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i8(self.code())
    }
}

impl<'de> Deserialize<'de> for Stage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i8::deserialize(deserializer)?;
        Stage::from_code(code).ok_or_else(|| D::Error::custom(format!("invalid stage code {code}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for code in -1..=4 {
            let stage = Stage::from_code(code).unwrap();
            assert_eq!(stage.code(), code);
        }
        assert!(Stage::from_code(5).is_none());
        assert!(Stage::from_code(-2).is_none());
    }

    #[test]
    fn forward_chain_is_strict() {
        assert_eq!(Stage::Placed.next(), Some(Stage::Preparing));
        assert_eq!(Stage::OutForDelivery.next(), Some(Stage::Delivered));
        assert_eq!(Stage::Delivered.next(), None);
        assert_eq!(Stage::Cancelled.next(), None);
    }

    #[test]
    fn serializes_as_integer() {
        let json = serde_json::to_string(&Stage::OutForDelivery).unwrap();
        assert_eq!(json, "3");
        let back: Stage = serde_json::from_str("-1").unwrap();
        assert_eq!(back, Stage::Cancelled);
    }
}
