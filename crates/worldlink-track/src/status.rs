use std::fmt;

use serde::{Deserialize, Serialize};

/// Shipment lifecycle status, ordered by progress.
///
/// Status only ever advances along this order and is frozen once
/// `Delivered`. The derived `Ord` follows declaration order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ShipmentStatus {
    Packing,
    Packed,
    Loading,
    Loaded,
    Delivering,
    Delivered,
}

impl ShipmentStatus {
    /// Parse a wire status token. Returns `None` for unknown tokens.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "packing" => Some(Self::Packing),
            "packed" => Some(Self::Packed),
            "loading" => Some(Self::Loading),
            "loaded" => Some(Self::Loaded),
            "delivering" => Some(Self::Delivering),
            "delivered" => Some(Self::Delivered),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Packing => "packing",
            Self::Packed => "packed",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Delivering => "delivering",
            Self::Delivered => "delivered",
        }
    }

    /// Whether this status accepts no further transitions.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
