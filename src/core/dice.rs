//! Dice profile definitions
//! Each dice color maps to a distinct advertised service and display
//! metadata.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::bluetooth::constants::{UUID_BLUE_DICE_SERVICE, UUID_PINK_DICE_SERVICE};

/// The closed set of dice variants supported by this bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiceColor {
    Pink,
    Blue,
}

impl DiceColor {
    /// The service UUID the accessory advertises for this variant.
    pub fn service_uuid(&self) -> Uuid {
        match self {
            Self::Pink => UUID_PINK_DICE_SERVICE,
            Self::Blue => UUID_BLUE_DICE_SERVICE,
        }
    }

    /// Human-readable name shown in the accessory picker.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Pink => "Pink Dice",
            Self::Blue => "Blue Dice",
        }
    }

    /// Asset name for the product image.
    pub fn dice_name(&self) -> &'static str {
        match self {
            Self::Pink => "pink",
            Self::Blue => "blue",
        }
    }

    /// Resolves a paired accessory's display name back to its variant.
    pub fn from_display_name(name: &str) -> Option<Self> {
        if name == Self::Pink.display_name() {
            Some(Self::Pink)
        } else if name == Self::Blue.display_name() {
            Some(Self::Blue)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_resolve_back_to_colors() {
        assert_eq!(DiceColor::from_display_name("Pink Dice"), Some(DiceColor::Pink));
        assert_eq!(DiceColor::from_display_name("Blue Dice"), Some(DiceColor::Blue));
        assert_eq!(DiceColor::from_display_name("Green Dice"), None);
    }

    #[test]
    fn each_color_has_a_distinct_service() {
        assert_ne!(DiceColor::Pink.service_uuid(), DiceColor::Blue.service_uuid());
    }
}
