use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::OutfitError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Top,
    Bottom,
    FullbodyOuterwear,
    Shoes,
    Accessory,
    Uncategorized,
}

impl Default for Category {
    fn default() -> Self {
        Self::Uncategorized
    }
}

impl Category {
    /// Committable categories in the order the advice instruction lists them.
    pub const WEARABLE: [Category; 5] = [
        Category::Top,
        Category::Bottom,
        Category::FullbodyOuterwear,
        Category::Shoes,
        Category::Accessory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::FullbodyOuterwear => "fullbody_outerwear",
            Self::Shoes => "shoes",
            Self::Accessory => "accessory",
            Self::Uncategorized => "uncategorized",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Top => "Top piece",
            Self::Bottom => "Bottom piece",
            Self::FullbodyOuterwear => "One-piece / Outerwear",
            Self::Shoes => "Shoes",
            Self::Accessory => "Accessory",
            Self::Uncategorized => "Select a category",
        }
    }

    pub fn is_categorized(&self) -> bool {
        *self != Self::Uncategorized
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = OutfitError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "top" | "tops" => Ok(Self::Top),
            "bottom" | "bottoms" => Ok(Self::Bottom),
            "fullbody_outerwear" | "fullbody" | "outerwear" => Ok(Self::FullbodyOuterwear),
            "shoes" | "shoe" => Ok(Self::Shoes),
            "accessory" | "accessories" => Ok(Self::Accessory),
            "uncategorized" => Ok(Self::Uncategorized),
            _ => Err(OutfitError::validation(format!("unknown category '{raw}'"))),
        }
    }
}
