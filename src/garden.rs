//! Garden stage derivation for rebloom
//!
//! The growth garden is a cosmetic tier derived purely from the user's level.
//! It is never stored; callers recompute it whenever the level may have
//! changed so it cannot drift out of sync.

use serde::{Deserialize, Serialize};

/// Cosmetic growth tier gating the garden visuals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GardenStage {
    Sprout,
    Flower,
    Tree,
}

impl GardenStage {
    /// Short display name for the stage
    pub fn label(&self) -> &'static str {
        match self {
            GardenStage::Sprout => "Sprout",
            GardenStage::Flower => "Flower",
            GardenStage::Tree => "Tree",
        }
    }

    /// Product copy shown alongside the garden view
    pub fn blurb(&self) -> &'static str {
        match self {
            GardenStage::Sprout => "A tiny sprout has broken through. Every small step waters it.",
            GardenStage::Flower => "Your garden is blooming. Your effort is starting to show.",
            GardenStage::Tree => "A sturdy tree stands in your garden. Look how far you've come.",
        }
    }
}

impl std::fmt::Display for GardenStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Derives the garden stage from a level: sprout below 3, flower below 7,
/// tree from 7 up.
pub fn stage_for(level: u32) -> GardenStage {
    if level < 3 {
        GardenStage::Sprout
    } else if level < 7 {
        GardenStage::Flower
    } else {
        GardenStage::Tree
    }
}
