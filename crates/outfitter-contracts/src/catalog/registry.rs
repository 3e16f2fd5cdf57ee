use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::OutfitError;
use crate::media::{mime_for_path, DataUri, DEFAULT_IMAGE_MIME};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleOption {
    pub value: String,
    pub label: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct StyleCatalog {
    styles: IndexMap<String, StyleOption>,
}

impl StyleCatalog {
    pub fn new(styles: Option<IndexMap<String, StyleOption>>) -> Self {
        Self {
            styles: styles.unwrap_or_else(default_styles),
        }
    }

    pub fn get(&self, value: &str) -> Option<&StyleOption> {
        self.styles.get(value.trim())
    }

    pub fn list(&self) -> impl Iterator<Item = &StyleOption> {
        self.styles.values()
    }

    /// First entry; new sessions start on it.
    pub fn default_style(&self) -> Option<&StyleOption> {
        self.styles.values().next()
    }
}

impl Default for StyleCatalog {
    fn default() -> Self {
        Self::new(None)
    }
}

fn default_styles() -> IndexMap<String, StyleOption> {
    let mut map = IndexMap::new();
    let mut insert = |value: &str, label: &str, description: &str| {
        map.insert(
            value.to_string(),
            StyleOption {
                value: value.to_string(),
                label: label.to_string(),
                description: description.to_string(),
            },
        );
    };

    insert(
        "casual",
        "Casual",
        "Comfort and practicality for every day. Think jeans, t-shirts, sneakers and knitwear.",
    );
    insert(
        "elegant",
        "Elegant",
        "Sophistication and refinement. Tailoring, fine fabrics, classic cuts and neutral colours.",
    );
    insert(
        "sporty",
        "Sporty",
        "Borrowed from sportswear. Comfortable pieces like sweatshirts, leggings, bomber jackets and sneakers.",
    );
    insert(
        "boho",
        "Boho",
        "Bohemian and hippie. Ethnic prints, fringes, flowing fabrics, tunics and handmade accessories.",
    );
    insert(
        "minimalist",
        "Minimalist",
        "Less is more. Neutral colours, straight cuts, few prints and a focus on quality pieces.",
    );
    insert(
        "creative",
        "Creative",
        "Originality and daring. Mixed prints, vibrant colours, textures and statement pieces.",
    );
    insert(
        "romantic",
        "Romantic",
        "Delicate and feminine. Bows, ruffles, floral prints, pastel tones and light fabrics.",
    );
    insert(
        "rocker",
        "Rocker",
        "Attitude and rebellion. Leather, studs, ripped denim, band tees and combat boots.",
    );
    map
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Avatar {
    pub id: String,
    pub image_data: DataUri,
    pub alt_text: String,
}

impl Avatar {
    /// One-off avatar built from a local photo; never added to the catalog.
    pub fn from_file(path: &Path) -> Result<Self, OutfitError> {
        let bytes = std::fs::read(path).map_err(|err| {
            OutfitError::persistence(format!("failed reading {}: {err}", path.display()))
        })?;
        let mime = mime_for_path(path).unwrap_or(DEFAULT_IMAGE_MIME);
        let alt_text = path
            .file_stem()
            .and_then(|value| value.to_str())
            .unwrap_or("custom avatar")
            .to_string();
        Ok(Self {
            id: "custom".to_string(),
            image_data: DataUri::from_bytes(mime, &bytes),
            alt_text,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AvatarCatalog {
    avatars: IndexMap<String, Avatar>,
}

impl AvatarCatalog {
    pub fn new(avatars: Option<Vec<Avatar>>) -> Self {
        let avatars = avatars
            .unwrap_or_else(default_avatars)
            .into_iter()
            .map(|avatar| (avatar.id.clone(), avatar))
            .collect();
        Self { avatars }
    }

    pub fn get(&self, id: &str) -> Option<&Avatar> {
        self.avatars.get(id.trim())
    }

    pub fn list(&self) -> impl Iterator<Item = &Avatar> {
        self.avatars.values()
    }

    pub fn default_avatar(&self) -> Option<&Avatar> {
        self.avatars.values().next()
    }
}

impl Default for AvatarCatalog {
    fn default() -> Self {
        Self::new(None)
    }
}

// 1x1 transparent PNG; stand-in artwork for the built-in models.
const PLACEHOLDER_AVATAR_PNG: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

fn default_avatars() -> Vec<Avatar> {
    [
        ("avatar1", "Model with dark hair and light skin"),
        ("avatar2", "Model with blond hair and light skin"),
        ("avatar3", "Model with dark hair and dark skin"),
        ("avatar4", "Model with red hair and light skin"),
    ]
    .into_iter()
    .map(|(id, alt)| Avatar {
        id: id.to_string(),
        image_data: DataUri::new("image/png", PLACEHOLDER_AVATAR_PNG),
        alt_text: alt.to_string(),
    })
    .collect()
}
