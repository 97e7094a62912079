use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a catalog entry. The set is closed: cards can only ever be
/// built from these keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductKey {
    Accessoires,
    Vetements,
    Chaussures,
    Parfums,
    Tech,
    Bundle,
    Blueprint,
}

impl ProductKey {
    pub const ALL: [ProductKey; 7] = [
        Self::Accessoires,
        Self::Chaussures,
        Self::Vetements,
        Self::Parfums,
        Self::Tech,
        Self::Bundle,
        Self::Blueprint,
    ];

    /// Recommended entry point for visitors who are just starting out.
    pub const BEGINNER: ProductKey = Self::Accessoires;

    /// Short list shown when a visitor asks for packs without asking for all of them.
    pub const CURATED: [ProductKey; 3] = [Self::Accessoires, Self::Bundle, Self::Blueprint];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accessoires => "accessoires",
            Self::Vetements => "vetements",
            Self::Chaussures => "chaussures",
            Self::Parfums => "parfums",
            Self::Tech => "tech",
            Self::Bundle => "bundle",
            Self::Blueprint => "blueprint",
        }
    }
}

impl fmt::Display for ProductKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProductKey {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == value.trim())
            .ok_or_else(|| format!("unknown product key `{value}`"))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductCard {
    pub key: ProductKey,
    pub title: String,
    pub price_label: String,
    pub image_ref: String,
    pub url: String,
}
