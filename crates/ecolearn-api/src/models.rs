// Wire types for the admin endpoints.
//
// Read endpoints are handed to callers as raw `serde_json::Value` so the
// projection layer can decide how to interpret (or reject) the shape.
// Only the small, stable responses get typed structs here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Read endpoints exposed by the admin backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Nested `{categories: {label: {bin_color, cards}}}` payload.
    AssetRepository,
    /// Flat `{cards: [...]}` fast path for the gallery.
    CardsMinimal,
    /// `{counts: {label: n}, total_cards}` for the counters.
    AssetCounts,
}

impl Endpoint {
    /// Path relative to the API base URL.
    pub fn path(self) -> &'static str {
        match self {
            Self::AssetRepository => "admin/asset-repository",
            Self::CardsMinimal => "admin/cards-minimal",
            Self::AssetCounts => "admin/asset-counts",
        }
    }
}

/// Response of `GET admin/asset-counts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetCountsResponse {
    #[serde(default)]
    pub counts: BTreeMap<String, u64>,
    #[serde(default)]
    pub total_cards: u64,
}

/// A card image upload for `POST admin/one-shot-learn`.
#[derive(Debug, Clone)]
pub struct CardUpload {
    pub card_name: String,
    pub category_id: u32,
    pub file_name: String,
    pub image: Vec<u8>,
    /// When set, the backend replaces this card instead of creating one.
    pub replace_card_id: Option<String>,
}

/// Response of `POST admin/one-shot-learn`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneShotResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub card_id: Option<Value>,
    #[serde(default)]
    pub card_code: Option<String>,
    #[serde(default)]
    pub image_path: Option<String>,
    #[serde(default)]
    pub features_extracted: Option<u64>,
    /// Full card record, when the backend includes it.
    #[serde(default)]
    pub card: Option<Value>,
}
