// Rendered-surface value types.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use strum::{Display, IntoStaticStr};

use crate::model::{Item, ItemId};

/// Lifecycle of the gallery surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Display, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SurfaceState {
    #[default]
    Empty,
    Populating,
    Synced,
}

/// The on-screen representation of one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderUnit {
    pub id: ItemId,
    pub title: String,
    pub group: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    pub visible: bool,
}

impl RenderUnit {
    pub fn from_item(item: &Arc<Item>) -> Self {
        Self {
            id: item.id.clone(),
            title: item.name.clone(),
            group: item.group.clone(),
            color: item.color.clone(),
            image_path: item.image_path.clone(),
            visible: true,
        }
    }

    /// Whether this unit already presents `item` as it is now. Visibility
    /// is filter state and is not compared.
    pub fn shows(&self, item: &Item) -> bool {
        self.id == item.id
            && self.title == item.name
            && self.group == item.group
            && self.color == item.color
            && self.image_path == item.image_path
    }
}

/// Non-item content shown in place of (or above) the gallery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum Placeholder {
    /// No items at all.
    Empty,
    /// Items exist but the active filter hides all of them.
    NoMatches,
    /// The last load failed.
    Error(String),
}

/// Point-in-time copy of the whole surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GallerySnapshot {
    pub state: SurfaceState,
    pub units: Vec<RenderUnit>,
    pub placeholder: Option<Placeholder>,
    pub counters: IndexMap<String, usize>,
    pub total: usize,
}

impl GallerySnapshot {
    pub fn visible(&self) -> impl Iterator<Item = &RenderUnit> {
        self.units.iter().filter(|u| u.visible)
    }

    pub fn ids(&self) -> Vec<ItemId> {
        self.units.iter().map(|u| u.id.clone()).collect()
    }

    pub fn counter(&self, group: &str) -> usize {
        self.counters.get(group).copied().unwrap_or(0)
    }
}

/// Outcome of a full render request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The surface was rebuilt with this many units.
    Rendered(usize),
    /// The surface already matched, or another build is running.
    Skipped,
    /// A reset arrived mid-build; the partial build was discarded.
    Abandoned,
}

/// Outcome of a single-item patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    Applied,
    /// Held until the running build completes.
    Queued,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unit_carries_item_presentation() {
        let item = Arc::new(
            Item::new(7, "Pizza Box", "Landfill")
                .with_color("gray")
                .with_image_path("/uploads/pizza.jpg"),
        );
        let unit = RenderUnit::from_item(&item);

        assert_eq!(unit.title, "Pizza Box");
        assert_eq!(unit.image_path.as_deref(), Some("/uploads/pizza.jpg"));
        assert!(unit.visible);
    }

    #[test]
    fn placeholder_serializes_with_kind_tag() {
        let value = serde_json::to_value(Placeholder::Error("timed out".into())).unwrap();
        assert_eq!(value, json!({"kind": "error", "message": "timed out"}));
        assert_eq!(serde_json::to_value(Placeholder::Empty).unwrap(), json!({"kind": "empty"}));
    }
}
