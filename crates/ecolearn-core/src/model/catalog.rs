// ── Authoritative item collection ──
//
// Items are stored once, keyed by id. Groups hold ids only, so the flat
// list and the per-group view can never disagree about an item's fields.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use super::item::{Item, ItemId};

/// A named partition of items (a waste category).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub label: String,
    pub color: Option<String>,
    members: IndexSet<ItemId>,
}

impl Group {
    pub fn new(label: impl Into<String>, color: Option<String>) -> Self {
        Self {
            label: label.into(),
            color,
            members: IndexSet::new(),
        }
    }

    pub fn members(&self) -> impl Iterator<Item = &ItemId> {
        self.members.iter()
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.members.contains(id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Result of writing an item into the catalog.
#[derive(Debug, Clone, PartialEq)]
pub enum Upserted {
    Added(Arc<Item>),
    Updated {
        item: Arc<Item>,
        previous_group: String,
    },
}

impl Upserted {
    pub fn item(&self) -> &Arc<Item> {
        match self {
            Self::Added(item) | Self::Updated { item, .. } => item,
        }
    }
}

/// The authoritative item list plus group map.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    items: IndexMap<ItemId, Arc<Item>>,
    groups: IndexMap<String, Group>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a group so it shows up (with a zero count) even before
    /// any item is assigned to it.
    pub fn ensure_group(&mut self, label: &str, color: Option<String>) -> &mut Group {
        let group = self
            .groups
            .entry(label.to_owned())
            .or_insert_with(|| Group::new(label, None));
        if group.color.is_none() {
            group.color = color;
        }
        group
    }

    /// Insert a new item or replace an existing one, moving it between
    /// groups when its label changed. The move happens in one `&mut self`
    /// call, so no reader ever sees the item in zero or two groups.
    pub fn upsert(&mut self, item: Item) -> Upserted {
        let item = Arc::new(item);
        let id = item.id.clone();

        let previous_group = self.items.get(&id).map(|old| old.group.clone());
        if let Some(ref old) = previous_group {
            if *old != item.group {
                if let Some(group) = self.groups.get_mut(old) {
                    group.members.shift_remove(&id);
                }
            }
        }

        self.ensure_group(&item.group, item.color.clone())
            .members
            .insert(id.clone());
        // `insert` on an existing key keeps its position in the flat list.
        self.items.insert(id, Arc::clone(&item));

        match previous_group {
            Some(previous_group) => Upserted::Updated {
                item,
                previous_group,
            },
            None => Upserted::Added(item),
        }
    }

    /// Replace an existing item. Returns `None` if the id is unknown.
    pub fn update(&mut self, item: Item) -> Option<Upserted> {
        if self.items.contains_key(&item.id) {
            Some(self.upsert(item))
        } else {
            None
        }
    }

    pub fn get(&self, id: &ItemId) -> Option<&Arc<Item>> {
        self.items.get(id)
    }

    /// All items in load order.
    pub fn items(&self) -> impl Iterator<Item = &Arc<Item>> {
        self.items.values()
    }

    /// Owned copy of the flat item list, suitable for rendering.
    pub fn item_list(&self) -> Vec<Arc<Item>> {
        self.items.values().cloned().collect()
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    pub fn group(&self, label: &str) -> Option<&Group> {
        self.groups.get(label)
    }

    /// Items currently assigned to `label`, in group order.
    pub fn items_in_group(&self, label: &str) -> Vec<Arc<Item>> {
        self.groups
            .get(label)
            .map(|group| {
                group
                    .members
                    .iter()
                    .filter_map(|id| self.items.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Per-group item counts, in group order.
    pub fn counts(&self) -> IndexMap<String, usize> {
        self.groups
            .iter()
            .map(|(label, group)| (label.clone(), group.len()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Counts reported by the `asset-counts` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetCounts {
    pub counts: IndexMap<String, u64>,
    pub total: u64,
}

/// The four waste categories known to the backend, with the numeric ids
/// the upload endpoint expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
pub enum Category {
    #[strum(serialize = "Compostable")]
    Compostable,
    #[strum(serialize = "Recyclable")]
    Recyclable,
    #[strum(serialize = "Non-Recyclable")]
    NonRecyclable,
    #[strum(serialize = "Special Waste")]
    SpecialWaste,
}

impl Category {
    pub fn id(self) -> u32 {
        match self {
            Self::Compostable => 1,
            Self::Recyclable => 2,
            Self::NonRecyclable => 3,
            Self::SpecialWaste => 4,
        }
    }

    pub fn from_id(id: u32) -> Option<Self> {
        Self::iter().find(|c| c.id() == id)
    }
}
