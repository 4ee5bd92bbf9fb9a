// ── Domain model ──
//
// Canonical item and group types shared by the cache, projection, view,
// and controller layers.

mod catalog;
mod item;

pub use catalog::{AssetCounts, Catalog, Category, Group, Upserted};
pub use item::{Item, ItemId};
