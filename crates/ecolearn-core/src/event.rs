// Controller notifications and mutation requests.

use std::sync::Arc;

use strum::IntoStaticStr;

use crate::error::CoreError;
use crate::model::Item;

/// Notification delivered to subscribers and the broadcast channel.
#[derive(Debug, Clone, PartialEq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Event {
    /// A full load finished and the catalog was replaced.
    Loaded { items: usize, groups: usize },
    #[strum(serialize = "add")]
    Added(Arc<Item>),
    #[strum(serialize = "update")]
    Updated {
        item: Arc<Item>,
        previous_group: String,
    },
    /// A full load failed; the gallery shows an error placeholder.
    LoadFailed(CoreError),
    /// Cache keys were dropped. Empty means everything.
    Invalidated { keys: Vec<String> },
}

impl Event {
    /// Short event name (`loaded`, `add`, `update`, ...).
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

/// A known-item change applied without a reload.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Add(Item),
    Update(Item),
}

impl Mutation {
    pub fn item(&self) -> &Item {
        match self {
            Self::Add(item) | Self::Update(item) => item,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names() {
        let item = Arc::new(Item::new(1, "Banana Peel", "Compostable"));
        assert_eq!(Event::Loaded { items: 0, groups: 0 }.name(), "loaded");
        assert_eq!(Event::Added(Arc::clone(&item)).name(), "add");
        assert_eq!(
            Event::Updated {
                item,
                previous_group: "Compostable".into()
            }
            .name(),
            "update"
        );
        assert_eq!(Event::LoadFailed(CoreError::Timeout).name(), "load_failed");
        assert_eq!(Event::Invalidated { keys: vec![] }.name(), "invalidated");
    }
}
