// ── Payload → catalog projection ──
//
// Pure functions from raw endpoint JSON to a `Catalog`. Shape decisions
// (object vs array groups, record vs bare-label cards, field aliases)
// are made here once; nothing downstream looks at raw JSON again.
// Malformed input degrades to an empty or partial catalog, never an error.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::model::{AssetCounts, Catalog, Item, ItemId};

/// Signature of a projection, so the controller can be handed another one.
pub type ProjectionFn = fn(&Value) -> Catalog;

const ID_KEYS: [&str; 2] = ["card_id", "id"];
const NAME_KEYS: [&str; 2] = ["card_name", "name"];
const GROUP_KEYS: [&str; 3] = ["category_name", "category", "group"];
const COLOR_KEYS: [&str; 2] = ["bin_color", "color"];
const LABEL_KEYS: [&str; 3] = ["category_name", "name", "label"];

/// Group assigned to records that carry no category of their own.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// One card entry as it appears on the wire.
enum RawItem<'a> {
    Record(&'a Map<String, Value>),
    Label(&'a str),
}

impl<'a> RawItem<'a> {
    fn classify(value: &'a Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self::Record(map)),
            Value::String(s) if !s.trim().is_empty() => Some(Self::Label(s)),
            _ => None,
        }
    }

    fn into_item(self, group: &str, color: Option<&str>) -> Option<Item> {
        match self {
            Self::Record(map) => item_from_record(map, Some(group), color),
            Self::Label(label) => {
                let mut item = Item::new(ItemId::Str(label.to_owned()), label, group);
                item.color = color.map(str::to_owned);
                Some(item)
            }
        }
    }
}

fn first_of<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| map.get(*k).filter(|v| !v.is_null()))
}

fn first_str<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| map.get(*k).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
}

/// Build an item from one card record.
///
/// `group` overrides whatever category the record names; `color` is the
/// group colour used when the record has none. Returns `None` when the
/// record has no usable id.
pub fn item_from_record(
    map: &Map<String, Value>,
    group: Option<&str>,
    color: Option<&str>,
) -> Option<Item> {
    let Some(id) = first_of(map, &ID_KEYS).and_then(ItemId::from_json) else {
        debug!(?map, "skipping card without id");
        return None;
    };
    let name = first_str(map, &NAME_KEYS).map_or_else(|| id.to_string(), str::to_owned);
    let group = group
        .or_else(|| first_str(map, &GROUP_KEYS))
        .unwrap_or(UNCATEGORIZED);
    let color = first_str(map, &COLOR_KEYS).or(color);

    let mut item = Item::new(id, name, group);
    item.color = color.map(str::to_owned);
    item.image_path = first_str(map, &["image_path"]).map(str::to_owned);

    let consumed = ID_KEYS
        .iter()
        .chain(&NAME_KEYS)
        .chain(&GROUP_KEYS)
        .chain(&COLOR_KEYS)
        .chain(&["image_path"]);
    item.fields = map
        .iter()
        .filter(|(k, _)| !consumed.clone().any(|c| *c == k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    Some(item)
}

fn add_group(catalog: &mut Catalog, label: &str, color: Option<&str>, cards: Option<&Value>) {
    catalog.ensure_group(label, color.map(str::to_owned));
    let Some(cards) = cards else {
        return;
    };
    let Some(cards) = cards.as_array() else {
        warn!(group = label, "card list is not an array; group left empty");
        return;
    };
    for raw in cards.iter().filter_map(RawItem::classify) {
        if let Some(item) = raw.into_item(label, color) {
            catalog.upsert(item);
        }
    }
}

/// Project the nested `asset-repository` payload.
///
/// Accepts `categories` as an object keyed by label or as an array of
/// group records. Each group may be `{bin_color, cards}` or a bare card
/// array. Groups are registered even when they hold no cards.
pub fn project(raw: &Value) -> Catalog {
    let mut catalog = Catalog::new();

    match raw.get("categories") {
        None | Some(Value::Null) => {
            debug!("payload has no categories");
        }
        Some(Value::Object(groups)) => {
            for (label, group) in groups {
                match group {
                    Value::Array(_) => add_group(&mut catalog, label, None, Some(group)),
                    Value::Object(meta) => add_group(
                        &mut catalog,
                        label,
                        first_str(meta, &COLOR_KEYS),
                        meta.get("cards"),
                    ),
                    _ => warn!(group = %label, "unrecognized group shape; skipped"),
                }
            }
        }
        Some(Value::Array(groups)) => {
            for group in groups {
                let Some(meta) = group.as_object() else {
                    warn!("group entry is not an object; skipped");
                    continue;
                };
                let Some(label) = first_str(meta, &LABEL_KEYS) else {
                    warn!("group entry has no label; skipped");
                    continue;
                };
                add_group(
                    &mut catalog,
                    label,
                    first_str(meta, &COLOR_KEYS),
                    meta.get("cards"),
                );
            }
        }
        Some(other) => {
            warn!(kind = json_kind(other), "categories has unexpected type; treating as empty");
        }
    }

    debug!(items = catalog.len(), groups = catalog.groups().count(), "projected catalog");
    catalog
}

/// Project the flat `cards-minimal` payload. Each record names its own
/// category and colour.
pub fn project_minimal(raw: &Value) -> Catalog {
    let mut catalog = Catalog::new();
    let Some(cards) = raw.get("cards").and_then(Value::as_array) else {
        if raw.get("cards").is_some() {
            warn!("cards is not an array; treating as empty");
        }
        return catalog;
    };
    for card in cards {
        match card.as_object() {
            Some(map) => {
                if let Some(item) = item_from_record(map, None, None) {
                    catalog.upsert(item);
                }
            }
            None => debug!("skipping non-object card entry"),
        }
    }
    catalog
}

/// Parse the `asset-counts` payload. `None` when `counts` is absent or
/// not an object.
pub fn parse_counts(raw: &Value) -> Option<AssetCounts> {
    let counts = raw.get("counts")?.as_object()?;
    let counts: indexmap::IndexMap<String, u64> = counts
        .iter()
        .filter_map(|(label, n)| n.as_u64().map(|n| (label.clone(), n)))
        .collect();
    let total = raw
        .get("total_cards")
        .and_then(Value::as_u64)
        .unwrap_or_else(|| counts.values().sum());
    Some(AssetCounts { counts, total })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
