// ── Core identity and item types ──
//
// ItemId unifies the integer ids of the asset tables with the string
// ids of label-only entries behind one hashable key.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::{Map, Value};

// ── ItemId ──────────────────────────────────────────────────────────

/// Canonical identifier for a catalog item.
///
/// Deserializes with the same normalization as [`ItemId::from_json`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum ItemId {
    Int(i64),
    Str(String),
}

impl ItemId {
    /// Interpret a JSON id: integers stay integers, numeric strings are
    /// normalized so `"47"` and `47` name the same item.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Int),
            Value::String(s) if !s.is_empty() => Some(Self::from(s.as_str())),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Str(_) => None,
        }
    }
}

impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Str(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(n) => Ok(Self::Int(n)),
            Raw::Str(s) if s.is_empty() => Err(de::Error::custom("item id must not be empty")),
            Raw::Str(s) => Ok(Self::from(s)),
        }
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s}"),
        }
    }
}

impl FromStr for ItemId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl From<i64> for ItemId {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for ItemId {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<u32> for ItemId {
    fn from(n: u32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        match s.trim().parse::<i64>() {
            Ok(n) => Self::Int(n),
            Err(_) => Self::Str(s),
        }
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self::from(s.to_owned())
    }
}

// ── Item ────────────────────────────────────────────────────────────

/// A single catalog entity (an Eco-Card).
///
/// Items are annotated with their group label and the group's display
/// colour at projection time. Anything the backend sends beyond the
/// known fields is kept verbatim in `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub group: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Item {
    pub fn new(id: impl Into<ItemId>, name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            group: group.into(),
            color: None,
            image_path: None,
            fields: Map::new(),
        }
    }

    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    #[must_use]
    pub fn with_image_path(mut self, path: impl Into<String>) -> Self {
        self.image_path = Some(path.into());
        self
    }

    /// Look up a pass-through field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_strings_normalize_to_int() {
        assert_eq!(ItemId::from("47"), ItemId::Int(47));
        assert_eq!(ItemId::from_json(&json!("47")), Some(ItemId::Int(47)));
        assert_eq!(ItemId::from_json(&json!(47)), Some(ItemId::Int(47)));
    }

    #[test]
    fn non_numeric_strings_stay_strings() {
        let id: ItemId = "eco_warrior".parse().unwrap();
        assert_eq!(id, ItemId::Str("eco_warrior".into()));
        assert!(id.as_int().is_none());
    }

    #[test]
    fn rejects_null_and_empty_ids() {
        assert_eq!(ItemId::from_json(&Value::Null), None);
        assert_eq!(ItemId::from_json(&json!("")), None);
        assert_eq!(ItemId::from_json(&json!(1.5)), None);
    }

    #[test]
    fn deserialize_agrees_with_from_json() {
        for raw in [json!(47), json!("47"), json!(" 47"), json!("eco_warrior")] {
            let parsed: ItemId = serde_json::from_value(raw.clone()).unwrap();
            assert_eq!(Some(parsed), ItemId::from_json(&raw), "{raw}");
        }
        assert!(serde_json::from_value::<ItemId>(json!("")).is_err());
    }

    #[test]
    fn item_round_trips_with_string_id() {
        let item: Item = serde_json::from_value(json!({
            "id": "12", "name": "Glass Jar", "group": "Recyclable", "card_code": "REC-012"
        }))
        .unwrap();
        assert_eq!(item.id, ItemId::Int(12));
        assert_eq!(item.field("card_code"), Some(&json!("REC-012")));
    }

    #[test]
    fn item_serializes_flattened_fields() {
        let mut item = Item::new(1, "Banana Peel", "Compostable").with_color("green");
        item.fields.insert("card_code".into(), json!("COMP-001"));

        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["card_code"], json!("COMP-001"));
        assert_eq!(value["color"], json!("green"));
        assert!(value.get("image_path").is_none());
    }
}
