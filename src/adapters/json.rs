//! JSON manifest adapter.
//!
//! Manifest shape:
//!
//! ```json
//! {
//!   "volume_id": "bible",
//!   "dimensions": { "language": ["en", "la"] },
//!   "items": [
//!     { "id": "ot", "name": "Old Testament", "order": 0,
//!       "children": [ { "id": "gen", "name": "Genesis", "order": 0 } ] },
//!     { "id": "nt", "name": "New Testament", "order": "1" }
//!   ]
//! }
//! ```
//!
//! Children may be nested or flat with `parent_id`. `order` accepts integers,
//! integral floats and numeric strings; a missing order falls back to the
//! item's position among its siblings. Any other fields land in `Item::meta`.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::engine::adapter::{
    AdapterCapabilities, DeepLinkTarget, NormalizedVolume, Validation, VolumeAdapter, VolumeMeta,
};
use crate::error::ManifestError;
use crate::item::{Item, Link};

const RESERVED_KEYS: [&str; 6] = ["id", "name", "order", "parent_id", "parentId", "children"];

#[derive(Debug, Clone)]
enum ManifestSource {
    File(PathBuf),
    Inline(String),
}

pub struct JsonManifestAdapter {
    volume_id: String,
    source: ManifestSource,
    /// Ids seen by the last successful normalize
    known_ids: RefCell<Option<HashSet<String>>>,
}

impl JsonManifestAdapter {
    pub fn from_file(volume_id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::with_source(volume_id, ManifestSource::File(path.into()))
    }

    pub fn inline(volume_id: impl Into<String>, json: impl Into<String>) -> Self {
        Self::with_source(volume_id, ManifestSource::Inline(json.into()))
    }

    fn with_source(volume_id: impl Into<String>, source: ManifestSource) -> Self {
        Self {
            volume_id: volume_id.into(),
            source,
            known_ids: RefCell::new(None),
        }
    }
}

/// Integer-coercible order value.
pub fn coerce_order(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            let f = n.as_f64()?;
            (f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parent_field(obj: &Map<String, Value>) -> Option<&str> {
    obj.get("parent_id")
        .or_else(|| obj.get("parentId"))
        .and_then(Value::as_str)
}

fn validate_items(
    items: &[Value],
    path: &str,
    seen: &mut HashSet<String>,
    errors: &mut Vec<String>,
) {
    for (i, raw) in items.iter().enumerate() {
        let here = format!("{path}[{i}]");
        let Some(obj) = raw.as_object() else {
            errors.push(format!("{here}: item must be an object"));
            continue;
        };
        match obj.get("id").and_then(Value::as_str) {
            Some(id) if !id.trim().is_empty() => {
                if !seen.insert(id.to_string()) {
                    errors.push(format!("{here}: duplicate id '{id}'"));
                }
            }
            _ => errors.push(format!("{here}: missing or empty id")),
        }
        if let Some(name) = obj.get("name") {
            if !name.is_string() && !name.is_null() {
                errors.push(format!("{here}: name must be a string"));
            }
        }
        if let Some(order) = obj.get("order") {
            if coerce_order(order).is_none() {
                errors.push(format!("{here}: order {order} is not an integer"));
            }
        }
        match obj.get("children") {
            None | Some(Value::Null) => {}
            Some(Value::Array(children)) => {
                validate_items(children, &format!("{here}.children"), seen, errors)
            }
            Some(_) => errors.push(format!("{here}: children must be an array")),
        }
    }
}

fn flatten_items(
    items: &[Value],
    parent: Option<&str>,
    out: &mut Vec<Item>,
    links: &mut Vec<Link>,
) {
    for (position, raw) in items.iter().enumerate() {
        let Some(obj) = raw.as_object() else {
            continue;
        };
        let Some(id) = obj.get("id").and_then(Value::as_str) else {
            continue;
        };
        let order = obj
            .get("order")
            .and_then(coerce_order)
            .unwrap_or(position as i64);
        let parent_id = parent.or_else(|| parent_field(obj)).map(str::to_string);
        let meta: Map<String, Value> = obj
            .iter()
            .filter(|(k, _)| !RESERVED_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        if let Some(p) = &parent_id {
            links.push(Link {
                from: p.clone(),
                to: id.to_string(),
            });
        }
        out.push(Item {
            id: id.to_string(),
            name: obj.get("name").and_then(Value::as_str).map(str::to_string),
            order,
            parent_id,
            meta,
        });

        if let Some(children) = obj.get("children").and_then(Value::as_array) {
            flatten_items(children, Some(id), out, links);
        }
    }
}

fn parse_dimensions(raw: &Value) -> BTreeMap<String, Vec<String>> {
    raw.get("dimensions")
        .and_then(Value::as_object)
        .map(|dims| {
            dims.iter()
                .filter_map(|(name, values)| {
                    let values = values
                        .as_array()?
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect();
                    Some((name.clone(), values))
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait(?Send)]
impl VolumeAdapter for JsonManifestAdapter {
    fn volume_id(&self) -> &str {
        &self.volume_id
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities {
            deep_links: true,
            dimensions: true,
        }
    }

    async fn load_manifest(&self) -> Result<Value, ManifestError> {
        let text = match &self.source {
            ManifestSource::File(path) => {
                log::debug!("Reading manifest {}", path.display());
                std::fs::read_to_string(path)?
            }
            ManifestSource::Inline(json) => json.clone(),
        };
        Ok(serde_json::from_str(&text)?)
    }

    async fn validate(&self, raw: &Value) -> Validation {
        let mut errors = Vec::new();
        let Some(root) = raw.as_object() else {
            return Validation::from_errors(vec!["manifest must be a JSON object".into()]);
        };

        match root.get("items") {
            Some(Value::Array(items)) => {
                validate_items(items, "items", &mut HashSet::new(), &mut errors)
            }
            Some(_) => errors.push("items must be an array".into()),
            None => errors.push("missing items".into()),
        }

        if let Some(id) = root.get("volume_id") {
            if !id.is_string() {
                errors.push("volume_id must be a string".into());
            }
        }
        match root.get("dimensions") {
            None | Some(Value::Null) => {}
            Some(Value::Object(dims)) => {
                for (name, values) in dims {
                    let ok = values
                        .as_array()
                        .is_some_and(|vs| !vs.is_empty() && vs.iter().all(Value::is_string));
                    if !ok {
                        errors.push(format!(
                            "dimension '{name}' must be a non-empty array of strings"
                        ));
                    }
                }
            }
            Some(_) => errors.push("dimensions must be an object".into()),
        }

        Validation::from_errors(errors)
    }

    async fn normalize(&self, raw: Value) -> Result<NormalizedVolume, ManifestError> {
        let items_raw = raw
            .get("items")
            .and_then(Value::as_array)
            .ok_or_else(|| ManifestError::Other("manifest has no items array".into()))?;

        let mut items = Vec::new();
        let mut links = Vec::new();
        flatten_items(items_raw, None, &mut items, &mut links);

        let meta = VolumeMeta {
            volume_id: raw
                .get("volume_id")
                .and_then(Value::as_str)
                .map(str::to_string),
            dimensions: parse_dimensions(&raw),
        };

        *self.known_ids.borrow_mut() = Some(items.iter().map(|i| i.id.clone()).collect());
        log::debug!(
            "Normalized '{}': {} items, {} links",
            self.volume_id,
            items.len(),
            links.len()
        );
        Ok(NormalizedVolume { items, links, meta })
    }

    /// Accepts `item:<id>` or a bare id. Once the manifest has been
    /// normalized, unknown ids are rejected here.
    fn resolve_deep_link(&self, token: &str) -> Option<DeepLinkTarget> {
        let token = token.trim();
        let id = token.strip_prefix("item:").unwrap_or(token).trim();
        if id.is_empty() || id.contains(char::is_whitespace) {
            return None;
        }
        if let Some(known) = self.known_ids.borrow().as_ref() {
            if !known.contains(id) {
                return None;
            }
        }
        Some(DeepLinkTarget {
            focus_id: id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    const BIBLE: &str = r#"{
        "volume_id": "bible-nab",
        "dimensions": { "language": ["en", "la"] },
        "items": [
            { "id": "ot", "name": "Old Testament", "order": 0, "testament": "old",
              "children": [
                { "id": "gen", "name": "Genesis", "order": 0 },
                { "id": "exo", "name": "Exodus", "order": "1" },
                { "id": "lev", "order": 3.0 }
              ] },
            { "id": "nt", "name": "New Testament", "order": 1 },
            { "id": "mat", "name": "Matthew", "parent_id": "nt" }
        ]
    }"#;

    fn load(adapter: &JsonManifestAdapter) -> (Value, Validation) {
        let raw = block_on(adapter.load_manifest()).unwrap();
        let validation = block_on(adapter.validate(&raw));
        (raw, validation)
    }

    #[test]
    fn test_coerce_order() {
        assert_eq!(coerce_order(&serde_json::json!(3)), Some(3));
        assert_eq!(coerce_order(&serde_json::json!(-2)), Some(-2));
        assert_eq!(coerce_order(&serde_json::json!(4.0)), Some(4));
        assert_eq!(coerce_order(&serde_json::json!(" 7 ")), Some(7));
        assert_eq!(coerce_order(&serde_json::json!(1.5)), None);
        assert_eq!(coerce_order(&serde_json::json!("one")), None);
        assert_eq!(coerce_order(&serde_json::json!(null)), None);
    }

    #[test]
    fn test_normalize_flattens_nested_children() {
        let adapter = JsonManifestAdapter::inline("bible", BIBLE);
        let (raw, validation) = load(&adapter);
        assert!(validation.ok, "{:?}", validation.errors);

        let vol = block_on(adapter.normalize(raw)).unwrap();
        let ids: Vec<&str> = vol.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["ot", "gen", "exo", "lev", "nt", "mat"]);

        let exo = vol.items.iter().find(|i| i.id == "exo").unwrap();
        assert_eq!(exo.order, 1);
        assert_eq!(exo.parent_id.as_deref(), Some("ot"));
        let lev = vol.items.iter().find(|i| i.id == "lev").unwrap();
        assert_eq!(lev.order, 3);
        assert_eq!(lev.label(), "lev");
        let mat = vol.items.iter().find(|i| i.id == "mat").unwrap();
        assert_eq!(mat.order, 2);
        assert_eq!(mat.parent_id.as_deref(), Some("nt"));

        let ot = &vol.items[0];
        assert_eq!(ot.meta.get("testament"), Some(&Value::from("old")));
        assert!(!ot.meta.contains_key("children"));

        assert_eq!(vol.links.len(), 4);
        assert_eq!(vol.meta.volume_id.as_deref(), Some("bible-nab"));
        assert_eq!(vol.meta.dimensions["language"], vec!["en", "la"]);
    }

    #[test]
    fn test_validation_reports_every_problem() {
        let adapter = JsonManifestAdapter::inline(
            "bad",
            r#"{ "items": [
                { "id": "a", "order": "x" },
                { "name": "no id" },
                { "id": "a" },
                { "id": "b", "children": 5 }
            ], "dimensions": { "language": [] } }"#,
        );
        let (_, validation) = load(&adapter);
        assert!(!validation.ok);
        assert_eq!(validation.errors.len(), 5, "{:?}", validation.errors);
        assert!(validation.errors.iter().any(|e| e.contains("duplicate id 'a'")));
    }

    #[test]
    fn test_missing_items_rejected() {
        let adapter = JsonManifestAdapter::inline("empty", r#"{ "volume_id": 3 }"#);
        let (_, validation) = load(&adapter);
        assert_eq!(
            validation.errors,
            vec!["missing items".to_string(), "volume_id must be a string".to_string()]
        );
    }

    #[test]
    fn test_parse_error_is_manifest_error() {
        let adapter = JsonManifestAdapter::inline("broken", "{ not json");
        let err = block_on(adapter.load_manifest()).unwrap_err();
        assert!(matches!(err, ManifestError::Parse(_)));

        let missing = JsonManifestAdapter::from_file("gone", "/definitely/not/here.json");
        let err = block_on(missing.load_manifest()).unwrap_err();
        assert!(matches!(err, ManifestError::Io(_)));
    }

    #[test]
    fn test_deep_link_tokens() {
        let adapter = JsonManifestAdapter::inline("bible", BIBLE);
        assert_eq!(
            adapter.resolve_deep_link("item:gen").map(|t| t.focus_id),
            Some("gen".to_string())
        );
        assert!(adapter.resolve_deep_link("  ").is_none());
        assert!(adapter.resolve_deep_link("two words").is_none());

        let (raw, _) = load(&adapter);
        block_on(adapter.normalize(raw)).unwrap();
        assert!(adapter.resolve_deep_link("exo").is_some());
        assert!(adapter.resolve_deep_link("item:zzz").is_none());
    }
}
