use regex::Regex;
use serde_json::{Map, Value};

use super::text::safe_num;

/// Depth-first, pre-order walk over every JSON object in a tree.
///
/// Arrays are descended into but not yielded themselves. Uses an explicit
/// stack so arbitrarily deep feeds cannot overflow.
pub struct ObjectWalk<'a> {
    stack: Vec<&'a Value>,
}

impl<'a> ObjectWalk<'a> {
    pub fn new(root: &'a Value) -> Self {
        Self { stack: vec![root] }
    }
}

impl<'a> Iterator for ObjectWalk<'a> {
    type Item = &'a Map<String, Value>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            match node {
                Value::Array(items) => {
                    self.stack.extend(items.iter().rev());
                }
                Value::Object(map) => {
                    self.stack.extend(map.values().rev());
                    return Some(map);
                }
                _ => {}
            }
        }
        None
    }
}

pub fn walk_objects(root: &Value) -> ObjectWalk<'_> {
    ObjectWalk::new(root)
}

/// Reads a scalar as a number: JSON numbers directly, strings via [`safe_num`].
pub fn value_num(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => safe_num(s),
        _ => None,
    }
}

/// Declarative selection of one number out of an unknown JSON feed.
///
/// A candidate object is relevant when its label (first present of
/// `label_fields`) matches one of `label_patterns`, or when the uppercased
/// `label + serialized object` blob matches one of `blob_patterns`. The value
/// is the first field of `value_fields` that parses as a number.
#[derive(Debug, Clone)]
pub struct JsonRule {
    pub label_fields: Vec<&'static str>,
    pub label_patterns: Vec<Regex>,
    pub blob_patterns: Vec<Regex>,
    pub value_fields: Vec<&'static str>,
}

impl JsonRule {
    fn label(&self, obj: &Map<String, Value>) -> String {
        self.label_fields
            .iter()
            .filter_map(|field| obj.get(*field))
            .find(|v| !v.is_null())
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default()
    }

    pub fn is_relevant(&self, obj: &Map<String, Value>) -> bool {
        let label = self.label(obj);
        if self.label_patterns.iter().any(|re| re.is_match(&label)) {
            return true;
        }
        let serialized = serde_json::to_string(obj).unwrap_or_default();
        let blob = format!("{} {}", label, serialized).to_uppercase();
        self.blob_patterns.iter().any(|re| re.is_match(&blob))
    }

    pub fn read_value(&self, obj: &Map<String, Value>) -> Option<f64> {
        self.value_fields
            .iter()
            .filter_map(|field| obj.get(*field))
            .find_map(value_num)
    }

    /// All matching values in walk order.
    pub fn matches<'a>(&'a self, root: &'a Value) -> impl Iterator<Item = f64> + 'a {
        walk_objects(root)
            .filter(move |obj| self.is_relevant(obj))
            .filter_map(move |obj| self.read_value(obj))
    }

    pub fn first_match(&self, root: &Value) -> Option<f64> {
        self.matches(root).next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_walk_is_preorder() {
        let tree = json!({
            "id": 1,
            "children": [ { "id": 2, "leaf": { "id": 3 } }, { "id": 4 } ]
        });
        let ids: Vec<i64> = walk_objects(&tree)
            .filter_map(|o| o.get("id").and_then(|v| v.as_i64()))
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_walk_skips_scalars_and_root_arrays() {
        let tree = json!([1, "two", [ { "k": true } ], null]);
        assert_eq!(walk_objects(&tree).count(), 1);
    }

    #[test]
    fn test_value_num() {
        assert_eq!(value_num(&json!(7.1)), Some(7.1));
        assert_eq!(value_num(&json!("7,100.5")), Some(7100.5));
        assert_eq!(value_num(&json!("--")), None);
        assert_eq!(value_num(&json!(null)), None);
        assert_eq!(value_num(&json!({"a": 1})), None);
    }

    #[test]
    fn test_rule_priority_order() {
        let rule = JsonRule {
            label_fields: vec!["pair"],
            label_patterns: vec![Regex::new("^EUR/USD$").unwrap()],
            blob_patterns: vec![],
            value_fields: vec!["mid", "last"],
        };
        let tree = json!({"rows": [
            {"pair": "GBP/USD", "mid": "1.27"},
            {"pair": "EUR/USD", "mid": null, "last": "1.0912"}
        ]});
        assert_eq!(rule.first_match(&tree), Some(1.0912));
    }
}
