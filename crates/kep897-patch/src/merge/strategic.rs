//! Schema-less strategic merge of JSON documents.
//!
//! Without the OpenAPI schema of a resource the merge keys of lists are not
//! known, so they are guessed: a list of objects is merged by the first key of
//! [`MERGE_KEYS`] that every element of both lists carries. All other lists
//! are replaced by the patch.
use serde_json::{Map, Value};

/// The directive key used to control how a patch map is merged.
pub const DIRECTIVE_KEY: &str = "$patch";

/// Candidate merge keys for lists of objects, in order of preference.
pub const MERGE_KEYS: &[&str] = &[
    "name",
    "containerPort",
    "port",
    "mountPath",
    "devicePath",
    "ip",
    "type",
];

/// The value of a `$patch` directive.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Directive {
    /// Removes the map (or list element) from the base document.
    Delete,

    /// Replaces the map (or list) instead of merging into it.
    Replace,
}

impl Directive {
    /// Reads the directive of a patch map, if it carries one.
    ///
    /// Unknown directive values are treated like no directive.
    pub fn of(map: &Map<String, Value>) -> Option<Self> {
        match map.get(DIRECTIVE_KEY).and_then(Value::as_str) {
            Some("delete") => Some(Self::Delete),
            Some("replace") => Some(Self::Replace),
            _ => None,
        }
    }
}

/// Merges `patch` into `base`.
///
/// - `null` values in the patch remove the key from `base`.
/// - Maps are merged recursively, unless the patch map carries
///   `$patch: replace` (replaces the base map) or `$patch: delete` (removes
///   the key).
/// - Lists of objects sharing a merge key are merged element-wise, all other
///   values are replaced.
pub fn merge_maps(mut base: Map<String, Value>, patch: Map<String, Value>) -> Map<String, Value> {
    if Directive::of(&patch) == Some(Directive::Replace) {
        return strip_directives_map(patch);
    }

    for (key, patch_value) in patch {
        if key == DIRECTIVE_KEY {
            continue;
        }

        match patch_value {
            Value::Null => {
                base.remove(&key);
            }
            Value::Object(patch_map) => match Directive::of(&patch_map) {
                Some(Directive::Delete) => {
                    base.remove(&key);
                }
                _ => {
                    let merged = match base.remove(&key) {
                        Some(Value::Object(base_map)) => merge_maps(base_map, patch_map),
                        _ => strip_directives_map(patch_map),
                    };
                    base.insert(key, Value::Object(merged));
                }
            },
            Value::Array(patch_items) => {
                let merged = match base.remove(&key) {
                    Some(Value::Array(base_items)) => merge_lists(base_items, patch_items),
                    _ => strip_directives_list(patch_items),
                };
                base.insert(key, Value::Array(merged));
            }
            scalar => {
                base.insert(key, scalar);
            }
        }
    }

    base
}

/// Merges two lists.
///
/// Elements only present in the patch are placed before the base elements,
/// elements present in both are merged in place.
pub fn merge_lists(base: Vec<Value>, patch: Vec<Value>) -> Vec<Value> {
    let replace = patch
        .iter()
        .any(|item| is_directive_element(item, Directive::Replace));
    if replace {
        return strip_directives_list(
            patch
                .into_iter()
                .filter(|item| !is_directive_element(item, Directive::Replace))
                .collect(),
        );
    }

    let Some(merge_key) = find_merge_key(&base, &patch) else {
        return strip_directives_list(patch);
    };

    let mut merged = base;
    let mut prepended = Vec::new();

    for patch_item in patch {
        let Value::Object(patch_map) = patch_item else {
            continue;
        };
        let position = merged
            .iter()
            .position(|base_item| base_item.get(merge_key) == patch_map.get(merge_key));

        match (Directive::of(&patch_map), position) {
            (Some(Directive::Delete), Some(index)) => {
                merged.remove(index);
            }
            (Some(Directive::Delete), None) => {}
            (_, Some(index)) => {
                if let Value::Object(base_map) = merged.remove(index) {
                    merged.insert(index, Value::Object(merge_maps(base_map, patch_map)));
                }
            }
            (_, None) => prepended.push(Value::Object(strip_directives_map(patch_map))),
        }
    }

    prepended.extend(merged);
    prepended
}

/// Returns the merge key shared by every element of both lists.
fn find_merge_key(base: &[Value], patch: &[Value]) -> Option<&'static str> {
    let elements = || base.iter().chain(patch);

    if !elements().all(Value::is_object) {
        return None;
    }

    MERGE_KEYS.iter().copied().find(|key| {
        elements().all(|element| element.get(key).is_some_and(|value| !value.is_null()))
    })
}

/// An element consisting only of a `$patch` directive, like `{$patch: replace}`.
fn is_directive_element(item: &Value, directive: Directive) -> bool {
    item.as_object()
        .is_some_and(|map| map.len() == 1 && Directive::of(map) == Some(directive))
}

fn strip_directives(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(strip_directives_map(map)),
        Value::Array(items) => Value::Array(strip_directives_list(items)),
        other => other,
    }
}

fn strip_directives_map(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter()
        .filter(|(key, _)| key != DIRECTIVE_KEY)
        .map(|(key, value)| (key, strip_directives(value)))
        .collect()
}

/// Removes directives, dropping list elements marked for deletion.
fn strip_directives_list(items: Vec<Value>) -> Vec<Value> {
    items
        .into_iter()
        .filter(|item| {
            !item
                .as_object()
                .is_some_and(|map| Directive::of(map) == Some(Directive::Delete))
        })
        .map(strip_directives)
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn merge(base: Value, patch: Value) -> Value {
        let (Value::Object(base), Value::Object(patch)) = (base, patch) else {
            unreachable!("test documents are objects");
        };
        Value::Object(merge_maps(base, patch))
    }

    #[test]
    fn maps_merge_recursively() {
        let merged = merge(
            json!({"spec": {"replicas": 1, "template": {"spec": {"hostNetwork": true}}}}),
            json!({"spec": {"template": {"spec": {"nodeSelector": {"type": "prod"}}}}}),
        );

        assert_eq!(
            merged,
            json!({"spec": {
                "replicas": 1,
                "template": {"spec": {"hostNetwork": true, "nodeSelector": {"type": "prod"}}}
            }})
        );
    }

    #[test]
    fn null_removes_key() {
        let merged = merge(
            json!({"data": {"keep": "a", "drop": "b"}}),
            json!({"data": {"drop": null}}),
        );
        assert_eq!(merged, json!({"data": {"keep": "a"}}));
    }

    #[test]
    fn scalars_and_scalar_lists_are_replaced() {
        let merged = merge(
            json!({"replicas": 1, "args": ["a", "b"]}),
            json!({"replicas": 3, "args": ["c"]}),
        );
        assert_eq!(merged, json!({"replicas": 3, "args": ["c"]}));
    }

    #[test]
    fn named_lists_merge_with_new_elements_first() {
        let merged = merge(
            json!({"containers": [
                {"name": "nginx", "image": "nginx"},
                {"name": "sidecar", "image": "envoy"},
            ]}),
            json!({"containers": [
                {"name": "istio", "image": "istio"},
                {"name": "sidecar", "image": "envoy:2"},
            ]}),
        );

        assert_eq!(
            merged,
            json!({"containers": [
                {"name": "istio", "image": "istio"},
                {"name": "nginx", "image": "nginx"},
                {"name": "sidecar", "image": "envoy:2"},
            ]})
        );
    }

    #[test]
    fn lists_merge_by_fallback_key() {
        let merged = merge(
            json!({"volumeMounts": [{"mountPath": "/data", "readOnly": false}]}),
            json!({"volumeMounts": [{"mountPath": "/data", "readOnly": true}]}),
        );
        assert_eq!(
            merged,
            json!({"volumeMounts": [{"mountPath": "/data", "readOnly": true}]})
        );
    }

    #[test]
    fn delete_directive_removes_list_element() {
        let merged = merge(
            json!({"containers": [{"name": "a"}, {"name": "b"}]}),
            json!({"containers": [{"name": "a", "$patch": "delete"}]}),
        );
        assert_eq!(merged, json!({"containers": [{"name": "b"}]}));
    }

    #[test]
    fn replace_directive_replaces_list() {
        let merged = merge(
            json!({"containers": [{"name": "a"}, {"name": "b"}]}),
            json!({"containers": [{"name": "c"}, {"$patch": "replace"}]}),
        );
        assert_eq!(merged, json!({"containers": [{"name": "c"}]}));
    }

    #[test]
    fn map_directives() {
        let merged = merge(
            json!({
                "nodeSelector": {"type": "dev", "zone": "a"},
                "affinity": {"nodeAffinity": {}},
            }),
            json!({
                "nodeSelector": {"$patch": "replace", "type": "prod"},
                "affinity": {"$patch": "delete"},
            }),
        );
        assert_eq!(merged, json!({"nodeSelector": {"type": "prod"}}));
    }

    #[test]
    fn directives_are_not_copied_into_new_values() {
        let merged = merge(
            json!({}),
            json!({"spec": {"$patch": "replace", "containers": [{"name": "a", "$patch": "delete"}]}}),
        );
        assert_eq!(merged, json!({"spec": {"containers": []}}));
    }
}
