//! Initial-state extraction — fragments + instance variables → known values.
//!
//! Reports what a running instance already knows for each form fragment.
//! No validation happens here; a value is either present or it is not.

use flowdesk_core::InstanceVariables;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::compose::SchemaFragment;

/// Top-level variable key under which instance form data lives.
pub const DATA_KEY: &str = "data";

/// Known values for one fragment, field name → value.
///
/// Fields without a known value are absent, never `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FragmentValues(pub Map<String, Value>);

impl FragmentValues {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Known values per fragment, same length and order as the fragment list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InitialState(pub Vec<FragmentValues>);

impl InitialState {
    /// An initial state with one empty mapping per fragment.
    pub fn blank(fragment_count: usize) -> Self {
        Self(vec![FragmentValues::default(); fragment_count])
    }

    /// True when no fragment has any resolved field.
    pub fn is_blank(&self) -> bool {
        self.0.iter().all(FragmentValues::is_empty)
    }

    /// Field names with a defined value, across all fragments.
    pub fn defined_keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().flat_map(|f| f.0.keys().map(String::as_str))
    }
}

/// Compute the known values for each fragment from an instance snapshot.
///
/// Looks each fragment field up under the instance's [`DATA_KEY`] subtree,
/// treating dots in field names as path separators. Absent variables, absent
/// fields, and explicit `null` all mean "not known" and are omitted. The
/// output always has exactly one entry per fragment.
pub fn extract(fragments: &[SchemaFragment], variables: Option<&InstanceVariables>) -> InitialState {
    let Some(data) = variables.and_then(|vars| vars.get(DATA_KEY)) else {
        return InitialState::blank(fragments.len());
    };

    InitialState(
        fragments
            .iter()
            .map(|fragment| {
                let mut values = Map::new();
                for name in fragment.field_names() {
                    if let Some(value) = value_at_path(data, name) {
                        values.insert(name.to_string(), value.clone());
                    }
                }
                FragmentValues(values)
            })
            .collect(),
    )
}

/// Walk a dot-separated path through nested objects.
///
/// Returns `None` for missing segments, non-object intermediates, and
/// explicit `null` leaves — `null` is the engine's "undefined" sentinel.
fn value_at_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    if current.is_null() { None } else { Some(current) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fragment(id: &str, fields: &[&str]) -> SchemaFragment {
        let mut properties = Map::new();
        for name in fields {
            properties.insert(name.to_string(), json!({"type": "string"}));
        }
        SchemaFragment {
            id: id.to_string(),
            title: None,
            properties,
            required: Vec::new(),
        }
    }

    fn vars(data: Value) -> InstanceVariables {
        let mut map = Map::new();
        map.insert(DATA_KEY.to_string(), data);
        InstanceVariables(map)
    }

    #[test]
    fn absent_variables_yield_blank_state() {
        let fragments = vec![fragment("a", &["x"]), fragment("b", &["y"])];
        let state = extract(&fragments, None);
        assert_eq!(state.0.len(), 2);
        assert!(state.is_blank());
    }

    #[test]
    fn variables_without_data_key_yield_blank_state() {
        let fragments = vec![fragment("a", &["x"])];
        let raw = InstanceVariables(Map::new());
        assert!(extract(&fragments, Some(&raw)).is_blank());
    }

    #[test]
    fn known_fields_are_picked_per_fragment() {
        let fragments = vec![
            fragment("personal", &["name", "age"]),
            fragment("contact", &["email"]),
        ];
        let vars = vars(json!({"name": "Ann", "email": "a@x.com", "stray": true}));

        let state = extract(&fragments, Some(&vars));
        assert_eq!(state.0[0].0, json!({"name": "Ann"}).as_object().cloned().unwrap());
        assert_eq!(state.0[1].0, json!({"email": "a@x.com"}).as_object().cloned().unwrap());
    }

    #[test]
    fn null_values_are_omitted() {
        let fragments = vec![fragment("a", &["x", "y"])];
        let vars = vars(json!({"x": null, "y": 7}));

        let state = extract(&fragments, Some(&vars));
        assert!(!state.0[0].0.contains_key("x"));
        assert_eq!(state.0[0].0["y"], 7);
    }

    #[test]
    fn dotted_field_names_traverse_nested_objects() {
        let fragments = vec![fragment("a", &["applicant.name", "applicant.missing"])];
        let vars = vars(json!({"applicant": {"name": "Ann"}}));

        let state = extract(&fragments, Some(&vars));
        assert_eq!(state.0[0].0["applicant.name"], "Ann");
        assert!(!state.0[0].0.contains_key("applicant.missing"));
    }

    #[test]
    fn output_length_always_matches_fragment_count() {
        let fragments = vec![fragment("a", &["x"]), fragment("b", &[]), fragment("c", &["z"])];
        let vars = vars(json!({"x": 1}));

        for variables in [None, Some(&vars)] {
            let state = extract(&fragments, variables);
            assert_eq!(state.0.len(), fragments.len());
        }
    }

    #[test]
    fn extraction_is_idempotent() {
        let fragments = vec![fragment("a", &["x", "y"]), fragment("b", &["z"])];
        let vars = vars(json!({"x": [1, 2], "z": {"nested": true}}));

        let first = extract(&fragments, Some(&vars));
        let second = extract(&fragments, Some(&vars));
        assert_eq!(first, second);
    }

    #[test]
    fn field_order_follows_fragment_declaration() {
        let fragments = vec![fragment("a", &["zeta", "alpha"])];
        let vars = vars(json!({"alpha": 1, "zeta": 2}));

        let state = extract(&fragments, Some(&vars));
        let keys: Vec<&str> = state.0[0].0.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
    }
}
