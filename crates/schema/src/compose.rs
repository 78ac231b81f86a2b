//! Schema composition parsing — declared input schema → ordered fragments.
//!
//! A workflow declares its input either as one flat object schema or as an
//! `allOf` composition whose members each describe one step of a multi-part
//! form. The raw document is classified exactly once into
//! [`InputSchemaDefinition`]; downstream code only ever sees
//! [`SchemaFragment`]s and never re-inspects the raw JSON.

use flowdesk_core::SchemaError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fragment id used for a flat schema that declares no id of its own.
const FLAT_FRAGMENT_ID: &str = "input";

/// How many `$ref` hops to follow before declaring a reference cycle.
const MAX_REF_DEPTH: usize = 8;

/// One step of a multi-part input form.
///
/// Field order inside `properties` is the declaration order of the schema
/// document and is significant — it flows unchanged into the response and
/// into initial-state extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaFragment {
    /// Identifier of the step (member id, `$ref` target name, or a
    /// positional fallback)
    pub id: String,

    /// Human label of the step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Field name → type/constraint metadata, in declared order
    pub properties: Map<String, Value>,

    /// Names of mandatory fields
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl SchemaFragment {
    /// Field names in declared order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }
}

/// A declared input schema, classified once at parse time.
#[derive(Debug, Clone, PartialEq)]
pub enum InputSchemaDefinition {
    /// A plain object schema — the whole form is a single step.
    Flat(Map<String, Value>),

    /// An `allOf` composition — one step per member, in declaration order,
    /// with an optional local `definitions` map for `$ref` members.
    Composed {
        members: Vec<Value>,
        definitions: Map<String, Value>,
    },
}

impl InputSchemaDefinition {
    /// Classify a raw schema document by shape.
    pub fn classify(raw: &Value) -> Result<Self, SchemaError> {
        let obj = raw.as_object().ok_or(SchemaError::NotAnObject)?;
        match obj.get("allOf").and_then(Value::as_array) {
            Some(members) => Ok(Self::Composed {
                members: members.clone(),
                definitions: obj
                    .get("definitions")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default(),
            }),
            None => Ok(Self::Flat(obj.clone())),
        }
    }
}

/// Turn a declared input schema into its ordered form fragments.
///
/// Flat schemas yield exactly one fragment with all fields in declared
/// order; compositions yield one fragment per `allOf` member in declaration
/// order. Fails with [`SchemaError`] when a member lacks a field list or a
/// `$ref` cannot be resolved against the local `definitions`.
pub fn parse_fragments(raw: &Value) -> Result<Vec<SchemaFragment>, SchemaError> {
    match InputSchemaDefinition::classify(raw)? {
        InputSchemaDefinition::Flat(obj) => {
            let fragment = fragment_from_object(FLAT_FRAGMENT_ID, FLAT_FRAGMENT_ID, &obj, &Map::new())?;
            Ok(vec![fragment])
        }
        InputSchemaDefinition::Composed {
            members,
            definitions,
        } => members
            .iter()
            .enumerate()
            .map(|(i, member)| fragment_from_member(i, member, &definitions))
            .collect(),
    }
}

/// Build the fragment for one composition member.
fn fragment_from_member(
    index: usize,
    member: &Value,
    definitions: &Map<String, Value>,
) -> Result<SchemaFragment, SchemaError> {
    let label = format!("allOf[{index}]");

    let Some(obj) = member.as_object() else {
        return Err(SchemaError::MissingProperties { member: label });
    };

    // A `$ref` member resolves to a named definition; its name doubles as
    // the default fragment id.
    if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
        let (name, target) = resolve_ref(&label, reference, definitions)?;
        return fragment_from_object(&name, &label, target, definitions);
    }

    let fallback_id = format!("step-{}", index + 1);
    fragment_from_object(&fallback_id, &label, obj, definitions)
}

/// Resolve a local `#/definitions/<name>` reference, following chained
/// references up to a fixed depth.
fn resolve_ref<'a>(
    member: &str,
    reference: &str,
    definitions: &'a Map<String, Value>,
) -> Result<(String, &'a Map<String, Value>), SchemaError> {
    let unresolved = |reference: &str| SchemaError::UnresolvedRef {
        member: member.to_string(),
        reference: reference.to_string(),
    };

    let mut current = reference;
    for _ in 0..MAX_REF_DEPTH {
        let name = current
            .strip_prefix("#/definitions/")
            .ok_or_else(|| unresolved(current))?;
        let target = definitions
            .get(name)
            .and_then(Value::as_object)
            .ok_or_else(|| unresolved(current))?;

        match target.get("$ref").and_then(Value::as_str) {
            Some(next) => current = next,
            None => return Ok((name.to_string(), target)),
        }
    }
    // Reference chain too deep — almost certainly a cycle.
    Err(unresolved(current))
}

/// Build a fragment from a resolved member object.
///
/// Field-level `$ref`s inside `properties` are resolved here too, against
/// the member's own `definitions` first and the composition's second.
fn fragment_from_object(
    default_id: &str,
    label: &str,
    obj: &Map<String, Value>,
    outer_definitions: &Map<String, Value>,
) -> Result<SchemaFragment, SchemaError> {
    let Some(properties) = obj.get("properties").and_then(Value::as_object) else {
        return Err(SchemaError::MissingProperties {
            member: label.to_string(),
        });
    };

    let local_definitions = obj
        .get("definitions")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let mut resolved = Map::new();
    for (name, spec) in properties {
        let spec = match spec.as_object().and_then(|o| o.get("$ref")).and_then(Value::as_str) {
            Some(reference) => {
                let target = resolve_field_ref(label, reference, &local_definitions, outer_definitions)?;
                Value::Object(target)
            }
            None => spec.clone(),
        };
        resolved.insert(name.clone(), spec);
    }

    let required = obj
        .get("required")
        .and_then(Value::as_array)
        .map(|names| {
            names
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(SchemaFragment {
        id: obj
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or(default_id)
            .to_string(),
        title: obj.get("title").and_then(Value::as_str).map(str::to_string),
        properties: resolved,
        required,
    })
}

/// Resolve a `$ref` appearing as a field definition.
fn resolve_field_ref(
    member: &str,
    reference: &str,
    local: &Map<String, Value>,
    outer: &Map<String, Value>,
) -> Result<Map<String, Value>, SchemaError> {
    let name = reference
        .strip_prefix("#/definitions/")
        .ok_or_else(|| SchemaError::UnresolvedRef {
            member: member.to_string(),
            reference: reference.to_string(),
        })?;

    local
        .get(name)
        .or_else(|| outer.get(name))
        .and_then(Value::as_object)
        .cloned()
        .ok_or_else(|| SchemaError::UnresolvedRef {
            member: member.to_string(),
            reference: reference.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flat_schema_single_fragment() {
        let raw = json!({
            "title": "Request details",
            "properties": {
                "name": {"type": "string"},
                "age": {"type": "integer"}
            },
            "required": ["name"]
        });

        let fragments = parse_fragments(&raw).unwrap();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].id, "input");
        assert_eq!(fragments[0].title.as_deref(), Some("Request details"));
        let names: Vec<&str> = fragments[0].field_names().collect();
        assert_eq!(names, vec!["name", "age"]);
        assert_eq!(fragments[0].required, vec!["name"]);
    }

    #[test]
    fn flat_schema_preserves_declared_field_order() {
        let raw = json!({
            "properties": {
                "zeta": {"type": "string"},
                "alpha": {"type": "string"},
                "mid": {"type": "string"}
            }
        });

        let fragments = parse_fragments(&raw).unwrap();
        let names: Vec<&str> = fragments[0].field_names().collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn composed_schema_one_fragment_per_member() {
        let raw = json!({
            "allOf": [
                {"$ref": "#/definitions/personal"},
                {"$ref": "#/definitions/contact"}
            ],
            "definitions": {
                "personal": {
                    "title": "Personal",
                    "properties": {"name": {"type": "string"}, "age": {"type": "integer"}}
                },
                "contact": {
                    "title": "Contact",
                    "properties": {"email": {"type": "string"}}
                }
            }
        });

        let fragments = parse_fragments(&raw).unwrap();
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].id, "personal");
        assert_eq!(fragments[1].id, "contact");
        assert_eq!(fragments[0].title.as_deref(), Some("Personal"));
        let names: Vec<&str> = fragments[1].field_names().collect();
        assert_eq!(names, vec!["email"]);
    }

    #[test]
    fn composed_inline_members_keep_declaration_order() {
        let raw = json!({
            "allOf": [
                {"id": "second-first", "properties": {"b": {}}},
                {"properties": {"a": {}}}
            ]
        });

        let fragments = parse_fragments(&raw).unwrap();
        assert_eq!(fragments[0].id, "second-first");
        assert_eq!(fragments[1].id, "step-2");
    }

    #[test]
    fn member_without_properties_is_rejected() {
        let raw = json!({
            "allOf": [
                {"properties": {"ok": {}}},
                {"title": "broken"}
            ]
        });

        let err = parse_fragments(&raw).unwrap_err();
        match err {
            SchemaError::MissingProperties { member } => assert_eq!(member, "allOf[1]"),
            other => panic!("expected MissingProperties, got {other:?}"),
        }
    }

    #[test]
    fn missing_definition_is_rejected() {
        let raw = json!({
            "allOf": [{"$ref": "#/definitions/ghost"}],
            "definitions": {}
        });

        let err = parse_fragments(&raw).unwrap_err();
        match err {
            SchemaError::UnresolvedRef { member, reference } => {
                assert_eq!(member, "allOf[0]");
                assert_eq!(reference, "#/definitions/ghost");
            }
            other => panic!("expected UnresolvedRef, got {other:?}"),
        }
    }

    #[test]
    fn non_local_ref_is_rejected() {
        let raw = json!({
            "allOf": [{"$ref": "https://example.com/schema.json"}]
        });

        assert!(matches!(
            parse_fragments(&raw).unwrap_err(),
            SchemaError::UnresolvedRef { .. }
        ));
    }

    #[test]
    fn chained_refs_resolve() {
        let raw = json!({
            "allOf": [{"$ref": "#/definitions/alias"}],
            "definitions": {
                "alias": {"$ref": "#/definitions/real"},
                "real": {"properties": {"x": {"type": "number"}}}
            }
        });

        let fragments = parse_fragments(&raw).unwrap();
        assert_eq!(fragments[0].id, "real");
        assert!(fragments[0].properties.contains_key("x"));
    }

    #[test]
    fn cyclic_refs_are_rejected() {
        let raw = json!({
            "allOf": [{"$ref": "#/definitions/a"}],
            "definitions": {
                "a": {"$ref": "#/definitions/b"},
                "b": {"$ref": "#/definitions/a"}
            }
        });

        assert!(matches!(
            parse_fragments(&raw).unwrap_err(),
            SchemaError::UnresolvedRef { .. }
        ));
    }

    #[test]
    fn field_level_refs_resolve_against_member_definitions() {
        let raw = json!({
            "allOf": [{
                "properties": {
                    "country": {"$ref": "#/definitions/countryCode"}
                },
                "definitions": {
                    "countryCode": {"type": "string", "minLength": 2, "maxLength": 2}
                }
            }]
        });

        let fragments = parse_fragments(&raw).unwrap();
        assert_eq!(fragments[0].properties["country"]["minLength"], 2);
    }

    #[test]
    fn field_level_refs_fall_back_to_composition_definitions() {
        let raw = json!({
            "allOf": [{
                "properties": {"country": {"$ref": "#/definitions/countryCode"}}
            }],
            "definitions": {
                "countryCode": {"type": "string"}
            }
        });

        let fragments = parse_fragments(&raw).unwrap();
        assert_eq!(fragments[0].properties["country"]["type"], "string");
    }

    #[test]
    fn unresolvable_field_ref_is_rejected() {
        let raw = json!({
            "allOf": [{
                "properties": {"country": {"$ref": "#/definitions/nope"}}
            }]
        });

        assert!(matches!(
            parse_fragments(&raw).unwrap_err(),
            SchemaError::UnresolvedRef { .. }
        ));
    }

    #[test]
    fn non_object_root_is_rejected() {
        assert!(matches!(
            parse_fragments(&json!([1, 2, 3])).unwrap_err(),
            SchemaError::NotAnObject
        ));
        assert!(matches!(
            parse_fragments(&json!("schema")).unwrap_err(),
            SchemaError::NotAnObject
        ));
    }

    #[test]
    fn flat_schema_without_properties_is_rejected() {
        let raw = json!({"title": "no fields here"});
        assert!(matches!(
            parse_fragments(&raw).unwrap_err(),
            SchemaError::MissingProperties { .. }
        ));
    }

    #[test]
    fn empty_composition_yields_no_fragments() {
        let raw = json!({"allOf": []});
        assert!(parse_fragments(&raw).unwrap().is_empty());
    }

    #[test]
    fn classification_is_stable() {
        let flat = json!({"properties": {}});
        assert!(matches!(
            InputSchemaDefinition::classify(&flat).unwrap(),
            InputSchemaDefinition::Flat(_)
        ));

        let composed = json!({"allOf": [], "definitions": {}});
        assert!(matches!(
            InputSchemaDefinition::classify(&composed).unwrap(),
            InputSchemaDefinition::Composed { .. }
        ));
    }
}
