use serde_json::{json, Map, Value};

use crate::model::field::{Field, FieldKind};
use crate::model::constraint::Constraint;
use crate::model::Model;

/// Descriptor for one field of a record type: name, declared kind and the
/// constraint set. The ordered descriptor list is the single source of truth
/// for JSON marshaling, row decoding, permission-column alignment and the
/// introspection endpoint.
#[derive(Debug)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub constraints: &'static [Constraint],
}

impl FieldSpec {
    pub fn describe(&self) -> Value {
        json!({
            "type": self.kind.name(),
            "constraints": self.constraints.iter().map(Constraint::name).collect::<Vec<_>>(),
        })
    }
}

/// One record type: a named, ordered set of field descriptors, fixed at
/// definition time. Schemas are `static` and shared; instances carry the
/// per-request values.
#[derive(Debug)]
pub struct ModelSchema {
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
}

impl ModelSchema {
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Build an empty instance of this record type.
    pub fn instance(&'static self) -> Model {
        Model::new(self, self.fields.iter().map(|f| Field::new(f.kind, f.constraints)).collect())
    }

    /// Per-field type and constraint metadata, for client-facing schema
    /// documentation.
    pub fn describe(&self) -> Value {
        let mut map = Map::new();
        for field in self.fields {
            map.insert(field.name.to_string(), field.describe());
        }
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::models::USER;

    #[test]
    fn field_index_follows_declaration_order() {
        assert_eq!(USER.field_index("id"), Some(0));
        assert_eq!(USER.field_index("username"), Some(1));
        assert_eq!(USER.field_index("no_such_field"), None);
    }

    #[test]
    fn describe_lists_types_and_constraint_names() {
        let description = USER.describe();
        let username = &description["username"];
        assert_eq!(username["type"], "text");
        let constraints: Vec<&str> =
            username["constraints"].as_array().unwrap().iter().map(|v| v.as_str().unwrap()).collect();
        assert_eq!(constraints, vec!["Unique", "Length(1,20)", "Required"]);
    }

    #[test]
    fn instance_starts_with_all_fields_unset() {
        let user = USER.instance();
        assert!(USER.field_names().all(|name| user.get(name).is_none()));
    }
}
