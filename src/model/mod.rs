pub mod constraint;
pub mod field;
pub mod models;
pub mod schema;

use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::Row;
use thiserror::Error;

use crate::model::constraint::ValidationError;
use crate::model::field::{Field, FieldKind, FieldValue};
use crate::model::schema::ModelSchema;

/// Errors from dynamic model access and wire import.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("expected a JSON object")]
    NotAnObject,
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("cannot coerce value for field: {0}")]
    Coercion(String),
}

/// One record instance: a schema reference plus per-field optional values.
/// Built per request from a JSON body, query parameters or a store row, and
/// discarded after the action completes.
#[derive(Debug, Clone)]
pub struct Model {
    schema: &'static ModelSchema,
    fields: Vec<Field>,
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.schema, other.schema) && self.fields == other.fields
    }
}

impl Model {
    pub(crate) fn new(schema: &'static ModelSchema, fields: Vec<Field>) -> Self {
        Self { schema, fields }
    }

    pub fn schema(&self) -> &'static ModelSchema {
        self.schema
    }

    /// Populate an instance from a wire payload. Unknown keys are ignored;
    /// null and empty values leave the field unset; a value that cannot be
    /// coerced to the declared kind silently leaves the field unset. Callers
    /// that care whether a key was applied must check `get` afterwards.
    pub fn from_json(schema: &'static ModelSchema, payload: &Value) -> Result<Self, ModelError> {
        let object = payload.as_object().ok_or(ModelError::NotAnObject)?;
        let mut model = schema.instance();
        for (key, value) in object {
            if let Some(index) = schema.field_index(key) {
                if let Some(coerced) = FieldValue::coerce(schema.fields[index].kind, value) {
                    model.fields[index].set(coerced);
                }
            }
        }
        Ok(model)
    }

    /// Export set fields only, in schema order.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for (spec, field) in self.schema.fields.iter().zip(&self.fields) {
            if let Some(value) = field.value() {
                map.insert(spec.name.to_string(), value.to_json());
            }
        }
        Value::Object(map)
    }

    /// Populate an instance from a store row. A column that is absent from
    /// the row (narrow projection) or fails to decode leaves its field unset
    /// rather than aborting the record.
    pub fn from_row(schema: &'static ModelSchema, row: &PgRow) -> Self {
        let mut model = schema.instance();
        for (index, spec) in schema.fields.iter().enumerate() {
            if let Some(value) = decode_column(row, spec.name, spec.kind) {
                model.fields[index].set(value);
            }
        }
        model
    }

    pub fn field(&self, index: usize) -> &Field {
        &self.fields[index]
    }

    /// Iterate `(name, field)` pairs in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &Field)> + '_ {
        self.schema.fields.iter().map(|s| s.name).zip(self.fields.iter())
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        let index = self.schema.field_index(name)?;
        self.fields[index].value()
    }

    /// Dynamic set-by-name with the wire coercion rule. Unlike the JSON
    /// import path, failure here is reported to the caller.
    pub fn set(&mut self, name: &str, value: &Value) -> Result<(), ModelError> {
        let index = self
            .schema
            .field_index(name)
            .ok_or_else(|| ModelError::UnknownField(name.to_string()))?;
        let coerced = FieldValue::coerce(self.schema.fields[index].kind, value)
            .ok_or_else(|| ModelError::Coercion(name.to_string()))?;
        self.fields[index].set(coerced);
        Ok(())
    }

    /// Set an already-typed value by field index.
    pub fn set_value(&mut self, index: usize, value: FieldValue) {
        self.fields[index].set(value);
    }

    pub fn set_value_by_name(&mut self, name: &str, value: FieldValue) -> Result<(), ModelError> {
        let index = self
            .schema
            .field_index(name)
            .ok_or_else(|| ModelError::UnknownField(name.to_string()))?;
        self.fields[index].set(value);
        Ok(())
    }

    /// Clear one field's value. Used by the authorization layer to redact.
    pub fn erase(&mut self, index: usize) {
        self.fields[index].clear();
    }

    /// Clear one field's value by name; false when the name is unknown.
    pub fn erase_by_name(&mut self, name: &str) -> bool {
        match self.schema.field_index(name) {
            Some(index) => {
                self.fields[index].clear();
                true
            }
            None => false,
        }
    }

    /// Export per-column storage values in schema order, typed for binding.
    /// Unset fields export as NULL so statement arity always matches the
    /// column list.
    pub fn to_row(&self) -> Vec<(FieldKind, Option<FieldValue>)> {
        self.fields.iter().map(|f| (f.kind(), f.value().cloned())).collect()
    }

    pub fn has_values(&self) -> bool {
        self.fields.iter().any(Field::has_value)
    }

    /// Aggregate validation: one entry per field with failures, in
    /// declaration order. Empty result means the record is valid.
    pub fn validate_all(&self) -> Vec<(&'static str, Vec<ValidationError>)> {
        self.fields()
            .filter_map(|(name, field)| {
                let errors = field.validate();
                (!errors.is_empty()).then_some((name, errors))
            })
            .collect()
    }

    /// Validation for partial updates: only fields carrying a value are
    /// checked, so absent `Required` fields do not fail.
    pub fn validate_updates(&self) -> Vec<(&'static str, Vec<ValidationError>)> {
        self.fields()
            .filter(|(_, field)| field.has_value())
            .filter_map(|(name, field)| {
                let errors = field.validate();
                (!errors.is_empty()).then_some((name, errors))
            })
            .collect()
    }

    /// Fields flagged `Unique` that currently hold a value, stringified for
    /// the duplicate probe.
    pub fn unique_fields(&self) -> Vec<(&'static str, String)> {
        self.fields()
            .filter(|(_, field)| field.is_unique())
            .filter_map(|(name, field)| field.value().map(|v| (name, v.to_string())))
            .collect()
    }
}

/// Render a validation result as the wire `info` object:
/// `{field: [description, ...]}`.
pub fn validation_info(errors: &[(&'static str, Vec<ValidationError>)]) -> Value {
    let mut map = Map::new();
    for (name, field_errors) in errors {
        map.insert(
            name.to_string(),
            Value::Array(field_errors.iter().map(|e| Value::from(e.description.clone())).collect()),
        );
    }
    Value::Object(map)
}

fn decode_column(row: &PgRow, name: &str, kind: FieldKind) -> Option<FieldValue> {
    match kind {
        FieldKind::Int => row
            .try_get::<i64, _>(name)
            .ok()
            .or_else(|| row.try_get::<i32, _>(name).ok().map(i64::from))
            .or_else(|| row.try_get::<i16, _>(name).ok().map(i64::from))
            .map(FieldValue::Int),
        FieldKind::Text => row.try_get::<String, _>(name).ok().map(FieldValue::Text),
        FieldKind::Bool => row
            .try_get::<bool, _>(name)
            .ok()
            .or_else(|| row.try_get::<i16, _>(name).ok().map(|v| v != 0))
            .map(FieldValue::Bool),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::models::{PHOTO, USER};
    use serde_json::json;

    fn sample_user() -> Model {
        Model::from_json(
            &USER,
            &json!({
                "username": "abc",
                "password": "Abcdef12",
                "email": "a@b.com",
                "gender": "m",
                "born": "1990-01-01",
            }),
        )
        .unwrap()
    }

    #[test]
    fn from_json_ignores_unknown_keys() {
        let user = Model::from_json(&USER, &json!({"username": "abc", "shoe_size": 44})).unwrap();
        assert_eq!(user.get("username"), Some(&FieldValue::Text("abc".to_string())));
        assert!(user.get("id").is_none());
    }

    #[test]
    fn from_json_coerces_numeric_strings() {
        let user = Model::from_json(&USER, &json!({"permission_group": "3"})).unwrap();
        assert_eq!(user.get("permission_group"), Some(&FieldValue::Int(3)));
    }

    #[test]
    fn from_json_leaves_uncoercible_fields_unset() {
        let user = Model::from_json(&USER, &json!({"permission_group": "lots"})).unwrap();
        assert!(user.get("permission_group").is_none());
    }

    #[test]
    fn from_json_rejects_non_objects() {
        assert!(matches!(Model::from_json(&USER, &json!([1, 2])), Err(ModelError::NotAnObject)));
    }

    #[test]
    fn json_round_trip_preserves_safe_values() {
        let user = sample_user();
        let round_tripped = Model::from_json(&USER, &user.to_json()).unwrap();
        assert_eq!(user, round_tripped);
    }

    #[test]
    fn validation_is_idempotent() {
        let photo = Model::from_json(&PHOTO, &json!({"title": ""})).unwrap();
        assert_eq!(photo.validate_all(), photo.validate_all());
    }

    #[test]
    fn validate_all_reports_in_declaration_order() {
        let photo = PHOTO.instance();
        let errors = photo.validate_all();
        let names: Vec<_> = errors.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["extension", "title", "category", "is_private"]);
        assert!(errors.iter().all(|(_, errs)| errs.len() == 1 && errs[0].constraint == "Required"));
    }

    #[test]
    fn validate_updates_skips_unset_required_fields() {
        let mut photo = PHOTO.instance();
        assert!(photo.validate_updates().is_empty());

        photo.set("title", &json!("x")).unwrap();
        assert!(photo.validate_updates().is_empty());

        photo.set("category", &json!("memes")).unwrap();
        let errors = photo.validate_updates();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, "category");
    }

    #[test]
    fn unique_fields_only_includes_set_ones() {
        let user = sample_user();
        let unique: Vec<_> = user.unique_fields();
        assert_eq!(
            unique,
            vec![("username", "abc".to_string()), ("email", "a@b.com".to_string())]
        );
    }

    #[test]
    fn erase_clears_a_single_field() {
        let mut user = sample_user();
        let index = USER.field_index("email").unwrap();
        user.erase(index);
        assert!(user.get("email").is_none());
        assert!(user.get("username").is_some());
    }

    #[test]
    fn set_by_name_rejects_unknown_and_uncoercible() {
        let mut user = USER.instance();
        assert!(matches!(user.set("nope", &json!(1)), Err(ModelError::UnknownField(_))));
        assert!(matches!(user.set("id", &json!("abc")), Err(ModelError::Coercion(_))));
        assert!(user.set("id", &json!("17")).is_ok());
        assert_eq!(user.get("id"), Some(&FieldValue::Int(17)));
    }

    #[test]
    fn validation_info_shapes_field_error_map() {
        let user = Model::from_json(&USER, &json!({"password": "short"})).unwrap();
        let info = validation_info(&user.validate_all());
        assert!(info["username"][0].as_str().unwrap().contains("required"));
        assert!(info["password"][0].as_str().unwrap().contains("Password"));
    }
}
