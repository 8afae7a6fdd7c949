use serde_json::Value;

use crate::model::constraint::{Constraint, ValidationError};

/// Declared storage type of a field. Drives JSON coercion, row decoding and
/// SQL bind types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int,
    Text,
    Bool,
}

impl FieldKind {
    pub fn name(self) -> &'static str {
        match self {
            FieldKind::Int => "int",
            FieldKind::Text => "text",
            FieldKind::Bool => "bool",
        }
    }
}

/// A typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Text(String),
    Bool(bool),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Int(_) => FieldKind::Int,
            FieldValue::Text(_) => FieldKind::Text,
            FieldValue::Bool(_) => FieldKind::Bool,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Coerce a wire value into `kind`. Exact-type matches are taken as-is;
    /// strings holding a numeric or boolean literal are parsed. Anything else
    /// is a coercion failure and returns `None` (the field stays unset).
    ///
    /// Null and the empty string count as "no value supplied".
    pub fn coerce(kind: FieldKind, value: &Value) -> Option<FieldValue> {
        match (kind, value) {
            (_, Value::Null) => None,
            (FieldKind::Int, Value::Number(n)) => n.as_i64().map(FieldValue::Int),
            (FieldKind::Int, Value::String(s)) => s.trim().parse().ok().map(FieldValue::Int),
            (FieldKind::Text, Value::String(s)) if s.is_empty() => None,
            (FieldKind::Text, Value::String(s)) => Some(FieldValue::Text(s.clone())),
            (FieldKind::Bool, Value::Bool(b)) => Some(FieldValue::Bool(*b)),
            (FieldKind::Bool, Value::String(s)) => match s.as_str() {
                "true" | "1" => Some(FieldValue::Bool(true)),
                "false" | "0" => Some(FieldValue::Bool(false)),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Int(i) => Value::from(*i),
            FieldValue::Text(s) => Value::from(s.clone()),
            FieldValue::Bool(b) => Value::from(*b),
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// One attribute slot of a record: an optional value plus the ordered
/// constraint set declared for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    kind: FieldKind,
    constraints: &'static [Constraint],
    value: Option<FieldValue>,
}

impl Field {
    pub fn new(kind: FieldKind, constraints: &'static [Constraint]) -> Self {
        Self { kind, constraints, value: None }
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn constraints(&self) -> &'static [Constraint] {
        self.constraints
    }

    pub fn value(&self) -> Option<&FieldValue> {
        self.value.as_ref()
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    pub fn set(&mut self, value: FieldValue) {
        self.value = Some(value);
    }

    pub fn clear(&mut self) {
        self.value = None;
    }

    pub fn is_unique(&self) -> bool {
        self.constraints.contains(&Constraint::Unique)
    }

    pub fn is_required(&self) -> bool {
        self.constraints.contains(&Constraint::Required)
    }

    /// One entry per failing constraint, in declaration order. An unset field
    /// declared `Required` yields exactly the Required error and nothing
    /// else; an unset field without it is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        match &self.value {
            Some(value) => self
                .constraints
                .iter()
                .filter(|c| !c.is_satisfied(value))
                .map(Constraint::to_error)
                .collect(),
            None if self.is_required() => vec![Constraint::Required.to_error()],
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const USERNAME_CONSTRAINTS: &[Constraint] =
        &[Constraint::Required, Constraint::Length { min: 1, max: 20 }];

    #[test]
    fn coerces_numeric_string_to_int() {
        assert_eq!(FieldValue::coerce(FieldKind::Int, &json!("42")), Some(FieldValue::Int(42)));
        assert_eq!(FieldValue::coerce(FieldKind::Int, &json!(7)), Some(FieldValue::Int(7)));
        assert_eq!(FieldValue::coerce(FieldKind::Int, &json!("4x2")), None);
    }

    #[test]
    fn coerces_bool_literals() {
        assert_eq!(FieldValue::coerce(FieldKind::Bool, &json!("true")), Some(FieldValue::Bool(true)));
        assert_eq!(FieldValue::coerce(FieldKind::Bool, &json!("0")), Some(FieldValue::Bool(false)));
        assert_eq!(FieldValue::coerce(FieldKind::Bool, &json!("yes")), None);
    }

    #[test]
    fn null_and_empty_string_are_no_value() {
        assert_eq!(FieldValue::coerce(FieldKind::Text, &Value::Null), None);
        assert_eq!(FieldValue::coerce(FieldKind::Text, &json!("")), None);
    }

    #[test]
    fn number_does_not_coerce_into_text() {
        assert_eq!(FieldValue::coerce(FieldKind::Text, &json!(12)), None);
    }

    #[test]
    fn unset_required_field_reports_only_required() {
        let field = Field::new(FieldKind::Text, USERNAME_CONSTRAINTS);
        let errors = field.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].constraint, "Required");
    }

    #[test]
    fn unset_optional_field_is_valid() {
        let field = Field::new(FieldKind::Text, &[Constraint::Length { min: 2, max: 64 }]);
        assert!(field.validate().is_empty());
    }

    #[test]
    fn set_field_checks_value_constraints() {
        let mut field = Field::new(FieldKind::Text, USERNAME_CONSTRAINTS);
        field.set(FieldValue::Text("a".repeat(30)));
        let errors = field.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].constraint, "Length(1,20)");
    }

    #[test]
    fn unique_flag_comes_from_constraint_list() {
        let field = Field::new(FieldKind::Text, &[Constraint::Unique]);
        assert!(field.is_unique());
        let plain = Field::new(FieldKind::Text, &[]);
        assert!(!plain.is_unique());
    }
}
