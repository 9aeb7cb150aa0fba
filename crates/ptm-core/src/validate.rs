//! Extraction checks run over raw hub rows before mapping.
//!
//! Problems are reported, never enforced: a row that fails a check is still
//! mapped and loaded, and whatever is missing becomes absence downstream.

use crate::record::RawRecord;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// JSON kind a field is expected to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    String,
    Integer,
    Bool,
    List,
    Object,
}

impl ValueKind {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ValueKind::String => value.is_string(),
            ValueKind::Integer => value.is_i64() || value.is_u64(),
            ValueKind::Bool => value.is_boolean(),
            ValueKind::List => value.is_array(),
            ValueKind::Object => value.is_object(),
        }
    }
}

type RowPredicate = Arc<dyn Fn(&RawRecord) -> bool + Send + Sync>;

#[derive(Clone)]
enum Check {
    Field { field: String, kind: ValueKind },
    Row(RowPredicate),
}

/// A named check over one raw row.
#[derive(Clone)]
pub struct Constraint {
    name: String,
    check: Check,
}

impl std::fmt::Debug for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Constraint").field("name", &self.name).finish()
    }
}

impl Constraint {
    /// `field` must be present with the given kind.
    pub fn field_exists(field: &str, kind: ValueKind) -> Self {
        Self {
            name: format!("{} exists", field),
            check: Check::Field {
                field: field.to_string(),
                kind,
            },
        }
    }

    /// Arbitrary predicate over the whole row.
    pub fn row<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&RawRecord) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            check: Check::Row(Arc::new(predicate)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn field(&self) -> Option<&str> {
        match &self.check {
            Check::Field { field, .. } => Some(field),
            Check::Row(_) => None,
        }
    }

    fn holds(&self, row: &RawRecord) -> bool {
        match &self.check {
            Check::Field { field, kind } => row.get(field).is_some_and(|v| kind.matches(v)),
            Check::Row(predicate) => predicate(row),
        }
    }
}

/// One violated constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Problem {
    pub row_index: usize,
    pub constraint: String,
    pub field: Option<String>,
}

/// Check every row against every constraint.
pub fn validate(rows: &[RawRecord], constraints: &[Constraint]) -> Vec<Problem> {
    let mut problems = Vec::new();
    for (row_index, row) in rows.iter().enumerate() {
        for constraint in constraints {
            if !constraint.holds(row) {
                problems.push(Problem {
                    row_index,
                    constraint: constraint.name.clone(),
                    field: constraint.field().map(str::to_string),
                });
            }
        }
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_constraints() {
        let rows = vec![
            json!({"modelId": "gpt2", "likes": 3}).as_object().unwrap().clone(),
            json!({"modelId": 7}).as_object().unwrap().clone(),
        ];
        let constraints = vec![
            Constraint::field_exists("modelId", ValueKind::String),
            Constraint::field_exists("likes", ValueKind::Integer),
        ];
        let problems = validate(&rows, &constraints);
        assert_eq!(problems.len(), 2);
        assert!(problems.iter().all(|p| p.row_index == 1));
        assert_eq!(problems[0].constraint, "modelId exists");
    }

    #[test]
    fn test_row_constraint() {
        let rows = vec![json!({"modelId": "a", "id": "b"}).as_object().unwrap().clone()];
        let constraints = vec![Constraint::row("modelId and id are equivalent", |row| {
            row.get("modelId") == row.get("id")
        })];
        let problems = validate(&rows, &constraints);
        assert_eq!(problems.len(), 1);
        assert!(problems[0].field.is_none());
    }
}
