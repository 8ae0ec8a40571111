//! Structural checks on shaped elements before they are written.
//!
//! Validation is opt-in: it parses every value of every row, which makes a
//! full run several times slower.

use std::collections::HashMap;
use std::fmt;

use crate::data::tables::{Row, ShapedElement, Table};
use crate::tags::has_problem_chars;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Integer,
    Float,
    Text,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    Range { min: f64, max: f64 },
    NonEmpty,
    NoProblemChars,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    pub name: &'static str,
    pub field_type: FieldType,
    pub constraints: Vec<Constraint>,
}

impl FieldRule {
    pub fn new(name: &'static str, field_type: FieldType) -> Self {
        FieldRule {
            name,
            field_type,
            constraints: Vec::new(),
        }
    }

    pub fn with(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    fn check(&self, value: &str) -> Option<String> {
        let number = match self.field_type {
            FieldType::Integer => match value.parse::<i64>() {
                Ok(number) => Some(number as f64),
                Err(_) => return Some(format!("must be of integer type, got {:?}", value)),
            },
            FieldType::Float => match value.parse::<f64>() {
                Ok(number) if number.is_finite() => Some(number),
                _ => return Some(format!("must be of float type, got {:?}", value)),
            },
            FieldType::Text => None,
        };

        self.constraints.iter().find_map(|constraint| match constraint {
            Constraint::Range { min, max } => match number {
                Some(number) if number < *min || number > *max => {
                    Some(format!("must be between {} and {}, got {}", min, max, value))
                },
                _ => None,
            },
            Constraint::NonEmpty if value.is_empty() => Some("empty values not allowed".to_string()),
            Constraint::NoProblemChars if has_problem_chars(value) => {
                Some(format!("contains problematic characters: {:?}", value))
            },
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub table: Table,
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}: {}", self.table.name(), self.field, self.message)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub element_type: &'static str,
    pub field_errors: Vec<FieldError>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Element of type '{}' has the following errors:", self.element_type)?;
        for field_error in &self.field_errors {
            write!(f, "\n  {}", field_error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Field rules for each output table.
#[derive(Debug, Clone)]
pub struct Schema {
    rules: HashMap<Table, Vec<FieldRule>>,
}

impl Schema {
    pub fn new() -> Self {
        Schema { rules: HashMap::new() }
    }

    pub fn with_table(mut self, table: Table, rules: Vec<FieldRule>) -> Self {
        self.rules.insert(table, rules);
        self
    }

    /// The default schema, with tag keys also rejected when they contain
    /// characters that do not survive a round trip through SQL loaders.
    pub fn rejecting_problem_keys() -> Self {
        let mut schema = Schema::default();
        for table in [Table::NodeTags, Table::WayTags] {
            if let Some(rules) = schema.rules.get_mut(&table) {
                for rule in rules.iter_mut().filter(|rule| rule.name == "key") {
                    rule.constraints.push(Constraint::NoProblemChars);
                }
            }
        }
        schema
    }

    fn check_row(&self, table: Table, row: &dyn Row, errors: &mut Vec<FieldError>) {
        let Some(rules) = self.rules.get(&table) else {
            return;
        };
        let columns = table.columns();
        let values = row.values();

        for rule in rules {
            let message = match columns.iter().position(|column| *column == rule.name) {
                Some(index) => match values.get(index) {
                    Some(value) => rule.check(value),
                    None => Some("required field".to_string()),
                },
                None => Some("required field".to_string()),
            };
            if let Some(message) = message {
                errors.push(FieldError {
                    table,
                    field: rule.name,
                    message,
                });
            }
        }
    }
}

impl Default for Schema {
    fn default() -> Self {
        use Constraint::*;
        use FieldType::*;

        let tag_rules = || vec![
            FieldRule::new("id", Integer),
            FieldRule::new("key", Text).with(NonEmpty),
            FieldRule::new("value", Text),
            FieldRule::new("type", Text).with(NonEmpty),
        ];

        Schema::new()
            .with_table(Table::Nodes, vec![
                FieldRule::new("id", Integer),
                FieldRule::new("lat", Float).with(Range { min: -90.0, max: 90.0 }),
                FieldRule::new("lon", Float).with(Range { min: -180.0, max: 180.0 }),
                FieldRule::new("user", Text),
                FieldRule::new("uid", Integer),
                FieldRule::new("version", Text),
                FieldRule::new("changeset", Integer),
                FieldRule::new("timestamp", Text).with(NonEmpty),
            ])
            .with_table(Table::NodeTags, tag_rules())
            .with_table(Table::Ways, vec![
                FieldRule::new("id", Integer),
                FieldRule::new("user", Text),
                FieldRule::new("uid", Integer),
                FieldRule::new("version", Text),
                FieldRule::new("changeset", Integer),
                FieldRule::new("timestamp", Text).with(NonEmpty),
            ])
            .with_table(Table::WayNodes, vec![
                FieldRule::new("id", Integer),
                FieldRule::new("node_id", Integer),
                FieldRule::new("position", Integer).with(Range { min: 0.0, max: f64::MAX }),
            ])
            .with_table(Table::WayTags, tag_rules())
    }
}

pub fn validate(element: &ShapedElement, schema: &Schema) -> Result<(), ValidationError> {
    let mut field_errors = Vec::new();
    for (table, row) in element.rows() {
        schema.check_row(table, row, &mut field_errors);
    }

    if field_errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError {
            element_type: element.element_type(),
            field_errors,
        })
    }
}
