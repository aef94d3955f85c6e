//! Filter Engine
//!
//! Composable row predicates: comparison, containment, negation and AND
//! across columns. Evaluation is a linear scan; there are no indexes.

use crate::error::{LedgerError, Result};
use crate::types::{FieldValue, Values};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Boolean function over one row's values
pub type Predicate = Box<dyn Fn(&Values) -> bool>;

/// Filter operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    Greater,
    Less,
    Equal,
    Contains,
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterOperator::Greater => "GREATER",
            FilterOperator::Less => "LESS",
            FilterOperator::Equal => "EQUAL",
            FilterOperator::Contains => "CONTAINS",
        };
        f.write_str(name)
    }
}

/// One condition applied to a column
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    operator: FilterOperator,
    operand: FieldValue,
    negate: bool,
}

impl FilterCondition {
    /// Build a condition, rejecting operands the operator cannot use
    ///
    /// Text works with every operator. Numbers work with the comparisons,
    /// null only with `Equal` (matches an absent or null column) and lists
    /// only with `Contains` (every element must be present).
    pub fn new(operator: FilterOperator, operand: impl Into<FieldValue>) -> Result<Self> {
        let operand = operand.into();
        verify_operand_type(operator, &operand)?;
        Ok(FilterCondition {
            operator,
            operand,
            negate: false,
        })
    }

    pub fn greater(operand: impl Into<FieldValue>) -> Result<Self> {
        Self::new(FilterOperator::Greater, operand)
    }

    pub fn less(operand: impl Into<FieldValue>) -> Result<Self> {
        Self::new(FilterOperator::Less, operand)
    }

    pub fn equal(operand: impl Into<FieldValue>) -> Result<Self> {
        Self::new(FilterOperator::Equal, operand)
    }

    pub fn contains(operand: impl Into<FieldValue>) -> Result<Self> {
        Self::new(FilterOperator::Contains, operand)
    }

    /// Invert the outcome of this condition
    pub fn negated(mut self) -> Self {
        self.negate = !self.negate;
        self
    }

    pub fn operator(&self) -> FilterOperator {
        self.operator
    }

    pub fn operand(&self) -> &FieldValue {
        &self.operand
    }

    pub fn is_negated(&self) -> bool {
        self.negate
    }

    /// Evaluate against the value stored under `column_key`
    pub fn matches(&self, column_key: &str, row: &Values) -> bool {
        let value = row.get(column_key);
        let hit = match self.operator {
            FilterOperator::Equal => match value {
                None => self.operand.is_null(),
                Some(v) => *v == self.operand,
            },
            FilterOperator::Greater => {
                matches!(value.and_then(|v| v.compare(&self.operand)), Some(Ordering::Greater))
            }
            FilterOperator::Less => {
                matches!(value.and_then(|v| v.compare(&self.operand)), Some(Ordering::Less))
            }
            FilterOperator::Contains => value.map_or(false, |v| contains(v, &self.operand)),
        };
        hit != self.negate
    }
}

fn verify_operand_type(operator: FilterOperator, operand: &FieldValue) -> Result<()> {
    let compatible = match operand {
        FieldValue::Text(_) => true,
        FieldValue::Number(_) => matches!(
            operator,
            FilterOperator::Greater | FilterOperator::Less | FilterOperator::Equal
        ),
        FieldValue::Null => operator == FilterOperator::Equal,
        FieldValue::List(_) => operator == FilterOperator::Contains,
        FieldValue::Bool(_) | FieldValue::Object(_) => false,
    };

    if compatible {
        Ok(())
    } else {
        Err(LedgerError::FilterOperandType {
            operator: operator.to_string(),
            operand: operand.to_string(),
        })
    }
}

fn contains(haystack: &FieldValue, needle: &FieldValue) -> bool {
    match (haystack, needle) {
        (FieldValue::List(items), FieldValue::List(wanted)) => {
            wanted.iter().all(|w| items.contains(w))
        }
        (FieldValue::List(items), _) => items.contains(needle),
        (FieldValue::Text(s), FieldValue::Text(sub)) => s.contains(sub.as_str()),
        _ => false,
    }
}

/// Predicate for a single condition on `column_key`
pub fn build_predicate(column_key: &str, condition: &FilterCondition) -> Predicate {
    let column_key = column_key.to_string();
    let condition = condition.clone();
    Box::new(move |row: &Values| condition.matches(&column_key, row))
}

/// Conditions per column, all AND-ed together
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisualizeFilters {
    filters: BTreeMap<String, Vec<FilterCondition>>,
}

impl VisualizeFilters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition on `column_key` (builder form)
    pub fn with(mut self, column_key: impl Into<String>, condition: FilterCondition) -> Self {
        self.add(column_key, condition);
        self
    }

    pub fn add(&mut self, column_key: impl Into<String>, condition: FilterCondition) {
        self.filters.entry(column_key.into()).or_default().push(condition);
    }

    pub fn is_empty(&self) -> bool {
        self.filters.values().all(Vec::is_empty)
    }

    pub fn conditions(&self, column_key: &str) -> &[FilterCondition] {
        self.filters.get(column_key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn matches(&self, row: &Values) -> bool {
        self.filters
            .iter()
            .all(|(key, conditions)| conditions.iter().all(|c| c.matches(key, row)))
    }
}

impl From<BTreeMap<String, Vec<FilterCondition>>> for VisualizeFilters {
    fn from(filters: BTreeMap<String, Vec<FilterCondition>>) -> Self {
        VisualizeFilters { filters }
    }
}

/// AND over every condition of every column; `None` or empty accepts all rows
pub fn build_composite_predicate(filters: Option<&VisualizeFilters>) -> Predicate {
    match filters {
        Some(filters) if !filters.is_empty() => {
            let filters = filters.clone();
            Box::new(move |row: &Values| filters.matches(row))
        }
        _ => Box::new(|_: &Values| true),
    }
}
