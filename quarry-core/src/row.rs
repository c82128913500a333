use crate::{AsValue, Error, Result, Value};
use std::sync::Arc;

/// Shared column labels of a result set.
pub type RowNames = Arc<[String]>;
/// Owned row value slice matching `RowNames` length.
pub type Row = Box<[Value]>;

/// A result row with its corresponding column labels.
#[derive(Debug, Clone, PartialEq)]
pub struct RowLabeled {
    /// Column names.
    pub labels: RowNames,
    /// Data values (aligned by index with `labels`).
    pub values: Row,
}

impl RowLabeled {
    pub fn new(names: RowNames, values: Row) -> Self {
        Self {
            labels: names,
            values,
        }
    }
    pub fn names(&self) -> &[String] {
        &self.labels
    }
    pub fn values(&self) -> &[Value] {
        &self.values
    }
    pub fn len(&self) -> usize {
        self.values.len()
    }
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
    /// Value of the column with the given label, labels are matched exactly first and
    /// then ignoring ASCII case (drivers may normalize the case of the labels).
    pub fn get_column(&self, name: &str) -> Option<&Value> {
        self.labels
            .iter()
            .position(|v| v == name)
            .or_else(|| self.labels.iter().position(|v| v.eq_ignore_ascii_case(name)))
            .map(|i| &self.values[i])
    }
    /// Typed value of the column with the given label.
    pub fn get<T: AsValue>(&self, name: &str) -> Result<T> {
        let value = self.get_column(name).ok_or_else(|| {
            Error::msg(format!(
                "Column `{}` is not part of the row, available columns: {}",
                name,
                self.labels.join(", ")
            ))
        })?;
        T::try_from_value(value.clone())
            .map_err(|e| e.context(format!("While reading column `{}`", name)))
    }
    /// Typed value at the zero-based position.
    pub fn get_at<T: AsValue>(&self, index: usize) -> Result<T> {
        let value = self.values.get(index).ok_or_else(|| {
            Error::msg(format!(
                "Column index {} is out of bounds, the row has {} columns",
                index,
                self.values.len()
            ))
        })?;
        T::try_from_value(value.clone())
    }
}

impl From<RowLabeled> for Row {
    fn from(value: RowLabeled) -> Self {
        value.values
    }
}
