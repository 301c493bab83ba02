//! Row and table definitions

use crate::model::LabelSet;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Standard column names
pub const METRIC_NAME_FIELD: &str = "metric_name";
pub const LABELS_FIELD: &str = "labels";
pub const TIMESTAMP_FIELD: &str = "timestamp";
pub const VALUE_FIELD: &str = "value";

/// A single stored sample.
///
/// Rows produced from one series share the metric name and label set.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRow {
    pub metric_name: Arc<str>,
    pub labels: Arc<LabelSet>,
    pub timestamp_ms: i64,
    pub value: f64,
}

/// Validated `[database.]table` identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    database: Option<String>,
    table: String,
}

impl TableName {
    /// `metrics.samples`
    pub fn default_samples() -> Self {
        Self {
            database: Some("metrics".to_string()),
            table: "samples".to_string(),
        }
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Backtick-quoted form for SQL text.
    pub fn quoted(&self) -> String {
        match &self.database {
            Some(db) => format!("`{}`.`{}`", db, self.table),
            None => format!("`{}`", self.table),
        }
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl FromStr for TableName {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        let value = value.trim();
        let (database, table) = match value.split_once('.') {
            Some((db, table)) => (Some(db), table),
            None => (None, value),
        };

        if !is_identifier(table) || database.is_some_and(|db| !is_identifier(db)) {
            return Err(format!(
                "invalid table name '{}'; expected [database.]table using letters, digits and '_'",
                value
            ));
        }

        Ok(Self {
            database: database.map(str::to_string),
            table: table.to_string(),
        })
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.database {
            Some(db) => write!(f, "{}.{}", db, self.table),
            None => write!(f, "{}", self.table),
        }
    }
}
