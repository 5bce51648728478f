use std::fmt;

use crate::error::{DashboardError, Result};

/// Postgres truncates identifiers longer than this (NAMEDATALEN - 1).
const MAX_IDENTIFIER_BYTES: usize = 63;

/// A validated SQL identifier, rendered double-quoted so it can be spliced
/// into statement text without injection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(DashboardError::InvalidIdentifier(
                "identifier must not be empty".to_string(),
            ));
        }
        if name.contains('\0') {
            return Err(DashboardError::InvalidIdentifier(format!(
                "identifier contains a NUL byte: {name:?}"
            )));
        }
        if name.len() > MAX_IDENTIFIER_BYTES {
            return Err(DashboardError::InvalidIdentifier(format!(
                "identifier longer than {MAX_IDENTIFIER_BYTES} bytes: {name}"
            )));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0.replace('"', "\"\""))
    }
}

/// `"schema"."table"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedTable {
    pub schema: Identifier,
    pub table: Identifier,
}

impl QualifiedTable {
    pub fn new(schema: &str, table: &str) -> Result<Self> {
        Ok(Self {
            schema: Identifier::new(schema)?,
            table: Identifier::new(table)?,
        })
    }

    pub fn count_sql(&self) -> String {
        format!("SELECT COUNT(*) FROM {self}")
    }

    pub fn range_sql(&self, column: &Identifier) -> String {
        format!("SELECT MIN({column}), MAX({column}) FROM {self}")
    }

    /// Rows per calendar day of `column`, oldest day first.
    pub fn count_by_date_sql(&self, column: &Identifier) -> String {
        format!(
            "SELECT date({column}) AS event_on, COUNT(*) AS count_on_event \
             FROM {self} GROUP BY date({column}) ORDER BY event_on"
        )
    }
}

impl fmt::Display for QualifiedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}
