//! SQL text generation for staging statements
//!
//! Table and routine names come from configuration and are validated as plain
//! `[schema.]name` identifiers, so they can be spliced into statements as-is.
//! Column names come from the data file header and are always quoted.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::database::Dialect;

static IDENTIFIER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*(\.[A-Za-z_][A-Za-z0-9_$]*)?$").unwrap()
});

/// A configured name that is not a valid SQL identifier
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid SQL identifier '{0}': expected [schema.]name using letters, digits and underscores")]
pub struct InvalidIdentifier(pub String);

/// A validated, optionally schema-qualified SQL identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Validate a table or routine name
    pub fn parse(name: &str) -> Result<Self, InvalidIdentifier> {
        let name = name.trim();
        if IDENTIFIER_REGEX.is_match(name) {
            Ok(Self(name.to_string()))
        } else {
            Err(InvalidIdentifier(name.to_string()))
        }
    }

    /// Wrap a name built from known-good parts
    pub(crate) fn from_trusted(name: String) -> Self {
        debug_assert!(IDENTIFIER_REGEX.is_match(&name));
        Self(name)
    }

    /// The identifier as written
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Schema part, if qualified
    pub fn schema(&self) -> Option<&str> {
        self.0.split_once('.').map(|(schema, _)| schema)
    }

    /// Unqualified name part
    pub fn name(&self) -> &str {
        match self.0.split_once('.') {
            Some((_, name)) => name,
            None => &self.0,
        }
    }
}

impl TryFrom<String> for Identifier {
    type Error = InvalidIdentifier;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Identifier::parse(&value)
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        value.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Quote an arbitrary column name
pub fn quote_column(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn column_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| quote_column(c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `DELETE FROM <table>`: empties the table, keeps its structure
pub fn delete_all(table: &Identifier) -> String {
    format!("DELETE FROM {table}")
}

/// `CREATE TABLE` with one text column per source column
pub fn create_text_table(table: &Identifier, columns: &[String]) -> String {
    let defs = columns
        .iter()
        .map(|c| format!("{} TEXT", quote_column(c)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE IF NOT EXISTS {table} ({defs})")
}

/// Multi-row `INSERT ... VALUES` with placeholders for `rows` records
pub fn insert_rows(dialect: Dialect, table: &Identifier, columns: &[String], rows: usize) -> String {
    let width = columns.len();
    let mut sql = format!("INSERT INTO {table} ({}) VALUES ", column_list(columns));

    for row in 0..rows {
        if row > 0 {
            sql.push_str(", ");
        }
        sql.push('(');
        for col in 0..width {
            if col > 0 {
                sql.push_str(", ");
            }
            sql.push_str(&dialect.placeholder(row * width + col + 1));
        }
        sql.push(')');
    }

    sql
}

/// Copy staged rows into the destination table, column by column
pub fn copy_rows(staging: &Identifier, destination: &Identifier, columns: &[String]) -> String {
    let list = column_list(columns);
    format!("INSERT INTO {destination} ({list}) SELECT {list} FROM {staging}")
}
