//! Validated, optionally schema-qualified table names.
//!
//! Table names are spliced into SQL text, so they are restricted to plain
//! identifiers and always emitted double-quoted.

use crate::constants::limits::MAX_IDENTIFIER_LENGTH;
use crate::error::{Result, TransportError};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName {
    schema: Option<String>,
    name: String,
}

impl TableName {
    /// Parse `table` or `schema.table`
    pub fn parse(value: &str) -> Result<Self> {
        let mut parts = value.split('.');
        let (schema, name) = match (parts.next(), parts.next(), parts.next()) {
            (Some(name), None, None) => (None, name),
            (Some(schema), Some(name), None) => (Some(schema), name),
            _ => {
                return Err(TransportError::invalid_name(
                    value,
                    "expected `table` or `schema.table`",
                ))
            }
        };

        if let Some(schema) = schema {
            validate_identifier(value, schema)?;
        }
        validate_identifier(value, name)?;

        Ok(Self {
            schema: schema.map(str::to_string),
            name: name.to_string(),
        })
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `"schema"."table"` or `"table"`
    pub fn qualified(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", quote_identifier(schema), quote_identifier(&self.name)),
            None => quote_identifier(&self.name),
        }
    }

    /// Unqualified, quoted name for an object derived from this table
    pub fn derived_identifier(&self, suffix: &str) -> String {
        quote_identifier(&format!("{}_{suffix}", self.name))
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{schema}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

pub(crate) fn quote_identifier(identifier: &str) -> String {
    format!("\"{identifier}\"")
}

fn validate_identifier(full: &str, identifier: &str) -> Result<()> {
    let mut chars = identifier.chars();
    let Some(first) = chars.next() else {
        return Err(TransportError::invalid_name(full, "empty identifier"));
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(TransportError::invalid_name(
            full,
            format!("identifier '{identifier}' must start with a letter or underscore"),
        ));
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(TransportError::invalid_name(
            full,
            format!("identifier '{identifier}' may only contain letters, digits and underscores"),
        ));
    }
    if identifier.len() > MAX_IDENTIFIER_LENGTH {
        return Err(TransportError::invalid_name(
            full,
            format!("identifier '{identifier}' exceeds {MAX_IDENTIFIER_LENGTH} characters"),
        ));
    }
    Ok(())
}
