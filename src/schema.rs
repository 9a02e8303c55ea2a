//! Schema registry: the column contract used to validate ingested rows.
//!
//! The registry holds an ordered list of `(name, type, nullable)` column specs. Binding it to a
//! header yields a [`ColumnLayout`]; [`SchemaRegistry::validate`] then turns one raw record into a
//! typed [`ValidatedRecord`] or a [`SchemaError`]. Validation is pure and has no side effects.

use csv::StringRecord;

use crate::catalog::columns;
use crate::error::SchemaError;
use crate::types::{DataType, Field, Schema, Value};

/// A row that passed validation, in schema field order.
pub type ValidatedRecord = Vec<Value>;

/// Authoritative column contract for one record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRegistry {
    schema: Schema,
    key_column: Option<String>,
}

/// Positions of the registry's fields inside a concrete header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    positions: Vec<usize>,
    header_len: usize,
}

impl SchemaRegistry {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            key_column: None,
        }
    }

    /// Declare the identifier column used for last-write-wins replacement during loads.
    pub fn with_key_column(mut self, column: impl Into<String>) -> Self {
        self.key_column = Some(column.into());
        self
    }

    /// Registry for the product catalog export.
    pub fn products() -> Self {
        Self::new(Schema::new(vec![
            Field::new(columns::ID, DataType::Int64),
            Field::new(columns::GENDER, DataType::Utf8),
            Field::new(columns::MASTER_CATEGORY, DataType::Utf8),
            Field::new(columns::SUB_CATEGORY, DataType::Utf8),
            Field::new(columns::ARTICLE_TYPE, DataType::Utf8),
            Field::nullable(columns::BASE_COLOUR, DataType::Utf8),
            Field::nullable(columns::SEASON, DataType::Utf8),
            Field::nullable(columns::YEAR, DataType::Int64),
            Field::nullable(columns::USAGE, DataType::Utf8),
            Field::new(columns::DISPLAY_NAME, DataType::Utf8),
        ]))
        .with_key_column(columns::ID)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Index of the key column in schema order, if one is declared.
    pub fn key_index(&self) -> Option<usize> {
        self.key_column
            .as_deref()
            .and_then(|name| self.schema.index_of(name))
    }

    /// Map schema fields to header positions.
    ///
    /// Columns may appear in any order and extra columns are ignored.
    pub fn layout<'h, I>(&self, headers: I) -> Result<ColumnLayout, SchemaError>
    where
        I: IntoIterator<Item = &'h str>,
    {
        let headers: Vec<&str> = headers.into_iter().map(str::trim).collect();
        let mut positions = Vec::with_capacity(self.schema.fields.len());
        for field in &self.schema.fields {
            match headers.iter().position(|h| *h == field.name) {
                Some(idx) => positions.push(idx),
                None => {
                    return Err(SchemaError::MissingColumn {
                        column: field.name.clone(),
                    });
                }
            }
        }
        Ok(ColumnLayout {
            positions,
            header_len: headers.len(),
        })
    }

    /// Validate one raw record against the registry.
    pub fn validate(
        &self,
        layout: &ColumnLayout,
        record: &StringRecord,
    ) -> Result<ValidatedRecord, SchemaError> {
        if record.len() != layout.header_len {
            return Err(SchemaError::FieldCount {
                expected: layout.header_len,
                found: record.len(),
            });
        }

        let mut row = Vec::with_capacity(self.schema.fields.len());
        for (field, &pos) in self.schema.fields.iter().zip(layout.positions.iter()) {
            let raw = record.get(pos).ok_or_else(|| SchemaError::MissingColumn {
                column: field.name.clone(),
            })?;
            row.push(parse_field(field, raw)?);
        }
        Ok(row)
    }
}

fn parse_field(field: &Field, raw: &str) -> Result<Value, SchemaError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return if field.nullable {
            Ok(Value::Null)
        } else {
            Err(SchemaError::NullInNonNullableColumn {
                column: field.name.clone(),
            })
        };
    }

    let mismatch = || SchemaError::TypeMismatch {
        column: field.name.clone(),
        expected: field.data_type,
        raw: raw.to_owned(),
    };

    match field.data_type {
        DataType::Utf8 => Ok(Value::Utf8(trimmed.to_owned())),
        DataType::Int64 => trimmed
            .parse::<i64>()
            .map(Value::Int64)
            .map_err(|_| mismatch()),
        DataType::Float64 => trimmed
            .parse::<f64>()
            .map(Value::Float64)
            .map_err(|_| mismatch()),
        DataType::Bool => parse_bool(trimmed).map(Value::Bool).ok_or_else(mismatch),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Some(true),
        "false" | "f" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}
