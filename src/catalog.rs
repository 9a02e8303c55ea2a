//! Product catalog record type.

use serde::Serialize;

use crate::types::{DataSet, Schema, Value};

/// Column names of the product catalog export.
pub mod columns {
    pub const ID: &str = "id";
    pub const GENDER: &str = "gender";
    pub const MASTER_CATEGORY: &str = "masterCategory";
    pub const SUB_CATEGORY: &str = "subCategory";
    pub const ARTICLE_TYPE: &str = "articleType";
    pub const BASE_COLOUR: &str = "baseColour";
    pub const SEASON: &str = "season";
    pub const YEAR: &str = "year";
    pub const USAGE: &str = "usage";
    pub const DISPLAY_NAME: &str = "productDisplayName";
}

/// One row of the product catalog.
///
/// Optional attributes are `None` when the source cell was empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductRecord {
    pub id: i64,
    pub gender: String,
    pub master_category: String,
    pub sub_category: String,
    pub article_type: String,
    pub base_colour: Option<String>,
    pub season: Option<String>,
    pub year: Option<i64>,
    pub usage: Option<String>,
    pub display_name: String,
}

impl ProductRecord {
    /// Build a typed record from a stored row.
    ///
    /// Returns `None` if the schema lacks a product column or a required value is null.
    pub fn from_row(schema: &Schema, row: &[Value]) -> Option<Self> {
        let get = |name: &str| schema.index_of(name).and_then(|idx| row.get(idx));
        let text = |name: &str| get(name).and_then(Value::as_str).map(str::to_owned);

        Some(Self {
            id: get(columns::ID)?.as_i64()?,
            gender: text(columns::GENDER)?,
            master_category: text(columns::MASTER_CATEGORY)?,
            sub_category: text(columns::SUB_CATEGORY)?,
            article_type: text(columns::ARTICLE_TYPE)?,
            base_colour: text(columns::BASE_COLOUR),
            season: text(columns::SEASON),
            year: get(columns::YEAR).and_then(Value::as_i64),
            usage: text(columns::USAGE),
            display_name: text(columns::DISPLAY_NAME)?,
        })
    }

    /// Iterate typed records of a product dataset, skipping rows that do not fit.
    pub fn iter(dataset: &DataSet) -> impl Iterator<Item = ProductRecord> + '_ {
        dataset
            .rows
            .iter()
            .filter_map(|row| Self::from_row(&dataset.schema, row))
    }
}
