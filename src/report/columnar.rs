use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde::ser::Error as _;
use serde_json::{Map, Value};

use crate::error::ElispotError;

/// `{column: {row_index: value}}`, the table layout exchanged with the
/// presentation layer.
pub type ColumnarTable = BTreeMap<String, BTreeMap<String, Value>>;

pub fn to_columnar<T: Serialize>(rows: &[T]) -> Result<ColumnarTable, serde_json::Error> {
    let mut table = ColumnarTable::new();
    for (index, row) in rows.iter().enumerate() {
        let Value::Object(fields) = serde_json::to_value(row)? else {
            return Err(serde_json::Error::custom("table rows must serialize to objects"));
        };
        for (column, value) in fields {
            table
                .entry(column)
                .or_default()
                .insert(index.to_string(), value);
        }
    }
    Ok(table)
}

/// Rebuilds typed rows, ordered by numeric row index. Cells missing from a
/// column are left out of that row.
pub fn from_columnar<T: DeserializeOwned>(table: &ColumnarTable) -> Result<Vec<T>, ElispotError> {
    let mut rows: BTreeMap<usize, Map<String, Value>> = BTreeMap::new();
    for (column, cells) in table {
        for (index, value) in cells {
            let row = index.trim().parse::<usize>().map_err(|_| {
                ElispotError::invalid_parameter(
                    "row_index",
                    index,
                    format!("column {column} uses a non-numeric row index"),
                )
            })?;
            rows.entry(row)
                .or_default()
                .insert(column.clone(), value.clone());
        }
    }
    rows.into_values()
        .map(|fields| serde_json::from_value(Value::Object(fields)).map_err(ElispotError::from))
        .collect()
}

#[cfg(test)]
#[path = "../../tests/src_inline/report/columnar.rs"]
mod tests;
