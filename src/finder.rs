//! Attribute-based finder names, parsed into explicit column lists.
//!
//! The original dynamic-dispatch idea ("find_by_name_and_value" resolved at
//! call time) is reframed as a small parser plus validation step: parse the
//! name into an operation and a column list, then zip the columns against
//! positional values. No runtime method synthesis is involved.

use crate::error::{Error, Result};
use crate::query::{Conditions, FilterValue};
use crate::record::Record;
use crate::value::Value;

const FIND_ALL_PREFIX: &str = "find_all_by_";
const FIND_FIRST_PREFIX: &str = "find_by_";
const COLUMN_SEPARATOR: &str = "_and_";

/// Whether a finder returns a sequence or a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinderKind {
    First,
    All,
}

/// A parsed finder name: `find_by_name_and_value` becomes
/// `{kind: First, columns: ["name", "value"]}`.
#[derive(Debug, Clone, PartialEq)]
pub struct FinderName {
    pub kind: FinderKind,
    pub columns: Vec<String>,
}

impl FinderName {
    /// Parse a method-like finder name.
    ///
    /// Returns `None` when the name does not look like a finder at all, so a
    /// dispatcher can fall through to other lookup mechanisms. A name that
    /// parses but references a bad column fails later, in
    /// [`conditions_for`], with a distinguishable error.
    pub fn parse(name: &str) -> Option<FinderName> {
        let (kind, rest) = if let Some(rest) = name.strip_prefix(FIND_ALL_PREFIX) {
            (FinderKind::All, rest)
        } else if let Some(rest) = name.strip_prefix(FIND_FIRST_PREFIX) {
            (FinderKind::First, rest)
        } else {
            return None;
        };

        if rest.is_empty() {
            return None;
        }
        let columns: Vec<String> = rest.split(COLUMN_SEPARATOR).map(str::to_string).collect();
        if columns.iter().any(|c| c.is_empty()) {
            return None;
        }
        Some(FinderName { kind, columns })
    }
}

/// Zip a parsed finder's columns against positional values, validating
/// arity and schema.
///
/// # Errors
///
/// - [`Error::InvalidArgument`]: value count does not equal column count
/// - [`Error::UnknownOperation`]: a column is absent from `R`'s schema
pub fn conditions_for<R: Record>(finder: &FinderName, values: Vec<Value>) -> Result<Conditions> {
    if finder.columns.len() != values.len() {
        return Err(Error::InvalidArgument {
            entity: R::table().to_string(),
            expected: finder.columns.len(),
            given: values.len(),
        });
    }
    for column in &finder.columns {
        if !R::has_column(column) {
            return Err(Error::UnknownOperation {
                entity: R::table().to_string(),
                column: column.clone(),
            });
        }
    }
    Ok(finder
        .columns
        .iter()
        .cloned()
        .zip(values)
        .map(|(column, value)| (column, FilterValue::One(value)))
        .collect())
}
