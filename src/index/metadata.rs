//! Columnar metadata table keyed by identifier.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct MetadataColumns {
    idx: Vec<String>,
    columns: BTreeMap<String, Vec<Value>>,
}

/// Identifier column plus one column per attribute.
///
/// Invariant: identifiers are unique, so the row count equals the number of
/// distinct identifiers; every column has exactly one value per row (null
/// where a row lacks the attribute).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "MetadataColumns", into = "MetadataColumns")]
pub struct MetadataTable {
    data: MetadataColumns,
    positions: HashMap<String, usize>,
}

impl PartialEq for MetadataTable {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl TryFrom<MetadataColumns> for MetadataTable {
    type Error = ValidationError;

    fn try_from(data: MetadataColumns) -> Result<Self, Self::Error> {
        let rows = data.idx.len();
        if let Some((name, col)) = data.columns.iter().find(|(_, c)| c.len() != rows) {
            return Err(ValidationError::InvalidConfig {
                reason: format!("metadata column '{name}' has {} rows, expected {rows}", col.len()),
            });
        }

        let mut positions = HashMap::with_capacity(rows);
        for (pos, idx) in data.idx.iter().enumerate() {
            if positions.insert(idx.clone(), pos).is_some() {
                return Err(ValidationError::DuplicateIdentifier { idx: idx.clone() });
            }
        }
        Ok(Self { data, positions })
    }
}

impl From<MetadataTable> for MetadataColumns {
    fn from(table: MetadataTable) -> Self {
        table.data
    }
}

impl MetadataTable {
    /// Builds a table from `(identifier, attributes)` records.
    ///
    /// # Errors
    /// `DuplicateIdentifier` if an identifier repeats.
    pub fn from_records<I>(records: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (String, Map<String, Value>)>,
    {
        let records: Vec<(String, Map<String, Value>)> = records.into_iter().collect();
        let names: BTreeSet<&String> = records.iter().flat_map(|(_, attrs)| attrs.keys()).collect();

        let mut columns: BTreeMap<String, Vec<Value>> = names
            .iter()
            .map(|name| ((*name).clone(), Vec::with_capacity(records.len())))
            .collect();
        let mut idx = Vec::with_capacity(records.len());
        for (id, attrs) in &records {
            idx.push(id.clone());
            for (name, col) in &mut columns {
                col.push(attrs.get(name).cloned().unwrap_or(Value::Null));
            }
        }

        Self::try_from(MetadataColumns { idx, columns })
    }

    /// Number of rows (distinct identifiers).
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.idx.len()
    }

    /// Returns true if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.idx.is_empty()
    }

    /// Row position of `idx`.
    #[must_use]
    pub fn position(&self, idx: &str) -> Option<usize> {
        self.positions.get(idx).copied()
    }

    /// Returns true if `idx` has a row.
    #[must_use]
    pub fn contains(&self, idx: &str) -> bool {
        self.positions.contains_key(idx)
    }

    /// Identifier at row `pos`.
    #[must_use]
    pub fn idx_at(&self, pos: usize) -> Option<&str> {
        self.data.idx.get(pos).map(String::as_str)
    }

    /// Non-null attributes of row `pos`.
    #[must_use]
    pub fn attributes_at(&self, pos: usize) -> Map<String, Value> {
        self.data
            .columns
            .iter()
            .filter_map(|(name, col)| match col.get(pos) {
                Some(Value::Null) | None => None,
                Some(v) => Some((name.clone(), v.clone())),
            })
            .collect()
    }

    /// Appends the rows of `other`, filling columns missing on either side
    /// with nulls. Nothing is appended if an identifier would repeat.
    ///
    /// # Errors
    /// `DuplicateIdentifier` on the first repeated identifier.
    pub fn concat(&mut self, other: MetadataTable) -> Result<(), ValidationError> {
        if let Some(dup) = other.data.idx.iter().find(|idx| self.contains(idx)) {
            return Err(ValidationError::DuplicateIdentifier { idx: dup.clone() });
        }

        let before = self.len();
        let added = other.len();
        for name in other.data.columns.keys() {
            self.data
                .columns
                .entry(name.clone())
                .or_insert_with(|| vec![Value::Null; before]);
        }
        let mut other_columns = other.data.columns;
        for (name, col) in &mut self.data.columns {
            match other_columns.remove(name) {
                Some(values) => col.extend(values),
                None => col.extend(std::iter::repeat(Value::Null).take(added)),
            }
        }
        for (offset, idx) in other.data.idx.into_iter().enumerate() {
            self.positions.insert(idx.clone(), before + offset);
            self.data.idx.push(idx);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(label: &str) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("default_label".to_string(), Value::from(label));
        m
    }

    #[test]
    fn from_records_builds_aligned_columns() {
        let mut extra = attrs("EGFR");
        extra.insert("biotype".to_string(), Value::from("protein_coding"));
        let table = MetadataTable::from_records([
            ("ENSG00000146648".to_string(), extra),
            ("ENSG00000109339".to_string(), attrs("MAPK10")),
        ])
        .unwrap();

        assert_eq!(table.len(), 2);
        let pos = table.position("ENSG00000109339").unwrap();
        let row = table.attributes_at(pos);
        assert_eq!(row["default_label"], Value::from("MAPK10"));
        assert!(!row.contains_key("biotype"));
    }

    #[test]
    fn duplicate_identifiers_are_rejected() {
        let err = MetadataTable::from_records([
            ("A".to_string(), attrs("a")),
            ("A".to_string(), attrs("b")),
        ])
        .unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateIdentifier { .. }));
    }

    #[test]
    fn concat_fills_missing_columns() {
        let mut left = MetadataTable::from_records([("A".to_string(), attrs("a"))]).unwrap();
        let mut other_attrs = Map::new();
        other_attrs.insert("synonyms".to_string(), Value::from(3));
        let right = MetadataTable::from_records([("B".to_string(), other_attrs)]).unwrap();

        left.concat(right).unwrap();
        assert_eq!(left.len(), 2);
        assert_eq!(left.idx_at(1), Some("B"));
        assert!(!left.attributes_at(0).contains_key("synonyms"));
        assert_eq!(left.attributes_at(1)["synonyms"], Value::from(3));

        let dup = MetadataTable::from_records([("A".to_string(), attrs("again"))]).unwrap();
        assert!(left.concat(dup).is_err());
        assert_eq!(left.len(), 2);
    }

    #[test]
    fn serde_roundtrip_rebuilds_positions() {
        let table = MetadataTable::from_records([
            ("A".to_string(), attrs("a")),
            ("B".to_string(), attrs("b")),
        ])
        .unwrap();
        let json = serde_json::to_string(&table).unwrap();
        let back: MetadataTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table);
        assert_eq!(back.position("B"), Some(1));
    }
}
