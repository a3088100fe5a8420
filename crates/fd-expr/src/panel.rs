//! Panel data: rows keyed by (entity, timestamp) with named numeric fields.
//!
//! A panel is built once per query and is immutable while expressions are
//! evaluated against it. Rows may arrive in any interleaving (for example
//! sorted by date and then symbol), but for each entity the timestamps must be
//! strictly increasing in row order. Timestamps are compared as strings, so
//! they should be ISO-8601 formatted.

use crate::{ExprError, PanelConfig, Result};
use polars::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Rows sharing one entity or one timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    key: Arc<str>,
    rows: Vec<usize>,
}

impl Partition {
    /// Entity identifier or timestamp shared by the rows.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Row positions in panel order.
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    /// Number of rows in the partition.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the partition has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Panel of observations indexed by (entity, timestamp).
#[derive(Debug, Clone)]
pub struct Panel {
    entities: Vec<Arc<str>>,
    timestamps: Vec<Arc<str>>,
    fields: BTreeMap<String, Vec<f64>>,
    by_entity: Vec<Partition>,
    by_time: Vec<Partition>,
}

impl Panel {
    /// Create a panel index with no fields.
    ///
    /// Fails if the two index vectors differ in length or if any entity's
    /// timestamps are not strictly increasing.
    pub fn new(entities: Vec<String>, timestamps: Vec<String>) -> Result<Self> {
        if entities.len() != timestamps.len() {
            return Err(ExprError::InvalidPanel(format!(
                "{} entity keys but {} timestamps",
                entities.len(),
                timestamps.len()
            )));
        }

        let mut interned: HashMap<String, Arc<str>> = HashMap::new();
        let entities: Vec<Arc<str>> = entities
            .into_iter()
            .map(|e| interned.entry(e).or_insert_with_key(|k| Arc::from(k.as_str())).clone())
            .collect();
        interned.clear();
        let timestamps: Vec<Arc<str>> = timestamps
            .into_iter()
            .map(|t| interned.entry(t).or_insert_with_key(|k| Arc::from(k.as_str())).clone())
            .collect();

        let by_entity = partition_by_entity(&entities, &timestamps)?;
        let by_time = partition_by_time(&timestamps);

        Ok(Self {
            entities,
            timestamps,
            fields: BTreeMap::new(),
            by_entity,
            by_time,
        })
    }

    /// Add or replace a field.
    pub fn with_field(mut self, name: impl Into<String>, values: Vec<f64>) -> Result<Self> {
        let name = name.into();
        if values.len() != self.len() {
            return Err(ExprError::InvalidPanel(format!(
                "field `{}` has {} values, panel has {} rows",
                name,
                values.len(),
                self.len()
            )));
        }
        self.fields.insert(name, values);
        Ok(self)
    }

    /// Build a panel from a DataFrame.
    ///
    /// The index columns named in `config` are read as strings. Every other
    /// numeric or boolean column becomes a field; nulls become `NaN`.
    pub fn from_frame(df: &DataFrame, config: &PanelConfig) -> Result<Self> {
        let entities = string_column(df, &config.entity_column)?;
        let timestamps = string_column(df, &config.time_column)?;
        let mut panel = Self::new(entities, timestamps)?;

        for column in df.get_columns() {
            let name = column.name().as_str();
            if name == config.entity_column || name == config.time_column {
                continue;
            }
            if !is_numeric(column.dtype()) {
                tracing::debug!(column = name, dtype = %column.dtype(), "skipping non-numeric column");
                continue;
            }
            let cast = column.cast(&DataType::Float64)?;
            let values: Vec<f64> = cast
                .f64()?
                .into_iter()
                .map(|v| v.unwrap_or(f64::NAN))
                .collect();
            panel.fields.insert(name.to_string(), values);
        }

        Ok(panel)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the panel has no rows.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entity identifier of each row.
    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.entities.iter().map(|e| e.as_ref())
    }

    /// Timestamp of each row.
    pub fn timestamps(&self) -> impl Iterator<Item = &str> {
        self.timestamps.iter().map(|t| t.as_ref())
    }

    /// Entity identifier of one row.
    pub fn entity(&self, row: usize) -> Option<&str> {
        self.entities.get(row).map(|e| e.as_ref())
    }

    /// Timestamp of one row.
    pub fn timestamp(&self, row: usize) -> Option<&str> {
        self.timestamps.get(row).map(|t| t.as_ref())
    }

    /// Values of a field, if present.
    pub fn field(&self, name: &str) -> Option<&[f64]> {
        self.fields.get(name).map(Vec::as_slice)
    }

    /// Whether the panel has a field with this name.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Field names in sorted order.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    /// One partition per entity, in order of first appearance.
    ///
    /// Rows within a partition are in time order.
    pub fn entity_partitions(&self) -> &[Partition] {
        &self.by_entity
    }

    /// One partition per timestamp, in timestamp order.
    pub fn time_partitions(&self) -> &[Partition] {
        &self.by_time
    }

    /// Rows observed at one timestamp.
    pub fn cross_section(&self, timestamp: &str) -> Option<&Partition> {
        self.by_time
            .binary_search_by(|p| p.key().cmp(timestamp))
            .ok()
            .map(|idx| &self.by_time[idx])
    }

    /// Index columns as polars series.
    pub(crate) fn index_columns(&self, config: &PanelConfig) -> (Series, Series) {
        let entities: Vec<&str> = self.entities().collect();
        let timestamps: Vec<&str> = self.timestamps().collect();
        (
            Series::new(config.entity_column.as_str().into(), entities),
            Series::new(config.time_column.as_str().into(), timestamps),
        )
    }
}

fn string_column(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let column = df
        .column(name)
        .map_err(|_| ExprError::InvalidPanel(format!("missing index column `{name}`")))?
        .cast(&DataType::String)?;

    column
        .str()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value
                .map(str::to_string)
                .ok_or_else(|| ExprError::InvalidPanel(format!("null `{name}` at row {row}")))
        })
        .collect()
}

fn is_numeric(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Boolean) || dtype.is_integer() || dtype.is_float()
}

fn partition_by_entity(entities: &[Arc<str>], timestamps: &[Arc<str>]) -> Result<Vec<Partition>> {
    let mut slot_by_entity: HashMap<&str, usize> = HashMap::new();
    let mut partitions: Vec<Partition> = Vec::new();

    for (row, (entity, timestamp)) in entities.iter().zip(timestamps).enumerate() {
        let slot = *slot_by_entity.entry(entity.as_ref()).or_insert_with(|| {
            partitions.push(Partition {
                key: entity.clone(),
                rows: Vec::new(),
            });
            partitions.len() - 1
        });

        let partition = &mut partitions[slot];
        if let Some(&last) = partition.rows.last()
            && timestamps[last].as_ref() >= timestamp.as_ref()
        {
            return Err(ExprError::InvalidPanel(format!(
                "timestamps for entity `{}` are not strictly increasing at row {} ({} after {})",
                entity, row, timestamp, timestamps[last]
            )));
        }
        partition.rows.push(row);
    }

    Ok(partitions)
}

fn partition_by_time(timestamps: &[Arc<str>]) -> Vec<Partition> {
    let mut groups: BTreeMap<&Arc<str>, Vec<usize>> = BTreeMap::new();
    for (row, timestamp) in timestamps.iter().enumerate() {
        groups.entry(timestamp).or_default().push(row);
    }
    groups
        .into_iter()
        .map(|(key, rows)| Partition {
            key: key.clone(),
            rows,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> DataFrame {
        df![
            "date" => ["2024-01-01", "2024-01-01", "2024-01-02", "2024-01-02", "2024-01-03"],
            "symbol" => ["A", "B", "A", "B", "A"],
            "close" => [10.0, 20.0, 11.0, 21.0, 12.0],
            "volume" => [100i64, 200, 110, 210, 120],
            "sector" => ["tech", "energy", "tech", "energy", "tech"],
        ]
        .unwrap()
    }

    #[test]
    fn test_from_frame_partitions() {
        let panel = Panel::from_frame(&sample_frame(), &PanelConfig::default()).unwrap();

        assert_eq!(panel.len(), 5);
        assert_eq!(panel.field_names(), vec!["close", "volume"]);
        assert!(!panel.has_field("sector"));

        let entities = panel.entity_partitions();
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].key(), "A");
        assert_eq!(entities[0].rows(), &[0, 2, 4]);
        assert_eq!(entities[1].key(), "B");
        assert_eq!(entities[1].rows(), &[1, 3]);

        let times = panel.time_partitions();
        assert_eq!(times.len(), 3);
        assert_eq!(times[0].key(), "2024-01-01");
        assert_eq!(times[0].rows(), &[0, 1]);
        assert_eq!(panel.cross_section("2024-01-03").unwrap().rows(), &[4]);
        assert!(panel.cross_section("2024-02-01").is_none());
    }

    #[test]
    fn test_integer_fields_become_floats() {
        let panel = Panel::from_frame(&sample_frame(), &PanelConfig::default()).unwrap();
        assert_eq!(panel.field("volume").unwrap()[1], 200.0);
    }

    #[test]
    fn test_small_integer_fields_are_kept() {
        let df = df![
            "symbol" => ["A", "A"],
            "date" => ["2024-01-01", "2024-01-02"],
            "lots" => [3i16, -4],
            "flag" => [1u8, 0],
            "tier" => [2i8, 5],
            "shares" => [700u16, 800],
        ]
        .unwrap();
        let panel = Panel::from_frame(&df, &PanelConfig::default()).unwrap();
        assert_eq!(panel.field_names(), vec!["flag", "lots", "shares", "tier"]);
        assert_eq!(panel.field("lots").unwrap(), &[3.0, -4.0]);
        assert_eq!(panel.field("shares").unwrap()[1], 800.0);
    }

    #[test]
    fn test_nulls_become_nan() {
        let df = df![
            "symbol" => ["A", "A"],
            "date" => ["2024-01-01", "2024-01-02"],
            "close" => [Some(1.0), None],
        ]
        .unwrap();
        let panel = Panel::from_frame(&df, &PanelConfig::default()).unwrap();
        assert!(panel.field("close").unwrap()[1].is_nan());
    }

    #[test]
    fn test_rejects_non_increasing_timestamps() {
        let result = Panel::new(
            vec!["A".into(), "B".into(), "A".into()],
            vec!["2024-01-02".into(), "2024-01-01".into(), "2024-01-02".into()],
        );
        assert!(matches!(result, Err(ExprError::InvalidPanel(_))));
    }

    #[test]
    fn test_rejects_missing_index_column() {
        let df = df!["close" => [1.0]].unwrap();
        let result = Panel::from_frame(&df, &PanelConfig::default());
        assert!(matches!(result, Err(ExprError::InvalidPanel(_))));
    }

    #[test]
    fn test_field_length_checked() {
        let panel = Panel::new(vec!["A".into()], vec!["2024-01-01".into()]).unwrap();
        assert!(panel.with_field("close", vec![1.0, 2.0]).is_err());
    }
}
