use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use parkcast_core::{LotId, OccupancyRecord};

use super::PipelineError;

/// Identity of one frame row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowKey {
    pub reading_id: i64,
    pub lot_id: LotId,
    pub name: String,
    pub total: i64,
    pub timestamp: DateTime<FixedOffset>,
}

/// Column-major table of optional feature values, one row per reading.
///
/// Missing values stay `None` until [`FeatureFrame::matrix`] fills them.
#[derive(Debug, Clone, Default)]
pub struct FeatureFrame {
    keys: Vec<RowKey>,
    target: Vec<Option<f64>>,
    columns: Vec<String>,
    values: Vec<Vec<Option<f64>>>,
}

impl FeatureFrame {
    /// Start a frame with keys and target only.
    pub fn from_records(records: &[OccupancyRecord]) -> Self {
        let keys = records
            .iter()
            .map(|r| RowKey {
                reading_id: r.reading_id,
                lot_id: r.lot_id.clone(),
                name: r.name.clone(),
                total: r.total,
                timestamp: r.timestamp,
            })
            .collect();
        let target = records.iter().map(|r| r.occupancy_rate).collect();
        Self {
            keys,
            target,
            columns: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Append a feature column, replacing any column of the same name.
    pub fn add_column(&mut self, name: impl Into<String>, values: Vec<Option<f64>>) -> Result<(), PipelineError> {
        let name = name.into();
        if values.len() != self.len() {
            return Err(PipelineError::LengthMismatch {
                name,
                expected: self.len(),
                actual: values.len(),
            });
        }
        match self.columns.iter().position(|c| *c == name) {
            Some(idx) => self.values[idx] = values,
            None => {
                self.columns.push(name);
                self.values.push(values);
            }
        }
        Ok(())
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|idx| self.values[idx].as_slice())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Number of feature columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn keys(&self) -> &[RowKey] {
        &self.keys
    }

    pub fn targets(&self) -> &[Option<f64>] {
        &self.target
    }

    pub fn feature_columns(&self) -> &[String] {
        &self.columns
    }

    /// Missing feature cells across the whole frame.
    pub fn missing_count(&self) -> usize {
        self.values
            .iter()
            .map(|col| col.iter().filter(|v| v.is_none()).count())
            .sum()
    }

    /// Row indices per lot, in first-seen lot order, each chronological.
    pub fn lot_groups(&self) -> Vec<Vec<usize>> {
        let mut slots: HashMap<&str, usize> = HashMap::new();
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for (idx, key) in self.keys.iter().enumerate() {
            let slot = *slots.entry(key.lot_id.as_str()).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(idx);
        }
        groups
    }

    /// Rows where the target and every feature are present.
    pub fn complete_rows(&self) -> FeatureFrame {
        let rows: Vec<usize> = (0..self.len())
            .filter(|&i| self.target[i].is_some() && self.values.iter().all(|col| col[i].is_some()))
            .collect();
        self.select_rows(&rows)
    }

    /// The most recent row of every lot, oldest first.
    pub fn latest_per_lot(&self) -> FeatureFrame {
        let mut latest: Vec<usize> = self
            .lot_groups()
            .into_iter()
            .filter_map(|group| {
                group.into_iter().max_by(|&a, &b| {
                    // ties resolve to the later row
                    self.keys[a].timestamp.cmp(&self.keys[b].timestamp).then(a.cmp(&b))
                })
            })
            .collect();
        latest.sort_by(|&a, &b| self.keys[a].timestamp.cmp(&self.keys[b].timestamp).then(a.cmp(&b)));
        self.select_rows(&latest)
    }

    /// New frame holding the given rows in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> FeatureFrame {
        FeatureFrame {
            keys: rows.iter().map(|&i| self.keys[i].clone()).collect(),
            target: rows.iter().map(|&i| self.target[i]).collect(),
            columns: self.columns.clone(),
            values: self
                .values
                .iter()
                .map(|col| rows.iter().map(|&i| col[i]).collect())
                .collect(),
        }
    }

    /// Row-major matrix over `columns`, missing cells filled with 0.
    pub fn matrix(&self, columns: &[String]) -> Result<Vec<Vec<f64>>, PipelineError> {
        let selected = columns
            .iter()
            .map(|name| {
                self.column(name)
                    .ok_or_else(|| PipelineError::UnknownColumn(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok((0..self.len())
            .map(|row| selected.iter().map(|col| col[row].unwrap_or(0.0)).collect())
            .collect())
    }

    /// Targets with missing values filled with 0.
    pub fn target_vector(&self) -> Vec<f64> {
        self.target.iter().map(|t| t.unwrap_or(0.0)).collect()
    }
}
