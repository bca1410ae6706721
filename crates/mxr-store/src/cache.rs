//! Sparse per-job result cache.
//!
//! Cells are keyed first by result matrix id and then by coordinate, and only
//! cells that actually arrived are stored. Both levels keep insertion order so
//! the persisted snapshot is stable across rebuilds.

use std::{fmt, str::FromStr};

use indexmap::IndexMap;
use thiserror::Error;

/// Coordinate of a result cell, rendered as `"{row}-{column}"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoord {
    pub row: u32,
    pub column: u32,
}

impl CellCoord {
    pub fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.row, self.column)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid cell key '{0}', expected '<row>-<column>'")]
pub struct CellKeyError(pub String);

impl FromStr for CellCoord {
    type Err = CellKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CellKeyError(s.to_owned());
        let (row, column) = s.split_once('-').ok_or_else(invalid)?;
        Ok(Self {
            row: row.parse().map_err(|_| invalid())?,
            column: column.parse().map_err(|_| invalid())?,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RecordOutcome {
    /// First value for this coordinate.
    Inserted,
    /// Same value already present; nothing changed.
    Duplicate,
    /// A different value was present and has been replaced.
    Conflict { previous: f64 },
}

impl RecordOutcome {
    /// Whether the cache contents changed.
    pub fn changed(&self) -> bool {
        !matches!(self, RecordOutcome::Duplicate)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultCache {
    matrices: IndexMap<String, IndexMap<CellCoord, f64>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one cell. Last write wins; the outcome tells a redelivery apart
    /// from a conflicting value.
    pub fn record_entry(
        &mut self,
        result_matrix_id: &str,
        row: u32,
        column: u32,
        value: f64,
    ) -> RecordOutcome {
        let cells = self
            .matrices
            .entry(result_matrix_id.to_owned())
            .or_default();
        match cells.insert(CellCoord::new(row, column), value) {
            None => RecordOutcome::Inserted,
            Some(previous) if previous == value => RecordOutcome::Duplicate,
            Some(previous) => RecordOutcome::Conflict { previous },
        }
    }

    pub fn completion_count(&self, result_matrix_id: &str) -> usize {
        self.matrices.get(result_matrix_id).map_or(0, IndexMap::len)
    }

    /// Received cells over `total_cells`, clamped to `[0, 1]`; zero when
    /// `total_cells` is zero.
    pub fn completion_fraction(&self, result_matrix_id: &str, total_cells: u64) -> f64 {
        if total_cells == 0 {
            return 0.0;
        }
        let fraction = self.completion_count(result_matrix_id) as f64 / total_cells as f64;
        fraction.clamp(0.0, 1.0)
    }

    pub fn cell_value(&self, result_matrix_id: &str, row: u32, column: u32) -> Option<f64> {
        self.matrices
            .get(result_matrix_id)?
            .get(&CellCoord::new(row, column))
            .copied()
    }

    pub fn result_ids(&self) -> impl Iterator<Item = &str> {
        self.matrices.keys().map(String::as_str)
    }

    /// Cells of one result matrix in arrival order.
    pub fn cells(&self, result_matrix_id: &str) -> impl Iterator<Item = (CellCoord, f64)> + '_ {
        self.matrices
            .get(result_matrix_id)
            .into_iter()
            .flat_map(|cells| cells.iter().map(|(coord, value)| (*coord, *value)))
    }

    /// Dense row-major view of a result matrix; missing cells are `None`.
    pub fn grid(&self, result_matrix_id: &str, rows: u32, columns: u32) -> Vec<Vec<Option<f64>>> {
        let cells = self.matrices.get(result_matrix_id);
        (0..rows)
            .map(|row| {
                (0..columns)
                    .map(|column| {
                        cells.and_then(|c| c.get(&CellCoord::new(row, column)).copied())
                    })
                    .collect()
            })
            .collect()
    }

    /// Drop the cells of one result matrix that fail `keep`, returning how
    /// many were dropped. A result left without cells is removed.
    pub fn retain_cells(
        &mut self,
        result_matrix_id: &str,
        mut keep: impl FnMut(CellCoord) -> bool,
    ) -> usize {
        let Some(cells) = self.matrices.get_mut(result_matrix_id) else {
            return 0;
        };
        let before = cells.len();
        cells.retain(|coord, _| keep(*coord));
        let dropped = before - cells.len();
        if cells.is_empty() {
            self.matrices.shift_remove(result_matrix_id);
        }
        dropped
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    /// Number of result matrices with at least one cell.
    pub fn len(&self) -> usize {
        self.matrices.len()
    }
}
