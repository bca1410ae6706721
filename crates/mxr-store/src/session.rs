use mxr_events::MatrixDescriptor;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{SESSION_KEY, StateStore, StoreResult, correlator::Calculation};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("select two matrices before starting a calculation")]
    Incomplete,
    #[error("cannot multiply {multiplicand} by {multiplier}: inner dimensions differ")]
    ShapeMismatch {
        multiplicand: String,
        multiplier: String,
    },
}

/// The two operands picked by the user, multiplicand first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    #[serde(default, rename = "firstMatrix", alias = "first")]
    pub first: Option<MatrixDescriptor>,
    #[serde(default, rename = "secondMatrix", alias = "second")]
    pub second: Option<MatrixDescriptor>,
}

impl Selection {
    /// Fill the second slot when only the first is set; otherwise replace the
    /// first.
    pub fn select(&mut self, matrix: MatrixDescriptor) {
        match (&self.first, &self.second) {
            (Some(_), None) => self.second = Some(matrix),
            _ => self.first = Some(matrix),
        }
    }

    pub fn clear(&mut self) {
        self.first = None;
        self.second = None;
    }

    /// Both operands, checked for a compatible inner dimension.
    pub fn operands(&self) -> Result<(&MatrixDescriptor, &MatrixDescriptor), SelectionError> {
        let (Some(first), Some(second)) = (&self.first, &self.second) else {
            return Err(SelectionError::Incomplete);
        };
        if first.columns != second.rows {
            return Err(SelectionError::ShapeMismatch {
                multiplicand: first.to_string(),
                multiplier: second.to_string(),
            });
        }
        Ok((first, second))
    }
}

/// What a restart needs to resume progress display.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(
        default,
        rename = "currentCalculation",
        skip_serializing_if = "Option::is_none"
    )]
    pub calculation: Option<Calculation>,
    #[serde(flatten)]
    pub selection: Selection,
}

impl SessionRecord {
    pub fn load(store: &dyn StateStore) -> StoreResult<Option<Self>> {
        match store.read(SESSION_KEY)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn save(&self, store: &dyn StateStore) -> StoreResult<()> {
        let raw = serde_json::to_string(self)?;
        store.write(SESSION_KEY, &raw)
    }
}
