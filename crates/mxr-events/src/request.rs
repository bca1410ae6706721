//! Bodies of the requests published to the matrix workers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("matrix shape must be at least 1x1, got {rows}x{columns}")]
    EmptyShape { rows: u32, columns: u32 },
    #[error("request encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Ask the generator to create a random matrix of the given shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateMatrixRequest {
    pub rows: u32,
    pub columns: u32,
}

impl GenerateMatrixRequest {
    pub fn new(rows: u32, columns: u32) -> Result<Self, RequestError> {
        if rows == 0 || columns == 0 {
            return Err(RequestError::EmptyShape { rows, columns });
        }
        Ok(Self { rows, columns })
    }

    pub fn to_message(&self) -> Result<String, RequestError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixRef {
    pub id: String,
}

/// Ask the master to multiply `multiplicand` by `multiplier`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartCalculationRequest {
    pub multiplicand: MatrixRef,
    pub multiplier: MatrixRef,
}

impl StartCalculationRequest {
    pub fn new(multiplicand_id: impl Into<String>, multiplier_id: impl Into<String>) -> Self {
        Self {
            multiplicand: MatrixRef {
                id: multiplicand_id.into(),
            },
            multiplier: MatrixRef {
                id: multiplier_id.into(),
            },
        }
    }

    pub fn to_message(&self) -> Result<String, RequestError> {
        Ok(serde_json::to_string(self)?)
    }
}
