use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Type tag of a freshly generated matrix.
pub const NEW_MATRIX_TAG: &str = "new matrix generated";
/// Type tag binding a started multiplication to its result matrix id.
pub const RESULT_MATRIX_TAG: &str = "result matrix created";
/// Type tag of a single computed result cell.
pub const ENTRY_RESULT_TAG: &str = "entry result";

pub(crate) const KNOWN_TAGS: [&str; 3] = [NEW_MATRIX_TAG, RESULT_MATRIX_TAG, ENTRY_RESULT_TAG];

/// Shape and identity of a generated matrix. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatrixDescriptor {
    pub id: String,
    pub rows: u32,
    pub columns: u32,
}

impl MatrixDescriptor {
    pub fn new(id: impl Into<String>, rows: u32, columns: u32) -> Self {
        Self {
            id: id.into(),
            rows,
            columns,
        }
    }

    pub fn cell_count(&self) -> u64 {
        u64::from(self.rows) * u64::from(self.columns)
    }
}

impl fmt::Display for MatrixDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}x{})", self.id, self.rows, self.columns)
    }
}

/// Server confirmation that a multiplication of `multiplicand_id` by
/// `multiplier_id` will publish its cells under `result_matrix_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultMatrixLink {
    #[serde(alias = "resultMatrixId")]
    pub result_matrix_id: String,
    #[serde(rename = "multiplicand_matrix_id", alias = "multiplicandId")]
    pub multiplicand_id: String,
    #[serde(rename = "multiplier_matrix_id", alias = "multiplierId")]
    pub multiplier_id: String,
}

/// One computed cell of a result matrix.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntryResult {
    #[serde(alias = "resultMatrixId")]
    pub result_matrix_id: String,
    #[serde(alias = "rowIndex")]
    pub row_index: u32,
    #[serde(alias = "columnIndex")]
    pub column_index: u32,
    pub value: f64,
}

/// Typed event decoded from the result stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MatrixEvent {
    #[serde(rename = "new matrix generated")]
    NewMatrix {
        // The upstream publisher spells this field `matirx`.
        #[serde(alias = "matirx")]
        matrix: MatrixDescriptor,
    },
    #[serde(rename = "result matrix created")]
    ResultMatrix(ResultMatrixLink),
    #[serde(rename = "entry result")]
    EntryResult(EntryResult),
}

impl MatrixEvent {
    pub fn tag(&self) -> &'static str {
        match self {
            MatrixEvent::NewMatrix { .. } => NEW_MATRIX_TAG,
            MatrixEvent::ResultMatrix(_) => RESULT_MATRIX_TAG,
            MatrixEvent::EntryResult(_) => ENTRY_RESULT_TAG,
        }
    }
}

/// Failure reported by a worker on the error feed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    #[serde(deserialize_with = "code_as_string")]
    pub code: String,
    pub message: String,
}

fn code_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Code {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Code::deserialize(deserializer)? {
        Code::Text(text) => text,
        Code::Number(number) => number.to_string(),
    })
}
