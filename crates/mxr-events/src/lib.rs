//! Domain events carried on the matrix result stream, the envelope decoder that
//! unwraps raw transport messages into them, and the outbound request bodies.

mod envelope;
mod event;
mod request;

pub use envelope::{DecodeError, decode_error_report, decode_event};
pub use event::{
    ENTRY_RESULT_TAG, EntryResult, ErrorReport, MatrixDescriptor, MatrixEvent, NEW_MATRIX_TAG,
    RESULT_MATRIX_TAG, ResultMatrixLink,
};
pub use request::{GenerateMatrixRequest, MatrixRef, RequestError, StartCalculationRequest};
