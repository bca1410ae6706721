use mxr_events::{MatrixDescriptor, ResultMatrixLink};
use serde::{Deserialize, Serialize};

/// Locally started multiplication of `multiplicand_id` by `multiplier_id`.
///
/// `result_matrix_id` is attached once, when the server confirms the job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calculation {
    pub multiplicand_id: String,
    pub multiplier_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_matrix_id: Option<String>,
    /// Result shape: multiplicand rows by multiplier columns.
    pub rows: u32,
    pub columns: u32,
    pub total_cells: u64,
}

impl Calculation {
    pub fn new(
        multiplicand_id: impl Into<String>,
        multiplier_id: impl Into<String>,
        rows: u32,
        columns: u32,
    ) -> Self {
        Self {
            multiplicand_id: multiplicand_id.into(),
            multiplier_id: multiplier_id.into(),
            result_matrix_id: None,
            rows,
            columns,
            total_cells: u64::from(rows) * u64::from(columns),
        }
    }

    pub fn for_operands(multiplicand: &MatrixDescriptor, multiplier: &MatrixDescriptor) -> Self {
        Self::new(
            multiplicand.id.clone(),
            multiplier.id.clone(),
            multiplicand.rows,
            multiplier.columns,
        )
    }

    pub fn matches(&self, link: &ResultMatrixLink) -> bool {
        self.multiplicand_id == link.multiplicand_id && self.multiplier_id == link.multiplier_id
    }

    pub fn contains(&self, row: u32, column: u32) -> bool {
        row < self.rows && column < self.columns
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A calculation is already live; the request is refused.
    AlreadyRunning,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The live calculation now carries this result id.
    Bound,
    /// The live calculation already carried this result id.
    AlreadyBound,
    /// No live calculation for this operand pair, or it is bound elsewhere.
    Ignored,
}

/// Binds the live calculation to its result matrix id.
#[derive(Clone, Debug, Default)]
pub struct JobCorrelator {
    current: Option<Calculation>,
    links: Vec<ResultMatrixLink>,
}

impl JobCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_calculation(
        &mut self,
        multiplicand_id: impl Into<String>,
        multiplier_id: impl Into<String>,
        rows: u32,
        columns: u32,
    ) -> StartOutcome {
        if self.current.is_some() {
            return StartOutcome::AlreadyRunning;
        }
        self.current = Some(Calculation::new(multiplicand_id, multiplier_id, rows, columns));
        StartOutcome::Started
    }

    pub fn on_result_matrix_link(&mut self, link: ResultMatrixLink) -> LinkOutcome {
        let outcome = match self.current.as_mut() {
            Some(calc) if calc.matches(&link) => {
                if calc.result_matrix_id.is_none() {
                    calc.result_matrix_id = Some(link.result_matrix_id.clone());
                    LinkOutcome::Bound
                } else if calc.result_matrix_id.as_deref() == Some(link.result_matrix_id.as_str()) {
                    LinkOutcome::AlreadyBound
                } else {
                    LinkOutcome::Ignored
                }
            }
            _ => LinkOutcome::Ignored,
        };
        if !self.links.contains(&link) {
            self.links.push(link);
        }
        outcome
    }

    pub fn current(&self) -> Option<&Calculation> {
        self.current.as_ref()
    }

    /// Every distinct link seen this session, in arrival order.
    pub fn links(&self) -> &[ResultMatrixLink] {
        &self.links
    }

    /// Reinstall a calculation persisted by an earlier session.
    pub fn restore(&mut self, calculation: Calculation) {
        self.current = Some(calculation);
    }

    pub fn reset(&mut self) -> Option<Calculation> {
        self.current.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(result: &str, multiplicand: &str, multiplier: &str) -> ResultMatrixLink {
        ResultMatrixLink {
            result_matrix_id: result.into(),
            multiplicand_id: multiplicand.into(),
            multiplier_id: multiplier.into(),
        }
    }

    #[test]
    fn binds_matching_link_once() {
        let mut correlator = JobCorrelator::new();
        assert_eq!(correlator.start_calculation("a", "b", 2, 2), StartOutcome::Started);
        assert_eq!(correlator.current().map(|c| c.total_cells), Some(4));

        assert_eq!(correlator.on_result_matrix_link(link("r1", "a", "b")), LinkOutcome::Bound);
        assert_eq!(
            correlator.on_result_matrix_link(link("r1", "a", "b")),
            LinkOutcome::AlreadyBound
        );
        assert_eq!(correlator.on_result_matrix_link(link("r2", "a", "b")), LinkOutcome::Ignored);

        let current = correlator.current().expect("live calculation");
        assert_eq!(current.result_matrix_id.as_deref(), Some("r1"));
        assert_eq!(correlator.links().len(), 2);
    }

    #[test]
    fn both_operands_must_match() {
        let mut correlator = JobCorrelator::new();
        correlator.start_calculation("a", "b", 2, 2);
        assert_eq!(correlator.on_result_matrix_link(link("r1", "x", "b")), LinkOutcome::Ignored);
        assert_eq!(correlator.on_result_matrix_link(link("r1", "b", "a")), LinkOutcome::Ignored);
        assert_eq!(correlator.current().and_then(|c| c.result_matrix_id.clone()), None);
    }

    #[test]
    fn second_start_is_refused_until_reset() {
        let mut correlator = JobCorrelator::new();
        correlator.start_calculation("a", "b", 2, 3);
        assert_eq!(
            correlator.start_calculation("c", "d", 1, 1),
            StartOutcome::AlreadyRunning
        );
        assert_eq!(correlator.current().map(|c| c.multiplicand_id.as_str()), Some("a"));

        let previous = correlator.reset().expect("was running");
        assert_eq!(previous.total_cells, 6);
        assert_eq!(correlator.start_calculation("c", "d", 1, 1), StartOutcome::Started);
    }

    #[test]
    fn link_without_calculation_is_recorded_but_ignored() {
        let mut correlator = JobCorrelator::new();
        assert_eq!(correlator.on_result_matrix_link(link("r1", "a", "b")), LinkOutcome::Ignored);
        assert_eq!(correlator.links(), [link("r1", "a", "b")]);
        assert!(correlator.current().is_none());
    }

    #[test]
    fn shape_follows_operands() {
        let calc = Calculation::for_operands(
            &MatrixDescriptor::new("a", 3, 2),
            &MatrixDescriptor::new("b", 2, 5),
        );
        assert_eq!((calc.rows, calc.columns, calc.total_cells), (3, 5, 15));
        assert!(calc.contains(2, 4));
        assert!(!calc.contains(3, 0));
    }
}
