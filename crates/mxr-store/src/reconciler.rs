//! Applies decoded stream events to the projections and keeps the durable
//! records in step with them.

use mxr_events::{EntryResult, ErrorReport, MatrixDescriptor, MatrixEvent};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    DynStateStore, RESULT_CACHE_KEY, SESSION_KEY, StoreError, StoreResult,
    cache::{RecordOutcome, ResultCache},
    correlator::{Calculation, JobCorrelator, LinkOutcome, StartOutcome},
    error_log::ErrorLog,
    registry::MatrixRegistry,
    session::{Selection, SelectionError, SessionRecord},
    snapshot,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    /// Decoded events handed to [`Reconciler::apply`].
    pub events: u64,
    /// Messages dropped because they could not be decoded.
    pub dropped: u64,
    pub duplicates: u64,
    pub conflicts: u64,
    pub out_of_range: u64,
    pub persist_failures: u64,
    /// The last write of some durable record failed.
    pub degraded: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Applied {
    Registered,
    Linked(LinkOutcome),
    Recorded(RecordOutcome),
    /// The cell lies outside the bound calculation's result shape.
    OutOfRange,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Progress {
    pub calculation: Calculation,
    pub received: usize,
    pub fraction: f64,
}

/// Owner of every projection. Whoever holds it mutably is the single writer.
pub struct Reconciler {
    store: DynStateStore,
    registry: MatrixRegistry,
    correlator: JobCorrelator,
    cache: ResultCache,
    selection: Selection,
    errors: ErrorLog,
    stats: ReconcileStats,
    cache_unsaved: bool,
    session_unsaved: bool,
}

impl Reconciler {
    /// Rebuild the durable projections from `store`. Unreadable records are
    /// logged and treated as absent.
    pub fn open(store: DynStateStore) -> Self {
        let raw_cache = store.read(RESULT_CACHE_KEY).unwrap_or_else(|err| {
            warn!(%err, "result cache record unreadable");
            None
        });
        let cache = snapshot::deserialize(raw_cache.as_deref());
        let session = SessionRecord::load(store.as_ref())
            .unwrap_or_else(|err| {
                warn!(%err, "session record unreadable");
                None
            })
            .unwrap_or_default();

        let mut correlator = JobCorrelator::new();
        if let Some(calculation) = session.calculation {
            correlator.restore(calculation);
        }
        info!(
            results = cache.len(),
            resumed = correlator.current().is_some(),
            "reconciler opened"
        );

        Self {
            store,
            registry: MatrixRegistry::new(),
            correlator,
            cache,
            selection: session.selection,
            errors: ErrorLog::default(),
            stats: ReconcileStats::default(),
            cache_unsaved: false,
            session_unsaved: false,
        }
    }

    pub fn apply(&mut self, event: MatrixEvent) -> Applied {
        self.stats.events += 1;
        match event {
            MatrixEvent::NewMatrix { matrix } => {
                debug!(id = %matrix.id, rows = matrix.rows, columns = matrix.columns, "matrix registered");
                self.registry.register(matrix);
                Applied::Registered
            }
            MatrixEvent::ResultMatrix(link) => {
                let result_matrix_id = link.result_matrix_id.clone();
                let outcome = self.correlator.on_result_matrix_link(link);
                if outcome == LinkOutcome::Bound {
                    info!(%result_matrix_id, "calculation bound to result matrix");
                    self.persist_session();
                    self.drop_out_of_range(&result_matrix_id);
                } else {
                    debug!(%result_matrix_id, ?outcome, "result matrix link not bound");
                }
                Applied::Linked(outcome)
            }
            MatrixEvent::EntryResult(entry) => self.record_entry(entry),
        }
    }

    fn record_entry(&mut self, entry: EntryResult) -> Applied {
        let EntryResult {
            result_matrix_id,
            row_index: row,
            column_index: column,
            value,
        } = entry;

        if let Some(calc) = self.correlator.current() {
            let bound = calc.result_matrix_id.as_deref() == Some(result_matrix_id.as_str());
            if bound && !calc.contains(row, column) {
                warn!(
                    %result_matrix_id, row, column,
                    rows = calc.rows, columns = calc.columns,
                    "dropping cell outside result shape"
                );
                self.stats.out_of_range += 1;
                return Applied::OutOfRange;
            }
        }

        let outcome = self.cache.record_entry(&result_matrix_id, row, column, value);
        match outcome {
            RecordOutcome::Inserted => {}
            RecordOutcome::Duplicate => {
                self.stats.duplicates += 1;
                debug!(%result_matrix_id, row, column, "duplicate cell delivery");
            }
            RecordOutcome::Conflict { previous } => {
                self.stats.conflicts += 1;
                warn!(
                    %result_matrix_id, row, column, previous, value,
                    "conflicting value for result cell, keeping latest"
                );
            }
        }
        if outcome.changed() {
            self.persist_cache();
        }
        Applied::Recorded(outcome)
    }

    /// Cells that arrived before the link are checked once it binds.
    fn drop_out_of_range(&mut self, result_matrix_id: &str) {
        let Some(calc) = self.correlator.current() else {
            return;
        };
        let dropped = self
            .cache
            .retain_cells(result_matrix_id, |c| calc.contains(c.row, c.column));
        if dropped > 0 {
            warn!(
                %result_matrix_id, dropped,
                rows = calc.rows, columns = calc.columns,
                "dropping early cells outside result shape"
            );
            self.stats.out_of_range += dropped as u64;
            self.persist_cache();
        }
    }

    pub fn record_dropped(&mut self) {
        self.stats.dropped += 1;
    }

    pub fn record_error(&mut self, report: ErrorReport) {
        warn!(code = %report.code, message = %report.message, "worker reported an error");
        self.errors.push(report);
    }

    /// Select a registered matrix by id.
    pub fn select_matrix(&mut self, id: &str) -> Option<MatrixDescriptor> {
        let matrix = self.registry.get(id)?.clone();
        self.select(matrix.clone());
        Some(matrix)
    }

    pub fn select(&mut self, matrix: MatrixDescriptor) {
        self.selection.select(matrix);
        self.persist_session();
    }

    /// Replace both selection slots at once. An incompatible pair is refused
    /// and leaves the current selection untouched.
    pub fn select_operands(
        &mut self,
        multiplicand: MatrixDescriptor,
        multiplier: MatrixDescriptor,
    ) -> Result<(), SelectionError> {
        let selection = Selection {
            first: Some(multiplicand),
            second: Some(multiplier),
        };
        selection.operands()?;
        self.selection = selection;
        self.persist_session();
        Ok(())
    }

    /// Start multiplying the selected operands.
    pub fn start_calculation(&mut self) -> Result<StartOutcome, SelectionError> {
        let (multiplicand, multiplier) = self.selection.operands()?;
        let outcome = self.correlator.start_calculation(
            multiplicand.id.clone(),
            multiplier.id.clone(),
            multiplicand.rows,
            multiplier.columns,
        );
        match outcome {
            StartOutcome::Started => {
                info!(
                    multiplicand = %multiplicand.id,
                    multiplier = %multiplier.id,
                    "calculation started"
                );
                self.persist_session();
            }
            StartOutcome::AlreadyRunning => debug!("calculation already running"),
        }
        Ok(outcome)
    }

    /// Drop the live calculation and the selection. Recorded cells stay.
    pub fn reset(&mut self) {
        self.selection.clear();
        if let Some(previous) = self.correlator.reset() {
            info!(multiplicand = %previous.multiplicand_id, multiplier = %previous.multiplier_id, "calculation reset");
        }
        self.persist_session();
    }

    pub fn registry(&self) -> &MatrixRegistry {
        &self.registry
    }

    pub fn correlator(&self) -> &JobCorrelator {
        &self.correlator
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn errors(&self) -> &ErrorLog {
        &self.errors
    }

    pub fn current(&self) -> Option<&Calculation> {
        self.correlator.current()
    }

    pub fn stats(&self) -> ReconcileStats {
        ReconcileStats {
            degraded: self.cache_unsaved || self.session_unsaved,
            ..self.stats
        }
    }

    /// Completion of the live calculation; zero until it is bound.
    pub fn progress(&self) -> Option<Progress> {
        let calculation = self.correlator.current()?;
        let (received, fraction) = match calculation.result_matrix_id.as_deref() {
            Some(id) => (
                self.cache.completion_count(id),
                self.cache.completion_fraction(id, calculation.total_cells),
            ),
            None => (0, 0.0),
        };
        Some(Progress {
            calculation: calculation.clone(),
            received,
            fraction,
        })
    }

    fn persist_cache(&mut self) {
        let result = snapshot::serialize(&self.cache)
            .map_err(StoreError::from)
            .and_then(|raw| self.store.write(RESULT_CACHE_KEY, &raw));
        self.cache_unsaved = self.note_persist(RESULT_CACHE_KEY, result);
    }

    fn persist_session(&mut self) {
        let record = SessionRecord {
            calculation: self.correlator.current().cloned(),
            selection: self.selection.clone(),
        };
        let result = record.save(self.store.as_ref());
        self.session_unsaved = self.note_persist(SESSION_KEY, result);
    }

    /// Returns whether the record is now out of date on disk.
    fn note_persist(&mut self, record: &str, result: StoreResult<()>) -> bool {
        match result {
            Ok(()) => false,
            Err(err) => {
                warn!(%err, record, "persist failed, durability degraded");
                self.stats.persist_failures += 1;
                true
            }
        }
    }
}
