use mxr_events::ErrorReport;

/// Worker failures seen on the error feed during this session.
#[derive(Clone, Debug, Default)]
pub struct ErrorLog {
    reports: Vec<ErrorReport>,
}

impl ErrorLog {
    pub fn push(&mut self, report: ErrorReport) {
        self.reports.push(report);
    }

    pub fn list(&self) -> &[ErrorReport] {
        &self.reports
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}
