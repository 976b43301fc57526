use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// ImageRecord committed; object stages ran (possibly with drops).
    Committed,
    /// The file could not be decoded or read.
    Skipped { reason: String },
    /// The ImageRecord could not be committed.
    Failed { stage: &'static str, reason: String },
    /// Stopped by cancellation; `image_id` is set if the record was committed first.
    Cancelled,
}

/// What happened to one file of a folder run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageOutcome {
    pub path: PathBuf,
    pub image_id: Option<String>,
    pub url: Option<String>,
    /// False when the bucket's public-read policy could not be applied.
    pub policy_applied: bool,
    pub objects_committed: usize,
    pub vectors_dropped: usize,
    pub objects_dropped: usize,
    pub status: OutcomeStatus,
}

impl ImageOutcome {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            image_id: None,
            url: None,
            policy_applied: false,
            objects_committed: 0,
            vectors_dropped: 0,
            objects_dropped: 0,
            status: OutcomeStatus::Cancelled,
        }
    }

    pub fn with_status(mut self, status: OutcomeStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_committed(&self) -> bool { matches!(self.status, OutcomeStatus::Committed) }

    /// Committed, but some vector or object was dropped after retries.
    pub fn is_partial(&self) -> bool { self.image_id.is_some() && (self.vectors_dropped > 0 || self.objects_dropped > 0) }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport { pub outcomes: Vec<ImageOutcome> }

impl IngestReport {
    fn count(&self, f: impl Fn(&ImageOutcome) -> bool) -> usize { self.outcomes.iter().filter(|o| f(o)).count() }

    pub fn committed(&self) -> usize { self.count(ImageOutcome::is_committed) }
    pub fn skipped(&self) -> usize { self.count(|o| matches!(o.status, OutcomeStatus::Skipped { .. })) }
    pub fn failed(&self) -> usize { self.count(|o| matches!(o.status, OutcomeStatus::Failed { .. })) }
    pub fn cancelled(&self) -> usize { self.count(|o| matches!(o.status, OutcomeStatus::Cancelled)) }
    pub fn partial(&self) -> usize { self.count(ImageOutcome::is_partial) }
    pub fn objects(&self) -> usize { self.outcomes.iter().map(|o| o.objects_committed).sum() }
}
