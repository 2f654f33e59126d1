//! Units of work handed to the translation worker and the outcomes it
//! reports back.

use tracing::debug;

use super::RequestId;
use super::service::{RichDetailResult, SegmentRequest, TranslationService};
use super::tabs::TabId;
use crate::cancellation::{CancellationToken, JobStage};
use crate::selection::GroupKey;

/// Which slot a job's result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobTarget {
    Segment { key: GroupKey },
    Hover { index: usize },
    Detail { tab: TabId },
}

#[derive(Debug, Clone)]
pub struct TranslationJob {
    pub id: RequestId,
    pub target: JobTarget,
    pub request: SegmentRequest,
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobPayload {
    Text(String),
    Detail(RichDetailResult),
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobResult {
    Done(JobPayload),
    Failed(String),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub id: RequestId,
    pub result: JobResult,
}

impl TranslationJob {
    /// Call the service for this job. Service errors become
    /// [`JobResult::Failed`]; nothing escapes as an error.
    pub fn run(&self, service: &dyn TranslationService) -> JobOutcome {
        if let Err(cancelled) = self.cancel.check(JobStage::BeforeRequest) {
            debug!("Skipping translation job: {cancelled}");
            return self.outcome(JobResult::Cancelled);
        }

        let response = match self.target {
            JobTarget::Detail { .. } => service.rich_analyze(&self.request).map(JobPayload::Detail),
            JobTarget::Segment { .. } | JobTarget::Hover { .. } => service
                .translate_segment(&self.request)
                .map(JobPayload::Text),
        };

        if let Err(cancelled) = self.cancel.check(JobStage::AfterResponse) {
            debug!("Dropping translation response: {cancelled}");
            return self.outcome(JobResult::Cancelled);
        }
        let result = match response {
            Ok(payload) => JobResult::Done(payload),
            Err(err) => JobResult::Failed(format!("{err:#}")),
        };
        self.outcome(result)
    }

    fn outcome(&self, result: JobResult) -> JobOutcome {
        JobOutcome {
            id: self.id,
            result,
        }
    }
}
