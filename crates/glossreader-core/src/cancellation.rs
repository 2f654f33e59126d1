use std::fmt;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::translation::RequestId;

/// Points in a translation job where a retired request stops early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    BeforeRequest,
    AfterResponse,
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeforeRequest => write!(f, "before_request"),
            Self::AfterResponse => write!(f, "after_response"),
        }
    }
}

/// A request was retired by the orchestrator while its job was running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled {
    pub request: RequestId,
    pub stage: JobStage,
}

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request {} cancelled at stage={}", self.request, self.stage)
    }
}

impl std::error::Error for Cancelled {}

/// Cancel flag for one request. The orchestrator keeps a clone and flips it
/// when the request's slot is retired; the job checks it around the service
/// call.
#[derive(Clone, Debug)]
pub struct CancellationToken {
    request: RequestId,
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn for_request(request: RequestId) -> Self {
        Self {
            request,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn request(&self) -> RequestId {
        self.request
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn check(&self, stage: JobStage) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            return Err(Cancelled {
                request: self.request,
                stage,
            });
        }
        Ok(())
    }
}
