//! Runs translation jobs against the service and reports outcomes over a
//! channel. State is never touched here: the owner drains outcomes on its
//! own thread and applies them.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

use crate::translation::{JobOutcome, JobResult, TranslationJob, TranslationService};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkerMode {
    /// One thread per job, so jobs from the same batch overlap.
    #[default]
    Threaded,
    /// Run each job during `submit`; outcomes still wait for `drain`.
    Inline,
}

pub struct TranslationWorker {
    service: Arc<dyn TranslationService>,
    mode: WorkerMode,
    tx: Sender<JobOutcome>,
    rx: Receiver<JobOutcome>,
}

impl TranslationWorker {
    pub fn new(service: Arc<dyn TranslationService>, mode: WorkerMode) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            service,
            mode,
            tx,
            rx,
        }
    }

    pub fn service(&self) -> &Arc<dyn TranslationService> {
        &self.service
    }

    pub fn mode(&self) -> WorkerMode {
        self.mode
    }

    pub fn submit(&self, job: TranslationJob) {
        debug!(request_id = job.id, target = ?job.target, "Submitting translation job");
        match self.mode {
            WorkerMode::Inline => {
                let outcome = job.run(self.service.as_ref());
                let _ = self.tx.send(outcome);
            }
            WorkerMode::Threaded => {
                let service = Arc::clone(&self.service);
                let tx = self.tx.clone();
                let id = job.id;
                let spawned = thread::Builder::new()
                    .name(format!("translate-{id}"))
                    .spawn(move || {
                        let outcome = job.run(service.as_ref());
                        let _ = tx.send(outcome);
                    });
                if let Err(err) = spawned {
                    warn!(request_id = id, "Failed to spawn translation thread: {err}");
                    let _ = self.tx.send(JobOutcome {
                        id,
                        result: JobResult::Failed(format!("worker unavailable: {err}")),
                    });
                }
            }
        }
    }

    /// Every outcome that has arrived so far, without blocking.
    pub fn drain(&self) -> Vec<JobOutcome> {
        self.rx.try_iter().collect()
    }

    /// Block up to `timeout` for the next outcome.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<JobOutcome> {
        match self.rx.recv_timeout(timeout) {
            Ok(outcome) => Some(outcome),
            Err(RecvTimeoutError::Timeout) => None,
            // The worker holds a sender itself, so the channel cannot close.
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationToken;
    use crate::selection::GroupKey;
    use crate::translation::{
        JobPayload, JobTarget, LanguagePair, RichDetailResult, SegmentRequest,
    };
    use anyhow::Result;

    struct UpperService;

    impl TranslationService for UpperService {
        fn translate_segment(&self, request: &SegmentRequest) -> Result<String> {
            Ok(request.text.to_uppercase())
        }
        fn rich_analyze(&self, _request: &SegmentRequest) -> Result<RichDetailResult> {
            anyhow::bail!("not supported")
        }
        fn list_models(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
        fn health_check(&self) -> bool {
            true
        }
    }

    fn job(id: u64, text: &str) -> TranslationJob {
        TranslationJob {
            id,
            target: JobTarget::Segment {
                key: GroupKey {
                    first: id as usize,
                    last: id as usize,
                },
            },
            request: SegmentRequest::new(text, None, &LanguagePair::new("auto", "en")),
            cancel: CancellationToken::for_request(id),
        }
    }

    #[test]
    fn inline_outcomes_wait_for_drain() {
        let worker = TranslationWorker::new(Arc::new(UpperService), WorkerMode::Inline);
        worker.submit(job(1, "uno"));
        worker.submit(job(2, "dos"));

        let outcomes = worker.drain();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(
            outcomes[0].result,
            JobResult::Done(JobPayload::Text("UNO".to_string()))
        );
        assert!(worker.drain().is_empty());
    }

    #[test]
    fn threaded_jobs_all_report_back() {
        let worker = TranslationWorker::new(Arc::new(UpperService), WorkerMode::Threaded);
        for id in 1..=3 {
            worker.submit(job(id, "x"));
        }

        let mut ids = Vec::new();
        while ids.len() < 3 {
            let outcome = worker
                .recv_timeout(Duration::from_secs(5))
                .expect("threaded job should report within timeout");
            ids.push(outcome.id);
        }
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn cancelled_job_skips_the_service() {
        let worker = TranslationWorker::new(Arc::new(UpperService), WorkerMode::Inline);
        let job = job(7, "never");
        job.cancel.cancel();
        worker.submit(job);
        assert_eq!(worker.drain()[0].result, JobResult::Cancelled);
    }
}
