//! Off-thread hand-off of shot reports to storage and the feedback service.
//!
//! The detection loop must never wait on disk or network. [`Dispatcher`]
//! runs a small async runtime on its own thread; each submitted report is
//! fanned out to every configured sink as an independent task, so several
//! reports can be in flight at once and finish in any order. Results come
//! back on a channel the caller polls when convenient.

use crate::core::report::ShotReport;
use crate::feedback::FeedbackResponse;
use crate::session::SharedSessionLog;
use crate::store::ReportStore;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

#[cfg(feature = "feedback")]
use crate::feedback::FeedbackClient;

/// Dispatcher start-up errors.
#[derive(Debug)]
pub enum DispatchError {
    Runtime(String),
    Spawn(String),
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::Runtime(msg) => write!(f, "Failed to create dispatch runtime: {msg}"),
            DispatchError::Spawn(msg) => write!(f, "Failed to start dispatch worker: {msg}"),
        }
    }
}

impl std::error::Error for DispatchError {}

/// Result of handing one report to one sink.
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    Stored {
        shot_number: u64,
        report_id: String,
    },
    StoreFailed {
        shot_number: u64,
        error: String,
    },
    Feedback {
        shot_number: u64,
        response: FeedbackResponse,
    },
    FeedbackFailed {
        shot_number: u64,
        error: String,
    },
}

impl DispatchOutcome {
    pub fn shot_number(&self) -> u64 {
        match self {
            DispatchOutcome::Stored { shot_number, .. }
            | DispatchOutcome::StoreFailed { shot_number, .. }
            | DispatchOutcome::Feedback { shot_number, .. }
            | DispatchOutcome::FeedbackFailed { shot_number, .. } => *shot_number,
        }
    }
}

/// Sinks a dispatcher fans reports out to.
#[derive(Default)]
pub struct DispatcherBuilder {
    store: Option<Arc<ReportStore>>,
    #[cfg(feature = "feedback")]
    feedback: Option<FeedbackClient>,
    session: Option<SharedSessionLog>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(mut self, store: ReportStore) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    #[cfg(feature = "feedback")]
    pub fn feedback(mut self, client: FeedbackClient) -> Self {
        self.feedback = Some(client);
        self
    }

    /// Count stored reports and received feedback in a session log.
    pub fn session_log(mut self, log: SharedSessionLog) -> Self {
        self.session = Some(log);
        self
    }

    /// Start the worker thread.
    pub fn spawn(self) -> Result<Dispatcher, DispatchError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DispatchError::Runtime(e.to_string()))?;

        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = unbounded();
        let sinks = Sinks {
            store: self.store,
            #[cfg(feature = "feedback")]
            feedback: self.feedback,
            session: self.session,
            outcomes: outcome_tx,
        };

        let worker = thread::Builder::new()
            .name("formcheck-dispatch".to_string())
            .spawn(move || runtime.block_on(run_worker(queue_rx, sinks)))
            .map_err(|e| DispatchError::Spawn(e.to_string()))?;

        Ok(Dispatcher {
            queue: Some(queue_tx),
            outcomes: outcome_rx,
            worker: Some(worker),
        })
    }
}

/// Fire-and-forget report hand-off.
pub struct Dispatcher {
    queue: Option<mpsc::UnboundedSender<ShotReport>>,
    outcomes: Receiver<DispatchOutcome>,
    worker: Option<JoinHandle<()>>,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Queue a report. Never blocks; returns `false` if the worker is gone.
    pub fn submit(&self, report: ShotReport) -> bool {
        match self.queue {
            Some(ref queue) => queue.send(report).is_ok(),
            None => false,
        }
    }

    /// Get the receiver for outcomes.
    pub fn outcomes(&self) -> &Receiver<DispatchOutcome> {
        &self.outcomes
    }

    /// Try to receive an outcome without blocking.
    pub fn try_outcome(&self) -> Option<DispatchOutcome> {
        self.outcomes.try_recv().ok()
    }

    /// Close the queue, wait for in-flight work and return outcomes not yet
    /// taken by the caller.
    pub fn shutdown(mut self) -> Vec<DispatchOutcome> {
        self.close();
        self.outcomes.try_iter().collect()
    }

    fn close(&mut self) {
        // Dropping the sender ends the worker loop once the queue drains.
        self.queue.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("Dispatch worker panicked");
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.close();
    }
}

struct Sinks {
    store: Option<Arc<ReportStore>>,
    #[cfg(feature = "feedback")]
    feedback: Option<FeedbackClient>,
    session: Option<SharedSessionLog>,
    outcomes: Sender<DispatchOutcome>,
}

impl Sinks {
    fn fan_out(&self, report: ShotReport, tasks: &mut JoinSet<()>) {
        let report = Arc::new(report);

        if let Some(ref store) = self.store {
            let store = store.clone();
            let report = report.clone();
            let session = self.session.clone();
            let outcomes = self.outcomes.clone();
            tasks.spawn(async move {
                let shot_number = report.shot_number;
                let report_id = report.report_id.clone();
                let result = tokio::task::spawn_blocking(move || store.append(&report)).await;
                let outcome = match result {
                    Ok(Ok(())) => {
                        if let Some(session) = session {
                            session.record_report_stored();
                        }
                        DispatchOutcome::Stored {
                            shot_number,
                            report_id,
                        }
                    }
                    Ok(Err(e)) => DispatchOutcome::StoreFailed {
                        shot_number,
                        error: e.to_string(),
                    },
                    Err(e) => DispatchOutcome::StoreFailed {
                        shot_number,
                        error: e.to_string(),
                    },
                };
                if let DispatchOutcome::StoreFailed { ref error, .. } = outcome {
                    tracing::warn!("Failed to store shot {}: {}", shot_number, error);
                }
                let _ = outcomes.send(outcome);
            });
        }

        self.request_feedback(report, tasks);
    }

    #[cfg(feature = "feedback")]
    fn request_feedback(&self, report: Arc<ShotReport>, tasks: &mut JoinSet<()>) {
        let Some(ref client) = self.feedback else {
            return;
        };
        let client = client.clone();
        let session = self.session.clone();
        let outcomes = self.outcomes.clone();
        tasks.spawn(async move {
            let shot_number = report.shot_number;
            let outcome = match client.analyze(&report).await {
                Ok(response) => {
                    if let Some(session) = session {
                        session.record_feedback();
                    }
                    DispatchOutcome::Feedback {
                        shot_number,
                        response,
                    }
                }
                Err(e) => {
                    tracing::warn!("Feedback for shot {} failed: {}", shot_number, e);
                    DispatchOutcome::FeedbackFailed {
                        shot_number,
                        error: e.to_string(),
                    }
                }
            };
            let _ = outcomes.send(outcome);
        });
    }

    #[cfg(not(feature = "feedback"))]
    fn request_feedback(&self, _report: Arc<ShotReport>, _tasks: &mut JoinSet<()>) {}
}

async fn run_worker(mut queue: mpsc::UnboundedReceiver<ShotReport>, sinks: Sinks) {
    let mut tasks = JoinSet::new();

    loop {
        tokio::select! {
            next = queue.recv() => match next {
                Some(report) => sinks.fan_out(report, &mut tasks),
                None => break,
            },
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    tracing::warn!("Dispatch task failed: {}", e);
                }
            }
        }
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            tracing::warn!("Dispatch task failed: {}", e);
        }
    }
}
