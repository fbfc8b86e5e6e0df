use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use world_backup::backup::{BackupJob, JobReport, StrategyOutcome};
use world_backup::engine::{JobOutcome, RunPermit, RuntimeEvent};
use world_backup::errors::Result;
use world_backup::exec::ExecutorBackend;

/// What a [`FakeExecutor`] does with a dispatched job.
#[derive(Debug, Clone)]
pub enum FakeBehaviour {
    /// Immediately report the given outcome.
    Complete(JobOutcome),
    /// Keep the permit until the test calls [`HeldJobs::finish_all`].
    Hold,
}

/// Jobs parked by a [`FakeBehaviour::Hold`] executor.
#[derive(Debug, Clone, Default)]
pub struct HeldJobs {
    inner: Arc<Mutex<Vec<(String, RunPermit)>>>,
}

impl HeldJobs {
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Report every held job as finished with `outcome`.
    pub async fn finish_all(&self, tx: &mpsc::Sender<RuntimeEvent>, outcome: JobOutcome) {
        let held: Vec<_> = self.inner.lock().unwrap().drain(..).collect();
        for (job, permit) in held {
            tx.send(RuntimeEvent::JobFinished {
                job,
                outcome: outcome.clone(),
                permit,
            })
            .await
            .expect("runtime still listening");
        }
    }
}

/// A fake executor that:
/// - records which jobs were dispatched
/// - completes them immediately or parks them, depending on its behaviour.
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    executed: Arc<Mutex<Vec<String>>>,
    behaviour: FakeBehaviour,
    held: HeldJobs,
}

impl FakeExecutor {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, executed: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            runtime_tx,
            executed,
            behaviour: FakeBehaviour::Complete(JobOutcome::Succeeded(empty_report("fake"))),
            held: HeldJobs::default(),
        }
    }

    pub fn with_behaviour(mut self, behaviour: FakeBehaviour) -> Self {
        self.behaviour = behaviour;
        self
    }

    /// Handle to the jobs this executor parks.
    pub fn held(&self) -> HeldJobs {
        self.held.clone()
    }
}

impl ExecutorBackend for FakeExecutor {
    fn dispatch(
        &mut self,
        job: BackupJob,
        permit: RunPermit,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let executed = Arc::clone(&self.executed);
        let behaviour = self.behaviour.clone();
        let held = self.held.clone();

        Box::pin(async move {
            executed.lock().unwrap().push(job.name.clone());

            match behaviour {
                FakeBehaviour::Complete(outcome) => {
                    tx.send(RuntimeEvent::JobFinished {
                        job: job.name,
                        outcome,
                        permit,
                    })
                    .await
                    .map_err(|e| anyhow::anyhow!(e.to_string()))?;
                }
                FakeBehaviour::Hold => {
                    held.inner.lock().unwrap().push((job.name, permit));
                }
            }
            Ok(())
        })
    }
}

/// A report for a job where neither strategy did anything.
pub fn empty_report(job: &str) -> JobReport {
    JobReport {
        job: job.to_string(),
        full_tree: StrategyOutcome::Skipped("fake".to_string()),
        extensions: StrategyOutcome::Skipped("fake".to_string()),
        pruned: Vec::new(),
    }
}
