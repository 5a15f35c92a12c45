// THEORY:
// The `parallel_pipeline` module runs many assessments at once. A single
// dispatcher task receives every request and hands it to the workers in
// round-robin order; each worker runs the CPU-bound prediction on tokio's
// blocking pool and answers through a oneshot channel carried by the task.
//
// Assessments are independent: the only state shared between them is the
// immutable model behind an `Arc`, so results never depend on scheduling.

use crate::core_modules::scoring::{RiskResult, SymptomInputs};
use crate::error::{AssessError, ModelError};
use crate::pipeline::RiskModel;
use futures::future::join_all;
use image::RgbImage;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

struct AssessTask {
    image: RgbImage,
    symptoms: Option<SymptomInputs>,
    result_sender: oneshot::Sender<Result<RiskResult, ModelError>>,
}

pub struct WorkerPool {
    task_sender: mpsc::UnboundedSender<AssessTask>,
    dispatcher: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns the dispatcher and `size` workers (at least one) on the current
    /// tokio runtime.
    pub fn new(model: Arc<dyn RiskModel>, size: usize) -> Self {
        let size = size.max(1);
        let (task_sender, mut task_receiver) = mpsc::unbounded_channel::<AssessTask>();

        let (worker_senders, worker_receivers): (Vec<_>, Vec<_>) = (0..size)
            .map(|_| mpsc::unbounded_channel::<AssessTask>())
            .unzip();

        let dispatcher = tokio::spawn(async move {
            let mut worker_idx = 0;
            while let Some(task) = task_receiver.recv().await {
                if worker_senders[worker_idx].send(task).is_err() {
                    warn!(worker_idx, "Worker stopped, dropping task");
                }
                worker_idx = (worker_idx + 1) % size;
            }
        });

        let workers = worker_receivers
            .into_iter()
            .enumerate()
            .map(|(worker_idx, mut worker_receiver)| {
                let model = Arc::clone(&model);
                tokio::spawn(async move {
                    while let Some(task) = worker_receiver.recv().await {
                        Self::run_task(worker_idx, Arc::clone(&model), task).await;
                    }
                })
            })
            .collect();

        Self {
            task_sender,
            dispatcher,
            workers,
        }
    }

    /// One worker per logical CPU.
    pub fn with_available_cpus(model: Arc<dyn RiskModel>) -> Self {
        Self::new(model, num_cpus::get())
    }

    async fn run_task(worker_idx: usize, model: Arc<dyn RiskModel>, task: AssessTask) {
        let AssessTask {
            image,
            symptoms,
            result_sender,
        } = task;
        let prediction =
            tokio::task::spawn_blocking(move || model.predict(&image, symptoms.as_ref())).await;
        match prediction {
            Ok(result) => {
                debug!(worker_idx, ok = result.is_ok(), "Task finished");
                let _ = result_sender.send(result);
            }
            // Dropping the sender tells the caller the worker failed.
            Err(join_error) => warn!(worker_idx, error = %join_error, "Prediction task failed"),
        }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub async fn assess(
        &self,
        image: RgbImage,
        symptoms: Option<SymptomInputs>,
    ) -> Result<RiskResult, AssessError> {
        let (result_sender, result_receiver) = oneshot::channel();

        let task = AssessTask {
            image,
            symptoms,
            result_sender,
        };

        self.task_sender
            .send(task)
            .map_err(|_| AssessError::PoolClosed)?;

        let result = result_receiver
            .await
            .map_err(|_| AssessError::WorkerDropped)?;
        Ok(result?)
    }

    /// Assesses every job concurrently; results come back in job order.
    pub async fn assess_batch(
        &self,
        jobs: Vec<(RgbImage, Option<SymptomInputs>)>,
    ) -> Vec<Result<RiskResult, AssessError>> {
        join_all(
            jobs.into_iter()
                .map(|(image, symptoms)| self.assess(image, symptoms)),
        )
        .await
    }

    /// Stops accepting work and waits for queued tasks to drain.
    pub async fn shutdown(self) {
        drop(self.task_sender);
        let _ = self.dispatcher.await;
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}
