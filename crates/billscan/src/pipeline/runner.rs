use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::config::PipelineConfig;
use super::error::{panic_message, StageError};
use super::health::{ComponentHealth, HealthReport};
use super::submission::{ImageSubmission, SubmitError};
use crate::config::{build_extractor, build_object_store, build_parser, open_database, Config};
use crate::db::{RecordSink, SqliteRecordSink};
use crate::error::{BillscanError, ConfigError, ExtractionError, RegistryError};
use crate::extract::TextExtractor;
use crate::parse::StructuredParser;
use crate::registry::{Job, JobEvent, JobEventBroadcaster, JobId, Stage, TaskRegistry};
use crate::storage::ObjectStore;

/// The four stage executors, in the order a job visits them.
#[derive(Clone)]
struct Stages {
    store: Arc<dyn ObjectStore>,
    extractor: Arc<dyn TextExtractor>,
    parser: Arc<dyn StructuredParser>,
    sink: Arc<dyn RecordSink>,
}

struct Inner {
    stages: Stages,
    registry: Arc<TaskRegistry>,
    config: PipelineConfig,
    runtime: Handle,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Everything one background task needs to drive its job.
struct JobContext {
    id: JobId,
    submission: ImageSubmission,
    cancel: CancellationToken,
}

/// Drives submitted images through upload, extraction, parsing and persistence.
///
/// Each job runs on its own task; progress is visible through the registry.
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<Inner>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Queues the image and returns its job id without waiting on any stage.
    pub fn submit(&self, submission: ImageSubmission) -> Result<JobId, SubmitError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(SubmitError::ShuttingDown);
        }

        let id = self
            .inner
            .registry
            .insert(Job::queued(JobId::new(), submission.extension()));
        info!(
            job_id = %id,
            bytes = submission.len(),
            extension = submission.extension(),
            "Job submitted"
        );

        let job = JobContext {
            id,
            submission,
            cancel: self.inner.shutdown.child_token(),
        };
        let handle = self
            .inner
            .runtime
            .spawn(run_job(Arc::clone(&self.inner), job));

        let mut tasks = self.lock_tasks();
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);

        Ok(id)
    }

    pub fn status(&self, id: &JobId) -> Result<Job, RegistryError> {
        self.inner.registry.get(id)
    }

    /// Resolves once the job reaches `Completed` or `Failed`.
    pub async fn wait_for(&self, id: &JobId) -> Result<Job, RegistryError> {
        let mut events = self.inner.registry.subscribe();
        loop {
            let job = self.inner.registry.get(id)?;
            if job.is_finished() {
                return Ok(job);
            }
            match events.recv().await {
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return self.inner.registry.get(id),
            }
        }
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.inner.registry
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.inner.registry.subscribe()
    }

    pub async fn health(&self) -> HealthReport {
        let stages = &self.inner.stages;
        let components = vec![
            ComponentHealth::from_check("object_store", stages.store.health_check().await),
            ComponentHealth::from_check("text_extractor", stages.extractor.health_check().await),
            ComponentHealth::from_check("structured_parser", stages.parser.health_check().await),
            ComponentHealth::from_check("record_sink", stages.sink.health_check().await),
        ];
        HealthReport::new(components, self.inner.registry.counts())
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Cancels every in-flight job and waits for their tasks to finish.
    ///
    /// Cancelled jobs end `Failed` at whatever stage they were in. New
    /// submissions are rejected afterwards.
    pub async fn shutdown(&self) {
        info!("Shutting down pipeline");
        self.inner.shutdown.cancel();

        let tasks = std::mem::take(&mut *self.lock_tasks());
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Job task did not finish cleanly");
            }
        }
    }

    fn lock_tasks(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.inner.tasks.lock().unwrap_or_else(|poisoned| {
            warn!("Task list lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

async fn run_job(inner: Arc<Inner>, job: JobContext) {
    let span = info_span!("pipeline", job_id = %job.id);
    async move {
        let outcome = AssertUnwindSafe(inner.execute(&job)).catch_unwind().await;
        let result = match outcome {
            Ok(result) => result,
            Err(payload) => Err(StageError::Panicked(panic_message(payload.as_ref()))),
        };
        inner.finish(&job.id, result);
    }
    .instrument(span)
    .await
}

impl Inner {
    async fn execute(&self, job: &JobContext) -> Result<String, StageError> {
        let bytes = job.submission.bytes();

        self.registry
            .advance(&job.id, Stage::Uploading, "Uploading image")?;
        let storage_key = cancellable(
            &job.cancel,
            self.stages.store.put(bytes, job.submission.extension()),
        )
        .instrument(info_span!("upload"))
        .await?;
        debug!(storage_key = %storage_key, "Image stored");

        let key = storage_key.clone();
        self.registry.update(&job.id, move |j| {
            j.artifacts.storage_key = Some(key);
            j.advance(Stage::Extracting, "Extracting text from image")
        })?;

        let text = cancellable(&job.cancel, self.stages.extractor.extract_text(bytes))
            .instrument(info_span!("extract"))
            .await?;
        let length = text.trim().chars().count();
        if length < self.config.min_text_length {
            return Err(ExtractionError::InsufficientText {
                length,
                minimum: self.config.min_text_length,
            }
            .into());
        }
        let text_length = text.chars().count();
        debug!(text_length, "Text extracted");

        self.registry.update(&job.id, move |j| {
            j.artifacts.text_length = Some(text_length);
            j.advance(Stage::Parsing, "Parsing transaction details")
        })?;

        let fields = cancellable(&job.cancel, self.stages.parser.parse(&text))
            .instrument(info_span!("parse"))
            .await?;
        fields.validate()?;
        debug!(
            amount = fields.amount,
            payment_method = %fields.payment_method,
            category = %fields.category,
            "Transaction parsed"
        );

        self.registry
            .advance(&job.id, Stage::Persisting, "Saving transaction record")?;

        // A write that has started runs to completion so a Failed job never leaves a record.
        if job.cancel.is_cancelled() {
            return Err(StageError::Cancelled);
        }
        let record_id = self
            .stages
            .sink
            .persist(&fields, &storage_key, &text)
            .instrument(info_span!("persist"))
            .await?;

        Ok(record_id)
    }

    fn finish(&self, id: &JobId, result: Result<String, StageError>) {
        match result {
            Ok(record_id) => match self.registry.update(id, |j| j.complete(&record_id)) {
                Ok(job) => info!(
                    record_id = %record_id,
                    elapsed_ms = job.processing_time.map(|d| d.as_millis() as u64),
                    "Job completed"
                ),
                Err(e) => error!(error = %e, "Could not mark job completed"),
            },
            Err(err) => {
                let kind = err.kind();
                let message = err.to_string();
                warn!(kind = ?kind, error = %message, "Job failed");
                if let Err(e) = self.registry.update(id, |j| j.fail(kind, &message)) {
                    error!(error = %e, "Could not mark job failed");
                }
            }
        }
    }
}

/// Runs one stage call, giving up as soon as `cancel` fires.
async fn cancellable<T, E, F>(cancel: &CancellationToken, work: F) -> Result<T, StageError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<StageError>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(StageError::Cancelled),
        result = work => result.map_err(Into::into),
    }
}

/// Assembles a [`Pipeline`] from its stage executors.
#[derive(Default)]
pub struct PipelineBuilder {
    store: Option<Arc<dyn ObjectStore>>,
    extractor: Option<Arc<dyn TextExtractor>>,
    parser: Option<Arc<dyn StructuredParser>>,
    sink: Option<Arc<dyn RecordSink>>,
    registry: Option<Arc<TaskRegistry>>,
    config: PipelineConfig,
    runtime: Option<Handle>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Production wiring: filesystem store, OCR extractor, configured parser, SQLite sink.
    pub fn from_config(config: &Config) -> Result<Self, BillscanError> {
        let extractor = build_extractor(config)?;
        let parser = build_parser(config)?;
        let db = open_database(config)?;

        Ok(Self::new()
            .object_store(Arc::new(build_object_store(config)))
            .text_extractor(extractor)
            .structured_parser(parser)
            .record_sink(Arc::new(SqliteRecordSink::new(
                db,
                &config.records.currency,
            )))
            .config(PipelineConfig::from_config(config)))
    }

    pub fn object_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn text_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn structured_parser(mut self, parser: Arc<dyn StructuredParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn record_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Shares an existing registry instead of creating one.
    pub fn registry(mut self, registry: Arc<TaskRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Runtime to spawn job tasks on. Defaults to the current one.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Result<Pipeline, ConfigError> {
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|e| ConfigError::Validation {
                message: format!("Pipeline needs a Tokio runtime: {}", e),
            })?,
        };

        let stages = Stages {
            store: self.store.ok_or_else(|| missing("object store"))?,
            extractor: self.extractor.ok_or_else(|| missing("text extractor"))?,
            parser: self.parser.ok_or_else(|| missing("structured parser"))?,
            sink: self.sink.ok_or_else(|| missing("record sink"))?,
        };
        let registry = self.registry.unwrap_or_else(|| {
            Arc::new(TaskRegistry::new(JobEventBroadcaster::new(
                self.config.event_capacity,
            )))
        });

        Ok(Pipeline {
            inner: Arc::new(Inner {
                stages,
                registry,
                config: self.config,
                runtime,
                shutdown: CancellationToken::new(),
                tasks: Mutex::new(Vec::new()),
            }),
        })
    }
}

fn missing(component: &str) -> ConfigError {
    ConfigError::Validation {
        message: format!("Pipeline is missing its {}", component),
    }
}
