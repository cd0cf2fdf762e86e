//! Test harness for isolated pipeline runs.
//!
//! Each harness owns a temporary object-store root and an in-memory
//! database, so tests never share state.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use billscan::db::{record_repo, Database, RecordSink, SqliteRecordSink, TransactionRecord};
use billscan::extract::TextExtractor;
use billscan::parse::StructuredParser;
use billscan::pipeline::Pipeline;
use billscan::registry::{Job, JobId, Stage};
use billscan::storage::{FilesystemStore, ObjectStore};

pub struct TestHarness {
    temp_dir: TempDir,
    pub db: Database,
    pub store: Arc<FilesystemStore>,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = Arc::new(FilesystemStore::new(
            temp_dir.path().join("objects"),
            "bill_images",
        ));
        let db = Database::open_in_memory().expect("Failed to open in-memory database");
        Self {
            temp_dir,
            db,
            store,
        }
    }

    /// Pipeline over this harness's store and database with the given extractor and parser.
    pub fn pipeline(
        &self,
        extractor: Arc<dyn TextExtractor>,
        parser: Arc<dyn StructuredParser>,
    ) -> Pipeline {
        self.pipeline_with(self.store.clone(), extractor, parser, self.sink())
    }

    /// Pipeline with every stage executor supplied by the caller.
    pub fn pipeline_with(
        &self,
        store: Arc<dyn ObjectStore>,
        extractor: Arc<dyn TextExtractor>,
        parser: Arc<dyn StructuredParser>,
        sink: Arc<dyn RecordSink>,
    ) -> Pipeline {
        Pipeline::builder()
            .object_store(store)
            .text_extractor(extractor)
            .structured_parser(parser)
            .record_sink(sink)
            .build()
            .expect("Failed to build pipeline")
    }

    pub fn sink(&self) -> Arc<SqliteRecordSink> {
        Arc::new(SqliteRecordSink::new(self.db.clone(), "CNY"))
    }

    pub fn record_count(&self) -> u64 {
        record_repo::count(&self.db).expect("count records")
    }

    pub fn record(&self, record_id: &str) -> Option<TransactionRecord> {
        record_repo::find_by_record_id(&self.db, record_id).expect("find record")
    }

    pub async fn object_exists(&self, key: &str) -> bool {
        self.store.exists(key).await.expect("check object")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Waits for the job to finish, failing the test after five seconds.
pub async fn finished(pipeline: &Pipeline, id: &JobId) -> Job {
    tokio::time::timeout(Duration::from_secs(5), pipeline.wait_for(id))
        .await
        .expect("job did not finish in time")
        .expect("job is registered")
}

/// Polls until the job reaches `stage`, failing the test after five seconds.
pub async fn reached(pipeline: &Pipeline, id: &JobId, stage: Stage) -> Job {
    let poll = async {
        loop {
            let job = pipeline.status(id).expect("job is registered");
            if job.stage == stage {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), poll)
        .await
        .expect("job did not reach the expected stage in time")
}
