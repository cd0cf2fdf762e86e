//! Scripted stage executors and builders for test data.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use billscan::db::{DatabaseError, RecordSink};
use billscan::error::{ExtractionError, ParseError, StorageError};
use billscan::extract::TextExtractor;
use billscan::parse::{parse_transaction_time, StructuredParser, TransactionFields};
use billscan::pipeline::ImageSubmission;
use billscan::storage::ObjectStore;

/// Builder for `TransactionFields`.
pub struct FieldsBuilder {
    fields: TransactionFields,
}

impl FieldsBuilder {
    pub fn new() -> Self {
        Self {
            fields: TransactionFields {
                payment_method: "支付宝".to_string(),
                amount: 18.5,
                transaction_time: parse_transaction_time("2024-05-01 12:30:45")
                    .expect("valid test time"),
                category: "餐饮".to_string(),
                merchant: Some("星巴克".to_string()),
                description: None,
            },
        }
    }

    pub fn amount(mut self, amount: f64) -> Self {
        self.fields.amount = amount;
        self
    }

    pub fn payment_method(mut self, method: &str) -> Self {
        self.fields.payment_method = method.to_string();
        self
    }

    pub fn category(mut self, category: &str) -> Self {
        self.fields.category = category.to_string();
        self
    }

    pub fn time(mut self, time: &str) -> Self {
        self.fields.transaction_time = parse_transaction_time(time).expect("valid test time");
        self
    }

    pub fn build(self) -> TransactionFields {
        self.fields
    }
}

impl Default for FieldsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

enum ExtractBehavior {
    Text(String),
    Fail(String),
    Panic,
}

/// Text extractor that plays back a fixed outcome, optionally after a delay.
pub struct ScriptedExtractor {
    behavior: ExtractBehavior,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedExtractor {
    pub fn text(text: &str) -> Self {
        Self::with(ExtractBehavior::Text(text.to_string()))
    }

    pub fn failing(message: &str) -> Self {
        Self::with(ExtractBehavior::Fail(message.to_string()))
    }

    pub fn panicking() -> Self {
        Self::with(ExtractBehavior::Panic)
    }

    fn with(behavior: ExtractBehavior) -> Self {
        Self {
            behavior,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextExtractor for ScriptedExtractor {
    async fn extract_text(&self, _bytes: &[u8]) -> Result<String, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.behavior {
            ExtractBehavior::Text(text) => Ok(text.clone()),
            ExtractBehavior::Fail(message) => {
                Err(ExtractionError::DetectionFailed(message.clone()))
            }
            ExtractBehavior::Panic => panic!("detector crashed"),
        }
    }
}

enum ParseBehavior {
    Fields(TransactionFields),
    NoJson,
}

/// Structured parser that returns fixed fields or a fixed failure.
pub struct ScriptedParser {
    behavior: ParseBehavior,
    calls: AtomicUsize,
}

impl ScriptedParser {
    pub fn returning(fields: TransactionFields) -> Self {
        Self {
            behavior: ParseBehavior::Fields(fields),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn without_json() -> Self {
        Self {
            behavior: ParseBehavior::NoJson,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StructuredParser for ScriptedParser {
    async fn parse(&self, _text: &str) -> Result<TransactionFields, ParseError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            ParseBehavior::Fields(fields) => Ok(fields.clone()),
            ParseBehavior::NoJson => Err(ParseError::NoJson),
        }
    }
}

/// Object store whose writes always fail, as on a full disk.
#[derive(Default)]
pub struct FailingStore {
    calls: AtomicUsize,
}

impl FailingStore {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for FailingStore {
    async fn put(&self, _bytes: &[u8], extension: &str) -> Result<String, StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::WriteObject {
            path: format!("bill_images/rejected.{}", extension).into(),
            source: std::io::Error::other("No space left on device"),
        })
    }
}

/// Record sink whose inserts always fail.
#[derive(Default)]
pub struct FailingSink {
    calls: AtomicUsize,
}

impl FailingSink {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordSink for FailingSink {
    async fn persist(
        &self,
        _fields: &TransactionFields,
        _storage_key: &str,
        _raw_text: &str,
    ) -> Result<String, DatabaseError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(DatabaseError::ConnectionPoisoned)
    }
}

/// A receipt text long enough to pass the minimum-length check.
pub const RECEIPT_TEXT: &str = "星巴克咖啡 国贸店\n支付宝 实付 ¥18.50\n2024-05-01 12:30:45";

pub fn jpeg_upload() -> ImageSubmission {
    ImageSubmission::from_upload(
        vec![0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10],
        Some("receipt.jpg"),
        Some("image/jpeg"),
    )
    .expect("valid upload")
}
