use async_trait::async_trait;

use super::record_repo::{self, NewRecord, STATUS_COMPLETED};
use super::{Database, DatabaseError};
use crate::parse::TransactionFields;

/// Final pipeline stage: turns parsed fields into a durable record.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Persists the transaction and returns its record id.
    async fn persist(
        &self,
        fields: &TransactionFields,
        storage_key: &str,
        raw_text: &str,
    ) -> Result<String, DatabaseError>;

    async fn health_check(&self) -> Result<(), String> {
        Ok(())
    }
}

/// [`RecordSink`] writing to the `bill_records` table.
#[derive(Clone)]
pub struct SqliteRecordSink {
    db: Database,
    currency: String,
}

impl SqliteRecordSink {
    pub fn new(db: Database, currency: &str) -> Self {
        Self {
            db,
            currency: currency.to_string(),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn new_record(&self, fields: &TransactionFields, storage_key: &str, raw_text: &str) -> NewRecord {
        NewRecord {
            payment_method: fields.payment_method.clone(),
            amount: fields.amount_in_cents(),
            currency: self.currency.clone(),
            transaction_time: fields.formatted_time(),
            category: fields.category.clone(),
            merchant: fields.merchant.clone(),
            description: fields.description.clone(),
            image_key: Some(storage_key.to_string()),
            ocr_text: Some(raw_text.to_string()),
            status: STATUS_COMPLETED.to_string(),
        }
    }
}

#[async_trait]
impl RecordSink for SqliteRecordSink {
    async fn persist(
        &self,
        fields: &TransactionFields,
        storage_key: &str,
        raw_text: &str,
    ) -> Result<String, DatabaseError> {
        let record = self.new_record(fields, storage_key, raw_text);
        let inserted = self
            .db
            .call(move |db| record_repo::insert(db, &record))
            .await?;
        log::info!("Bill record created: {}", inserted.record_id);
        Ok(inserted.record_id)
    }

    async fn health_check(&self) -> Result<(), String> {
        self.db
            .call(|db| db.ping())
            .await
            .map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_transaction_time;

    fn fields() -> TransactionFields {
        TransactionFields {
            payment_method: "支付宝".to_string(),
            amount: 18.499,
            transaction_time: parse_transaction_time("2024-05-01 12:30:00").unwrap(),
            category: "餐饮".to_string(),
            merchant: Some("星巴克".to_string()),
            description: Some("latte".to_string()),
        }
    }

    #[tokio::test]
    async fn test_persist_writes_completed_record() {
        let db = Database::open_in_memory().unwrap();
        let sink = SqliteRecordSink::new(db.clone(), "CNY");

        let record_id = sink
            .persist(&fields(), "bill_images/a.jpg", "Starbucks ¥18.50")
            .await
            .unwrap();

        let record = record_repo::find_by_record_id(&db, &record_id)
            .unwrap()
            .unwrap();
        assert_eq!(record.amount, 18.5);
        assert_eq!(record.currency, "CNY");
        assert_eq!(record.status, "completed");
        assert_eq!(record.transaction_time, "2024-05-01 12:30:00");
        assert_eq!(record.image_key.as_deref(), Some("bill_images/a.jpg"));
        assert_eq!(record.ocr_text.as_deref(), Some("Starbucks ¥18.50"));
    }

    #[tokio::test]
    async fn test_configured_currency() {
        let db = Database::open_in_memory().unwrap();
        let sink = SqliteRecordSink::new(db.clone(), "USD");
        let record_id = sink.persist(&fields(), "k", "t").await.unwrap();
        let record = record_repo::find_by_record_id(&db, &record_id)
            .unwrap()
            .unwrap();
        assert_eq!(record.currency, "USD");
    }

    #[tokio::test]
    async fn test_health_check() {
        let sink = SqliteRecordSink::new(Database::open_in_memory().unwrap(), "CNY");
        assert!(sink.health_check().await.is_ok());
    }
}
