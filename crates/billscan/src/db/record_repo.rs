//! Record repository: CRUD and paginated queries for the `bill_records` table.

use chrono::Utc;
use rusqlite::{params, Row};
use serde::Serialize;
use uuid::Uuid;

use super::{Database, DatabaseError};

/// Status tag given to records created by the pipeline.
pub const STATUS_COMPLETED: &str = "completed";

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 200;

/// A persisted transaction record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: i64,
    pub record_id: String,
    pub payment_method: String,
    pub amount: f64,
    pub currency: String,
    pub transaction_time: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_text: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TransactionRecord {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            record_id: row.get("record_id")?,
            payment_method: row.get("payment_method")?,
            amount: row.get("amount")?,
            currency: row.get("currency")?,
            transaction_time: row.get("transaction_time")?,
            category: row.get("category")?,
            merchant: row.get("merchant")?,
            description: row.get("description")?,
            image_key: row.get("image_key")?,
            ocr_text: row.get("ocr_text")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Values for a new record; ids and timestamps are assigned on insert.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub payment_method: String,
    pub amount: f64,
    pub currency: String,
    /// `YYYY-MM-DD HH:MM:SS`.
    pub transaction_time: String,
    pub category: String,
    pub merchant: Option<String>,
    pub description: Option<String>,
    pub image_key: Option<String>,
    pub ocr_text: Option<String>,
    pub status: String,
}

/// One page of records plus totals.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPage {
    pub records: Vec<TransactionRecord>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u64,
}

/// Normalized `(page, page_size)`: pages start at 1, sizes are clamped to `1..=MAX_PAGE_SIZE`.
pub fn normalize_paging(page: u32, page_size: u32) -> (u32, u32) {
    (page.max(1), page_size.clamp(1, MAX_PAGE_SIZE))
}

/// Inserts a record and returns it with its assigned ids.
pub fn insert(db: &Database, record: &NewRecord) -> Result<TransactionRecord, DatabaseError> {
    let record_id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO bill_records (record_id, payment_method, amount, currency,
             transaction_time, category, merchant, description, image_key, ocr_text,
             status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
            params![
                record_id,
                record.payment_method,
                record.amount,
                record.currency,
                record.transaction_time,
                record.category,
                record.merchant,
                record.description,
                record.image_key,
                record.ocr_text,
                record.status,
                now,
            ],
        )?;

        let row = conn.query_row(
            "SELECT * FROM bill_records WHERE id = ?1",
            params![conn.last_insert_rowid()],
            TransactionRecord::from_row,
        )?;
        Ok(row)
    })
}

/// Finds a record by its opaque record id.
pub fn find_by_record_id(
    db: &Database,
    record_id: &str,
) -> Result<Option<TransactionRecord>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM bill_records WHERE record_id = ?1")?;
        let mut rows = stmt.query_map(params![record_id], TransactionRecord::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Records with `from <= transaction_time <= to`, newest transaction first.
pub fn query_by_time_range(
    db: &Database,
    from: &str,
    to: &str,
    page: u32,
    page_size: u32,
) -> Result<RecordPage, DatabaseError> {
    paginate(
        db,
        "transaction_time BETWEEN ?1 AND ?2",
        &[&from, &to],
        page,
        page_size,
    )
}

/// Records paid with `payment_method`, newest transaction first.
pub fn query_by_payment_method(
    db: &Database,
    payment_method: &str,
    page: u32,
    page_size: u32,
) -> Result<RecordPage, DatabaseError> {
    paginate(db, "payment_method = ?1", &[&payment_method], page, page_size)
}

fn paginate(
    db: &Database,
    condition: &str,
    filter_params: &[&dyn rusqlite::types::ToSql],
    page: u32,
    page_size: u32,
) -> Result<RecordPage, DatabaseError> {
    let (page, page_size) = normalize_paging(page, page_size);
    let offset = (page as i64 - 1) * page_size as i64;

    db.with_conn(|conn| {
        let count_sql = format!("SELECT COUNT(*) FROM bill_records WHERE {}", condition);
        let total: u64 = conn.query_row(&count_sql, filter_params, |r| r.get(0))?;

        let n = filter_params.len();
        let query_sql = format!(
            "SELECT * FROM bill_records WHERE {} ORDER BY transaction_time DESC, id DESC LIMIT ?{} OFFSET ?{}",
            condition,
            n + 1,
            n + 2
        );
        let limit = page_size as i64;
        let mut params_ref: Vec<&dyn rusqlite::types::ToSql> = filter_params.to_vec();
        params_ref.push(&limit);
        params_ref.push(&offset);

        let mut stmt = conn.prepare(&query_sql)?;
        let records: Vec<TransactionRecord> = stmt
            .query_map(params_ref.as_slice(), TransactionRecord::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RecordPage {
            records,
            total,
            page,
            page_size,
            total_pages: total.div_ceil(page_size as u64),
        })
    })
}

/// Updates status and, when given, description. Returns `false` if no record matched.
pub fn update_status(
    db: &Database,
    record_id: &str,
    status: &str,
    description: Option<&str>,
) -> Result<bool, DatabaseError> {
    let now = Utc::now().to_rfc3339();
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE bill_records
             SET status = ?2, description = COALESCE(?3, description), updated_at = ?4
             WHERE record_id = ?1",
            params![record_id, status, description, now],
        )?;
        Ok(changed > 0)
    })
}

/// Total number of records.
pub fn count(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let n: u64 = conn.query_row("SELECT COUNT(*) FROM bill_records", [], |r| r.get(0))?;
        Ok(n)
    })
}
