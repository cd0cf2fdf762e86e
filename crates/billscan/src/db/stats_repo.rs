//! Spending statistics over a transaction time range.

use rusqlite::{params, Connection};
use serde::Serialize;

use super::{Database, DatabaseError};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallStats {
    pub total_count: u64,
    pub total_amount: f64,
    pub average_amount: f64,
    pub max_amount: f64,
    pub min_amount: f64,
}

/// Count and sum for one category or payment method.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupStats {
    pub key: String,
    pub count: u64,
    pub total_amount: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendingStats {
    pub from: String,
    pub to: String,
    pub overall: OverallStats,
    pub by_category: Vec<GroupStats>,
    pub by_payment_method: Vec<GroupStats>,
}

/// Aggregates records with `from <= transaction_time <= to`. Groups are ordered by total, largest first.
pub fn spending_stats(db: &Database, from: &str, to: &str) -> Result<SpendingStats, DatabaseError> {
    db.with_conn(|conn| {
        let overall = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(amount), 0), COALESCE(AVG(amount), 0),
                    COALESCE(MAX(amount), 0), COALESCE(MIN(amount), 0)
             FROM bill_records WHERE transaction_time BETWEEN ?1 AND ?2",
            params![from, to],
            |r| {
                Ok(OverallStats {
                    total_count: r.get(0)?,
                    total_amount: r.get(1)?,
                    average_amount: r.get(2)?,
                    max_amount: r.get(3)?,
                    min_amount: r.get(4)?,
                })
            },
        )?;

        Ok(SpendingStats {
            from: from.to_string(),
            to: to.to_string(),
            overall,
            by_category: grouped(conn, GroupColumn::Category, from, to)?,
            by_payment_method: grouped(conn, GroupColumn::PaymentMethod, from, to)?,
        })
    })
}

#[derive(Clone, Copy)]
enum GroupColumn {
    Category,
    PaymentMethod,
}

impl GroupColumn {
    fn as_sql(self) -> &'static str {
        match self {
            GroupColumn::Category => "category",
            GroupColumn::PaymentMethod => "payment_method",
        }
    }
}

fn grouped(
    conn: &Connection,
    column: GroupColumn,
    from: &str,
    to: &str,
) -> Result<Vec<GroupStats>, DatabaseError> {
    let sql = format!(
        "SELECT {col}, COUNT(*), SUM(amount) FROM bill_records
         WHERE transaction_time BETWEEN ?1 AND ?2
         GROUP BY {col} ORDER BY SUM(amount) DESC, {col} ASC",
        col = column.as_sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![from, to], |r| {
            Ok(GroupStats {
                key: r.get(0)?,
                count: r.get(1)?,
                total_amount: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
