//! Schema versioning through SQLite's `user_version` pragma.

use rusqlite::Connection;

use super::error::DatabaseError;

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create bill_records",
        sql: include_str!("sql/001_create_bill_records.sql"),
    },
    Migration {
        version: 2,
        name: "index bill_records by time and method",
        sql: include_str!("sql/002_index_bill_records.sql"),
    },
];

/// Newest schema version this build understands.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

pub fn schema_version(conn: &Connection) -> Result<u32, DatabaseError> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Brings the schema up to [`latest_version`] in a single transaction.
pub fn run_all(conn: &mut Connection) -> Result<(), DatabaseError> {
    let found = schema_version(conn)?;
    let latest = latest_version();
    if found > latest {
        return Err(DatabaseError::SchemaTooNew { found, latest });
    }
    if found == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in MIGRATIONS.iter().filter(|m| m.version > found) {
        log::info!("Applying schema v{} ({})", migration.version, migration.name);
        tx.execute_batch(migration.sql)
            .map_err(|source| DatabaseError::Migration {
                version: migration.version,
                source,
            })?;
    }
    tx.pragma_update(None, "user_version", latest)?;
    tx.commit()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migrated() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        run_all(&mut conn).unwrap();
        conn
    }

    const INSERT_MINIMAL: &str = "INSERT INTO bill_records (record_id, payment_method, amount,
        transaction_time, category, created_at, updated_at)
        VALUES ('r1', '支付宝', 1.0, '2024-01-01 00:00:00', '餐饮', 'now', 'now')";

    #[test]
    fn test_fresh_db_reaches_latest_version() {
        let conn = migrated();
        assert_eq!(schema_version(&conn).unwrap(), latest_version());
    }

    #[test]
    fn test_rerun_is_noop() {
        let mut conn = migrated();
        run_all(&mut conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), latest_version());
    }

    #[test]
    fn test_newer_schema_is_rejected() {
        let mut conn = migrated();
        conn.pragma_update(None, "user_version", latest_version() + 1)
            .unwrap();
        assert!(matches!(
            run_all(&mut conn),
            Err(DatabaseError::SchemaTooNew { .. })
        ));
    }

    #[test]
    fn test_versions_strictly_increase() {
        assert!(MIGRATIONS.windows(2).all(|w| w[0].version < w[1].version));
    }

    #[test]
    fn test_bill_records_defaults() {
        let conn = migrated();
        conn.execute(INSERT_MINIMAL, []).unwrap();
        let (currency, status): (String, String) = conn
            .query_row(
                "SELECT currency, status FROM bill_records WHERE record_id = 'r1'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(currency, "CNY");
        assert_eq!(status, "pending");
    }

    #[test]
    fn test_record_id_is_unique() {
        let conn = migrated();
        conn.execute(INSERT_MINIMAL, []).unwrap();
        assert!(conn.execute(INSERT_MINIMAL, []).is_err());
    }
}
