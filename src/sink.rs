//! Discrepancy Sink — buffered, idempotent persistence of discrepancy
//! records to the output table. See §4.8.

use crate::connection::{Connection, Dialect, Param};
use crate::discrepancy::Discrepancy;
use crate::error::Result;

/// Where the output table lives.
#[derive(Debug, Clone)]
pub struct OutputLocation {
    pub schema: String,
    pub table: String,
}

impl OutputLocation {
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }

    fn staging_name(&self) -> String {
        format!("{}.{}_staging", self.schema, self.table)
    }
}

/// Buffers discrepancy records and flushes them in batches via a
/// create-staging / bulk-insert / MERGE cycle (§4.8).
pub struct DiscrepancySink<'a> {
    conn: &'a dyn Connection,
    location: OutputLocation,
    batch_size: usize,
    buffer: Vec<Discrepancy>,
    table_ensured: bool,
}

impl<'a> DiscrepancySink<'a> {
    pub fn new(conn: &'a dyn Connection, location: OutputLocation, batch_size: usize) -> Self {
        DiscrepancySink {
            conn,
            location,
            batch_size,
            buffer: Vec::new(),
            table_ensured: false,
        }
    }

    /// Append a record to the in-memory buffer; flush automatically once
    /// `batch_size` is reached.
    pub async fn write(&mut self, record: Discrepancy) -> Result<()> {
        if !self.table_ensured {
            self.ensure_table().await?;
            self.table_ensured = true;
        }
        self.buffer.push(record);
        if self.buffer.len() >= self.batch_size {
            self.flush().await?;
        }
        Ok(())
    }

    async fn ensure_table(&self) -> Result<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.location.qualified(),
            typed_column_list(self.conn.dialect())
        );
        self.conn.execute(&sql, &[]).await?;
        Ok(())
    }

    /// Drain the buffer: stage into a temp table, then MERGE into the
    /// target on `(primary_key, column, year, month, week)`.
    pub async fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let staging = self.location.staging_name();
        let create_staging = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            staging,
            typed_column_list(self.conn.dialect())
        );
        self.conn.execute(&create_staging, &[]).await?;

        let placeholders: Vec<String> = (1..=Discrepancy::FIELD_NAMES.len())
            .map(|i| self.conn.dialect().placeholder(i))
            .collect();
        let insert_sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            staging,
            Discrepancy::FIELD_NAMES.join(", "),
            placeholders.join(", ")
        );

        let rows: Vec<Vec<Param>> = self
            .buffer
            .iter()
            .map(|record| record.as_string_fields().into_iter().map(Param::Text).collect())
            .collect();
        self.conn.execute_many(&insert_sql, &rows).await?;

        let merge_sql = format!(
            "MERGE INTO {target} USING {staging} \
             ON {target}.primary_key = {staging}.primary_key \
             AND {target}.column = {staging}.column \
             AND {target}.year = {staging}.year \
             AND {target}.month = {staging}.month \
             AND {target}.week = {staging}.week \
             WHEN MATCHED THEN UPDATE SET {target}.type = {staging}.type, \
                 {target}.source_value = {staging}.source_value, \
                 {target}.dest_value = {staging}.dest_value \
             WHEN NOT MATCHED THEN INSERT ({fields}) VALUES ({staging_fields})",
            target = self.location.qualified(),
            staging = staging,
            fields = Discrepancy::FIELD_NAMES.join(", "),
            staging_fields = Discrepancy::FIELD_NAMES
                .iter()
                .map(|f| format!("{staging}.{f}", staging = staging, f = f))
                .collect::<Vec<_>>()
                .join(", "),
        );
        self.conn.execute(&merge_sql, &[]).await?;
        self.conn.commit().await?;

        self.buffer.clear();
        Ok(())
    }

    /// Flush any remaining buffer and release resources.
    pub async fn close(mut self) -> Result<()> {
        self.flush().await
    }
}

pub fn dialect_placeholders(dialect: Dialect, count: usize) -> Vec<String> {
    (1..=count).map(|i| dialect.placeholder(i)).collect()
}

/// The output table's column list, typed per §6's schema and the target
/// dialect's own wide-text/bounded-text/datetime spellings. `record_insert_datetime`
/// defaults at the database on insert; the sink's own INSERT always supplies
/// an explicit value, so the default only matters for rows inserted outside
/// this crate.
fn typed_column_list(dialect: Dialect) -> String {
    let bounded = match dialect {
        Dialect::SqlServer => "VARCHAR(500)",
        Dialect::Oracle => "VARCHAR2(500)",
    };
    let wide_text = match dialect {
        Dialect::SqlServer => "NVARCHAR(MAX)",
        Dialect::Oracle => "CLOB",
    };
    let datetime = match dialect {
        Dialect::SqlServer => "DATETIME",
        Dialect::Oracle => "TIMESTAMP",
    };
    let now_fn = match dialect {
        Dialect::SqlServer => "GETDATE()",
        Dialect::Oracle => "SYSTIMESTAMP",
    };

    Discrepancy::FIELD_NAMES
        .iter()
        .map(|field| match *field {
            "primary_key" | "column" | "type" => format!("{field} {bounded}"),
            "record_insert_datetime" => format!("{field} {datetime} DEFAULT {now_fn}"),
            _ => format!("{field} {wide_text}"),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::mock::MockConnection;
    use crate::discrepancy::DiscrepancyKind;
    use crate::partition::Partition;
    use chrono::Utc;

    fn sample(pk: &str) -> Discrepancy {
        Discrepancy {
            primary_key: pk.to_string(),
            kind: DiscrepancyKind::Mismatch,
            column: Some("col".to_string()),
            source_value: Some(crate::value::Value::String("b".to_string())),
            dest_value: Some(crate::value::Value::String("c".to_string())),
            source_hash: None,
            dest_hash: None,
            year: "2021".to_string(),
            month: "01".to_string(),
            week: None,
            record_insert_datetime: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_write_below_batch_size_does_not_flush() {
        let conn = MockConnection::new(Dialect::SqlServer);
        let location = OutputLocation {
            schema: "dbo".to_string(),
            table: "mismatches".to_string(),
        };
        let mut sink = DiscrepancySink::new(&conn, location, 10);
        sink.write(sample("1")).await.unwrap();
        assert!(conn.table_rows("dbo.mismatches_staging").is_empty());
    }

    #[tokio::test]
    async fn test_flush_populates_target_table() {
        let conn = MockConnection::new(Dialect::SqlServer);
        let location = OutputLocation {
            schema: "dbo".to_string(),
            table: "mismatches".to_string(),
        };
        let mut sink = DiscrepancySink::new(&conn, location, 1);
        sink.write(sample("1")).await.unwrap();
        let target_rows = conn.table_rows("dbo.mismatches_staging");
        assert_eq!(target_rows.len(), 1);
    }

    #[test]
    fn test_qualified_name() {
        let loc = OutputLocation {
            schema: "dbo".to_string(),
            table: "mismatches".to_string(),
        };
        assert_eq!(loc.qualified(), "dbo.mismatches");
    }
}
